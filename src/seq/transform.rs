//! Transform combinators: batch, accumulate, pairwise, index, chain, range_over
use pin_project_lite::pin_project;
use std::collections::VecDeque;
use std::ops::Add;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use super::core::Sequence;

// Batch
pin_project! {
    pub struct Batch<S>
    where
        S: Sequence,
    {
        #[pin]
        seq: S,
        size: usize,
        buffer: Vec<S::Item>,
        done: bool,
    }
}

impl<S: Sequence> Sequence for Batch<S> {
    type Item = Vec<S::Item>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        if *this.done || *this.size == 0 {
            return Poll::Ready(None);
        }

        while this.buffer.len() < *this.size {
            match ready!(this.seq.as_mut().poll_next(cx)) {
                Some(item) => this.buffer.push(item),
                None => {
                    *this.done = true;
                    if this.buffer.is_empty() {
                        return Poll::Ready(None);
                    }
                    return Poll::Ready(Some(std::mem::take(this.buffer)));
                }
            }
        }

        let chunk = std::mem::replace(this.buffer, Vec::with_capacity(*this.size));
        Poll::Ready(Some(chunk))
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.project().seq.poll_close(cx)
    }
}

// Accumulate
pin_project! {
    /// Inclusive running fold starting from `T::default()`.
    pub struct Accumulate<S, F>
    where
        S: Sequence,
    {
        #[pin]
        seq: S,
        acc: Option<S::Item>,
        f: F,
    }
}

impl<S, F> Sequence for Accumulate<S, F>
where
    S: Sequence,
    S::Item: Default + Clone,
    F: FnMut(S::Item, S::Item) -> S::Item,
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        match ready!(this.seq.poll_next(cx)) {
            Some(item) => {
                let acc = this.acc.take().unwrap_or_default();
                let next = (this.f)(acc, item);
                *this.acc = Some(next.clone());
                Poll::Ready(Some(next))
            }
            None => Poll::Ready(None),
        }
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.project().seq.poll_close(cx)
    }
}

// PairWise
pin_project! {
    pub struct PairWise<S>
    where
        S: Sequence,
    {
        #[pin]
        seq: S,
        prev: Option<S::Item>,
    }
}

impl<S> Sequence for PairWise<S>
where
    S: Sequence,
    S::Item: Clone,
{
    type Item = (S::Item, S::Item);

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        loop {
            match ready!(this.seq.as_mut().poll_next(cx)) {
                Some(item) => {
                    if let Some(prev) = this.prev.replace(item.clone()) {
                        return Poll::Ready(Some((prev, item)));
                    }
                }
                None => return Poll::Ready(None),
            }
        }
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.project().seq.poll_close(cx)
    }
}

// Index
pin_project! {
    pub struct Index<S> {
        #[pin]
        seq: S,
        index: usize,
    }
}

impl<S: Sequence> Sequence for Index<S> {
    type Item = (usize, S::Item);

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        match ready!(this.seq.poll_next(cx)) {
            Some(item) => {
                let idx = *this.index;
                *this.index = this.index.saturating_add(1);
                Poll::Ready(Some((idx, item)))
            }
            None => Poll::Ready(None),
        }
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.project().seq.poll_close(cx)
    }
}

// Chain
pin_project! {
    pub struct Chain<S1, S2> {
        #[pin]
        first: S1,
        #[pin]
        second: S2,
        first_done: bool,
    }
}

impl<S1, S2> Sequence for Chain<S1, S2>
where
    S1: Sequence,
    S2: Sequence<Item = S1::Item>,
{
    type Item = S1::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();

        if !*this.first_done {
            match ready!(this.first.poll_next(cx)) {
                Some(item) => return Poll::Ready(Some(item)),
                None => *this.first_done = true,
            }
        }

        this.second.poll_next(cx)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.project();
        if !*this.first_done {
            ready!(this.first.poll_close(cx));
            *this.first_done = true;
        }
        this.second.poll_close(cx)
    }
}

/// Concatenation of any number of sequences of the same type.
pub struct ChainAll<S> {
    sources: VecDeque<Pin<Box<S>>>,
}

impl<S: Sequence> Sequence for ChainAll<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        while let Some(front) = this.sources.front_mut() {
            match ready!(front.as_mut().poll_next(cx)) {
                Some(item) => return Poll::Ready(Some(item)),
                None => {
                    this.sources.pop_front();
                }
            }
        }
        Poll::Ready(None)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        while let Some(front) = this.sources.front_mut() {
            ready!(front.as_mut().poll_close(cx));
            this.sources.pop_front();
        }
        Poll::Ready(())
    }
}

/// Concatenate `sources` in argument order, draining each before the next.
pub fn chain_all<I>(sources: I) -> ChainAll<I::Item>
where
    I: IntoIterator,
    I::Item: Sequence,
{
    ChainAll { sources: sources.into_iter().map(Box::pin).collect() }
}

// RangeOver
pin_project! {
    /// Sub-sampling window over a sequence: positions `start`,
    /// `start + step`, … strictly below `stop`.
    pub struct RangeOver<S> {
        #[pin]
        seq: S,
        start: usize,
        step: usize,
        stop: usize,
        position: usize,
    }
}

impl<S: Sequence> Sequence for RangeOver<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        if *this.step == 0 {
            return Poll::Ready(None);
        }

        while *this.position < *this.stop {
            match ready!(this.seq.as_mut().poll_next(cx)) {
                Some(item) => {
                    let position = *this.position;
                    *this.position += 1;
                    if position >= *this.start && (position - *this.start) % *this.step == 0 {
                        return Poll::Ready(Some(item));
                    }
                }
                None => {
                    *this.position = *this.stop;
                }
            }
        }
        Poll::Ready(None)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.project().seq.poll_close(cx)
    }
}

// Extension trait for these combinators
pub trait TransformSequenceExt: Sequence + Sized {
    /// Group consecutive items into chunks of `size`. The last chunk may be
    /// shorter; a zero size yields nothing.
    fn batch(self, size: usize) -> Batch<Self> {
        Batch { seq: self, size, buffer: Vec::with_capacity(size), done: false }
    }

    /// Running sum, starting from the type's zero value.
    fn accumulate(self) -> Accumulate<Self, fn(Self::Item, Self::Item) -> Self::Item>
    where
        Self::Item: Add<Output = Self::Item> + Default + Clone,
    {
        Accumulate { seq: self, acc: None, f: <Self::Item as Add>::add }
    }

    /// Running fold with `f`, starting from `Self::Item::default()`.
    fn accumulate_with<F>(self, f: F) -> Accumulate<Self, F>
    where
        Self::Item: Default + Clone,
        F: FnMut(Self::Item, Self::Item) -> Self::Item,
    {
        Accumulate { seq: self, acc: None, f }
    }

    /// Overlapping pairs of consecutive items.
    fn pairwise(self) -> PairWise<Self>
    where
        Self::Item: Clone,
    {
        PairWise { seq: self, prev: None }
    }

    /// Pair every item with its 0-based position.
    fn index(self) -> Index<Self> {
        Index { seq: self, index: 0 }
    }

    fn chain<S2>(self, other: S2) -> Chain<Self, S2>
    where
        S2: Sequence<Item = Self::Item>,
    {
        Chain { first: self, second: other, first_done: false }
    }

    /// Skip to `start`, then yield every `step`-th item until position `stop`.
    fn range_over(self, start: usize, step: usize, stop: usize) -> RangeOver<Self> {
        RangeOver { seq: self, start, step, stop, position: 0 }
    }
}

impl<S: Sequence + Sized> TransformSequenceExt for S {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seq::constructors::{count, empty, from_iter};
    use crate::seq::core::SequenceExt;
    use tokio_test::block_on;

    #[test]
    fn batch_emits_short_tail() {
        let out = block_on(from_iter(1..=8).batch(3).to_vec());
        assert_eq!(out, vec![vec![1, 2, 3], vec![4, 5, 6], vec![7, 8]]);
    }

    #[test]
    fn batch_of_zero_is_empty() {
        assert!(block_on(from_iter(1..=8).batch(0).to_vec()).is_empty());
    }

    #[test]
    fn batch_over_infinite_source() {
        let out = block_on(count(0u32, 1).batch(2).limit(2).to_vec());
        assert_eq!(out, vec![vec![0, 1], vec![2, 3]]);
    }

    #[test]
    fn accumulate_is_an_inclusive_scan() {
        assert_eq!(block_on(from_iter(vec![1, 2, 3, 4]).accumulate().to_vec()), vec![1, 3, 6, 10]);
        assert!(block_on(empty::<i32>().accumulate().to_vec()).is_empty());
    }

    #[test]
    fn accumulate_with_starts_from_default() {
        let out = block_on(
            from_iter(vec![vec!["a", "b"], vec!["c", "d"]])
                .accumulate_with(|mut acc, next| {
                    acc.extend(next);
                    acc
                })
                .to_vec(),
        );
        assert_eq!(out, vec![vec!["a", "b"], vec!["a", "b", "c", "d"]]);
    }

    #[test]
    fn pairwise_needs_two_items() {
        assert!(block_on(from_iter(vec![1]).pairwise().to_vec()).is_empty());
        assert_eq!(block_on(from_iter(1..=4).pairwise().to_vec()), vec![(1, 2), (2, 3), (3, 4)]);
    }

    #[test]
    fn range_over_samples_positions() {
        let out = block_on(from_iter(1..=8).range_over(1, 2, 10).to_vec());
        assert_eq!(out, vec![2, 4, 6, 8]);
        assert!(block_on(from_iter(1..=8).range_over(0, 0, 10).to_vec()).is_empty());
    }

    #[test]
    fn range_over_stops_pulling_at_stop() {
        // Infinite source, so this only terminates if stop is honoured
        let out = block_on(count(0u64, 1).range_over(2, 3, 12).to_vec());
        assert_eq!(out, vec![2, 5, 8, 11]);
    }

    #[test]
    fn chain_all_drains_in_argument_order() {
        let out = block_on(chain_all(vec![from_iter(vec![1, 2]), from_iter(vec![]), from_iter(vec![3])]).to_vec());
        assert_eq!(out, vec![1, 2, 3]);
    }
}
