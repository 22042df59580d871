//! Core sequence trait and the basic combinators
//!
//! A [`Sequence`] is a lazy, single-pass producer. Consumers either pull one
//! item at a time ([`SequenceExt::next`], [`Pull`]) or hand a callback to
//! [`SequenceExt::drive`], which pushes items until the source runs dry or the
//! callback returns `false`.

use pin_project_lite::pin_project;
use std::future::{poll_fn, Future};
use std::pin::Pin;
use std::task::{ready, Context, Poll};

/// A lazy producer of values.
///
/// Generators are always ready; only the concurrent combinators ever return
/// `Poll::Pending`.
pub trait Sequence {
    type Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>>;

    /// Release producer-side resources once the consumer is done with the
    /// sequence, whether or not it was exhausted. Must be idempotent.
    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let _ = cx;
        Poll::Ready(())
    }
}

/// A type-erased sequence, handy for chaining heterogeneous sources.
pub type BoxSequence<'a, T> = Pin<Box<dyn Sequence<Item = T> + Send + 'a>>;

impl<S: Sequence + ?Sized> Sequence for Pin<Box<S>> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().as_mut().poll_next(cx)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.get_mut().as_mut().poll_close(cx)
    }
}

impl<S: Sequence + Unpin + ?Sized> Sequence for Box<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut **self.get_mut()).poll_next(cx)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        Pin::new(&mut **self.get_mut()).poll_close(cx)
    }
}

impl<S: Sequence + Unpin + ?Sized> Sequence for &mut S {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut **self.get_mut()).poll_next(cx)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        Pin::new(&mut **self.get_mut()).poll_close(cx)
    }
}

/// Extension trait providing the consumer operations and the basic combinators
pub trait SequenceExt: Sequence + Sized {
    /// Get the next item from the sequence
    fn next(&mut self) -> Next<'_, Self>
    where
        Self: Unpin,
    {
        Next { seq: self }
    }

    /// Push every item into `f` until the source is exhausted or `f` returns
    /// `false`. The sequence is closed before the future resolves.
    fn drive<F>(self, f: F) -> Drive<Self, F>
    where
        F: FnMut(Self::Item) -> bool,
    {
        Drive { seq: self, f, stopped: false }
    }

    /// Convert into a cursor that can be advanced independently of other cursors.
    fn pull(self) -> Pull<Self> {
        Pull::new(self)
    }

    /// Release producer-side resources without consuming the sequence.
    fn close(&mut self) -> Close<'_, Self>
    where
        Self: Unpin,
    {
        Close { seq: self }
    }

    fn collect<B>(self) -> Collect<Self, B>
    where
        B: Default + Extend<Self::Item>,
    {
        Collect { seq: self, collection: B::default(), drained: false }
    }

    /// Drain the sequence into a `Vec`.
    fn to_vec(self) -> Collect<Self, Vec<Self::Item>> {
        self.collect()
    }

    /// Map every item through `f`, preserving order and cardinality.
    fn apply<U, F>(self, f: F) -> Apply<Self, F>
    where
        F: FnMut(Self::Item) -> U,
    {
        Apply { seq: self, f }
    }

    /// Keep the items satisfying `f`.
    fn filter<F>(self, f: F) -> Filter<Self, F>
    where
        F: FnMut(&Self::Item) -> bool,
    {
        Filter { seq: self, f, keep: true }
    }

    /// Discard the items satisfying `f`.
    fn drop_where<F>(self, f: F) -> Filter<Self, F>
    where
        F: FnMut(&Self::Item) -> bool,
    {
        Filter { seq: self, f, keep: false }
    }

    /// Yield at most the first `n` items.
    fn limit(self, n: usize) -> Limit<Self> {
        Limit { seq: self, remaining: n }
    }

    /// Yield items until `f` first fails, then stop for good.
    fn take_while<F>(self, f: F) -> TakeWhile<Self, F>
    where
        F: FnMut(&Self::Item) -> bool,
    {
        TakeWhile { seq: self, f, done: false }
    }

    fn boxed<'a>(self) -> BoxSequence<'a, Self::Item>
    where
        Self: Send + 'a,
    {
        Box::pin(self)
    }
}

impl<S: Sequence + Sized> SequenceExt for S {}

// Consumer futures

#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Next<'a, S: ?Sized> {
    seq: &'a mut S,
}

impl<S: Sequence + Unpin + ?Sized> Future for Next<'_, S> {
    type Output = Option<S::Item>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut *self.get_mut().seq).poll_next(cx)
    }
}

#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Close<'a, S: ?Sized> {
    seq: &'a mut S,
}

impl<S: Sequence + Unpin + ?Sized> Future for Close<'_, S> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut *self.get_mut().seq).poll_close(cx)
    }
}

pin_project! {
    #[must_use = "futures do nothing unless you `.await` or poll them"]
    pub struct Drive<S, F> {
        #[pin]
        seq: S,
        f: F,
        stopped: bool,
    }
}

impl<S, F> Future for Drive<S, F>
where
    S: Sequence,
    F: FnMut(S::Item) -> bool,
{
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut this = self.project();

        while !*this.stopped {
            match this.seq.as_mut().poll_next(cx) {
                Poll::Ready(Some(item)) => {
                    if !(this.f)(item) {
                        *this.stopped = true;
                    }
                }
                Poll::Ready(None) => *this.stopped = true,
                Poll::Pending => return Poll::Pending,
            }
        }

        this.seq.poll_close(cx)
    }
}

pin_project! {
    /// Drains the sequence, then closes it before resolving.
    #[must_use = "futures do nothing unless you `.await` or poll them"]
    pub struct Collect<S, B> {
        #[pin]
        seq: S,
        collection: B,
        drained: bool,
    }
}

impl<S, B> Future for Collect<S, B>
where
    S: Sequence,
    B: Default + Extend<S::Item>,
{
    type Output = B;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut this = self.project();
        while !*this.drained {
            match ready!(this.seq.as_mut().poll_next(cx)) {
                Some(item) => this.collection.extend(std::iter::once(item)),
                None => *this.drained = true,
            }
        }

        // A `limit` or `take_while` upstream may have stopped a live producer
        ready!(this.seq.poll_close(cx));
        Poll::Ready(std::mem::take(this.collection))
    }
}

// Pull adapter

/// A cursor over a sequence.
///
/// Used wherever two sequences have to be advanced out of lockstep. Call
/// [`Pull::close`] when done early so that producers backed by background
/// tasks are torn down deterministically; dropping the cursor only aborts them.
pub struct Pull<S> {
    seq: Pin<Box<S>>,
    exhausted: bool,
    closed: bool,
}

impl<S: Sequence> Pull<S> {
    pub fn new(seq: S) -> Self {
        Self { seq: Box::pin(seq), exhausted: false, closed: false }
    }

    pub async fn next(&mut self) -> Option<S::Item> {
        poll_fn(|cx| self.poll_item(cx)).await
    }

    /// Dispose of the underlying sequence.
    pub async fn close(mut self) {
        poll_fn(|cx| self.poll_dispose(cx)).await
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub(crate) fn poll_item(&mut self, cx: &mut Context<'_>) -> Poll<Option<S::Item>> {
        if self.exhausted || self.closed {
            return Poll::Ready(None);
        }
        let item = ready!(self.seq.as_mut().poll_next(cx));
        if item.is_none() {
            self.exhausted = true;
        }
        Poll::Ready(item)
    }

    pub(crate) fn poll_dispose(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        if !self.closed {
            ready!(self.seq.as_mut().poll_close(cx));
            self.closed = true;
        }
        Poll::Ready(())
    }
}

impl<S: Sequence> Sequence for Pull<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().poll_item(cx)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.get_mut().poll_dispose(cx)
    }
}

// Combinator structs

pin_project! {
    pub struct Apply<S, F> {
        #[pin]
        seq: S,
        f: F,
    }
}

impl<S, U, F> Sequence for Apply<S, F>
where
    S: Sequence,
    F: FnMut(S::Item) -> U,
{
    type Item = U;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        match this.seq.poll_next(cx) {
            Poll::Ready(Some(item)) => Poll::Ready(Some((this.f)(item))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.project().seq.poll_close(cx)
    }
}

pin_project! {
    pub struct Filter<S, F> {
        #[pin]
        seq: S,
        f: F,
        keep: bool,
    }
}

impl<S, F> Sequence for Filter<S, F>
where
    S: Sequence,
    F: FnMut(&S::Item) -> bool,
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        loop {
            match this.seq.as_mut().poll_next(cx) {
                Poll::Ready(Some(item)) => {
                    if (this.f)(&item) == *this.keep {
                        return Poll::Ready(Some(item));
                    }
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.project().seq.poll_close(cx)
    }
}

pin_project! {
    pub struct Limit<S> {
        #[pin]
        seq: S,
        remaining: usize,
    }
}

impl<S: Sequence> Sequence for Limit<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        if *this.remaining == 0 {
            return Poll::Ready(None);
        }
        match this.seq.poll_next(cx) {
            Poll::Ready(Some(item)) => {
                *this.remaining -= 1;
                Poll::Ready(Some(item))
            }
            Poll::Ready(None) => {
                *this.remaining = 0;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.project().seq.poll_close(cx)
    }
}

pin_project! {
    pub struct TakeWhile<S, F> {
        #[pin]
        seq: S,
        f: F,
        done: bool,
    }
}

impl<S, F> Sequence for TakeWhile<S, F>
where
    S: Sequence,
    F: FnMut(&S::Item) -> bool,
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        if *this.done {
            return Poll::Ready(None);
        }
        match this.seq.poll_next(cx) {
            Poll::Ready(Some(item)) if (this.f)(&item) => Poll::Ready(Some(item)),
            Poll::Ready(_) => {
                *this.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.project().seq.poll_close(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seq::constructors::{count, empty, from_iter};
    use tokio_test::block_on;

    #[test]
    fn drive_stops_when_consumer_declines() {
        let mut seen = Vec::new();
        block_on(count(0, 1).drive(|x| {
            seen.push(x);
            seen.len() < 3
        }));
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[test]
    fn drive_runs_to_exhaustion() {
        let mut seen = Vec::new();
        block_on(from_iter(vec!['a', 'b']).drive(|c| {
            seen.push(c);
            true
        }));
        assert_eq!(seen, vec!['a', 'b']);
    }

    #[test]
    fn pull_reports_exhaustion() {
        block_on(async {
            let mut cursor = from_iter(vec![1]).pull();
            assert_eq!(cursor.next().await, Some(1));
            assert!(!cursor.is_exhausted());
            assert_eq!(cursor.next().await, None);
            assert!(cursor.is_exhausted());
            assert_eq!(cursor.next().await, None);
            cursor.close().await;
        });
    }

    #[test]
    fn filter_and_drop_are_complements() {
        let kept = block_on(from_iter(1..=9).filter(|x| x % 3 == 0).to_vec());
        let dropped = block_on(from_iter(1..=9).drop_where(|x| x % 3 == 0).to_vec());
        assert_eq!(kept, vec![3, 6, 9]);
        assert_eq!(dropped, vec![1, 2, 4, 5, 7, 8]);
    }

    #[test]
    fn limit_zero_never_pulls() {
        let mut pulled = 0;
        let out = block_on(
            from_iter(1..=5)
                .apply(|x| {
                    pulled += 1;
                    x
                })
                .limit(0)
                .to_vec(),
        );
        assert!(out.is_empty());
        assert_eq!(pulled, 0);
    }

    #[test]
    fn take_while_does_not_resume() {
        let out = block_on(from_iter(vec![1, 2, 9, 3, 4]).take_while(|x| *x < 5).to_vec());
        assert_eq!(out, vec![1, 2]);
    }

    #[test]
    fn boxed_sequences_compose() {
        let boxed: BoxSequence<'static, i32> = from_iter(vec![1, 2, 3]).apply(|x| x * 10).boxed();
        assert_eq!(block_on(boxed.to_vec()), vec![10, 20, 30]);
        assert!(block_on(empty::<i32>().boxed().to_vec()).is_empty());
    }
}
