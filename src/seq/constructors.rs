//! Sequence constructors: empty, once, from_iter, from_string, range, count, repeat, cycle
use pin_project_lite::pin_project;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use super::core::Sequence;

// ================================
// Numeric stepping
// ================================

/// Numbers a [`Range`] or [`Count`] can step through.
///
/// Integer stepping is checked: reaching the end of the type's domain ends
/// the sequence instead of wrapping around.
pub trait Step: Copy + PartialOrd {
    const ZERO: Self;

    fn checked_step(self, step: Self) -> Option<Self>;
}

macro_rules! impl_step_int {
    ($($t:ty),*) => {
        $(
            impl Step for $t {
                const ZERO: Self = 0;

                fn checked_step(self, step: Self) -> Option<Self> {
                    self.checked_add(step)
                }
            }
        )*
    };
}

macro_rules! impl_step_float {
    ($($t:ty),*) => {
        $(
            impl Step for $t {
                const ZERO: Self = 0.0;

                fn checked_step(self, step: Self) -> Option<Self> {
                    Some(self + step)
                }
            }
        )*
    };
}

impl_step_int!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);
impl_step_float!(f32, f64);

// ================================
// Basic Constructors
// ================================

pub struct Empty<T> {
    _phantom: PhantomData<T>,
}

impl<T> Sequence for Empty<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(None)
    }
}

// PhantomData<T> would otherwise tie Unpin to T
impl<T> Unpin for Empty<T> {}

pub struct Once<T> {
    value: Option<T>,
}

impl<T> Unpin for Once<T> {}

impl<T> Sequence for Once<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.get_mut().value.take())
    }
}

pin_project! {
    /// The same value forever, see [`repeat`].
    pub struct Repeat<T> {
        value: T,
    }
}

impl<T: Clone> Sequence for Repeat<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(Some(self.project().value.clone()))
    }
}

pin_project! {
    /// Sequence over any iterator or collection.
    pub struct Iter<I> {
        iter: I,
    }
}

impl<I: Iterator> Sequence for Iter<I> {
    type Item = I::Item;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.project().iter.next())
    }
}

// ================================
// Numeric Generators
// ================================

/// Finite arithmetic progression, see [`range`].
#[derive(Debug, Clone)]
pub struct Range<T> {
    next: Option<T>,
    end: T,
    step: T,
}

impl<T: Step> Range<T> {
    fn advance(&mut self) -> Option<T> {
        let current = self.next?;
        let in_bounds = if self.step > T::ZERO {
            current < self.end
        } else if self.step < T::ZERO {
            current > self.end
        } else {
            false
        };
        if !in_bounds {
            self.next = None;
            return None;
        }
        self.next = current.checked_step(self.step);
        Some(current)
    }
}

impl<T: Step> Unpin for Range<T> {}

impl<T: Step> Sequence for Range<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.get_mut().advance())
    }
}

/// Infinite arithmetic progression, see [`count`].
#[derive(Debug, Clone)]
pub struct Count<T> {
    next: Option<T>,
    step: T,
}

impl<T: Step> Count<T> {
    fn advance(&mut self) -> Option<T> {
        let current = self.next?;
        self.next = current.checked_step(self.step);
        Some(current)
    }
}

impl<T: Step> Unpin for Count<T> {}

impl<T: Step> Sequence for Count<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.get_mut().advance())
    }
}

// ================================
// Cycle
// ================================

pin_project! {
    /// Endless repetition of a finite source.
    ///
    /// The first pass is recorded and replayed afterwards, so the source is
    /// only driven once.
    pub struct Cycle<S>
    where
        S: Sequence,
    {
        #[pin]
        source: S,
        recorded: Vec<S::Item>,
        replay: Option<usize>,
    }
}

impl<S> Sequence for Cycle<S>
where
    S: Sequence,
    S::Item: Clone,
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();

        let position = match *this.replay {
            Some(position) => position,
            None => match this.source.poll_next(cx) {
                Poll::Ready(Some(item)) => {
                    this.recorded.push(item.clone());
                    return Poll::Ready(Some(item));
                }
                Poll::Ready(None) => 0,
                Poll::Pending => return Poll::Pending,
            },
        };

        // An empty first pass means there is nothing to loop over
        if this.recorded.is_empty() {
            *this.replay = Some(0);
            return Poll::Ready(None);
        }

        let item = this.recorded[position].clone();
        *this.replay = Some((position + 1) % this.recorded.len());
        Poll::Ready(Some(item))
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.project().source.poll_close(cx)
    }
}

// ================================
// Constructor Functions
// ================================

/// Create an empty sequence
pub fn empty<T>() -> Empty<T> {
    Empty { _phantom: PhantomData }
}

/// Create a sequence that yields a single value
pub fn once<T>(value: T) -> Once<T> {
    Once { value: Some(value) }
}

/// Create a sequence from an iterator or collection
pub fn from_iter<I>(iter: I) -> Iter<I::IntoIter>
where
    I: IntoIterator,
{
    Iter { iter: iter.into_iter() }
}

/// Create a sequence over the characters of `s`
pub fn from_string(s: &str) -> Iter<std::vec::IntoIter<char>> {
    from_iter(s.chars().collect::<Vec<_>>())
}

/// `start, start + step, …` while below `end` (above it for a negative
/// step). A zero step yields nothing.
pub fn range<T: Step>(start: T, end: T, step: T) -> Range<T> {
    Range { next: Some(start), end, step }
}

/// `start, start + step, …` forever, or until the numeric type runs out.
pub fn count<T: Step>(start: T, step: T) -> Count<T> {
    Count { next: Some(start), step }
}

/// A clone of `value` forever.
pub fn repeat<T: Clone>(value: T) -> Repeat<T> {
    Repeat { value }
}

/// Repeat the items of `source` forever. An empty source yields nothing.
pub fn cycle<S>(source: S) -> Cycle<S>
where
    S: Sequence,
    S::Item: Clone,
{
    Cycle { source, recorded: Vec::new(), replay: None }
}

/// Repeat the items of a collection forever.
pub fn cycle_slice<T: Clone>(items: Vec<T>) -> Cycle<Iter<std::vec::IntoIter<T>>> {
    cycle(from_iter(items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seq::core::SequenceExt;
    use tokio_test::block_on;

    #[test]
    fn range_steps_forward_and_backward() {
        assert_eq!(block_on(range(1, 10, 2).to_vec()), vec![1, 3, 5, 7, 9]);
        assert_eq!(block_on(range(5, 0, -2).to_vec()), vec![5, 3, 1]);
        assert!(block_on(range(1, 1, 1).to_vec()).is_empty());
        assert!(block_on(range(1, 6, 0).to_vec()).is_empty());
    }

    #[test]
    fn range_stops_at_type_boundary() {
        assert_eq!(block_on(range(250u8, 255, 3).to_vec()), vec![250, 253]);
        assert_eq!(block_on(range(i8::MAX - 1, i8::MAX, 5).to_vec()), vec![126]);
    }

    #[test]
    fn count_ends_on_overflow_instead_of_wrapping() {
        assert_eq!(block_on(count(254u8, 1).to_vec()), vec![254, 255]);
    }

    #[test]
    fn repeat_clones_any_value() {
        assert_eq!(block_on(repeat(7i64).limit(3).to_vec()), vec![7, 7, 7]);
        assert_eq!(block_on(repeat("x").limit(2).to_vec()), vec!["x", "x"]);
        assert_eq!(block_on(repeat(vec![1, 2]).limit(2).to_vec()), vec![vec![1, 2], vec![1, 2]]);
    }

    #[test]
    fn float_ranges_work() {
        assert_eq!(block_on(range(0.0, 1.0, 0.25).to_vec()), vec![0.0, 0.25, 0.5, 0.75]);
    }

    #[test]
    fn once_yields_exactly_one_value() {
        assert_eq!(block_on(once("x").to_vec()), vec!["x"]);
    }

    #[test]
    fn cycle_of_empty_source_terminates() {
        assert!(block_on(cycle_slice(Vec::<u8>::new()).limit(10).to_vec()).is_empty());
    }

    #[test]
    fn cycle_replays_in_order() {
        let out = block_on(cycle(from_iter(vec![1, 2])).limit(5).to_vec());
        assert_eq!(out, vec![1, 2, 1, 2, 1]);
    }
}
