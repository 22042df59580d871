//! Combinatorial combinators: zip, zip_fill, product, permutations, combinations
//!
//! | Combinator | Output size |
//! |------------|-------------|
//! | `zip(a, b)` | min(len a, len b) |
//! | `zip_fill(a, b, ..)` | max(len a, len b) |
//! | `product(a, b)` | len a * len b |
//! | `permutations(items, k)` | n!/(n-k)! |
//! | `combinations(items, k)` | C(n, k) |
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};

use super::constructors::{from_iter, Iter};
use super::core::{Pull, Sequence};

// ================================
// Zip
// ================================

/// Positional pairing that ends as soon as either side is exhausted.
pub struct Zip<S1: Sequence, S2: Sequence> {
    a: Pull<S1>,
    b: Pull<S2>,
    item_a: Option<S1::Item>,
    item_b: Option<S2::Item>,
    done: bool,
}

impl<S1: Sequence, S2: Sequence> Unpin for Zip<S1, S2> {}

impl<S1: Sequence, S2: Sequence> Sequence for Zip<S1, S2> {
    type Item = (S1::Item, S2::Item);

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        if this.item_a.is_none() {
            match this.a.poll_item(cx) {
                Poll::Ready(Some(item)) => this.item_a = Some(item),
                Poll::Ready(None) => {
                    this.done = true;
                    return Poll::Ready(None);
                }
                Poll::Pending => {}
            }
        }

        if this.item_b.is_none() {
            match this.b.poll_item(cx) {
                Poll::Ready(Some(item)) => this.item_b = Some(item),
                Poll::Ready(None) => {
                    this.done = true;
                    return Poll::Ready(None);
                }
                Poll::Pending => {}
            }
        }

        match (this.item_a.take(), this.item_b.take()) {
            (Some(a), Some(b)) => Poll::Ready(Some((a, b))),
            (a, b) => {
                this.item_a = a;
                this.item_b = b;
                Poll::Pending
            }
        }
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        let a = this.a.poll_dispose(cx);
        let b = this.b.poll_dispose(cx);
        if a.is_ready() && b.is_ready() {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}

// ================================
// ZipFill
// ================================

/// Positional pairing that runs to the longer side, padding the shorter one.
pub struct ZipFill<S1: Sequence, S2: Sequence> {
    a: Pull<S1>,
    b: Pull<S2>,
    item_a: Option<Option<S1::Item>>,
    item_b: Option<Option<S2::Item>>,
    fill_a: S1::Item,
    fill_b: S2::Item,
}

impl<S1: Sequence, S2: Sequence> Unpin for ZipFill<S1, S2> {}

impl<S1, S2> Sequence for ZipFill<S1, S2>
where
    S1: Sequence,
    S2: Sequence,
    S1::Item: Clone,
    S2::Item: Clone,
{
    type Item = (S1::Item, S2::Item);

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        // `Some(None)` records that the side is exhausted for this round
        if this.item_a.is_none() {
            if let Poll::Ready(item) = this.a.poll_item(cx) {
                this.item_a = Some(item);
            }
        }
        if this.item_b.is_none() {
            if let Poll::Ready(item) = this.b.poll_item(cx) {
                this.item_b = Some(item);
            }
        }

        match (this.item_a.take(), this.item_b.take()) {
            (Some(None), Some(None)) => {
                this.item_a = Some(None);
                this.item_b = Some(None);
                Poll::Ready(None)
            }
            (Some(a), Some(b)) => {
                let a = a.unwrap_or_else(|| this.fill_a.clone());
                let b = b.unwrap_or_else(|| this.fill_b.clone());
                Poll::Ready(Some((a, b)))
            }
            (a, b) => {
                this.item_a = a;
                this.item_b = b;
                Poll::Pending
            }
        }
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        let a = this.a.poll_dispose(cx);
        let b = this.b.poll_dispose(cx);
        if a.is_ready() && b.is_ready() {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}

// ================================
// Product
// ================================

pin_project! {
    /// Cartesian product, outer loop over the first sequence.
    ///
    /// The inner sequence is recorded on its first pass and replayed for
    /// every later outer item.
    pub struct Product<S1, S2>
    where
        S1: Sequence,
        S2: Sequence,
    {
        #[pin]
        outer: S1,
        #[pin]
        inner: S2,
        current: Option<S1::Item>,
        recorded: Vec<S2::Item>,
        position: usize,
        inner_done: bool,
    }
}

impl<S1, S2> Sequence for Product<S1, S2>
where
    S1: Sequence,
    S2: Sequence,
    S1::Item: Clone,
    S2::Item: Clone,
{
    type Item = (S1::Item, S2::Item);

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            let a = match this.current.as_ref() {
                Some(a) => a,
                None => {
                    // Nothing to pair with, so the outer side is left untouched
                    if *this.inner_done && this.recorded.is_empty() {
                        return Poll::Ready(None);
                    }
                    match this.outer.as_mut().poll_next(cx) {
                        Poll::Ready(Some(a)) => {
                            *this.current = Some(a);
                            *this.position = 0;
                            continue;
                        }
                        Poll::Ready(None) => return Poll::Ready(None),
                        Poll::Pending => return Poll::Pending,
                    }
                }
            };

            if *this.position < this.recorded.len() {
                let pair = (a.clone(), this.recorded[*this.position].clone());
                *this.position += 1;
                return Poll::Ready(Some(pair));
            }

            if *this.inner_done {
                *this.current = None;
                continue;
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(b)) => {
                    let pair = (a.clone(), b.clone());
                    this.recorded.push(b);
                    *this.position += 1;
                    return Poll::Ready(Some(pair));
                }
                Poll::Ready(None) => {
                    *this.inner_done = true;
                    *this.current = None;
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.project();
        let outer = this.outer.poll_close(cx);
        let inner = this.inner.poll_close(cx);
        if outer.is_ready() && inner.is_ready() {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}

// ================================
// Subset indices
// ================================

/// Index sets of size `k` out of `0..n`, in colexicographic order.
///
/// Colex order of index sets is the same as ascending order of the subset
/// bitmasks, without being limited to a machine word.
#[derive(Debug, Clone)]
struct SubsetIndices {
    n: usize,
    indices: Vec<usize>,
    started: bool,
    done: bool,
}

impl SubsetIndices {
    fn new(n: usize, k: usize) -> Self {
        Self { n, indices: (0..k).collect(), started: false, done: k == 0 || k > n }
    }

    fn advance(&mut self) -> Option<&[usize]> {
        if self.done {
            return None;
        }
        if !self.started {
            self.started = true;
            return Some(&self.indices);
        }

        let k = self.indices.len();
        for j in 0..k {
            let limit = if j + 1 < k { self.indices[j + 1] } else { self.n };
            if self.indices[j] + 1 < limit {
                self.indices[j] += 1;
                for (t, slot) in self.indices[..j].iter_mut().enumerate() {
                    *slot = t;
                }
                return Some(&self.indices);
            }
        }

        self.done = true;
        None
    }
}

// ================================
// Permutations
// ================================

/// `k`-length arrangements of the pool.
///
/// Each `k`-subset (in combination order) is permuted in place with Heap's
/// algorithm, so every arrangement appears exactly once and the original
/// order comes first. For `k == n` this is plain Heap's algorithm over the
/// whole pool.
#[derive(Debug, Clone)]
pub struct Permutations<T> {
    pool: Vec<T>,
    subsets: SubsetIndices,
    work: Vec<T>,
    counters: Vec<usize>,
    i: usize,
    active: bool,
}

impl<T: Clone> Permutations<T> {
    fn advance(&mut self) -> Option<Vec<T>> {
        loop {
            if !self.active {
                let indices = self.subsets.advance()?;
                self.work = indices.iter().map(|&i| self.pool[i].clone()).collect();
                self.counters = vec![0; self.work.len()];
                self.i = 0;
                self.active = true;
                return Some(self.work.clone());
            }

            let k = self.work.len();
            while self.i < k {
                let i = self.i;
                if self.counters[i] < i {
                    if i % 2 == 0 {
                        self.work.swap(0, i);
                    } else {
                        self.work.swap(self.counters[i], i);
                    }
                    self.counters[i] += 1;
                    self.i = 0;
                    return Some(self.work.clone());
                }
                self.counters[i] = 0;
                self.i += 1;
            }

            self.active = false;
        }
    }
}

impl<T> Unpin for Permutations<T> {}

impl<T: Clone> Sequence for Permutations<T> {
    type Item = Vec<T>;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.get_mut().advance())
    }
}

// ================================
// Combinations
// ================================

/// `k`-element subsets of the pool, preserving relative order.
#[derive(Debug, Clone)]
pub struct Combinations<T> {
    pool: Vec<T>,
    subsets: SubsetIndices,
}

impl<T> Unpin for Combinations<T> {}

impl<T: Clone> Sequence for Combinations<T> {
    type Item = Vec<T>;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let pool = &this.pool;
        Poll::Ready(this.subsets.advance().map(|indices| indices.iter().map(|&i| pool[i].clone()).collect()))
    }
}

// ================================
// Constructor Functions
// ================================

/// Pair two sequences positionally, stopping at the shorter one.
pub fn zip<S1: Sequence, S2: Sequence>(a: S1, b: S2) -> Zip<S1, S2> {
    Zip { a: Pull::new(a), b: Pull::new(b), item_a: None, item_b: None, done: false }
}

/// Pair two collections positionally, stopping at the shorter one.
pub fn zip_slices<A, B>(a: Vec<A>, b: Vec<B>) -> Zip<Iter<std::vec::IntoIter<A>>, Iter<std::vec::IntoIter<B>>> {
    zip(from_iter(a), from_iter(b))
}

/// Pair two sequences positionally up to the longer one, substituting
/// `fill_a` / `fill_b` for the exhausted side.
pub fn zip_fill<S1: Sequence, S2: Sequence>(a: S1, b: S2, fill_a: S1::Item, fill_b: S2::Item) -> ZipFill<S1, S2> {
    ZipFill { a: Pull::new(a), b: Pull::new(b), item_a: None, item_b: None, fill_a, fill_b }
}

/// Cartesian product: `(a0, b0), (a0, b1), …, (a1, b0), …`.
pub fn product<S1: Sequence, S2: Sequence>(a: S1, b: S2) -> Product<S1, S2> {
    Product { outer: a, inner: b, current: None, recorded: Vec::new(), position: 0, inner_done: false }
}

/// All `k`-length arrangements of `items`. `k == 0` yields nothing and a
/// `k` beyond the length is clamped to it.
///
/// Takes ownership of `items` since the algorithm swaps elements in place;
/// every yielded `Vec` is an independent copy.
pub fn permutations<T: Clone>(items: Vec<T>, k: usize) -> Permutations<T> {
    let k = k.min(items.len());
    Permutations {
        subsets: SubsetIndices::new(items.len(), k),
        pool: items,
        work: Vec::with_capacity(k),
        counters: Vec::with_capacity(k),
        i: 0,
        active: false,
    }
}

/// All `k`-element subsets of `items` in ascending subset-bitmask order.
/// `k == 0` yields nothing and a `k` beyond the length is clamped to it.
pub fn combinations<T: Clone>(items: Vec<T>, k: usize) -> Combinations<T> {
    let k = k.min(items.len());
    Combinations { subsets: SubsetIndices::new(items.len(), k), pool: items }
}

// Extension trait for the sequence-based flavors
pub trait CombinatoricSequenceExt: Sequence + Sized {
    fn zip<S2: Sequence>(self, other: S2) -> Zip<Self, S2> {
        zip(self, other)
    }

    fn zip_fill<S2: Sequence>(self, other: S2, fill_self: Self::Item, fill_other: S2::Item) -> ZipFill<Self, S2> {
        zip_fill(self, other, fill_self, fill_other)
    }

    fn product<S2: Sequence>(self, other: S2) -> Product<Self, S2> {
        product(self, other)
    }
}

impl<S: Sequence + Sized> CombinatoricSequenceExt for S {}
