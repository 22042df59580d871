//! Fan-out of one sequence into independent branches
//!
//! Every branch observes the full source in order. Items are buffered only
//! until the slowest live branch has consumed them, and the source itself is
//! driven by whichever branch first reaches the end of the buffer. Branches
//! may be moved to different tasks and consumed concurrently.
use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Wake, Waker};

use super::constructors::{from_iter, Iter};
use super::core::{Apply, Sequence, SequenceExt};
use crate::config::TeeConfig;
use crate::error::panic_message;

// ================================
// Shared state
// ================================

/// Waker handed to the source: wakes every branch that is waiting on it.
struct WakerSet {
    wakers: Mutex<Vec<Option<Waker>>>,
}

impl WakerSet {
    fn new(branches: usize) -> Self {
        Self { wakers: Mutex::new(vec![None; branches]) }
    }

    fn register(&self, id: usize, waker: &Waker) {
        let mut wakers = self.wakers.lock().unwrap_or_else(PoisonError::into_inner);
        match &wakers[id] {
            Some(existing) if existing.will_wake(waker) => {}
            _ => wakers[id] = Some(waker.clone()),
        }
    }

    fn wake_except(&self, skip: Option<usize>) {
        let pending: Vec<Waker> = {
            let mut wakers = self.wakers.lock().unwrap_or_else(PoisonError::into_inner);
            wakers
                .iter_mut()
                .enumerate()
                .filter(|(id, _)| Some(*id) != skip)
                .filter_map(|(_, slot)| slot.take())
                .collect()
        };
        for waker in pending {
            waker.wake();
        }
    }
}

impl Wake for WakerSet {
    fn wake(self: Arc<Self>) {
        self.wake_except(None);
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.wake_except(None);
    }
}

struct TeeState<S: Sequence> {
    source: Pin<Box<S>>,
    exhausted: bool,
    source_closed: bool,
    /// Message of a panic raised while polling the source
    failure: Option<String>,
    /// Items not yet seen by every live branch
    buffer: VecDeque<S::Item>,
    /// Absolute position of `buffer[0]`
    base: usize,
    /// Absolute position of each branch, `None` once detached
    cursors: Vec<Option<usize>>,
}

impl<S: Sequence> TeeState<S> {
    fn trim(&mut self) {
        match self.cursors.iter().flatten().min() {
            Some(&slowest) => {
                while self.base < slowest && self.buffer.pop_front().is_some() {
                    self.base += 1;
                }
            }
            None => {
                self.base += self.buffer.len();
                self.buffer.clear();
            }
        }
    }

    fn all_detached(&self) -> bool {
        self.cursors.iter().all(Option::is_none)
    }
}

struct Shared<S: Sequence> {
    state: Mutex<TeeState<S>>,
    wakers: Arc<WakerSet>,
}

impl<S: Sequence> Shared<S> {
    fn new(source: S, branches: usize, config: &TeeConfig) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(TeeState {
                source: Box::pin(source),
                exhausted: false,
                source_closed: false,
                failure: None,
                buffer: VecDeque::with_capacity(config.initial_capacity),
                base: 0,
                cursors: vec![Some(0); branches],
            }),
            wakers: Arc::new(WakerSet::new(branches)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, TeeState<S>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ================================
// Branches
// ================================

enum Branch<S: Sequence> {
    /// A single branch needs no buffering
    Solo(Pin<Box<S>>),
    Shared { shared: Arc<Shared<S>>, id: usize },
}

/// One of the independent copies produced by [`tee`].
pub struct TeeBranch<S: Sequence> {
    inner: Branch<S>,
}

impl<S: Sequence> TeeBranch<S> {
    fn shared(shared: Arc<Shared<S>>, id: usize) -> Self {
        Self { inner: Branch::Shared { shared, id } }
    }
}

impl<S> Sequence for TeeBranch<S>
where
    S: Sequence,
    S::Item: Clone,
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let (shared, id) = match &mut self.get_mut().inner {
            Branch::Solo(source) => return source.as_mut().poll_next(cx),
            Branch::Shared { shared, id } => (shared, *id),
        };

        let mut state = shared.lock();
        let cursor = match state.cursors[id] {
            Some(cursor) => cursor,
            None => return Poll::Ready(None),
        };

        if cursor < state.base + state.buffer.len() {
            let item = state.buffer[cursor - state.base].clone();
            state.cursors[id] = Some(cursor + 1);
            state.trim();
            return Poll::Ready(Some(item));
        }

        // Buffered items are still delivered; a failed source ends every
        // branch with the same panic
        if let Some(message) = state.failure.clone() {
            drop(state);
            panic!("tee source panicked: {}", message);
        }

        if state.exhausted {
            return Poll::Ready(None);
        }

        // At the frontier: drive the source on behalf of every branch
        shared.wakers.register(id, cx.waker());
        let waker = Waker::from(Arc::clone(&shared.wakers));
        let mut source_cx = Context::from_waker(&waker);
        let polled = panic::catch_unwind(AssertUnwindSafe(|| state.source.as_mut().poll_next(&mut source_cx)));
        let polled = match polled {
            Ok(polled) => polled,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                log::warn!("tee: source panicked: {}", message);
                state.failure = Some(message);
                drop(state);
                shared.wakers.wake_except(Some(id));
                panic::resume_unwind(payload);
            }
        };
        match polled {
            Poll::Ready(Some(item)) => {
                state.buffer.push_back(item.clone());
                state.cursors[id] = Some(cursor + 1);
                state.trim();
                drop(state);
                shared.wakers.wake_except(Some(id));
                Poll::Ready(Some(item))
            }
            Poll::Ready(None) => {
                state.exhausted = true;
                drop(state);
                shared.wakers.wake_except(Some(id));
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    /// Detach this branch. The source is closed once every branch has been
    /// closed.
    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let (shared, id) = match &mut self.get_mut().inner {
            Branch::Solo(source) => return source.as_mut().poll_close(cx),
            Branch::Shared { shared, id } => (shared, *id),
        };

        let mut state = shared.lock();
        if state.cursors[id].take().is_some() {
            log::trace!("tee: branch {} closed", id);
            state.trim();
        }

        if state.all_detached() && !state.source_closed {
            if state.source.as_mut().poll_close(cx).is_pending() {
                return Poll::Pending;
            }
            state.source_closed = true;
            log::debug!("tee: all branches closed, source released");
        }
        Poll::Ready(())
    }
}

impl<S: Sequence> Drop for TeeBranch<S> {
    fn drop(&mut self) {
        if let Branch::Shared { shared, id } = &self.inner {
            let mut state = shared.lock();
            if state.cursors[*id].take().is_some() {
                log::trace!("tee: branch {} dropped", id);
                state.trim();
            }
        }
    }
}

// ================================
// Constructor Functions
// ================================

/// Split `source` into `n` independent branches with the default buffer
/// configuration. `n == 0` yields no branches, and `n == 1` yields a single
/// branch that owns the boxed source with no shared buffer.
///
/// The buffer holds every item the slowest live branch has not read yet and
/// has no upper bound: a branch that is kept alive but never read makes it
/// grow for as long as the others advance. Drop or close branches that are
/// no longer needed, especially over infinite sources.
///
/// If polling the source panics, the panic is resumed in the branch that was
/// polling it, and every other branch panics once it has read the items
/// buffered before the failure.
pub fn tee<S>(source: S, n: usize) -> Vec<TeeBranch<S>>
where
    S: Sequence,
    S::Item: Clone,
{
    tee_with_config(source, n, &TeeConfig::default())
}

pub fn tee_with_config<S>(source: S, n: usize, config: &TeeConfig) -> Vec<TeeBranch<S>>
where
    S: Sequence,
    S::Item: Clone,
{
    log::debug!("tee: splitting source into {} branches", n);
    match n {
        0 => Vec::new(),
        1 => vec![TeeBranch { inner: Branch::Solo(Box::pin(source)) }],
        _ => {
            let shared = Shared::new(source, n, config);
            (0..n).map(|id| TeeBranch::shared(Arc::clone(&shared), id)).collect()
        }
    }
}

/// The key half of [`unpack`].
pub type Keys<S, K, V> = Apply<TeeBranch<S>, fn((K, V)) -> K>;

/// The value half of [`unpack`].
pub type Values<S, K, V> = Apply<TeeBranch<S>, fn((K, V)) -> V>;

fn key_of<K, V>((key, _): (K, V)) -> K {
    key
}

fn value_of<K, V>((_, value): (K, V)) -> V {
    value
}

/// Split a sequence of pairs into a key sequence and a value sequence that
/// can be consumed (and abandoned) independently.
pub fn unpack<S, K, V>(pairs: S) -> (Keys<S, K, V>, Values<S, K, V>)
where
    S: Sequence<Item = (K, V)>,
    K: Clone,
    V: Clone,
{
    let shared = Shared::new(pairs, 2, &TeeConfig::default());
    let keys = TeeBranch::shared(Arc::clone(&shared), 0).apply(key_of::<K, V> as fn((K, V)) -> K);
    let values = TeeBranch::shared(shared, 1).apply(value_of::<K, V> as fn((K, V)) -> V);
    (keys, values)
}

type MapEntries<K, V> = Iter<std::collections::hash_map::IntoIter<K, V>>;

/// [`unpack`] over the entries of a map. Both halves follow the same
/// (unspecified) map order, so keys and values stay aligned.
pub fn unpack_map<K, V>(map: HashMap<K, V>) -> (Keys<MapEntries<K, V>, K, V>, Values<MapEntries<K, V>, K, V>)
where
    K: Clone,
    V: Clone,
{
    unpack(from_iter(map))
}

// Extension trait for fan-out
pub trait TeeSequenceExt: Sequence + Sized {
    fn tee(self, n: usize) -> Vec<TeeBranch<Self>>
    where
        Self::Item: Clone,
    {
        tee(self, n)
    }
}

impl<S: Sequence + Sized> TeeSequenceExt for S {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seq::constructors::{count, from_iter};
    use tokio_test::block_on;

    #[test]
    fn buffer_is_trimmed_to_slowest_branch() {
        let mut branches = tee(from_iter(1..=10), 2);
        let mut fast = branches.remove(0);
        let mut slow = branches.remove(0);

        block_on(async {
            for expected in 1..=4 {
                assert_eq!(fast.next().await, Some(expected));
            }
            assert_eq!(slow.next().await, Some(1));
        });

        if let Branch::Shared { shared, .. } = &fast.inner {
            let state = shared.lock();
            assert_eq!(state.base, 1);
            assert_eq!(state.buffer.len(), 3);
        }
    }

    #[test]
    fn dropped_branch_releases_buffer() {
        let mut branches = tee(count(0u32, 1), 2);
        let idle = branches.pop();
        let mut active = branches.remove(0);
        drop(idle);

        block_on(async {
            for expected in 0..100 {
                assert_eq!(active.next().await, Some(expected));
            }
        });

        if let Branch::Shared { shared, .. } = &active.inner {
            assert!(shared.lock().buffer.is_empty());
        }
    }

    #[test]
    fn idle_live_branch_retains_everything() {
        let mut branches = tee(count(0u32, 1), 2);
        let idle = branches.pop();
        let mut active = branches.remove(0);

        block_on(async {
            for expected in 0..100 {
                assert_eq!(active.next().await, Some(expected));
            }
        });

        if let Branch::Shared { shared, .. } = &active.inner {
            let state = shared.lock();
            assert_eq!(state.base, 0);
            assert_eq!(state.buffer.len(), 100);
        }
        drop(idle);
    }

    #[test]
    fn zero_and_one_branches() {
        assert!(tee(from_iter(1..=3), 0).is_empty());
        let solo = tee(from_iter(1..=3), 1);
        assert_eq!(solo.len(), 1);
        assert!(matches!(solo[0].inner, Branch::Solo(_)));
        for branch in solo {
            assert_eq!(block_on(branch.to_vec()), vec![1, 2, 3]);
        }
    }
}
