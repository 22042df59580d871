//! Worker pool: concurrent evaluation of a sequence on tokio tasks
//!
//! A dispatcher task drives the source into a bounded job channel, a fixed
//! number of workers apply the user function and publish into one bounded
//! results channel, and the consumer reads results in completion order.
//! Closing the pool (explicitly, or through `drive` stopping early) flips a
//! shared cancellation signal that halts dispatch and publishing, and then
//! joins every task.
use std::future::{poll_fn, ready, Future, Ready};
use std::panic;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::{JoinError, JoinSet};

use super::constructors::{from_iter, Iter};
use super::core::{Apply, Sequence, SequenceExt};
use crate::config::PoolConfig;
use crate::error::{panic_message, SeqError, SeqResult};

/// A result tagged with the position of the input it was computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem<T> {
    pub index: usize,
    pub value: T,
}

impl<T> WorkItem<T> {
    pub fn into_value(self) -> T {
        self.value
    }
}

type Job<I> = (usize, I);

// Resolves once the cancellation flag is set or the pool is gone
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        let flagged = *cancel.borrow_and_update();
        if flagged || cancel.changed().await.is_err() {
            return;
        }
    }
}

async fn dispatch<S>(mut source: Pin<Box<S>>, jobs: mpsc::Sender<Job<S::Item>>, mut cancel: watch::Receiver<bool>)
where
    S: Sequence,
{
    let mut index = 0;
    loop {
        let item = tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => break,
            item = poll_fn(|cx| source.as_mut().poll_next(cx)) => item,
        };
        let item = match item {
            Some(item) => item,
            None => break,
        };

        tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => break,
            sent = jobs.send((index, item)) => {
                if sent.is_err() {
                    break;
                }
            }
        }
        index += 1;
    }

    poll_fn(|cx| source.as_mut().poll_close(cx)).await;
    log::trace!("pool: dispatcher finished after {} items", index);
}

async fn work<I, O, F, Fut>(
    jobs: Arc<Mutex<mpsc::Receiver<Job<I>>>>,
    results: mpsc::Sender<WorkItem<O>>,
    f: Arc<F>,
    mut cancel: watch::Receiver<bool>,
) where
    F: Fn(I) -> Fut,
    Fut: Future<Output = O>,
{
    loop {
        let job = tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => break,
            job = async { jobs.lock().await.recv().await } => job,
        };
        let (index, input) = match job {
            Some(job) => job,
            None => break,
        };

        // An item already taken off the queue is always finished
        let value = f(input).await;

        tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => break,
            sent = results.send(WorkItem { index, value }) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }
}

/// Concurrent map over a sequence, yielding [`WorkItem`]s as they complete.
///
/// Tasks are spawned on the ambient tokio runtime the first time the pool is
/// polled, so the pool must be consumed from within a runtime. A worker panic
/// cancels the pool and is resumed in the consumer on its next poll; use
/// [`WorkerPool::shutdown`] to get it back as an error instead.
pub struct WorkerPool<S, F, O> {
    source: Option<Pin<Box<S>>>,
    f: Arc<F>,
    config: PoolConfig,
    results: Option<mpsc::Receiver<WorkItem<O>>>,
    cancel: Option<watch::Sender<bool>>,
    tasks: JoinSet<()>,
    failure: Option<SeqError>,
    finished: bool,
}

impl<S, F, Fut, O> WorkerPool<S, F, O>
where
    S: Sequence + Send + 'static,
    S::Item: Send + 'static,
    F: Fn(S::Item) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = O> + Send + 'static,
    O: Send + 'static,
{
    pub fn new(source: S, config: PoolConfig, f: F) -> Self {
        Self {
            source: Some(Box::pin(source)),
            f: Arc::new(f),
            config: config.normalized(),
            results: None,
            cancel: None,
            tasks: JoinSet::new(),
            failure: None,
            finished: false,
        }
    }

    /// Stop the pool, wait for all tasks, and report the first worker panic.
    pub async fn shutdown(mut self) -> SeqResult<()> {
        poll_fn(|cx| Pin::new(&mut self).poll_close(cx)).await;
        match self.failure.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn start(&mut self, source: Pin<Box<S>>) {
        let PoolConfig { workers, queue_capacity, results_capacity } = self.config;
        let (jobs_tx, jobs_rx) = mpsc::channel(queue_capacity);
        let (results_tx, results_rx) = mpsc::channel(results_capacity);
        let (cancel_tx, cancel_rx) = watch::channel(false);

        self.tasks.spawn(dispatch(source, jobs_tx, cancel_rx.clone()));
        let jobs_rx = Arc::new(Mutex::new(jobs_rx));
        for _ in 0..workers {
            self.tasks.spawn(work(Arc::clone(&jobs_rx), results_tx.clone(), Arc::clone(&self.f), cancel_rx.clone()));
        }

        self.results = Some(results_rx);
        self.cancel = Some(cancel_tx);
        log::debug!("pool: started {} workers (queue {}, results {})", workers, queue_capacity, results_capacity);
    }
}

impl<S, F, O> WorkerPool<S, F, O> {
    fn signal_cancel(&self) {
        if let Some(cancel) = &self.cancel {
            // No receivers left just means every task already exited
            let _ = cancel.send(true);
        }
    }

    /// Keep the first task failure for [`WorkerPool::shutdown`]. Only a panic
    /// payload is handed back for resuming.
    fn record_failure(&mut self, err: JoinError) -> Option<Box<dyn std::any::Any + Send>> {
        let (failure, payload) = if err.is_panic() {
            let payload = err.into_panic();
            let message = panic_message(payload.as_ref());
            log::warn!("pool: worker panicked: {}", message);
            (SeqError::WorkerPanicked(message), Some(payload))
        } else {
            let failure = SeqError::from(err);
            log::warn!("pool: task ended abnormally: {}", failure);
            (failure, None)
        };
        if self.failure.is_none() {
            self.failure = Some(failure);
        }
        payload
    }
}

impl<S, F, Fut, O> Sequence for WorkerPool<S, F, O>
where
    S: Sequence + Send + 'static,
    S::Item: Send + 'static,
    F: Fn(S::Item) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = O> + Send + 'static,
    O: Send + 'static,
{
    type Item = WorkItem<O>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        if let Some(mut source) = this.source.take() {
            if this.config.workers == 0 {
                if source.as_mut().poll_close(cx).is_pending() {
                    this.source = Some(source);
                    return Poll::Pending;
                }
                this.finished = true;
                return Poll::Ready(None);
            }
            this.start(source);
        }

        loop {
            // Reap finished tasks first so that a panic is not mistaken for a
            // short run when the results channel closes
            match this.tasks.poll_join_next(cx) {
                Poll::Ready(Some(Ok(()))) => continue,
                Poll::Ready(Some(Err(err))) => {
                    if let Some(payload) = this.record_failure(err) {
                        this.signal_cancel();
                        this.results = None;
                        this.tasks.abort_all();
                        this.finished = true;
                        panic::resume_unwind(payload);
                    }
                    continue;
                }
                Poll::Ready(None) if this.results.is_none() => {
                    this.finished = true;
                    log::debug!("pool: all workers finished");
                    return Poll::Ready(None);
                }
                Poll::Ready(None) | Poll::Pending => {}
            }

            let results = match this.results.as_mut() {
                Some(results) => results,
                None => return Poll::Pending,
            };
            match results.poll_recv(cx) {
                Poll::Ready(Some(item)) => return Poll::Ready(Some(item)),
                Poll::Ready(None) => this.results = None,
                Poll::Pending => return Poll::Pending,
            }
        }
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();

        // Never started: only the source needs releasing
        if let Some(source) = this.source.as_mut() {
            if source.as_mut().poll_close(cx).is_pending() {
                return Poll::Pending;
            }
            this.source = None;
        }

        this.signal_cancel();
        this.results = None;
        loop {
            match this.tasks.poll_join_next(cx) {
                Poll::Ready(Some(Ok(()))) => {}
                Poll::Ready(Some(Err(err))) => {
                    this.record_failure(err);
                }
                Poll::Ready(None) => break,
                Poll::Pending => return Poll::Pending,
            }
        }

        if !this.finished {
            this.finished = true;
            log::debug!("pool: closed");
        }
        Poll::Ready(())
    }
}

impl<S, F, O> Drop for WorkerPool<S, F, O> {
    fn drop(&mut self) {
        if !self.tasks.is_empty() {
            log::warn!("pool: dropped while running, aborting {} tasks", self.tasks.len());
        }
        self.signal_cancel();
    }
}

// ================================
// Constructor Functions
// ================================

pub type PoolValues<P, O> = Apply<P, fn(WorkItem<O>) -> O>;

type Identity<T> = fn(T) -> Ready<T>;

/// Run `items` through `workers` tasks unchanged, yielding them in
/// completion order.
pub fn pool<T>(items: Vec<T>, workers: usize) -> PoolValues<WorkerPool<Iter<std::vec::IntoIter<T>>, Identity<T>, T>, T>
where
    T: Send + 'static,
{
    pool_map(from_iter(items), workers, ready as Identity<T>)
}

/// Apply `f` concurrently on `workers` tasks, yielding results in completion
/// order.
pub fn pool_map<S, F, Fut, O>(source: S, workers: usize, f: F) -> PoolValues<WorkerPool<S, F, O>, O>
where
    S: Sequence + Send + 'static,
    S::Item: Send + 'static,
    F: Fn(S::Item) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = O> + Send + 'static,
    O: Send + 'static,
{
    pool_indexed(source, workers, f).apply(WorkItem::into_value as fn(WorkItem<O>) -> O)
}

/// Like [`pool_map`], but keeps the input index alongside every result.
pub fn pool_indexed<S, F, Fut, O>(source: S, workers: usize, f: F) -> WorkerPool<S, F, O>
where
    S: Sequence + Send + 'static,
    S::Item: Send + 'static,
    F: Fn(S::Item) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = O> + Send + 'static,
    O: Send + 'static,
{
    WorkerPool::new(source, PoolConfig::with_workers(workers), f)
}

// Extension trait for concurrent evaluation
pub trait ParallelSequenceExt: Sequence + Sized {
    fn pool_map<F, Fut, O>(self, workers: usize, f: F) -> PoolValues<WorkerPool<Self, F, O>, O>
    where
        Self: Send + 'static,
        Self::Item: Send + 'static,
        F: Fn(Self::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = O> + Send + 'static,
        O: Send + 'static,
    {
        pool_map(self, workers, f)
    }

    fn pool_indexed<F, Fut, O>(self, workers: usize, f: F) -> WorkerPool<Self, F, O>
    where
        Self: Send + 'static,
        Self::Item: Send + 'static,
        F: Fn(Self::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = O> + Send + 'static,
        O: Send + 'static,
    {
        pool_indexed(self, workers, f)
    }

    fn pool_with<F, Fut, O>(self, config: PoolConfig, f: F) -> WorkerPool<Self, F, O>
    where
        Self: Send + 'static,
        Self::Item: Send + 'static,
        F: Fn(Self::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = O> + Send + 'static,
        O: Send + 'static,
    {
        WorkerPool::new(self, config, f)
    }
}

impl<S: Sequence + Sized> ParallelSequenceExt for S {}
