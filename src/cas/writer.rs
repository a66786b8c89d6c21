//! # Async Background Writer
//!
//! The CAS's background writer is one logical task: a dedicated thread that
//! drains a bounded job queue and persists blobs to L2. Shutdown is
//! coordinated by an atomic "closed" flag plus an outstanding-writes
//! barrier: producers register themselves in the barrier *before* touching
//! the queue, so `close()` can safely wait for the barrier to drain to zero
//! before dropping the channel's `Sender` half — guaranteeing no producer
//! ever sends on an already-disconnected channel, and no acknowledged write
//! is lost.
//!
//! One worker thread, one bounded queue, one atomic flag, one drain
//! barrier: enough to make shutdown race-free without a runtime.

use crate::store::{BatchEntry, ObjectStore};
use crossbeam_queue::ArrayQueue;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

pub struct WriteJob {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// Tracks in-flight producer calls so shutdown can wait for them to finish
/// before tearing down the channel.
struct ShutdownBarrier {
    outstanding: AtomicUsize,
    lock: Mutex<()>,
    condvar: Condvar,
}

impl ShutdownBarrier {
    fn new() -> Self {
        Self {
            outstanding: AtomicUsize::new(0),
            lock: Mutex::new(()),
            condvar: Condvar::new(),
        }
    }

    fn enter(self: &Arc<Self>) -> OutstandingGuard {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        OutstandingGuard {
            barrier: Arc::clone(self),
        }
    }

    fn wait_until_drained(&self) {
        let mut guard = self.lock.lock().unwrap();
        while self.outstanding.load(Ordering::SeqCst) != 0 {
            let (g, _timeout) = self
                .condvar
                .wait_timeout(guard, Duration::from_millis(5))
                .unwrap();
            guard = g;
        }
    }
}

struct OutstandingGuard {
    barrier: Arc<ShutdownBarrier>,
}

impl Drop for OutstandingGuard {
    fn drop(&mut self) {
        if self.barrier.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            let _lock = self.barrier.lock.lock().unwrap();
            self.barrier.condvar.notify_all();
        }
    }
}

/// A logged, non-fatal async-writer failure. Async write errors are routed
/// to an error channel and logged; they never crash the process.
#[derive(Debug, Clone)]
pub struct WriteError {
    pub message: String,
}

/// Owns the background writer thread and the producer-facing handles
/// needed to enqueue jobs and shut the writer down.
pub struct AsyncWriter {
    sender: Mutex<Option<SyncSender<WriteJob>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    barrier: Arc<ShutdownBarrier>,
    errors: Arc<ArrayQueue<WriteError>>,
    logger_target: String,
}

impl AsyncWriter {
    pub fn spawn(
        l2: Arc<ObjectStore>,
        queue_depth: usize,
        error_queue_depth: usize,
        logger_target: impl Into<String>,
    ) -> Self {
        let logger_target = logger_target.into();
        let logger_target_thread = logger_target.clone();
        let (tx, rx): (SyncSender<WriteJob>, Receiver<WriteJob>) = sync_channel(queue_depth.max(1));
        let errors = Arc::new(ArrayQueue::new(error_queue_depth.max(1)));
        let errors_for_thread = Arc::clone(&errors);

        let handle = std::thread::Builder::new()
            .name("helios-cas-writer".to_string())
            .spawn(move || run_writer(rx, l2, errors_for_thread, logger_target_thread))
            .expect("failed to spawn helios-cas-writer thread");

        Self {
            sender: Mutex::new(Some(tx)),
            handle: Mutex::new(Some(handle)),
            barrier: Arc::new(ShutdownBarrier::new()),
            errors,
            logger_target,
        }
    }

    /// Attempts to enqueue a job without blocking. Returns `Ok(true)` if
    /// enqueued, `Ok(false)` if the queue is full (caller should fall back
    /// to a synchronous write), `Err(())` if the writer has been closed.
    pub fn try_enqueue(&self, job: WriteJob) -> Result<bool, ()> {
        let _guard = self.barrier.enter();
        let sender_slot = self.sender.lock().unwrap();
        let Some(sender) = sender_slot.as_ref() else {
            return Err(());
        };
        match sender.try_send(job) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(_)) => Ok(false),
            Err(TrySendError::Disconnected(_)) => Err(()),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.lock().unwrap().is_none()
    }

    /// Drains any errors accumulated since the last drain, logging each.
    pub fn drain_errors(&self) -> Vec<WriteError> {
        let mut out = Vec::new();
        while let Some(err) = self.errors.pop() {
            log::warn!(target: self.logger_target.as_str(), "async write failed: {}", err.message);
            out.push(err);
        }
        out
    }

    /// Signals shutdown, waits for in-flight producers to finish, then
    /// drops the sender (disconnecting the channel) and joins the worker.
    /// Idempotent: a second call is a no-op.
    pub fn close(&self) {
        let maybe_sender = {
            let mut slot = self.sender.lock().unwrap();
            slot.take()
        };
        if maybe_sender.is_none() {
            // Already closed by a previous call.
            return;
        }
        self.barrier.wait_until_drained();
        drop(maybe_sender);

        if let Some(handle) = self.handle.lock().unwrap().take() {
            let _ = handle.join();
        }
        self.drain_errors();
        log::info!(target: self.logger_target.as_str(), "async writer closed");
    }
}

fn run_writer(
    rx: Receiver<WriteJob>,
    l2: Arc<ObjectStore>,
    errors: Arc<ArrayQueue<WriteError>>,
    logger_target: String,
) {
    // Drain whatever is immediately available alongside the job that woke
    // us up, so bursts of stores become one batched put_batch call.
    while let Ok(first) = rx.recv() {
        let mut batch = vec![first];
        while let Ok(job) = rx.try_recv() {
            batch.push(job);
        }

        let entries: Vec<BatchEntry> = batch
            .into_iter()
            .map(|j| BatchEntry {
                key: j.key,
                value: j.value,
            })
            .collect();

        if let Err(e) = l2.put_batch(&entries) {
            log::error!(target: logger_target.as_str(), "batched async write failed: {e}");
            let _ = errors.push(WriteError {
                message: e.to_string(),
            });
        }
    }
}
