//! Notification context.
//!
//! Validation work runs on arbitrary Tokio worker tasks, but observers must
//! see results one at a time and in order. Every observer callback (and
//! every write to a field's recorded validity) is therefore packaged as a
//! job and sent to a single serial queue, which plays the role of the UI's
//! main thread.
//!
//! The queue is either driven by a Tokio task ([`NotifyContext::spawn`]) or
//! handed to the embedding UI loop ([`NotifyContext::manual`]), which drains
//! it wherever it runs its own callbacks.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use log::{debug, error, trace};
use tokio::runtime::Handle;
use tokio::sync::mpsc;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Sender half of the notification context.
///
/// Clone-able, can be sent to async tasks.
#[derive(Clone)]
pub struct NotifyContext {
    tx: mpsc::UnboundedSender<Job>,
}

impl NotifyContext {
    /// Create a context whose queue runs on a task of the current Tokio
    /// runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn spawn() -> Self {
        Self::spawn_on(&Handle::current())
    }

    /// Create a context whose queue runs on a task of `handle`'s runtime.
    pub fn spawn_on(handle: &Handle) -> Self {
        let (context, queue) = Self::manual();
        handle.spawn(queue.run());
        context
    }

    /// Create a context and return its queue for the caller to drive.
    pub fn manual() -> (Self, NotifyQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, NotifyQueue { rx })
    }

    /// Queue `job` to run on the notification context.
    ///
    /// Jobs run in the order they were dispatched. Dispatching after the
    /// queue was dropped discards the job.
    pub fn dispatch<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.tx.send(Box::new(job)).is_err() {
            debug!("NotifyContext: queue closed, dropping job");
        }
    }

    /// Check whether the queue is still accepting jobs.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiver half of the notification context.
pub struct NotifyQueue {
    rx: mpsc::UnboundedReceiver<Job>,
}

impl NotifyQueue {
    /// Run jobs until every [`NotifyContext`] has been dropped.
    pub async fn run(mut self) {
        while let Some(job) = self.rx.recv().await {
            run_job(job);
        }
        trace!("NotifyQueue: all senders dropped, stopping");
    }

    /// Run every job queued so far without waiting. Returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut count = 0;
        while let Ok(job) = self.rx.try_recv() {
            run_job(job);
            count += 1;
        }
        count
    }
}

fn run_job(job: Job) {
    if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(job)) {
        error!(
            "NotifyQueue: observer callback panicked: {}",
            extract_panic_message(&panic)
        );
    }
}

/// Extract a readable message from a panic payload.
pub fn extract_panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
