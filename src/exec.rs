//! Hand-off of mutations to the emulated CPU's execution thread.
//!
//! Structural changes to watch ranges must not race with compiled code, so
//! they are packaged as jobs and run by whoever owns the execution thread.
//! The submitting thread blocks until its job has been applied.

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::thread::{self, JoinHandle};

pub type Job = Box<dyn FnOnce() + Send + 'static>;

pub trait ExecutionContext {
    /// Run `job` while the execution thread is paused, returning once it has
    /// finished.
    fn run_exclusive(&self, job: Job);
}

/// Runs jobs on the calling thread.
///
/// For code that is already on the execution thread, or hosts that only have
/// one thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct Inline;

impl ExecutionContext for Inline {
    fn run_exclusive(&self, job: Job) {
        job();
    }
}

struct Message {
    job: Job,
    reply_channel: Sender<()>,
}

/// Submitting side of an [`ExecutionQueue`].
///
/// Must not be used from the thread that services the queue: that thread
/// would wait on itself forever. Use [`Inline`] there instead.
#[derive(Clone)]
pub struct ExecutionHandle {
    sender: Sender<Message>,
}

impl ExecutionContext for ExecutionHandle {
    fn run_exclusive(&self, job: Job) {
        let (reply_channel, reply) = bounded(1);
        if self.sender.send(Message { job, reply_channel }).is_err() {
            log::error!("execution thread is gone, exclusive job dropped");
            return;
        }
        if reply.recv().is_err() {
            log::error!("execution thread exited before finishing an exclusive job");
        }
    }
}

/// Servicing side, owned by the execution thread.
pub struct ExecutionQueue {
    receiver: Receiver<Message>,
}

impl ExecutionQueue {
    pub fn new() -> (ExecutionHandle, ExecutionQueue) {
        let (sender, receiver) = unbounded();
        (ExecutionHandle { sender }, ExecutionQueue { receiver })
    }

    /// Apply every job submitted so far without waiting for more. Meant to be
    /// called between instructions. Returns the number of jobs run.
    pub fn run_pending(&self) -> usize {
        let mut count = 0;
        while let Ok(message) = self.receiver.try_recv() {
            Self::apply(message);
            count += 1;
        }
        count
    }

    /// Block servicing jobs until every [`ExecutionHandle`] has been dropped.
    pub fn run_until_closed(&self) -> usize {
        let mut count = 0;
        while let Ok(message) = self.receiver.recv() {
            Self::apply(message);
            count += 1;
        }
        count
    }

    fn apply(message: Message) {
        (message.job)();
        // The submitter may have given up; nothing to do about that here.
        let _ = message.reply_channel.send(());
    }
}

/// A dedicated thread that does nothing but service an [`ExecutionQueue`].
pub struct ExecutionThread {
    handle: ExecutionHandle,
    thread: JoinHandle<usize>,
}

impl ExecutionThread {
    pub fn spawn() -> std::io::Result<Self> {
        let (handle, queue) = ExecutionQueue::new();
        let thread = thread::Builder::new()
            .name("execution".into())
            .spawn(move || queue.run_until_closed())?;
        Ok(Self { handle, thread })
    }

    pub fn handle(&self) -> &ExecutionHandle {
        &self.handle
    }

    /// Drop this thread's handle and wait for the queue to drain. Other
    /// clones of the handle keep the thread alive until they are dropped too.
    /// Returns the number of jobs the thread ran.
    pub fn join(self) -> usize {
        drop(self.handle);
        match self.thread.join() {
            Ok(count) => count,
            Err(_) => {
                log::error!("execution thread panicked");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn inline_runs_immediately() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        Inline.run_exclusive(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn run_pending_on_empty_queue_is_zero() {
        let (_handle, queue) = ExecutionQueue::new();
        assert_eq!(queue.run_pending(), 0);
    }

    #[test]
    fn handle_blocks_until_job_applied() {
        let counter = Arc::new(AtomicUsize::new(0));
        let (handle, queue) = ExecutionQueue::new();

        let c = counter.clone();
        let submitter = thread::spawn(move || {
            handle.run_exclusive(Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }));
        });

        // Keep pumping like an emulator would between instructions.
        let mut applied = 0;
        while applied == 0 {
            applied += queue.run_pending();
            thread::yield_now();
        }
        submitter.join().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn execution_thread_counts_jobs() {
        let exec = ExecutionThread::spawn().unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let c = counter.clone();
            exec.handle().run_exclusive(Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }));
        }
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(exec.join(), 3);
    }

    #[test]
    fn dropped_queue_does_not_hang_submitter() {
        let (handle, queue) = ExecutionQueue::new();
        drop(queue);
        handle.run_exclusive(Box::new(|| panic!("must not run")));
    }
}
