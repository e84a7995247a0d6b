//! Single-threaded FIFO task executor.
//!
//! Every submitted closure runs on one dedicated worker thread, strictly in
//! submission order. Dropping the executor enqueues a stop marker behind all
//! outstanding work and joins the worker, so every task submitted before the
//! drop has completed by the time `drop` returns.

use std::{
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::bounded;
use log::warn;

use crate::queue::MessageQueue;

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Task {
    Run(Job),
    Stop,
}

pub struct SerialExecutor {
    tasks: MessageQueue<Task>,
    handle: Option<JoinHandle<()>>,
}

impl SerialExecutor {
    /// Spawn the worker thread.
    pub fn new() -> Self {
        Self::named("serial-executor")
    }

    /// Spawn the worker thread with a descriptive thread name.
    pub fn named(name: &str) -> Self {
        let tasks = MessageQueue::new();
        let worker_tasks = tasks.clone();
        let handle = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || run(worker_tasks))
            .expect("failed to spawn executor thread");
        Self {
            tasks,
            handle: Some(handle),
        }
    }

    /// Queue `task` for execution and return immediately.
    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.tasks.push(Task::Run(Box::new(task)));
    }

    /// Queue `task` unless `limit` tasks are already waiting.
    ///
    /// Returns `false` when the task was rejected.
    pub fn try_submit_within<F>(&self, task: F, limit: usize) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.tasks
            .try_push_within(Task::Run(Box::new(task)), limit)
            .is_ok()
    }

    /// Wait until every task submitted so far has run.
    ///
    /// Returns `false` if the worker did not reach the barrier in time.
    pub fn barrier(&self, timeout: Duration) -> bool {
        let (done_tx, done_rx) = bounded(1);
        self.submit(move || {
            let _ = done_tx.send(());
        });
        done_rx.recv_timeout(timeout).is_ok()
    }

    /// Number of tasks waiting to run.
    pub fn queue_size(&self) -> usize {
        self.tasks.approximate_size()
    }
}

impl Default for SerialExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn run(tasks: MessageQueue<Task>) {
    loop {
        match tasks.pop() {
            Task::Run(job) => job(),
            Task::Stop => break,
        }
    }
}

impl Drop for SerialExecutor {
    fn drop(&mut self) {
        self.tasks.push(Task::Stop);
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!("SerialExecutor: worker thread panicked");
        }
    }
}

impl std::fmt::Debug for SerialExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialExecutor")
            .field("queue_size", &self.queue_size())
            .finish()
    }
}
