//! # Task Management System
//!
//! This module provides the worker pool the search engine scans chunks on. The
//! owning thread publishes tasks and polls for their results; it never blocks on
//! a worker except when shutting the pool down.
//!
//! ## Architecture Overview
//!
//! - `TaskManager`: Owns the workers, distributes tasks and collects results
//! - `Task`: A unit of work executed on a worker
//! - `TaskChannel`: Communication channel between the owning thread and one worker
//!
//! Each worker is an OS thread with a dedicated task channel and result channel.
//! Tasks go to workers round-robin, skipping workers that already hold
//! `max_in_flight` tasks; tasks that find every worker busy wait in a FIFO queue
//! until `process_queued_tasks` can place them.
//!
//! ## Task Lifecycle
//! 1. Tasks are published via `TaskManager::publish_task()`
//! 2. The manager sends them to available workers round-robin
//! 3. Workers process tasks and send back the outputs
//! 4. Outputs are drained on the owning thread by `process_completed_tasks()`
//!
//! ## Panics
//! A panicking task does not take its worker down: the panic is caught on the
//! worker, logged, and the task counts as finished without an output. A worker
//! whose thread exits anyway is marked dead and skipped; the tasks it still held
//! are written off so the other workers keep receiving work.
//!
//! ## Shutdown
//! Dropping the manager (or calling `shutdown`) closes every task channel and joins
//! the workers. Tasks still queued are dropped unprocessed; tasks already on a
//! worker run to completion first, so long-running tasks should check a
//! cancellation flag.
//!
//! ## Example Usage
//! ```rust
//! use voxel_area_search::engine_state::task_management::{task::Task, TaskManager};
//!
//! struct Square(u64);
//!
//! impl Task for Square {
//!     type Output = u64;
//!     fn process(self) -> u64 {
//!         self.0 * self.0
//!     }
//! }
//!
//! let mut task_manager = TaskManager::new(2, 1).unwrap();
//! task_manager.publish_task(Square(3));
//!
//! let mut results = Vec::new();
//! while results.is_empty() {
//!     task_manager.process_queued_tasks();
//!     results.extend(task_manager.process_completed_tasks());
//! }
//! assert_eq!(results, vec![9]);
//! ```

pub mod task;

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

use log::{debug, error, info, warn};
use task::Task;

use crate::engine_state::search::chunk_searcher::panic_message;
use crate::error::SearchError;

/// Default number of tasks that may sit on one worker at a time.
///
/// Two lets a worker pick up its next task without waiting for the owning thread
/// to poll.
pub const DEFAULT_MAX_TASKS_IN_FLIGHT: usize = 2;

/// A communication channel between the owning thread and a worker thread.
///
/// - `task_sender`: Sends tasks from the owning thread to the worker
/// - `result_receiver`: Receives task outputs from the worker, `None` for a
///   task that panicked
/// - `num_tasks_in_flight`: Tasks sent whose output has not been received yet
/// - `alive`: Cleared once the worker thread is found to have exited
/// - `worker`: Handle used to join the worker on shutdown
pub struct TaskChannel<T: Task> {
    task_sender: Sender<T>,
    result_receiver: Receiver<Option<T::Output>>,
    num_tasks_in_flight: usize,
    alive: bool,
    worker: JoinHandle<()>,
}

impl<T: Task> TaskChannel<T> {
    fn can_accept(&self, max_in_flight: usize) -> bool {
        self.alive && self.num_tasks_in_flight < max_in_flight
    }

    fn mark_dead(&mut self, index: usize) {
        if self.alive {
            error!(
                "Search worker {} exited, writing off {} tasks in flight",
                index, self.num_tasks_in_flight
            );
        }
        self.alive = false;
        self.num_tasks_in_flight = 0;
    }
}

/// Manages a pool of worker threads and coordinates task execution.
///
/// The `TaskManager` is responsible for:
/// - Creating and joining worker threads
/// - Distributing tasks across available workers
/// - Collecting task outputs
/// - Queuing tasks when all workers are busy
///
/// It is owned by a single thread; only the tasks cross thread boundaries.
pub struct TaskManager<T: Task> {
    channels: Vec<TaskChannel<T>>,
    queued_tasks: VecDeque<T>,
    current_channel: usize,
    max_in_flight: usize,
}

impl<T: Task> TaskManager<T> {
    /// Creates a new `TaskManager` with `num_workers` worker threads, each accepting
    /// up to `max_in_flight` tasks at a time.
    ///
    /// Both values are clamped to at least one.
    ///
    /// # Errors
    /// Returns [`SearchError::WorkerSpawn`] if a worker thread cannot be created.
    /// Workers spawned before the failure are joined before returning.
    pub fn new(num_workers: usize, max_in_flight: usize) -> Result<Self, SearchError> {
        let num_workers = num_workers.max(1);
        let mut manager = TaskManager {
            channels: Vec::with_capacity(num_workers),
            queued_tasks: VecDeque::new(),
            current_channel: 0,
            max_in_flight: max_in_flight.max(1),
        };

        for index in 0..num_workers {
            let (task_tx, task_rx) = channel::<T>();
            let (result_tx, result_rx) = channel::<Option<T::Output>>();

            let task_closure = move || {
                while let Ok(task) = task_rx.recv() {
                    let output = match panic::catch_unwind(AssertUnwindSafe(|| task.process())) {
                        Ok(output) => Some(output),
                        Err(payload) => {
                            error!(
                                "Task panicked on worker {}: {}",
                                index,
                                panic_message(payload.as_ref())
                            );
                            None
                        }
                    };
                    if result_tx.send(output).is_err() {
                        break;
                    }
                }
            };

            let worker = thread::Builder::new()
                .name(format!("area-search-worker-{index}"))
                .spawn(task_closure)
                .map_err(|source| SearchError::WorkerSpawn { index, source })?;

            manager.channels.push(TaskChannel {
                task_sender: task_tx,
                result_receiver: result_rx,
                num_tasks_in_flight: 0,
                alive: true,
                worker,
            });
        }

        info!(
            "Started {} search workers ({} tasks in flight each)",
            num_workers, manager.max_in_flight
        );
        Ok(manager)
    }

    /// Number of live worker threads.
    pub fn worker_count(&self) -> usize {
        self.channels.iter().filter(|channel| channel.alive).count()
    }

    /// Tasks handed to workers whose outputs have not been collected yet.
    pub fn tasks_in_flight(&self) -> usize {
        self.channels.iter().map(|channel| channel.num_tasks_in_flight).sum()
    }

    /// Tasks waiting for a free worker.
    pub fn queued_task_count(&self) -> usize {
        self.queued_tasks.len()
    }

    /// Whether a newly published task would go straight to a worker.
    pub fn has_capacity(&self) -> bool {
        self.queued_tasks.is_empty() && self.find_available_channel().is_some()
    }

    /// Attempts to send a task to a specific worker channel.
    ///
    /// Returns the task back and marks the worker dead if it has disconnected.
    fn try_send_task(&mut self, task: T, channel_idx: usize) -> Result<(), T> {
        let channel = &mut self.channels[channel_idx];
        match channel.task_sender.send(task) {
            Ok(()) => {
                channel.num_tasks_in_flight += 1;
                Ok(())
            }
            Err(task) => {
                channel.mark_dead(channel_idx);
                Err(task.0)
            }
        }
    }

    /// Sends `task` to the next worker that accepts it, skipping workers found
    /// dead along the way. Returns the task back if no worker can take it.
    fn dispatch(&mut self, mut task: T) -> Result<(), T> {
        while let Some(channel_idx) = self.find_available_channel() {
            match self.try_send_task(task, channel_idx) {
                Ok(()) => {
                    self.current_channel = (channel_idx + 1) % self.channels.len();
                    return Ok(());
                }
                Err(returned) => task = returned,
            }
        }
        Err(task)
    }

    /// Finds a worker channel that can accept a new task, round-robin from the
    /// last used channel.
    fn find_available_channel(&self) -> Option<usize> {
        if self.channels.is_empty() {
            return None;
        }

        let start_channel = self.current_channel % self.channels.len();
        let mut current = start_channel;

        loop {
            if self.channels[current].can_accept(self.max_in_flight) {
                return Some(current);
            }
            current = (current + 1) % self.channels.len();
            if current == start_channel {
                return None;
            }
        }
    }

    /// Publishes a new task for execution.
    ///
    /// # Returns
    /// - `true` if the task was immediately sent to a worker
    /// - `false` if it was queued because all workers are busy
    pub fn publish_task(&mut self, task: T) -> bool {
        if !self.queued_tasks.is_empty() {
            self.queued_tasks.push_back(task);
            return false;
        }

        match self.dispatch(task) {
            Ok(()) => true,
            Err(task) => {
                self.queued_tasks.push_back(task);
                false
            }
        }
    }

    /// Sends queued tasks to workers until the queue is empty or every worker is
    /// busy. Call once per tick.
    pub fn process_queued_tasks(&mut self) {
        while let Some(task) = self.queued_tasks.pop_front() {
            if let Err(task) = self.dispatch(task) {
                self.queued_tasks.push_front(task);
                break;
            }
        }
    }

    /// Collects every output the workers have produced since the last call.
    ///
    /// Tasks that panicked free their slot but produce no output. Never blocks.
    pub fn process_completed_tasks(&mut self) -> Vec<T::Output> {
        let mut outputs = Vec::new();
        for (index, channel) in self.channels.iter_mut().enumerate() {
            loop {
                match channel.result_receiver.try_recv() {
                    Ok(output) => {
                        channel.num_tasks_in_flight = channel.num_tasks_in_flight.saturating_sub(1);
                        outputs.extend(output);
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        channel.mark_dead(index);
                        break;
                    }
                }
            }
        }
        outputs
    }

    /// Drops queued tasks, closes every worker channel and joins the workers.
    ///
    /// Blocks until tasks already running on workers return.
    pub fn shutdown(&mut self) {
        if self.channels.is_empty() {
            return;
        }

        let dropped = self.queued_tasks.len();
        self.queued_tasks.clear();

        let worker_count = self.channels.len();
        for (index, channel) in self.channels.drain(..).enumerate() {
            let TaskChannel {
                task_sender,
                result_receiver,
                worker,
                ..
            } = channel;
            drop(task_sender);
            if worker.join().is_err() {
                warn!("Search worker {} panicked before shutdown", index);
            }
            drop(result_receiver);
        }

        debug!(
            "Shut down {} search workers, dropped {} queued tasks",
            worker_count, dropped
        );
    }
}

impl<T: Task> Drop for TaskManager<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    struct CountTask {
        value: usize,
        counter: Arc<AtomicUsize>,
    }

    impl Task for CountTask {
        type Output = usize;

        fn process(self) -> usize {
            self.counter.fetch_add(1, Ordering::SeqCst);
            self.value * 2
        }
    }

    /// Doubles its value, or panics on odd values when `fragile` is set.
    struct FragileTask {
        value: usize,
        fragile: bool,
    }

    impl Task for FragileTask {
        type Output = usize;

        fn process(self) -> usize {
            if self.fragile && self.value % 2 == 1 {
                panic!("odd value {}", self.value);
            }
            self.value * 2
        }
    }

    fn drain_all<T: Task>(manager: &mut TaskManager<T>, expected: usize) -> Vec<T::Output> {
        let mut outputs = Vec::new();
        for _ in 0..2000 {
            manager.process_queued_tasks();
            outputs.extend(manager.process_completed_tasks());
            if outputs.len() == expected {
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }
        outputs
    }

    #[test]
    fn runs_every_published_task() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut manager = TaskManager::new(3, 1).unwrap();

        for value in 0..20 {
            manager.publish_task(CountTask {
                value,
                counter: counter.clone(),
            });
        }

        let mut outputs = drain_all(&mut manager, 20);
        outputs.sort_unstable();

        assert_eq!(outputs, (0..20).map(|v| v * 2).collect::<Vec<_>>());
        assert_eq!(counter.load(Ordering::SeqCst), 20);
        assert_eq!(manager.tasks_in_flight(), 0);
        assert_eq!(manager.queued_task_count(), 0);
    }

    #[test]
    fn queues_beyond_in_flight_budget() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut manager = TaskManager::new(1, 1).unwrap();

        assert!(manager.has_capacity());
        assert!(manager.publish_task(CountTask {
            value: 1,
            counter: counter.clone(),
        }));
        assert!(!manager.has_capacity());
        assert!(!manager.publish_task(CountTask {
            value: 2,
            counter: counter.clone(),
        }));
        assert_eq!(manager.queued_task_count(), 1);

        let outputs = drain_all(&mut manager, 2);
        assert_eq!(outputs.len(), 2);
    }

    #[test]
    fn worker_count_is_clamped() {
        let manager: TaskManager<CountTask> = TaskManager::new(0, 0).unwrap();
        assert_eq!(manager.worker_count(), 1);
        assert!(manager.has_capacity());
    }

    #[test]
    fn panicking_task_does_not_stall_the_pool() {
        let mut manager = TaskManager::new(2, 2).unwrap();
        manager.publish_task(FragileTask {
            value: 1,
            fragile: true,
        });
        for value in 0..6 {
            manager.publish_task(FragileTask {
                value,
                fragile: false,
            });
        }

        let mut outputs = drain_all(&mut manager, 6);
        outputs.sort_unstable();

        assert_eq!(outputs, vec![0, 2, 4, 6, 8, 10]);
        assert_eq!(manager.queued_task_count(), 0);
        assert_eq!(manager.tasks_in_flight(), 0);
        assert_eq!(manager.worker_count(), 2);
        assert!(manager.has_capacity());
    }

    #[test]
    fn every_worker_survives_repeated_panics() {
        let mut manager = TaskManager::new(3, 1).unwrap();
        for value in 0..30 {
            manager.publish_task(FragileTask {
                value,
                fragile: true,
            });
        }

        let mut outputs = Vec::new();
        for _ in 0..2000 {
            manager.process_queued_tasks();
            outputs.extend(manager.process_completed_tasks());
            if manager.queued_task_count() == 0 && manager.tasks_in_flight() == 0 {
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }
        outputs.sort_unstable();

        assert_eq!(outputs, (0..30).step_by(2).map(|v| v * 2).collect::<Vec<_>>());
        assert_eq!(manager.worker_count(), 3);
    }

    #[test]
    fn shutdown_joins_workers() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut manager = TaskManager::new(2, 2).unwrap();
        for value in 0..4 {
            manager.publish_task(CountTask {
                value,
                counter: counter.clone(),
            });
        }

        manager.shutdown();

        assert_eq!(manager.worker_count(), 0);
        assert!(!manager.has_capacity());
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }
}
