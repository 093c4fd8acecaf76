//! # Task System Core Trait
//!
//! A `Task` is one unit of background work. The [`TaskManager`](super::TaskManager)
//! moves it to a worker thread, calls [`Task::process`] there and hands the output
//! back to the owning thread, which polls for it.
//!
//! ## Task Lifecycle
//! 1. A `Task` is created and published via `TaskManager::publish_task()`
//! 2. The task's `process()` method runs on a worker thread
//! 3. The output travels back over the worker's result channel
//! 4. `TaskManager::process_completed_tasks()` returns it on the owning thread
//!
//! ## Thread Safety
//! - `Task` must be `Send` to be transferred to a worker
//! - `Task::Output` must be `Send` to be transferred back
//! - Anything the task shares with the owning thread must be synchronized

/// A unit of work that can be executed on a worker thread.
///
/// Tasks should own all the data they need. They are consumed by `process`, so
/// large inputs move to the worker without cloning.
pub trait Task: Send + 'static {
    /// What the task produces for the owning thread.
    type Output: Send + 'static;

    /// Performs the work. Runs on a worker thread.
    ///
    /// Implementations handle their own failures and report them through
    /// `Output`; a panic escaping here takes the worker thread down with it.
    fn process(self) -> Self::Output;
}
