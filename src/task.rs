//! Task polling utilities
//!
//! Non-blocking inspection of background tasks spawned on the tokio runtime.

use futures::FutureExt;
use tokio::task::JoinHandle;

/// Result of polling a task
pub enum PollResult<T> {
    /// No task to poll (task was None)
    NoTask,
    /// Task is still running
    Pending,
    /// Task completed with result (may be Ok or join error)
    Complete(Result<T, tokio::task::JoinError>),
}

/// Poll an optional task handle and return its result if finished.
///
/// A finished task is taken out of `task`, so a second poll reports
/// `NoTask`.
///
/// # Example
/// ```ignore
/// match poll_task(&mut self.refresh) {
///     PollResult::Complete(Err(e)) if e.is_panic() => { /* refresh panicked */ }
///     PollResult::Pending => { /* still loading */ }
///     _ => {}
/// }
/// ```
pub fn poll_task<T>(task: &mut Option<JoinHandle<T>>) -> PollResult<T> {
    match task {
        None => return PollResult::NoTask,
        Some(handle) if !handle.is_finished() => return PollResult::Pending,
        Some(_) => {}
    }

    let Some(handle) = task.take() else {
        return PollResult::NoTask;
    };
    match handle.now_or_never() {
        Some(result) => PollResult::Complete(result),
        None => {
            // Shouldn't happen since we checked is_finished()
            tracing::warn!("Task not ready despite is_finished()");
            PollResult::Pending
        }
    }
}
