//! Task spawning.
//!
//! Background loops in the playback engine (progress reporting, segment
//! polling, trickplay builds) are spawned here and torn down through their
//! `JoinHandle`s.

pub use tokio::task::{spawn_blocking, yield_now, AbortHandle, JoinError, JoinHandle};

/// Spawns a new asynchronous task on the ambient Tokio runtime.
///
/// ```rust
/// use core_async::task::spawn;
///
/// # async fn example() {
/// let handle = spawn(async { 42 });
/// assert_eq!(handle.await.unwrap(), 42);
/// # }
/// ```
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::task::spawn(future)
}

/// Aborts a task and waits until it has fully unwound.
///
/// Cancellation errors are expected and swallowed; a panic inside the task is
/// returned to the caller.
pub async fn abort_and_join<T>(handle: JoinHandle<T>) -> Result<()> {
    handle.abort();
    match handle.await {
        Ok(_) => Ok(()),
        Err(err) if err.is_cancelled() => Ok(()),
        Err(err) => Err(err),
    }
}

/// Result type for task operations.
pub type Result<T> = std::result::Result<T, JoinError>;
