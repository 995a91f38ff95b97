//! Runtime utilities for host shells that drive the core from synchronous code.

pub use tokio::runtime::{Builder, Handle, Runtime};

/// Builds a multi-threaded runtime for a host application.
pub fn build_multi_thread() -> std::io::Result<Runtime> {
    Builder::new_multi_thread().enable_all().build()
}

/// Runs the provided future to completion on a fresh current-thread runtime.
pub fn block_on<F>(future: F) -> std::io::Result<F::Output>
where
    F: std::future::Future,
{
    let runtime = Builder::new_current_thread().enable_all().build()?;
    Ok(runtime.block_on(future))
}
