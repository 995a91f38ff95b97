//! Synchronization primitives.
//!
//! Tokio's async-aware channels and locks, plus the cancellation token used
//! to stop session-scoped background work.
//!
//! ```rust
//! use core_async::sync::{watch, CancellationToken};
//!
//! # async fn example() {
//! let (tx, rx) = watch::channel(0u32);
//! tx.send(1).unwrap();
//! assert_eq!(*rx.borrow(), 1);
//!
//! let token = CancellationToken::new();
//! let child = token.child_token();
//! token.cancel();
//! assert!(child.is_cancelled());
//! # }
//! ```

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, Mutex, MutexGuard, Notify, RwLock, RwLockReadGuard,
    RwLockWriteGuard, Semaphore, SemaphorePermit,
};

pub use tokio_util::sync::CancellationToken;
