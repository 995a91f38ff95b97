//! Async runtime facade for the media client core.
//!
//! Every core-* and provider-* crate spawns tasks, sleeps and builds channels
//! through this crate rather than reaching for Tokio directly. That keeps the
//! executor choice in one place and gives tests a single seam for paused time.
//!
//! # Modules
//!
//! - `task`: task spawning and join handles
//! - `time`: sleeps, intervals and wall-clock helpers
//! - `sync`: channels and async locks
//! - `runtime`: blocking entry points for host shells
//!
//! `select!` is re-exported so actor loops can multiplex channels without a
//! direct Tokio dependency.
//!
//! ```rust
//! use core_async::task;
//! use core_async::time::{sleep, Duration};
//!
//! async fn example() {
//!     let handle = task::spawn(async {
//!         sleep(Duration::from_millis(10)).await;
//!         42
//!     });
//!     assert_eq!(handle.await.unwrap(), 42);
//! }
//! ```

pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use sync::CancellationToken;
pub use tokio::select;
pub use task::spawn;
pub use time::{sleep, Duration, Instant};
