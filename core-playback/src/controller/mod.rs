//! # Session Controller
//!
//! [`PlaybackEngine`] builds and spawns the controller task;
//! [`PlaybackHandle`] is the cloneable command surface callers hold.
//!
//! ```ignore
//! let handle = PlaybackEngine::spawn(&core_config, EngineConfig::default(), bus)?;
//! handle
//!     .load_media(LoadRequest::new(item).with_start_position_ms(90_000))
//!     .await?;
//! let mut state = handle.subscribe_state();
//! while state.changed().await.is_ok() {
//!     render(&state.borrow());
//! }
//! ```

mod engine;
mod handle;

pub use engine::PlaybackEngine;
pub use handle::{LoadRequest, PlaybackHandle, SeekPreview};
