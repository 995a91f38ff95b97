//! # Core Runtime Module
//!
//! Runtime infrastructure shared by the playback core and its providers:
//! - [`config`]: `CoreConfig` builder with fail-fast capability checks
//! - [`logging`]: `tracing-subscriber` setup and credential redaction
//! - [`events`]: the typed `EventBus` the engine publishes on
//!
//! Hosts build a [`config::CoreConfig`], call [`logging::init_logging`] once,
//! and hand an [`events::EventBus`] to the engine. UI layers subscribe to the
//! bus rather than registering callbacks.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
