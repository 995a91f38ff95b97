//! # Desktop Bridge Implementations
//!
//! Default host adapters for desktop builds (macOS, Windows, Linux):
//! - `HttpClient` using `reqwest`, with status-aware retry
//! - `SettingsStore` backed by a small SQLite database
//!
//! Decoder factories are not provided here; desktop shells wire their own
//! libmpv binding into `NativePlayerFactory`.
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, SqliteSettingsStore};
//!
//! # async fn wire() -> bridge_traits::error::Result<()> {
//! let http = ReqwestHttpClient::new()?;
//! let settings = SqliteSettingsStore::open("/tmp/media-client/settings.db".into()).await?;
//! # Ok(())
//! # }
//! ```

mod http;
mod settings;

pub use http::ReqwestHttpClient;
pub use settings::SqliteSettingsStore;
