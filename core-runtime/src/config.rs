//! # Core Configuration Module
//!
//! Collects the host collaborators the playback engine is built from.
//!
//! ## Required Dependencies
//!
//! - `MediaCatalog` - stream URLs, media sources, segments, episode lists
//! - `ProgressSink` - server-side progress reporting
//! - at least one decoder factory (`ManagedPipelineFactory` or `NativePlayerFactory`)
//!
//! ## Optional Dependencies
//!
//! - `TrickplaySource` - seek-preview tiles (required when trickplay is enabled)
//! - `SettingsStore` - playback preferences; defaults apply without one
//!
//! When the `desktop-shims` feature is enabled,
//! [`CoreConfigBuilder::with_desktop_settings`] opens a SQLite settings store
//! under the data directory if none was provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .data_dir("/var/lib/media-client")
//!     .catalog(client.clone())
//!     .progress_sink(client.clone())
//!     .trickplay_source(client)
//!     .native_player_factory(Arc::new(MpvFactory::new()))
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // Panics: no catalog, no progress sink, no decoder
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - missing required collaborators");
//! ```

use crate::error::{Error, Result};
use bridge_traits::{
    ManagedPipelineFactory, MediaCatalog, NativePlayerFactory, ProgressSink, SettingsStore,
    TrickplaySource,
};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Core configuration for the playback engine.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Directory for client-side state (settings database)
    pub data_dir: Option<PathBuf>,

    /// Catalog and metadata provider (required)
    pub catalog: Arc<dyn MediaCatalog>,

    /// Progress reporting target (required)
    pub progress_sink: Arc<dyn ProgressSink>,

    /// Seek-preview tile provider (optional)
    pub trickplay_source: Option<Arc<dyn TrickplaySource>>,

    /// User preference storage (optional)
    pub settings_store: Option<Arc<dyn SettingsStore>>,

    /// Host managed pipeline (ExoPlayer/AVPlayer style)
    pub managed_pipeline_factory: Option<Arc<dyn ManagedPipelineFactory>>,

    /// Host native player library (libmpv style)
    pub native_player_factory: Option<Arc<dyn NativePlayerFactory>>,

    pub features: FeatureFlags,
}

impl fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreConfig")
            .field("data_dir", &self.data_dir)
            .field("catalog", &"MediaCatalog { ... }")
            .field("progress_sink", &"ProgressSink { ... }")
            .field(
                "trickplay_source",
                &self
                    .trickplay_source
                    .as_ref()
                    .map(|_| "TrickplaySource { ... }"),
            )
            .field(
                "settings_store",
                &self.settings_store.as_ref().map(|_| "SettingsStore { ... }"),
            )
            .field(
                "managed_pipeline_factory",
                &self
                    .managed_pipeline_factory
                    .as_ref()
                    .map(|_| "ManagedPipelineFactory { ... }"),
            )
            .field(
                "native_player_factory",
                &self
                    .native_player_factory
                    .as_ref()
                    .map(|_| "NativePlayerFactory { ... }"),
            )
            .field("features", &self.features)
            .finish()
    }
}

/// Feature flags control optional functionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Decode trickplay sheets on load (requires a `TrickplaySource`)
    pub enable_trickplay: bool,

    /// Fetch segments and run the skip monitor
    pub enable_segment_skip: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_trickplay: true,
            enable_segment_skip: true,
        }
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Whether at least one decoder backend can be constructed.
    pub fn has_decoder(&self) -> bool {
        self.managed_pipeline_factory.is_some() || self.native_player_factory.is_some()
    }

    /// Validates feature flags against the provided collaborators.
    pub fn validate(&self) -> Result<()> {
        if let Some(dir) = &self.data_dir {
            if dir.as_os_str().is_empty() {
                return Err(Error::Config("Data directory cannot be empty".to_string()));
            }
        }

        if !self.has_decoder() {
            return Err(decoder_missing_error());
        }

        if self.features.enable_trickplay && self.trickplay_source.is_none() {
            return Err(Error::Config(
                "Trickplay enabled but no TrickplaySource provided. \
                 Disable the feature or inject a TrickplaySource implementation."
                    .to_string(),
            ));
        }

        Ok(())
    }
}

fn decoder_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "DecoderBackend".to_string(),
        message: "No decoder factory provided. \
                 Android/iOS: inject a ManagedPipelineFactory wrapping the platform player. \
                 Desktop: inject a NativePlayerFactory wrapping libmpv."
            .to_string(),
    }
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    data_dir: Option<PathBuf>,
    catalog: Option<Arc<dyn MediaCatalog>>,
    progress_sink: Option<Arc<dyn ProgressSink>>,
    trickplay_source: Option<Arc<dyn TrickplaySource>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    managed_pipeline_factory: Option<Arc<dyn ManagedPipelineFactory>>,
    native_player_factory: Option<Arc<dyn NativePlayerFactory>>,
    features: Option<FeatureFlags>,
}

impl CoreConfigBuilder {
    /// Sets the data directory.
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder().data_dir("/tmp/media-client");
    /// ```
    pub fn data_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.data_dir = Some(path.into());
        self
    }

    /// Sets the catalog provider (required).
    pub fn catalog(mut self, catalog: Arc<dyn MediaCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Sets the progress sink (required).
    pub fn progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress_sink = Some(sink);
        self
    }

    pub fn trickplay_source(mut self, source: Arc<dyn TrickplaySource>) -> Self {
        self.trickplay_source = Some(source);
        self
    }

    /// Sets the settings store used for playback preferences.
    ///
    /// Without one, every load uses the default preferences.
    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    pub fn managed_pipeline_factory(mut self, factory: Arc<dyn ManagedPipelineFactory>) -> Self {
        self.managed_pipeline_factory = Some(factory);
        self
    }

    pub fn native_player_factory(mut self, factory: Arc<dyn NativePlayerFactory>) -> Self {
        self.native_player_factory = Some(factory);
        self
    }

    /// Enables or disables trickplay decoding.
    ///
    /// Default: true. Requires a `TrickplaySource`.
    pub fn enable_trickplay(mut self, enabled: bool) -> Self {
        self.features.get_or_insert_with(FeatureFlags::default).enable_trickplay = enabled;
        self
    }

    /// Enables or disables segment skipping.
    ///
    /// Default: true
    pub fn enable_segment_skip(mut self, enabled: bool) -> Self {
        self.features
            .get_or_insert_with(FeatureFlags::default)
            .enable_segment_skip = enabled;
        self
    }

    /// Sets all feature flags at once.
    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = Some(features);
        self
    }

    /// Opens the desktop SQLite settings store at `data_dir/settings.db`
    /// unless a store was already provided.
    #[cfg(feature = "desktop-shims")]
    pub async fn with_desktop_settings(mut self) -> Result<Self> {
        use bridge_desktop::SqliteSettingsStore;

        if self.settings_store.is_some() {
            return Ok(self);
        }

        let data_dir = self.data_dir.clone().ok_or_else(|| {
            Error::Config(
                "Data directory is required for the desktop settings store. \
                 Use .data_dir() to set it."
                    .to_string(),
            )
        })?;

        let store = SqliteSettingsStore::open(data_dir.join("settings.db"))
            .await
            .map_err(|e| {
                Error::Internal(format!("Failed to initialize default SettingsStore: {}", e))
            })?;
        self.settings_store = Some(Arc::new(store));
        Ok(self)
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// Fails with [`Error::CapabilityMissing`] when the catalog, the progress
    /// sink or every decoder factory is missing, and with [`Error::Config`]
    /// when a feature is enabled without its collaborator.
    pub fn build(self) -> Result<CoreConfig> {
        let catalog = self.catalog.ok_or_else(|| Error::CapabilityMissing {
            capability: "MediaCatalog".to_string(),
            message: "MediaCatalog implementation is required to resolve streams and sources. \
                     Inject the server provider (e.g. provider_jellyfin::JellyfinClient)."
                .to_string(),
        })?;

        let progress_sink = self.progress_sink.ok_or_else(|| Error::CapabilityMissing {
            capability: "ProgressSink".to_string(),
            message: "ProgressSink implementation is required for playback reporting. \
                     Inject the server provider or a no-op sink for offline playback."
                .to_string(),
        })?;

        let config = CoreConfig {
            data_dir: self.data_dir,
            catalog,
            progress_sink,
            trickplay_source: self.trickplay_source,
            settings_store: self.settings_store,
            managed_pipeline_factory: self.managed_pipeline_factory,
            native_player_factory: self.native_player_factory,
            features: self.features.unwrap_or_default(),
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{
        ManagedPipeline, MediaItem, MediaSegment, MediaSource, NativePlayer, NativeEvent,
        PipelineEvent, PlaybackReport, StreamHints, TrickplaySheet,
    };
    use bytes::Bytes;
    use core_async::sync::mpsc::UnboundedSender;

    struct MockCatalog;

    #[async_trait]
    impl MediaCatalog for MockCatalog {
        async fn resolve_stream_url(
            &self,
            _item_id: &str,
            _media_source_id: &str,
            _hints: &StreamHints,
        ) -> BridgeResult<String> {
            Ok("http://localhost/stream".to_string())
        }

        async fn get_media_sources(&self, _item_id: &str) -> BridgeResult<Vec<MediaSource>> {
            Ok(Vec::new())
        }

        async fn get_segments(&self, _item_id: &str) -> BridgeResult<Vec<MediaSegment>> {
            Ok(Vec::new())
        }

        async fn get_seasons(&self, _series_id: &str) -> BridgeResult<Vec<MediaItem>> {
            Ok(Vec::new())
        }

        async fn get_episodes(
            &self,
            _series_id: &str,
            _season_id: Option<&str>,
        ) -> BridgeResult<Vec<MediaItem>> {
            Ok(Vec::new())
        }
    }

    struct MockSink;

    #[async_trait]
    impl ProgressSink for MockSink {
        async fn report_start(&self, _report: &PlaybackReport) -> BridgeResult<()> {
            Ok(())
        }

        async fn report_progress(&self, _report: &PlaybackReport) -> BridgeResult<()> {
            Ok(())
        }

        async fn report_stop(&self, _report: &PlaybackReport) -> BridgeResult<()> {
            Ok(())
        }
    }

    struct MockTrickplay;

    #[async_trait]
    impl TrickplaySource for MockTrickplay {
        async fn trickplay_info(&self, _item_id: &str) -> BridgeResult<Option<TrickplaySheet>> {
            Ok(None)
        }

        async fn get_tile(
            &self,
            _item_id: &str,
            _width: u32,
            _tile_index: u32,
        ) -> BridgeResult<Option<Bytes>> {
            Ok(None)
        }
    }

    struct MockNativeFactory;

    impl NativePlayerFactory for MockNativeFactory {
        fn create(
            &self,
            _events: UnboundedSender<NativeEvent>,
        ) -> BridgeResult<Arc<dyn NativePlayer>> {
            Err(bridge_traits::BridgeError::NotAvailable("libmpv".to_string()))
        }
    }

    struct MockManagedFactory;

    impl ManagedPipelineFactory for MockManagedFactory {
        fn create(
            &self,
            _events: UnboundedSender<PipelineEvent>,
        ) -> BridgeResult<Arc<dyn ManagedPipeline>> {
            Err(bridge_traits::BridgeError::NotAvailable("exoplayer".to_string()))
        }
    }

    fn complete_builder() -> CoreConfigBuilder {
        CoreConfig::builder()
            .catalog(Arc::new(MockCatalog))
            .progress_sink(Arc::new(MockSink))
            .trickplay_source(Arc::new(MockTrickplay))
            .native_player_factory(Arc::new(MockNativeFactory))
    }

    #[test]
    fn test_builder_with_all_required_fields() {
        let config = complete_builder().build().unwrap();
        assert!(config.has_decoder());
        assert!(config.settings_store.is_none());
        assert_eq!(config.features, FeatureFlags::default());
    }

    #[test]
    fn test_builder_requires_catalog() {
        let result = CoreConfig::builder()
            .progress_sink(Arc::new(MockSink))
            .native_player_factory(Arc::new(MockNativeFactory))
            .build();

        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "MediaCatalog")
            }
            other => panic!("expected CapabilityMissing, got {:?}", other),
        }
    }

    #[test]
    fn test_builder_requires_progress_sink() {
        let result = CoreConfig::builder()
            .catalog(Arc::new(MockCatalog))
            .native_player_factory(Arc::new(MockNativeFactory))
            .build();

        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("ProgressSink"));
    }

    #[test]
    fn test_builder_requires_a_decoder_factory() {
        let result = CoreConfig::builder()
            .catalog(Arc::new(MockCatalog))
            .progress_sink(Arc::new(MockSink))
            .trickplay_source(Arc::new(MockTrickplay))
            .build();

        match result {
            Err(Error::CapabilityMissing { capability, message }) => {
                assert_eq!(capability, "DecoderBackend");
                assert!(message.contains("NativePlayerFactory"));
            }
            other => panic!("expected CapabilityMissing, got {:?}", other),
        }
    }

    #[test]
    fn test_managed_factory_alone_is_enough() {
        let config = CoreConfig::builder()
            .catalog(Arc::new(MockCatalog))
            .progress_sink(Arc::new(MockSink))
            .managed_pipeline_factory(Arc::new(MockManagedFactory))
            .enable_trickplay(false)
            .build()
            .unwrap();
        assert!(config.managed_pipeline_factory.is_some());
        assert!(config.native_player_factory.is_none());
    }

    #[test]
    fn test_trickplay_requires_source() {
        let result = CoreConfig::builder()
            .catalog(Arc::new(MockCatalog))
            .progress_sink(Arc::new(MockSink))
            .native_player_factory(Arc::new(MockNativeFactory))
            .build();

        match result {
            Err(Error::Config(message)) => assert!(message.contains("TrickplaySource")),
            other => panic!("expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn test_builder_with_feature_flags() {
        let config = complete_builder()
            .enable_segment_skip(false)
            .build()
            .unwrap();
        assert!(config.features.enable_trickplay);
        assert!(!config.features.enable_segment_skip);

        let config = complete_builder()
            .features(FeatureFlags {
                enable_trickplay: false,
                enable_segment_skip: true,
            })
            .build()
            .unwrap();
        assert!(!config.features.enable_trickplay);
    }

    #[test]
    fn test_validate_rejects_empty_data_dir() {
        let result = complete_builder().data_dir("").build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_debug_hides_collaborators() {
        let config = complete_builder().data_dir("/data").build().unwrap();
        let rendered = format!("{:?}", config);
        assert!(rendered.contains("MediaCatalog { ... }"));
        assert!(rendered.contains("\"/data\""));
    }

    #[cfg(feature = "desktop-shims")]
    #[tokio::test]
    async fn test_with_desktop_settings_opens_sqlite_store() {
        let base = std::env::temp_dir().join(format!(
            "core-runtime-test-{}",
            uuid::Uuid::new_v4()
        ));

        let config = complete_builder()
            .data_dir(&base)
            .with_desktop_settings()
            .await
            .unwrap()
            .build()
            .unwrap();

        let settings = config.settings_store.clone().unwrap();
        settings.set_bool("playback.skip_intro", false).await.unwrap();
        assert_eq!(
            settings.get_bool("playback.skip_intro").await.unwrap(),
            Some(false)
        );
        assert!(base.join("settings.db").exists());

        drop(config);
        let _ = tokio::fs::remove_dir_all(&base).await;
    }

    #[cfg(feature = "desktop-shims")]
    #[tokio::test]
    async fn test_with_desktop_settings_requires_data_dir() {
        let result = complete_builder().with_desktop_settings().await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
