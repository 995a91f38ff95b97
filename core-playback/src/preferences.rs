//! Playback preferences.
//!
//! Skip toggles per segment type and the autoplay toggle, read from the host
//! [`SettingsStore`] under `playback.*` keys. The engine reads them afresh at
//! every load so a change in the settings screen applies to the next item.

use bridge_traits::{SegmentType, SettingsStore};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const KEY_SKIP_INTRO: &str = "playback.skip_intro";
pub const KEY_SKIP_OUTRO: &str = "playback.skip_outro";
pub const KEY_SKIP_RECAP: &str = "playback.skip_recap";
pub const KEY_SKIP_COMMERCIAL: &str = "playback.skip_commercial";
pub const KEY_SKIP_PREVIEW: &str = "playback.skip_preview";
pub const KEY_SKIP_UNKNOWN: &str = "playback.skip_unknown";
pub const KEY_AUTOPLAY_NEXT: &str = "playback.autoplay_next";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackPreferences {
    pub skip_intro: bool,
    pub skip_outro: bool,
    pub skip_recap: bool,
    pub skip_commercial: bool,
    pub skip_preview: bool,
    pub skip_unknown: bool,
    pub autoplay_next: bool,
}

impl Default for PlaybackPreferences {
    fn default() -> Self {
        Self {
            skip_intro: true,
            skip_outro: true,
            skip_recap: true,
            skip_commercial: true,
            skip_preview: true,
            skip_unknown: false,
            autoplay_next: true,
        }
    }
}

impl PlaybackPreferences {
    /// Whether a skip affordance may be raised for `segment_type`.
    pub fn skip_enabled(&self, segment_type: SegmentType) -> bool {
        match segment_type {
            SegmentType::Intro => self.skip_intro,
            SegmentType::Outro => self.skip_outro,
            SegmentType::Recap => self.skip_recap,
            SegmentType::Commercial => self.skip_commercial,
            SegmentType::Preview => self.skip_preview,
            SegmentType::Unknown => self.skip_unknown,
        }
    }

    /// Read preferences, falling back to the default for every key that is
    /// missing or unreadable.
    pub async fn load(store: Option<&dyn SettingsStore>) -> Self {
        let defaults = Self::default();
        let Some(store) = store else {
            return defaults;
        };

        Self {
            skip_intro: read_flag(store, KEY_SKIP_INTRO, defaults.skip_intro).await,
            skip_outro: read_flag(store, KEY_SKIP_OUTRO, defaults.skip_outro).await,
            skip_recap: read_flag(store, KEY_SKIP_RECAP, defaults.skip_recap).await,
            skip_commercial: read_flag(store, KEY_SKIP_COMMERCIAL, defaults.skip_commercial)
                .await,
            skip_preview: read_flag(store, KEY_SKIP_PREVIEW, defaults.skip_preview).await,
            skip_unknown: read_flag(store, KEY_SKIP_UNKNOWN, defaults.skip_unknown).await,
            autoplay_next: read_flag(store, KEY_AUTOPLAY_NEXT, defaults.autoplay_next).await,
        }
    }

    pub async fn save(&self, store: &dyn SettingsStore) -> bridge_traits::error::Result<()> {
        store.set_bool(KEY_SKIP_INTRO, self.skip_intro).await?;
        store.set_bool(KEY_SKIP_OUTRO, self.skip_outro).await?;
        store.set_bool(KEY_SKIP_RECAP, self.skip_recap).await?;
        store.set_bool(KEY_SKIP_COMMERCIAL, self.skip_commercial).await?;
        store.set_bool(KEY_SKIP_PREVIEW, self.skip_preview).await?;
        store.set_bool(KEY_SKIP_UNKNOWN, self.skip_unknown).await?;
        store.set_bool(KEY_AUTOPLAY_NEXT, self.autoplay_next).await?;
        Ok(())
    }
}

async fn read_flag(store: &dyn SettingsStore, key: &str, default: bool) -> bool {
    match store.get_bool(key).await {
        Ok(Some(value)) => value,
        Ok(None) => default,
        Err(err) => {
            warn!("Failed to read preference {}: {}", key, err);
            default
        }
    }
}
