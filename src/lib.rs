//! Workspace placeholder crate.
//!
//! Exposes feature flags that map to the member crates so a host application
//! can depend on `media-client-workspace` alone and switch on what it needs
//! (`desktop-shims`, `jellyfin`).

pub use core_playback;
pub use core_runtime;

#[cfg(feature = "jellyfin")]
pub use provider_jellyfin;
