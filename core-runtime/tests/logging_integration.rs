//! Integration tests for logging system

use bridge_traits::logger::LogLevel;
use core_runtime::logging::{redact_if_sensitive, redact_url, LogFormat, LoggingConfig};

#[test]
fn test_logging_config_builder() {
    // Only one global subscriber per process, so this exercises the builder.
    let config = LoggingConfig::default()
        .with_format(LogFormat::Json)
        .with_level(LogLevel::Debug)
        .with_pii_redaction(true)
        .with_thread_info(true);

    assert_eq!(config.format, LogFormat::Json);
    assert_eq!(config.level, LogLevel::Debug);
    assert!(config.redact_pii);
    assert!(config.display_thread_info);
}

#[test]
fn test_redaction_of_credentials() {
    assert_eq!(redact_if_sensitive("access_token", "abc"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("X-Emby-Token", "abc"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("api_key", "abc"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("Authorization", "MediaBrowser Token=\"x\""), "[REDACTED]");
}

#[test]
fn test_redaction_keeps_playback_fields() {
    assert_eq!(redact_if_sensitive("item_id", "f00d"), "f00d");
    assert_eq!(redact_if_sensitive("session_id", "a1b2"), "a1b2");
    assert_eq!(redact_if_sensitive("position_ms", "15000"), "15000");
}

#[test]
fn test_stream_url_redaction() {
    assert_eq!(
        redact_url("https://srv/Videos/1/stream?static=true&ApiKey=tok"),
        "https://srv/Videos/1/stream?static=true&ApiKey=[REDACTED]"
    );
    assert_eq!(
        redact_url("https://srv/Videos/1/master.m3u8?api_key=tok&AudioStreamIndex=2"),
        "https://srv/Videos/1/master.m3u8?api_key=[REDACTED]&AudioStreamIndex=2"
    );
    assert_eq!(redact_url("https://srv/Videos/1/stream"), "https://srv/Videos/1/stream");
    assert_eq!(redact_url(""), "");
}

#[test]
fn test_format_selection() {
    #[cfg(debug_assertions)]
    assert_eq!(LogFormat::default(), LogFormat::Pretty);

    #[cfg(not(debug_assertions))]
    assert_eq!(LogFormat::default(), LogFormat::Json);
}
