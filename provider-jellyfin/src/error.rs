//! Error types for the Jellyfin provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Jellyfin provider errors
#[derive(Error, Debug)]
pub enum JellyfinError {
    /// The access token was rejected
    #[error("Authentication rejected (status {status_code})")]
    Unauthorized { status_code: u16 },

    /// API request returned an error
    #[error("Jellyfin API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Item or media source not found
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// The source offers neither direct delivery nor a transcoding URL
    #[error("No delivery path for media source {media_source_id}")]
    NoDeliveryPath { media_source_id: String },

    /// The server declined to play the item
    #[error("Playback refused by server: {reason}")]
    PlaybackRefused { reason: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Bridge error
    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for Jellyfin operations
pub type Result<T> = std::result::Result<T, JellyfinError>;

impl From<JellyfinError> for BridgeError {
    fn from(error: JellyfinError) -> Self {
        match error {
            JellyfinError::Unauthorized { status_code } => BridgeError::Http {
                status: status_code,
                message: "authentication rejected".to_string(),
            },
            JellyfinError::ApiError {
                status_code,
                message,
            } => BridgeError::Http {
                status: status_code,
                message,
            },
            JellyfinError::NotFound { resource } => BridgeError::NotFound(resource),
            JellyfinError::NoDeliveryPath { media_source_id } => BridgeError::OperationFailed(
                format!("No delivery path for media source {}", media_source_id),
            ),
            JellyfinError::PlaybackRefused { reason } => {
                BridgeError::OperationFailed(format!("Playback refused: {}", reason))
            }
            JellyfinError::ParseError(msg) => {
                BridgeError::OperationFailed(format!("Parse error: {}", msg))
            }
            JellyfinError::BridgeError(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = JellyfinError::ApiError {
            status_code: 400,
            message: "bad request".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Jellyfin API error (status 400): bad request"
        );
    }

    #[test]
    fn test_error_conversion_keeps_status() {
        let bridge: BridgeError = JellyfinError::ApiError {
            status_code: 503,
            message: "busy".to_string(),
        }
        .into();
        assert!(bridge.is_transient());

        let bridge: BridgeError = JellyfinError::NotFound {
            resource: "item abc".to_string(),
        }
        .into();
        assert!(matches!(bridge, BridgeError::NotFound(_)));
    }
}
