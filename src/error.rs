//! Error types for jamtune
//!
//! Library code returns these typed errors; the binary wraps them in `anyhow`.

use thiserror::Error;

/// Why a media sink reported a failure.
///
/// Mirrors the four codes an audio element can report, plus a catch-all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaErrorKind {
    Aborted,
    Network,
    Decode,
    Unsupported,
    Unknown,
}

impl MediaErrorKind {
    /// Message shown to the user when the sink reports this code.
    pub fn user_message(self) -> &'static str {
        match self {
            MediaErrorKind::Aborted => "Audio loading was aborted",
            MediaErrorKind::Network => "Network error while loading audio",
            MediaErrorKind::Decode => "Audio format not supported or file corrupted",
            MediaErrorKind::Unsupported => "Audio format not supported",
            MediaErrorKind::Unknown => "Audio failed to load",
        }
    }
}

/// Errors returned directly by a media sink operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("no source assigned")]
    NoSource,

    #[error("playback start rejected: {0}")]
    Rejected(String),

    #[error("media error: {0:?}")]
    Media(MediaErrorKind),

    #[error("audio device unavailable: {0}")]
    Device(String),
}

/// Playback failures surfaced through the controller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("audio load timed out")]
    Timeout,

    #[error("unsupported audio format")]
    UnsupportedFormat,

    #[error("audio decode failed")]
    DecodeFailure,

    #[error("no playable audio source for track {0}")]
    NoPlayableSource(String),

    #[error("a track is already loading")]
    SinkBusy,

    #[error("playback failed: {0}")]
    Sink(#[from] SinkError),
}

impl PlaybackError {
    /// Short, user-facing description (timeout / format / network / generic).
    pub fn user_message(&self) -> String {
        match self {
            PlaybackError::Timeout => "Audio load timed out, check your network connection".into(),
            PlaybackError::UnsupportedFormat
            | PlaybackError::DecodeFailure
            | PlaybackError::Sink(SinkError::Media(MediaErrorKind::Decode))
            | PlaybackError::Sink(SinkError::Media(MediaErrorKind::Unsupported)) => {
                "Audio format not supported, trying the next track".into()
            }
            PlaybackError::Network(_) | PlaybackError::Sink(SinkError::Media(MediaErrorKind::Network)) => {
                "Network connection problem".into()
            }
            PlaybackError::NoPlayableSource(_) => "No playable audio URL for this track".into(),
            PlaybackError::ConfigurationMissing(what) => format!("Player not ready: {}", what),
            PlaybackError::SinkBusy => "Another track is still loading".into(),
            PlaybackError::Sink(_) => "Playback failed".into(),
        }
    }
}

impl From<MediaErrorKind> for PlaybackError {
    fn from(kind: MediaErrorKind) -> Self {
        match kind {
            MediaErrorKind::Network => PlaybackError::Network(kind.user_message().to_string()),
            MediaErrorKind::Decode => PlaybackError::DecodeFailure,
            MediaErrorKind::Unsupported => PlaybackError::UnsupportedFormat,
            other => PlaybackError::Sink(SinkError::Media(other)),
        }
    }
}

/// Failures talking to the track catalog.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("catalog not configured: {0}")]
    NotConfigured(String),

    #[error("HTTP {status}: {reason}")]
    Status { status: u16, reason: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed catalog response: {0}")]
    Malformed(String),

    #[error("catalog reported an error: {0}")]
    Api(String),
}

/// Failures of the persisted key-value store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not encode {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: toml::ser::Error,
    },

    #[error("could not decode {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: toml::de::Error,
    },
}

pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_classification() {
        assert!(PlaybackError::Timeout.user_message().contains("timed out"));
        assert!(PlaybackError::DecodeFailure.user_message().contains("format"));
        assert!(PlaybackError::from(MediaErrorKind::Network)
            .user_message()
            .contains("Network"));
        assert_eq!(
            PlaybackError::Sink(SinkError::Rejected("denied".into())).user_message(),
            "Playback failed"
        );
    }

    #[test]
    fn test_media_kind_maps_to_taxonomy() {
        assert_eq!(PlaybackError::from(MediaErrorKind::Decode), PlaybackError::DecodeFailure);
        assert_eq!(
            PlaybackError::from(MediaErrorKind::Unsupported),
            PlaybackError::UnsupportedFormat
        );
        assert_eq!(
            PlaybackError::from(MediaErrorKind::Aborted),
            PlaybackError::Sink(SinkError::Media(MediaErrorKind::Aborted))
        );
    }
}
