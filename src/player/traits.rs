use crate::error::{MediaErrorKind, SinkError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    Off,
    All,
    One,
}

impl RepeatMode {
    /// off → all → one → off
    pub fn cycle(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::Off,
        }
    }
}

/// Lifecycle notifications emitted by a media sink.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEventKind {
    LoadStart,
    CanPlay,
    LoadedData,
    Play,
    Pause,
    /// Current position in seconds
    TimeUpdate(f64),
    Ended,
    Error(MediaErrorKind),
}

/// A sink event tagged with the source generation it belongs to.
///
/// Every `set_source` call bumps the sink's generation, so events still in
/// flight for an older source can be told apart and dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkEvent {
    pub generation: u64,
    pub kind: SinkEventKind,
}

pub type SinkEventSender = mpsc::UnboundedSender<SinkEvent>;
pub type SinkEventReceiver = mpsc::UnboundedReceiver<SinkEvent>;

/// An audio output that loads a URL and reports its lifecycle as events.
#[async_trait]
pub trait MediaSink: Send {
    /// Assign a new source, invalidating events from the previous one.
    fn set_source(&mut self, url: &str);

    /// Drop the current source without assigning a new one.
    fn clear_source(&mut self);

    fn source(&self) -> Option<String>;

    /// Generation of the current source.
    fn generation(&self) -> u64;

    /// Start loading the current source. Readiness is reported via events.
    fn load(&mut self);

    async fn play(&mut self) -> Result<(), SinkError>;

    fn pause(&mut self);

    fn is_paused(&self) -> bool;

    /// Whether the current source has played to the end.
    fn has_ended(&self) -> bool;

    /// 0.0 ..= 1.0
    fn set_volume(&mut self, volume: f32);

    fn position(&self) -> f64;

    fn set_position(&mut self, secs: f64);

    fn duration(&self) -> Option<f64>;
}
