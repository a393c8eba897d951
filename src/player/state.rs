use super::traits::PlaybackState;
use crate::catalog::Track;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, error};

pub const HISTORY_LIMIT: usize = 50;
pub const DEFAULT_VOLUME: u8 = 50;

/// Transient playback telemetry and play history.
#[derive(Debug)]
pub struct PlayerStore {
    current_track: Option<Arc<Track>>,
    state: PlaybackState,
    position: f64,
    duration: f64,
    volume: u8,
    last_error: Option<String>,
    /// Track ids, most recent first
    history: VecDeque<String>,
}

impl Default for PlayerStore {
    fn default() -> Self {
        Self {
            current_track: None,
            state: PlaybackState::Idle,
            position: 0.0,
            duration: 0.0,
            volume: DEFAULT_VOLUME,
            last_error: None,
            history: VecDeque::with_capacity(HISTORY_LIMIT),
        }
    }
}

impl PlayerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_track(&self) -> Option<&Arc<Track>> {
        self.current_track.as_ref()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn is_loading(&self) -> bool {
        self.state == PlaybackState::Loading
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.history.iter().map(String::as_str)
    }

    /// Make `track` current: position resets, duration takes the declared
    /// length until the sink reports the real one, and history is updated.
    pub fn set_current_track(&mut self, track: Arc<Track>) {
        self.position = 0.0;
        self.duration = track.duration as f64;
        self.record_history(&track.id);
        debug!(track_id = %track.id, name = %track.name, "current track set");
        self.current_track = Some(track);
    }

    fn record_history(&mut self, id: &str) {
        if id.is_empty() {
            return;
        }
        self.history.retain(|h| h != id);
        self.history.push_front(id.to_string());
        self.history.truncate(HISTORY_LIMIT);
    }

    /// Restore persisted history, keeping the cap and uniqueness.
    pub fn load_history<I: IntoIterator<Item = String>>(&mut self, ids: I) {
        self.history.clear();
        for id in ids {
            if self.history.len() == HISTORY_LIMIT {
                break;
            }
            if !id.is_empty() && !self.history.contains(&id) {
                self.history.push_back(id);
            }
        }
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.state = if playing {
            PlaybackState::Playing
        } else {
            PlaybackState::Paused
        };
    }

    /// Nothing is playing any more (queue exhausted, or stopped).
    pub fn set_idle(&mut self) {
        self.state = PlaybackState::Idle;
    }

    /// Entering loading always wins; leaving it drops back to idle.
    pub fn set_loading(&mut self, loading: bool) {
        if loading {
            self.state = PlaybackState::Loading;
        } else if self.state == PlaybackState::Loading {
            self.state = PlaybackState::Idle;
        }
    }

    pub fn set_position(&mut self, secs: f64) {
        self.position = secs.max(0.0);
    }

    pub fn set_duration(&mut self, secs: f64) {
        self.duration = secs.max(0.0);
    }

    /// Clamp to 0..=100.
    pub fn set_volume(&mut self, volume: i32) -> u8 {
        self.volume = volume.clamp(0, 100) as u8;
        debug!(volume = self.volume, "volume set");
        self.volume
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        error!(%message, "playback error");
        self.last_error = Some(message);
        self.state = PlaybackState::Error;
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
        if self.state == PlaybackState::Error {
            self.state = PlaybackState::Idle;
        }
    }

    /// Clamp `target` to the known duration and make it the position.
    pub fn seek_to(&mut self, target: f64) -> f64 {
        let target = target.clamp(0.0, self.duration.max(0.0));
        self.position = target;
        target
    }

    pub fn seek_by_percentage(&mut self, percent: f64) -> f64 {
        self.seek_to(percent / 100.0 * self.duration)
    }

    pub fn progress_percentage(&self) -> f64 {
        if self.duration <= 0.0 {
            0.0
        } else {
            self.position / self.duration * 100.0
        }
    }

    /// Back to idle with no current track. Volume and history survive.
    pub fn reset(&mut self) {
        self.current_track = None;
        self.state = PlaybackState::Idle;
        self.position = 0.0;
        self.duration = 0.0;
        self.last_error = None;
    }
}

/// `m:ss`
pub fn format_time(secs: f64) -> String {
    if !secs.is_finite() || secs <= 0.0 {
        return "0:00".to_string();
    }
    let total = secs.floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str) -> Arc<Track> {
        Arc::new(Track::new(id, &format!("Song {}", id), 200))
    }

    #[test]
    fn test_volume_is_clamped() {
        let mut store = PlayerStore::new();
        assert_eq!(store.set_volume(150), 100);
        assert_eq!(store.set_volume(-5), 0);
        assert_eq!(store.set_volume(42), 42);
    }

    #[test]
    fn test_set_current_track_resets_telemetry() {
        let mut store = PlayerStore::new();
        store.set_position(30.0);
        store.set_current_track(track("a"));
        assert_eq!(store.position(), 0.0);
        assert_eq!(store.duration(), 200.0);
        assert_eq!(store.history().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn test_history_dedup_and_cap() {
        let mut store = PlayerStore::new();
        store.set_current_track(track("x"));
        store.set_current_track(track("x"));
        assert_eq!(store.history().count(), 1);

        let mut store = PlayerStore::new();
        for i in 0..=HISTORY_LIMIT {
            store.set_current_track(track(&i.to_string()));
        }
        let history: Vec<_> = store.history().collect();
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history[0], HISTORY_LIMIT.to_string());
        assert!(!history.contains(&"0"));
    }

    #[test]
    fn test_replaying_moves_to_front() {
        let mut store = PlayerStore::new();
        store.set_current_track(track("a"));
        store.set_current_track(track("b"));
        store.set_current_track(track("a"));
        assert_eq!(store.history().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_error_forces_state() {
        let mut store = PlayerStore::new();
        store.set_loading(true);
        store.set_error("boom");
        assert_eq!(store.state(), PlaybackState::Error);
        assert_eq!(store.last_error(), Some("boom"));

        store.clear_error();
        assert_eq!(store.state(), PlaybackState::Idle);
        assert_eq!(store.last_error(), None);
    }

    #[test]
    fn test_loading_transitions() {
        let mut store = PlayerStore::new();
        store.set_loading(true);
        assert!(store.is_loading());
        store.set_loading(false);
        assert_eq!(store.state(), PlaybackState::Idle);

        store.set_playing(true);
        store.set_loading(false);
        assert!(store.is_playing());
        store.set_playing(false);
        assert_eq!(store.state(), PlaybackState::Paused);
    }

    #[test]
    fn test_seek_clamps_to_duration() {
        let mut store = PlayerStore::new();
        store.set_current_track(track("s"));
        assert_eq!(store.seek_to(500.0), 200.0);
        assert_eq!(store.seek_to(-3.0), 0.0);
        assert_eq!(store.seek_by_percentage(50.0), 100.0);
        assert_eq!(store.progress_percentage(), 50.0);
    }

    #[test]
    fn test_load_history_respects_cap() {
        let mut store = PlayerStore::new();
        store.load_history((0..80).map(|i| i.to_string()).chain(["3".to_string()]));
        assert_eq!(store.history().count(), HISTORY_LIMIT);
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(65.9), "1:05");
        assert_eq!(format_time(f64::NAN), "0:00");
    }
}
