//! Playback controller
//!
//! Drives one media sink through load → ready → play for a requested track,
//! trying each candidate URL in turn, and keeps the queue and player stores
//! in step with the events the sink reports.

use super::queue::QueueStore;
use super::sources::candidate_urls;
use super::state::PlayerStore;
use super::traits::{MediaSink, RepeatMode, SinkEvent, SinkEventKind, SinkEventReceiver};
use crate::catalog::Track;
use crate::error::{MediaErrorKind, PlaybackError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{debug, info, trace, warn};

/// How long one candidate URL gets to become playable.
pub const LOAD_TIMEOUT: Duration = Duration::from_secs(8);

pub const DEFAULT_ERROR_ADVANCE_DELAY: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Start the next queued track when one ends.
    pub auto_advance: bool,
    /// Wait before skipping past a track that failed to play.
    pub error_advance_delay: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            auto_advance: true,
            error_advance_delay: DEFAULT_ERROR_ADVANCE_DELAY,
        }
    }
}

/// The user preferences that outlive a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default = "default_volume")]
    pub volume: u8,
    #[serde(default)]
    pub shuffle: bool,
    #[serde(default)]
    pub repeat_mode: RepeatMode,
    /// Track ids, most recent first
    #[serde(default)]
    pub history: Vec<String>,
}

fn default_volume() -> u8 {
    super::state::DEFAULT_VOLUME
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            volume: default_volume(),
            shuffle: false,
            repeat_mode: RepeatMode::Off,
            history: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayOutcome {
    /// A new source is playing. `fallback` is set when no candidate became
    /// ready in time and the first one was used unverified.
    Started { url: String, fallback: bool },
    /// The requested track was already loaded; playback resumed.
    Resumed,
}

/// Something the owner of the controller should feed back into [`PlaybackController::dispatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    Sink(SinkEvent),
    /// The delayed skip after a playback failure is due.
    AdvanceDue,
}

pub struct PlaybackController<S> {
    queue: QueueStore,
    player: PlayerStore,
    sink: Option<S>,
    events: Option<SinkEventReceiver>,
    options: ControllerOptions,
    pending_advance: Option<Instant>,
    /// Generation of a source assigned without a ready check. Its
    /// load-start does not put the player back into loading.
    unverified: Option<u64>,
}

impl<S: MediaSink> PlaybackController<S> {
    pub fn new(options: ControllerOptions) -> Self {
        Self {
            queue: QueueStore::new(),
            player: PlayerStore::new(),
            sink: None,
            events: None,
            options,
            pending_advance: None,
            unverified: None,
        }
    }

    pub fn queue(&self) -> &QueueStore {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut QueueStore {
        &mut self.queue
    }

    pub fn player(&self) -> &PlayerStore {
        &self.player
    }

    pub fn sink(&self) -> Option<&S> {
        self.sink.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.sink.is_some()
    }

    pub fn pending_advance(&self) -> Option<Instant> {
        self.pending_advance
    }

    pub fn preferences(&self) -> Preferences {
        Preferences {
            volume: self.player.volume(),
            shuffle: self.queue.shuffle(),
            repeat_mode: self.queue.repeat_mode(),
            history: self.player.history().map(str::to_string).collect(),
        }
    }

    pub fn restore_preferences(&mut self, prefs: Preferences) {
        self.player.set_volume(prefs.volume as i32);
        self.queue.set_shuffle(prefs.shuffle);
        self.queue.set_repeat_mode(prefs.repeat_mode);
        self.player.load_history(prefs.history);
        if let Some(sink) = self.sink.as_mut() {
            sink.set_volume(self.player.volume() as f32 / 100.0);
        }
    }

    /// Bind a sink and the receiving end of its event channel.
    pub fn attach(&mut self, mut sink: S, events: SinkEventReceiver) {
        sink.set_volume(self.player.volume() as f32 / 100.0);
        self.sink = Some(sink);
        self.events = Some(events);
        info!("media sink attached");
    }

    /// Silence and release the sink; the player store goes back to idle.
    /// The queue is kept.
    pub fn disconnect(&mut self) -> Option<S> {
        let mut sink = self.sink.take();
        if let Some(s) = sink.as_mut() {
            s.pause();
            s.clear_source();
        }
        self.events = None;
        self.pending_advance = None;
        self.unverified = None;
        self.player.reset();
        info!("media sink detached");
        sink
    }

    /// Play `track`, optionally replacing the queue first with
    /// `(tracks, start_index)`.
    pub async fn play(&mut self, track: Arc<Track>, new_queue: Option<(Vec<Arc<Track>>, usize)>) -> Result<PlayOutcome> {
        if self.player.is_loading() {
            debug!(track_id = %track.id, "play request dropped, a load is in flight");
            return Err(PlaybackError::SinkBusy);
        }
        let Some(sink) = self.sink.as_mut() else {
            return Err(PlaybackError::ConfigurationMissing("no media sink attached".into()));
        };

        let is_current = self.player.current_track().is_some_and(|t| t.id == track.id);
        if is_current && !sink.has_ended() && sink.source().is_some() {
            if sink.is_paused() {
                if let Err(e) = sink.play().await {
                    let e = PlaybackError::from(e);
                    self.fail(&e);
                    return Err(e);
                }
            }
            debug!(track_id = %track.id, "resumed current track");
            return Ok(PlayOutcome::Resumed);
        }

        match self.load_and_play(track, new_queue).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    async fn load_and_play(&mut self, track: Arc<Track>, new_queue: Option<(Vec<Arc<Track>>, usize)>) -> Result<PlayOutcome> {
        self.pending_advance = None;
        self.unverified = None;
        self.player.clear_error();
        self.player.set_loading(true);

        if let Some((tracks, start)) = new_queue {
            self.queue.set_queue(tracks, start);
        }

        let sink = self.sink_mut()?;
        if !sink.is_paused() {
            sink.pause();
        }

        self.player.set_current_track(Arc::clone(&track));

        let candidates = candidate_urls(&track);
        if candidates.is_empty() {
            return Err(PlaybackError::NoPlayableSource(track.id.clone()));
        }

        let mut chosen = None;
        for url in &candidates {
            match self.try_candidate(url).await {
                Ok(()) => {
                    chosen = Some(url.clone());
                    break;
                }
                Err(e) => warn!(track_id = %track.id, url = %url, error = %e, "candidate failed, trying next"),
            }
        }

        let fallback = chosen.is_none();
        let url = match chosen {
            Some(url) => url,
            None => {
                // Nothing became ready; hand the sink the best guess.
                let url = candidates[0].clone();
                warn!(track_id = %track.id, url = %url, "no candidate became ready, using first one unverified");
                let sink = self.sink_mut()?;
                sink.set_source(&url);
                let generation = sink.generation();
                sink.load();
                self.unverified = Some(generation);
                // A fallback must never keep later requests out.
                self.player.set_loading(false);
                url
            }
        };

        let volume = self.player.volume();
        let sink = self.sink_mut()?;
        sink.set_volume(volume as f32 / 100.0);
        sink.play().await?;

        info!(track_id = %track.id, name = %track.name, url = %url, fallback, "playback started");
        Ok(PlayOutcome::Started { url, fallback })
    }

    /// Point the sink at `url` and wait for it to become playable.
    async fn try_candidate(&mut self, url: &str) -> Result<()> {
        let sink = self.sink_mut()?;
        sink.set_source(url);
        let generation = sink.generation();
        sink.load();
        debug!(url, generation, "loading candidate");

        match timeout(LOAD_TIMEOUT, self.wait_until_ready(generation)).await {
            Ok(result) => result,
            Err(_) => Err(PlaybackError::Timeout),
        }
    }

    /// Consume sink events until the source of `generation` is ready or
    /// fails. Other events are applied as usual; stale ones are dropped.
    async fn wait_until_ready(&mut self, generation: u64) -> Result<()> {
        loop {
            let event = match self.events.as_mut() {
                Some(rx) => rx.recv().await,
                None => None,
            };
            let Some(event) = event else {
                return Err(PlaybackError::ConfigurationMissing("sink event channel closed".into()));
            };
            if event.generation != generation {
                trace!(?event, "dropping stale sink event");
                continue;
            }
            match event.kind {
                SinkEventKind::CanPlay => {
                    self.apply_ready();
                    return Ok(());
                }
                SinkEventKind::Error(kind) => return Err(PlaybackError::from(kind)),
                other => self.apply_telemetry(other),
            }
        }
    }

    fn sink_mut(&mut self) -> Result<&mut S> {
        self.sink
            .as_mut()
            .ok_or_else(|| PlaybackError::ConfigurationMissing("no media sink attached".into()))
    }

    /// Record the failure and, with more than one queued track, schedule a skip.
    fn fail(&mut self, error: &PlaybackError) {
        self.player.set_error(error.user_message());
        if self.queue.len() > 1 {
            let due = Instant::now() + self.options.error_advance_delay;
            self.pending_advance = Some(due);
            debug!(delay_ms = self.options.error_advance_delay.as_millis() as u64, "skip to next track scheduled");
        }
    }

    fn apply_ready(&mut self) {
        if let Some(duration) = self.sink.as_ref().and_then(|s| s.duration()) {
            if duration.is_finite() {
                self.player.set_duration(duration.floor());
            }
        }
        self.player.set_loading(false);
    }

    fn apply_telemetry(&mut self, kind: SinkEventKind) {
        match kind {
            SinkEventKind::LoadStart => self.player.set_loading(true),
            SinkEventKind::Play => self.player.set_playing(true),
            SinkEventKind::Pause => self.player.set_playing(false),
            SinkEventKind::TimeUpdate(pos) => self.player.set_position(pos.floor()),
            SinkEventKind::LoadedData => {}
            SinkEventKind::CanPlay => self.apply_ready(),
            SinkEventKind::Ended | SinkEventKind::Error(_) => {
                trace!(?kind, "lifecycle event ignored during telemetry update")
            }
        }
    }

    /// Wait for the next thing that needs handling: a sink event or a due
    /// auto-advance. Cancel-safe. Pends forever with no sink attached.
    pub async fn next_event(&mut self) -> ControllerEvent {
        let deadline = self.pending_advance;
        let Some(rx) = self.events.as_mut() else {
            return std::future::pending().await;
        };

        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => ControllerEvent::Sink(event),
                None => std::future::pending().await,
            },
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => ControllerEvent::AdvanceDue,
        }
    }

    pub async fn dispatch(&mut self, event: ControllerEvent) {
        match event {
            ControllerEvent::Sink(event) => self.handle_event(event).await,
            ControllerEvent::AdvanceDue => {
                self.pending_advance = None;
                self.advance_after_error().await;
            }
        }
    }

    /// Apply every sink event already queued, without waiting.
    pub async fn process_pending_events(&mut self) {
        loop {
            let event = match self.events.as_mut().map(|rx| rx.try_recv()) {
                Some(Ok(event)) => event,
                _ => break,
            };
            self.handle_event(event).await;
        }
    }

    /// React to one sink event.
    pub async fn handle_event(&mut self, event: SinkEvent) {
        let Some(current) = self.sink.as_ref().map(|s| s.generation()) else {
            return;
        };
        if event.generation != current {
            trace!(?event, "dropping stale sink event");
            return;
        }

        match event.kind {
            SinkEventKind::LoadStart if self.unverified == Some(event.generation) => {
                trace!("load-start of unverified source ignored")
            }
            SinkEventKind::Ended => self.on_ended().await,
            SinkEventKind::Error(kind) => self.on_media_error(kind),
            other => self.apply_telemetry(other),
        }
    }

    async fn on_ended(&mut self) {
        let next = if self.options.auto_advance {
            self.queue.next_index()
        } else {
            None
        };

        match next.and_then(|i| self.queue.advance_to(i)) {
            Some(track) => {
                debug!(track_id = %track.id, index = ?self.queue.current_index(), "track ended, advancing");
                if let Err(e) = self.play(track, None).await {
                    warn!(error = %e, "auto-advance failed");
                }
            }
            None => {
                info!("queue finished");
                self.player.set_idle();
            }
        }
    }

    fn on_media_error(&mut self, kind: MediaErrorKind) {
        warn!(?kind, "sink reported a media error");
        self.fail(&PlaybackError::from(kind));
    }

    /// Skip past a failed track. Repeat-one would retry the same broken
    /// source forever, so it steps sequentially instead.
    async fn advance_after_error(&mut self) {
        let next = match (self.queue.repeat_mode(), self.queue.current_index()) {
            (RepeatMode::One, Some(cur)) if !self.queue.is_empty() => Some((cur + 1) % self.queue.len()),
            _ => self.queue.next_index(),
        };
        let Some(track) = next.and_then(|i| self.queue.advance_to(i)) else {
            debug!("nothing to skip to after error");
            return;
        };
        if let Err(e) = self.play(track, None).await {
            warn!(error = %e, "skip after error failed");
        }
    }

    /// Pause when playing, play otherwise. No-op without a current track or
    /// while a load is in flight.
    pub async fn toggle_play_pause(&mut self) -> Result<()> {
        if self.player.current_track().is_none() || self.player.is_loading() {
            return Ok(());
        }
        let Some(sink) = self.sink.as_mut() else {
            return Ok(());
        };
        if !sink.is_paused() {
            sink.pause();
        } else {
            sink.play().await?;
        }
        Ok(())
    }

    /// Seek, clamped to the known duration. Returns the applied position.
    pub fn seek(&mut self, target: f64) -> Option<f64> {
        let sink = self.sink.as_mut()?;
        if self.player.duration() <= 0.0 {
            return None;
        }
        let pos = self.player.seek_to(target);
        sink.set_position(pos);
        debug!(position = pos, "seek");
        Some(pos)
    }

    pub fn set_volume(&mut self, volume: i32) -> u8 {
        let volume = self.player.set_volume(volume);
        if let Some(sink) = self.sink.as_mut() {
            sink.set_volume(volume as f32 / 100.0);
        }
        volume
    }

    /// Play the queue's next track. `Ok(None)` when the queue is exhausted.
    pub async fn next(&mut self) -> Result<Option<PlayOutcome>> {
        if self.player.is_loading() {
            return Err(PlaybackError::SinkBusy);
        }
        match self.queue.next_index().and_then(|i| self.queue.advance_to(i)) {
            Some(track) => self.play(track, None).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn previous(&mut self) -> Result<Option<PlayOutcome>> {
        if self.player.is_loading() {
            return Err(PlaybackError::SinkBusy);
        }
        match self.queue.previous_index().and_then(|i| self.queue.advance_to(i)) {
            Some(track) => self.play(track, None).await.map(Some),
            None => Ok(None),
        }
    }

    /// Jump to a queue position.
    pub async fn play_at(&mut self, index: usize) -> Result<Option<PlayOutcome>> {
        if self.player.is_loading() {
            return Err(PlaybackError::SinkBusy);
        }
        match self.queue.advance_to(index) {
            Some(track) => self.play(track, None).await.map(Some),
            None => Ok(None),
        }
    }

    pub fn toggle_shuffle(&mut self) -> bool {
        let on = self.queue.toggle_shuffle();
        info!(shuffle = on, "shuffle toggled");
        on
    }

    pub fn cycle_repeat_mode(&mut self) -> RepeatMode {
        let mode = self.queue.cycle_repeat_mode();
        info!(?mode, "repeat mode changed");
        mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::memory::{LoadBehavior, MemorySink, MemorySinkHandle, SinkCall};
    use crate::player::traits::PlaybackState;
    use tokio::sync::mpsc;

    fn track(id: &str, url: &str) -> Arc<Track> {
        Arc::new(Track::new(id, &format!("Song {}", id), 120).with_audio(url))
    }

    fn controller() -> (PlaybackController<MemorySink>, MemorySinkHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = MemorySink::new(tx);
        let handle = sink.handle();
        let mut c = PlaybackController::new(ControllerOptions::default());
        c.attach(sink, rx);
        handle.clear_calls();
        (c, handle)
    }

    #[tokio::test]
    async fn test_play_starts_first_ready_candidate() {
        let (mut c, handle) = controller();
        let t = track("1", "http://x/1.mp3");

        let outcome = c.play(t, None).await.unwrap();
        assert_eq!(
            outcome,
            PlayOutcome::Started {
                url: "http://x/1.mp3".into(),
                fallback: false
            }
        );
        c.process_pending_events().await;
        assert_eq!(c.player().state(), PlaybackState::Playing);
        assert_eq!(c.player().duration(), 180.0);
        assert!(handle.calls().contains(&SinkCall::SetVolume(0.5)));
    }

    #[tokio::test]
    async fn test_failed_candidate_falls_through_to_next() {
        let (mut c, handle) = controller();
        let t = Arc::new(
            Track::new("1", "a", 100)
                .with_audio("http://x/stream.mp3")
                .with_download("http://x/file.ogg"),
        );
        handle.set_behavior("http://x/stream.mp3", LoadBehavior::Fail(MediaErrorKind::Network));

        let outcome = c.play(t, None).await.unwrap();
        assert_eq!(
            outcome,
            PlayOutcome::Started {
                url: "http://x/file.ogg".into(),
                fallback: false
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_candidates_fail_uses_first_unverified() {
        let (mut c, handle) = controller();
        let t = Arc::new(
            Track::new("1", "a", 100)
                .with_audio("http://x/a.ogg")
                .with_download("http://x/b.mp3"),
        );
        handle.set_behavior("http://x/b.mp3", LoadBehavior::Hang);
        handle.set_behavior("http://x/a.ogg", LoadBehavior::Fail(MediaErrorKind::Decode));

        let outcome = c.play(t, None).await.unwrap();
        assert_eq!(
            outcome,
            PlayOutcome::Started {
                url: "http://x/b.mp3".into(),
                fallback: true
            }
        );
        let sources: Vec<_> = handle
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                SinkCall::SetSource(url) => Some(url),
                _ => None,
            })
            .collect();
        assert_eq!(sources, vec!["http://x/b.mp3", "http://x/a.ogg", "http://x/b.mp3"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_fallback_does_not_block_later_requests() {
        let (mut c, handle) = controller();
        handle.set_default_behavior(LoadBehavior::Hang);
        handle.defer_play_until_ready(true);
        let tracks: Vec<_> = (0..3)
            .map(|i| track(&i.to_string(), &format!("http://x/{}.mp3", i)))
            .collect();

        let outcome = c.play(tracks[0].clone(), Some((tracks.clone(), 0))).await.unwrap();
        assert!(matches!(outcome, PlayOutcome::Started { fallback: true, .. }));

        tokio::time::advance(Duration::from_secs(600)).await;
        c.process_pending_events().await;
        assert_ne!(c.player().state(), PlaybackState::Loading);

        let next = c.next().await.unwrap();
        assert!(matches!(next, Some(PlayOutcome::Started { fallback: true, .. })));
        assert_eq!(c.queue().current_index(), Some(1));

        c.process_pending_events().await;
        let other = c.play(tracks[2].clone(), None).await;
        assert!(matches!(other, Ok(PlayOutcome::Started { .. })));
        assert_eq!(c.player().current_track().unwrap().id, "2");
    }

    #[tokio::test]
    async fn test_deferred_play_starts_once_ready() {
        let (mut c, handle) = controller();
        handle.defer_play_until_ready(true);
        c.play(track("1", "http://x/1.mp3"), None).await.unwrap();
        c.process_pending_events().await;
        assert_eq!(c.player().state(), PlaybackState::Playing);
    }

    #[tokio::test]
    async fn test_no_urls_is_an_error() {
        let (mut c, _handle) = controller();
        let t = Arc::new(Track::new("1", "silent", 100));
        let err = c.play(t, None).await.unwrap_err();
        assert_eq!(err, PlaybackError::NoPlayableSource("1".into()));
        assert_eq!(c.player().state(), PlaybackState::Error);
        assert!(c.player().last_error().is_some());
        assert!(c.pending_advance().is_none());
    }

    #[tokio::test]
    async fn test_failure_with_queue_schedules_advance() {
        let (mut c, handle) = controller();
        let tracks = vec![track("1", "http://x/1.mp3"), track("2", "http://x/2.mp3")];
        handle.reject_play(true);

        let err = c.play(tracks[0].clone(), Some((tracks.clone(), 0))).await.unwrap_err();
        assert!(matches!(err, PlaybackError::Sink(_)));
        assert!(c.pending_advance().is_some());

        handle.reject_play(false);
        c.dispatch(ControllerEvent::AdvanceDue).await;
        assert_eq!(c.queue().current_index(), Some(1));
        assert_eq!(c.player().current_track().unwrap().id, "2");
        assert!(c.player().last_error().is_none());
    }

    #[tokio::test]
    async fn test_play_while_loading_is_dropped() {
        let (mut c, handle) = controller();
        c.handle_event(SinkEvent {
            generation: handle_generation(&c),
            kind: SinkEventKind::LoadStart,
        })
        .await;
        assert!(c.player().is_loading());

        let err = c.play(track("1", "http://x/1.mp3"), None).await.unwrap_err();
        assert_eq!(err, PlaybackError::SinkBusy);
        assert!(handle.calls().is_empty());
        assert!(c.player().current_track().is_none());
        assert!(c.player().history().next().is_none());
    }

    fn handle_generation(c: &PlaybackController<MemorySink>) -> u64 {
        c.sink().unwrap().generation()
    }

    #[tokio::test]
    async fn test_same_track_resumes_without_reload() {
        let (mut c, handle) = controller();
        let t = track("1", "http://x/1.mp3");
        c.play(t.clone(), None).await.unwrap();
        c.process_pending_events().await;
        c.toggle_play_pause().await.unwrap();
        c.process_pending_events().await;
        assert_eq!(c.player().state(), PlaybackState::Paused);

        handle.clear_calls();
        assert_eq!(c.play(t, None).await.unwrap(), PlayOutcome::Resumed);
        assert_eq!(handle.calls(), vec![SinkCall::Play]);
    }

    #[tokio::test]
    async fn test_stale_events_are_ignored() {
        let (mut c, _handle) = controller();
        c.play(track("1", "http://x/1.mp3"), None).await.unwrap();
        c.process_pending_events().await;

        let stale = handle_generation(&c) - 1;
        c.handle_event(SinkEvent {
            generation: stale,
            kind: SinkEventKind::Error(MediaErrorKind::Network),
        })
        .await;
        assert_eq!(c.player().state(), PlaybackState::Playing);
    }

    #[tokio::test]
    async fn test_sink_error_event_is_classified() {
        let (mut c, handle) = controller();
        c.play(track("1", "http://x/1.mp3"), None).await.unwrap();
        handle.fail(MediaErrorKind::Decode);
        c.process_pending_events().await;
        assert_eq!(c.player().state(), PlaybackState::Error);
        assert_eq!(
            c.player().last_error(),
            Some(PlaybackError::DecodeFailure.user_message().as_str())
        );
    }

    #[tokio::test]
    async fn test_seek_and_volume_clamp() {
        let (mut c, handle) = controller();
        assert_eq!(c.seek(10.0), None);

        c.play(track("1", "http://x/1.mp3"), None).await.unwrap();
        assert_eq!(c.seek(1000.0), Some(180.0));
        assert_eq!(c.seek(-1.0), Some(0.0));

        assert_eq!(c.set_volume(150), 100);
        assert_eq!(handle.volume(), 1.0);
        assert_eq!(c.set_volume(-5), 0);
        assert_eq!(handle.volume(), 0.0);
    }

    #[tokio::test]
    async fn test_disconnect_resets_player() {
        let (mut c, handle) = controller();
        c.play(track("1", "http://x/1.mp3"), Some((vec![track("1", "http://x/1.mp3")], 0)))
            .await
            .unwrap();
        let sink = c.disconnect();
        assert!(sink.is_some());
        assert!(!c.is_connected());
        assert_eq!(c.player().state(), PlaybackState::Idle);
        assert!(c.player().current_track().is_none());
        assert_eq!(c.queue().len(), 1);
        assert!(handle.calls().contains(&SinkCall::ClearSource));

        let err = c.play(track("2", "http://x/2.mp3"), None).await.unwrap_err();
        assert!(matches!(err, PlaybackError::ConfigurationMissing(_)));
    }

    #[tokio::test]
    async fn test_preferences_round_trip() {
        let (mut c, handle) = controller();
        c.restore_preferences(Preferences {
            volume: 80,
            shuffle: true,
            repeat_mode: RepeatMode::All,
            history: vec!["9".into(), "8".into()],
        });
        assert_eq!(handle.volume(), 0.8);
        let prefs = c.preferences();
        assert_eq!(prefs.volume, 80);
        assert!(prefs.shuffle);
        assert_eq!(prefs.repeat_mode, RepeatMode::All);
        assert_eq!(prefs.history, vec!["9", "8"]);
    }
}
