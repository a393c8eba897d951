use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::commands::{Command, SeekTarget, HELP};
use super::config::{KeyValueStore, PersistentState};
use crate::catalog::{Catalog, Track, TrackBrowser};
use crate::error::PlaybackError;
use crate::player::{
    format_time, ControllerEvent, MediaSink, PlayOutcome, PlaybackController, PlaybackState,
    RepeatMode, SinkEventKind,
};

/// What the front end should do after a command.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Print(String),
    Quit,
}

/// Command interpreter: owns the controller, the catalog front end and the
/// persisted state, and renders every reply as text.
pub struct Shell<S, C, K> {
    controller: PlaybackController<S>,
    browser: TrackBrowser<C>,
    store: K,
    state: PersistentState,
    /// Rows of the most recent listing, targeted by `play <n>`
    listing: Vec<Arc<Track>>,
}

impl<S, C, K> Shell<S, C, K>
where
    S: MediaSink,
    C: Catalog,
    K: KeyValueStore,
{
    pub fn new(mut controller: PlaybackController<S>, browser: TrackBrowser<C>, store: K) -> Self {
        let state = PersistentState::load(&store);
        controller.restore_preferences(state.player.clone());
        Self {
            controller,
            browser,
            store,
            state,
            listing: Vec::new(),
        }
    }

    pub fn controller(&self) -> &PlaybackController<S> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut PlaybackController<S> {
        &mut self.controller
    }

    pub fn state(&self) -> &PersistentState {
        &self.state
    }

    pub fn listing(&self) -> &[Arc<Track>] {
        &self.listing
    }

    /// Probe the catalog and record whether we are configured and have an
    /// output attached.
    pub async fn refresh_connection(&mut self) -> bool {
        let configured = match self.browser.catalog().check_available().await {
            Ok(ok) => ok,
            Err(e) => {
                warn!(error = %e, "catalog availability check failed");
                false
            }
        };
        self.state.connection.configured = configured;
        self.state.connection.connected = self.controller.is_connected();
        self.persist();
        configured
    }

    /// Copy the controller's preferences into the state file.
    pub fn persist(&mut self) {
        self.state.player = self.controller.preferences();
        if let Err(e) = self.state.save(&mut self.store) {
            warn!(error = %e, "could not save state");
        }
    }

    pub async fn execute(&mut self, cmd: Command) -> Flow {
        debug!(?cmd, "command");
        let text = match cmd {
            Command::Search(text) => {
                let tracks = self.browser.search(&text).await;
                self.show_listing(tracks)
            }
            Command::Tag(tag) => {
                let tracks = self.browser.by_tag(&tag).await;
                self.show_listing(tracks)
            }
            Command::Popular => {
                let tracks = self.browser.popular().await;
                self.show_listing(tracks)
            }
            Command::Latest => {
                let tracks = self.browser.latest().await;
                self.show_listing(tracks)
            }
            Command::Random => {
                let tracks = self.browser.random().await;
                self.show_listing(tracks)
            }
            Command::Tags => self.browser.tags().await.join("  "),
            Command::Play(Some(row)) => self.play_row(row).await,
            Command::Play(None) => self.resume().await,
            Command::Pause if self.controller.player().is_loading() => {
                PlaybackError::SinkBusy.user_message()
            }
            Command::Pause => match self.controller.toggle_play_pause().await {
                Ok(()) if self.controller.player().current_track().is_none() => {
                    "Nothing is playing".to_string()
                }
                Ok(()) => self.paused_label(),
                Err(e) => e.user_message(),
            },
            Command::Next => {
                let result = self.controller.next().await;
                self.report(result, "End of queue")
            }
            Command::Prev => {
                let result = self.controller.previous().await;
                self.report(result, "Start of queue")
            }
            Command::Jump(position) => self.jump(position).await,
            Command::Seek(target) => {
                let secs = match target {
                    SeekTarget::Seconds(s) => s,
                    SeekTarget::Percent(p) => p / 100.0 * self.controller.player().duration(),
                };
                match self.controller.seek(secs) {
                    Some(pos) => format!("Seeked to {}", format_time(pos)),
                    None => "Cannot seek this track".to_string(),
                }
            }
            Command::Volume(v) => {
                let v = self.controller.set_volume(v);
                self.persist();
                format!("Volume {}", v)
            }
            Command::Shuffle => {
                let on = self.controller.toggle_shuffle();
                self.persist();
                format!("Shuffle {}", if on { "on" } else { "off" })
            }
            Command::Repeat => {
                let mode = self.controller.cycle_repeat_mode();
                self.persist();
                format!("Repeat {}", repeat_label(mode))
            }
            Command::Queue => self.show_queue(),
            Command::History => self.show_history(),
            Command::Status => self.status_line(),
            Command::Help => HELP.to_string(),
            Command::Quit => {
                self.persist();
                return Flow::Quit;
            }
        };
        Flow::Print(text)
    }

    /// Feed a controller event back in. Returns a line worth showing, if
    /// the event changed something the user cares about.
    pub async fn on_controller_event(&mut self, event: ControllerEvent) -> Option<String> {
        let before = self.current_id();
        let was_ended = matches!(
            &event,
            ControllerEvent::Sink(e) if e.kind == SinkEventKind::Ended
        );
        let is_error = matches!(
            &event,
            ControllerEvent::Sink(e) if matches!(e.kind, SinkEventKind::Error(_))
        );

        self.controller.dispatch(event).await;

        if self.current_id() != before {
            self.persist();
            return self.now_playing();
        }
        if is_error {
            return self.controller.player().last_error().map(str::to_string);
        }
        if was_ended && self.controller.player().state() == PlaybackState::Idle {
            info!("playback reached the end of the queue");
            return Some("Queue finished".to_string());
        }
        None
    }

    fn current_id(&self) -> Option<String> {
        self.controller.player().current_track().map(|t| t.id.clone())
    }

    fn now_playing(&self) -> Option<String> {
        self.controller
            .player()
            .current_track()
            .map(|t| format!("Now playing: {}", t.display_title()))
    }

    fn show_listing(&mut self, tracks: Vec<Arc<Track>>) -> String {
        if tracks.is_empty() {
            return "No tracks found".to_string();
        }
        let mut out = String::new();
        for (i, t) in tracks.iter().enumerate() {
            let _ = writeln!(
                out,
                "{:>3}. {}  [{}]",
                i + 1,
                t.display_title(),
                format_time(t.duration as f64)
            );
        }
        self.listing = tracks;
        out.trim_end().to_string()
    }

    async fn play_row(&mut self, row: usize) -> String {
        let Some(index) = row.checked_sub(1) else {
            return "Rows start at 1".to_string();
        };

        let result = if self.listing.is_empty() {
            self.controller.play_at(index).await
        } else {
            match self.listing.get(index).cloned() {
                Some(track) => {
                    let queue = (self.listing.clone(), index);
                    self.controller.play(track, Some(queue)).await.map(Some)
                }
                None => return format!("No row {}", row),
            }
        };
        self.report(result, "No such queue entry")
    }

    async fn jump(&mut self, position: usize) -> String {
        let Some(index) = position.checked_sub(1) else {
            return "Queue entries start at 1".to_string();
        };
        let result = self.controller.play_at(index).await;
        self.report(result, "No such queue entry")
    }

    async fn resume(&mut self) -> String {
        if self.controller.player().current_track().is_some() {
            let paused = self.controller.sink().map_or(false, |s| s.is_paused());
            if paused {
                if let Err(e) = self.controller.toggle_play_pause().await {
                    return e.user_message();
                }
            }
            return self.paused_label();
        }
        match self.controller.queue().current_index() {
            Some(index) => {
                let result = self.controller.play_at(index).await;
                self.report(result, "Nothing to play")
            }
            None => "Nothing to play, try `search` or `popular`".to_string(),
        }
    }

    fn report(&mut self, result: Result<Option<PlayOutcome>, PlaybackError>, exhausted: &str) -> String {
        match result {
            Ok(Some(outcome)) => {
                self.persist();
                let title = self
                    .controller
                    .player()
                    .current_track()
                    .map(|t| t.display_title())
                    .unwrap_or_default();
                match outcome {
                    PlayOutcome::Started { fallback: true, .. } => {
                        format!("Playing: {} (source unverified)", title)
                    }
                    PlayOutcome::Started { .. } => format!("Playing: {}", title),
                    PlayOutcome::Resumed => format!("Resumed: {}", title),
                }
            }
            Ok(None) => exhausted.to_string(),
            Err(e) => e.user_message(),
        }
    }

    fn paused_label(&self) -> String {
        let paused = self.controller.sink().map_or(true, |s| s.is_paused());
        if paused { "Paused" } else { "Playing" }.to_string()
    }

    fn show_queue(&self) -> String {
        let queue = self.controller.queue();
        if queue.is_empty() {
            return "Queue is empty".to_string();
        }
        let mut out = String::new();
        for (i, t) in queue.tracks().iter().enumerate() {
            let marker = if queue.current_index() == Some(i) { '>' } else { ' ' };
            let _ = writeln!(out, "{}{:>3}. {}", marker, i + 1, t.display_title());
        }
        out.trim_end().to_string()
    }

    fn show_history(&self) -> String {
        let known = self
            .controller
            .queue()
            .tracks()
            .iter()
            .chain(self.listing.iter());
        let known: Vec<&Arc<Track>> = known.collect();

        let lines: Vec<String> = self
            .controller
            .player()
            .history()
            .map(|id| match known.iter().find(|t| t.id == id) {
                Some(t) => t.display_title(),
                None => format!("#{}", id),
            })
            .collect();
        if lines.is_empty() {
            "No history yet".to_string()
        } else {
            lines.join("\n")
        }
    }

    fn status_line(&self) -> String {
        let player = self.controller.player();
        let queue = self.controller.queue();
        let track = player
            .current_track()
            .map(|t| t.display_title())
            .unwrap_or_else(|| "-".to_string());
        let position = queue
            .current_index()
            .map(|i| format!("{}/{}", i + 1, queue.len()))
            .unwrap_or_else(|| "-".to_string());

        let mut line = format!(
            "[{:?}] {}  {} / {}  vol {}  shuffle {}  repeat {}  queue {}",
            player.state(),
            track,
            format_time(player.position()),
            format_time(player.duration()),
            player.volume(),
            if queue.shuffle() { "on" } else { "off" },
            repeat_label(queue.repeat_mode()),
            position,
        );
        if let Some(err) = player.last_error() {
            let _ = write!(line, "\nlast error: {}", err);
        }
        line
    }
}

fn repeat_label(mode: RepeatMode) -> &'static str {
    match mode {
        RepeatMode::Off => "off",
        RepeatMode::All => "all",
        RepeatMode::One => "one",
    }
}
