use super::traits::RepeatMode;
use crate::catalog::Track;
use rand::Rng;
use std::sync::Arc;
use tracing::debug;

/// The ordered play queue with shuffle/repeat policy.
#[derive(Debug, Default)]
pub struct QueueStore {
    tracks: Vec<Arc<Track>>,
    current: Option<usize>,
    shuffle: bool,
    repeat: RepeatMode,
}

impl QueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the queue. `start_index` is clamped into range.
    pub fn set_queue(&mut self, tracks: Vec<Arc<Track>>, start_index: usize) {
        self.current = if tracks.is_empty() {
            None
        } else {
            Some(start_index.min(tracks.len() - 1))
        };
        self.tracks = tracks;
        debug!(len = self.tracks.len(), current = ?self.current, "queue replaced");
    }

    pub fn tracks(&self) -> &[Arc<Track>] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_track(&self) -> Option<&Arc<Track>> {
        self.current.and_then(|i| self.tracks.get(i))
    }

    pub fn track_at(&self, index: usize) -> Option<&Arc<Track>> {
        self.tracks.get(index)
    }

    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    pub fn set_shuffle(&mut self, shuffle: bool) {
        self.shuffle = shuffle;
    }

    pub fn toggle_shuffle(&mut self) -> bool {
        self.shuffle = !self.shuffle;
        self.shuffle
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat
    }

    pub fn set_repeat_mode(&mut self, mode: RepeatMode) {
        self.repeat = mode;
    }

    pub fn cycle_repeat_mode(&mut self) -> RepeatMode {
        self.repeat = self.repeat.cycle();
        self.repeat
    }

    /// Index to play after the current one, or `None` once the queue is exhausted.
    pub fn next_index(&self) -> Option<usize> {
        let current = self.current?;
        let len = self.tracks.len();

        if self.repeat == RepeatMode::One {
            return Some(current);
        }

        if self.shuffle {
            if len <= 1 {
                return Some(current);
            }
            // Draw from len-1 slots and skip over the current one.
            let pick = rand::thread_rng().gen_range(0..len - 1);
            return Some(if pick >= current { pick + 1 } else { pick });
        }

        if current + 1 < len {
            Some(current + 1)
        } else if self.repeat == RepeatMode::All {
            Some(0)
        } else {
            None
        }
    }

    /// Sequential predecessor; shuffle does not apply.
    pub fn previous_index(&self) -> Option<usize> {
        let current = self.current?;

        if self.repeat == RepeatMode::One {
            return Some(current);
        }

        if current > 0 {
            Some(current - 1)
        } else if self.repeat == RepeatMode::All {
            Some(self.tracks.len() - 1)
        } else {
            None
        }
    }

    /// Move to `index`; `None` if it is out of range (index left untouched).
    pub fn advance_to(&mut self, index: usize) -> Option<Arc<Track>> {
        let track = self.tracks.get(index)?.clone();
        self.current = Some(index);
        Some(track)
    }

    pub fn can_play_next(&self) -> bool {
        matches!(self.current, Some(i) if i + 1 < self.tracks.len())
    }

    pub fn can_play_previous(&self) -> bool {
        matches!(self.current, Some(i) if i > 0)
    }

    /// Append unless a track with the same id is already queued.
    pub fn add(&mut self, track: Arc<Track>) -> bool {
        if self.tracks.iter().any(|t| t.id == track.id) {
            return false;
        }
        self.tracks.push(track);
        if self.current.is_none() {
            self.current = Some(0);
        }
        true
    }

    /// Remove by track id, keeping the current index on the same logical item.
    pub fn remove(&mut self, track_id: &str) -> Option<Arc<Track>> {
        let pos = self.tracks.iter().position(|t| t.id == track_id)?;
        let removed = self.tracks.remove(pos);

        self.current = match self.current {
            _ if self.tracks.is_empty() => None,
            Some(cur) if pos < cur => Some(cur - 1),
            Some(cur) => Some(cur.min(self.tracks.len() - 1)),
            None => None,
        };
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
        self.current = None;
    }
}
