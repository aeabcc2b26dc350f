//! Cached now-playing metadata
//!
//! [`SongInfo`] is only ever updated from parsed `status`/`currentsong`
//! fields. A different `file:` value is the one signal that a new track
//! started.

use crate::protocol::codec::SongFields;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Player state from the `state:` field of `status`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayState {
    Play,
    Pause,
    #[default]
    Stop,
}

impl FromStr for PlayState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "play" => Ok(Self::Play),
            "pause" => Ok(Self::Pause),
            "stop" => Ok(Self::Stop),
            other => Err(format!("unknown play state '{other}'")),
        }
    }
}

impl fmt::Display for PlayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Play => write!(f, "play"),
            Self::Pause => write!(f, "pause"),
            Self::Stop => write!(f, "stop"),
        }
    }
}

/// Result of applying one parsed reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackChange {
    /// No filename, or the same filename as before
    Unchanged,
    /// First filename seen since construction or reset
    Started,
    /// Filename differs from the cached one
    Changed,
}

/// Latest known track metadata
#[derive(Debug, Clone, Serialize)]
pub struct SongInfo {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub filename: String,
    /// Seconds
    pub duration: f64,
    /// Seconds, as of `elapsed_sampled_at`
    pub elapsed: f64,
    #[serde(skip)]
    pub elapsed_sampled_at: Instant,
    pub state: PlayState,
}

impl Default for SongInfo {
    fn default() -> Self {
        Self {
            title: String::new(),
            artist: String::new(),
            album: String::new(),
            filename: String::new(),
            duration: 0.0,
            elapsed: 0.0,
            elapsed_sampled_at: Instant::now(),
            state: PlayState::Stop,
        }
    }
}

impl SongInfo {
    /// Merge parsed fields, clearing stale metadata first if the file changed
    pub fn apply(&mut self, fields: SongFields) -> TrackChange {
        let change = match &fields.file {
            Some(file) if self.filename.is_empty() && !file.is_empty() => TrackChange::Started,
            Some(file) if *file != self.filename => TrackChange::Changed,
            _ => TrackChange::Unchanged,
        };

        if change == TrackChange::Changed {
            self.title.clear();
            self.artist.clear();
            self.album.clear();
            self.duration = 0.0;
            self.elapsed = 0.0;
        }

        if let Some(file) = fields.file {
            self.filename = file;
        }
        if let Some(title) = fields.title {
            self.title = title;
        }
        if let Some(artist) = fields.artist {
            self.artist = artist;
        }
        if let Some(album) = fields.album {
            self.album = album;
        }
        if let Some(duration) = fields.duration {
            self.duration = duration;
        }
        if let Some(elapsed) = fields.elapsed {
            self.elapsed = elapsed;
            self.elapsed_sampled_at = Instant::now();
        }
        if let Some(state) = fields.state {
            self.state = state;
        }

        change
    }

    /// Check if a track is known
    pub fn has_file(&self) -> bool {
        !self.filename.is_empty()
    }

    /// Elapsed seconds extrapolated to now while playing
    pub fn elapsed_now(&self) -> f64 {
        self.elapsed_at(Instant::now())
    }

    /// Elapsed seconds extrapolated to `now`, capped at the duration
    pub fn elapsed_at(&self, now: Instant) -> f64 {
        let mut elapsed = self.elapsed;
        if self.state == PlayState::Play {
            elapsed += now
                .saturating_duration_since(self.elapsed_sampled_at)
                .as_secs_f64();
        }
        if self.duration > 0.0 {
            elapsed.min(self.duration)
        } else {
            elapsed
        }
    }

    /// Time left in the track
    pub fn remaining(&self) -> Duration {
        let left = (self.duration - self.elapsed_now()).max(0.0);
        Duration::from_secs_f64(left)
    }

    /// Position in the track as 0..=100
    pub fn progress_percent(&self) -> f64 {
        if self.duration <= 0.0 {
            return 0.0;
        }
        (self.elapsed_now() / self.duration * 100.0).clamp(0.0, 100.0)
    }
}
