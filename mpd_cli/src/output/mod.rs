mod formatters;

pub use formatters::{JsonFormatter, TextFormatter};

use anyhow::Result;
use mpd_client_core::{MpdClient, PlayState};
use serde::Serialize;
use std::path::PathBuf;

/// Output format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Snapshot of what the client knows about the current track
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NowPlaying {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub file: String,
    pub state: PlayState,
    /// Seconds, extrapolated to the snapshot time
    pub elapsed: f64,
    pub duration: f64,
    pub progress_percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub art: Option<ArtSummary>,
}

/// Fetched cover art, without the bytes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtSummary {
    pub size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_to: Option<PathBuf>,
}

impl NowPlaying {
    pub fn from_client(client: &MpdClient) -> Self {
        let song = client.song();
        let art = client.art_bytes().map(|bytes| ArtSummary {
            size: bytes.len(),
            mime_type: client.art_mime_type().map(str::to_string),
            saved_to: None,
        });

        Self {
            title: song.title.clone(),
            artist: song.artist.clone(),
            album: song.album.clone(),
            file: song.filename.clone(),
            state: song.state,
            elapsed: song.elapsed_now(),
            duration: song.duration,
            progress_percent: song.progress_percent(),
            server_version: client.server_version().map(str::to_string),
            art,
        }
    }

    /// Record where the art was written
    pub fn with_saved_art(mut self, path: Option<PathBuf>) -> Self {
        if let Some(art) = &mut self.art {
            art.saved_to = path;
        }
        self
    }

    /// Identity of the display, ignoring the ticking clock
    pub fn same_track_view(&self, other: &Self) -> bool {
        self.file == other.file
            && self.title == other.title
            && self.artist == other.artist
            && self.album == other.album
            && self.state == other.state
            && self.art == other.art
    }
}

/// Trait for output formatters
pub trait OutputFormatter: Send + Sync {
    fn format(&self, view: &NowPlaying) -> Result<String>;
}

/// Create a formatter based on output format
pub fn create_formatter(
    format: OutputFormat,
    use_color: bool,
    display: &crate::config::DisplayConfig,
) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter::new(use_color, display)),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
    }
}
