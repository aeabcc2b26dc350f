use super::{NowPlaying, OutputFormatter};
use crate::config::DisplayConfig;
use anyhow::Result;
use colored::*;
use mpd_client_core::PlayState;

/// Width of the text progress bar in cells
const BAR_WIDTH: usize = 30;

/// Text formatter for human-readable output
///
/// Each `show_*` switch of [`DisplayConfig`] hides one line or part of it.
pub struct TextFormatter {
    use_color: bool,
    display: DisplayConfig,
}

impl TextFormatter {
    pub fn new(use_color: bool, display: &DisplayConfig) -> Self {
        Self {
            use_color,
            display: display.clone(),
        }
    }

    fn colorize(&self, text: &str, color: fn(&str) -> ColoredString) -> String {
        if self.use_color {
            color(text).to_string()
        } else {
            text.to_string()
        }
    }

    fn state_label(&self, state: PlayState) -> String {
        match state {
            PlayState::Play => self.colorize("playing", |s| s.green()),
            PlayState::Pause => self.colorize("paused", |s| s.yellow()),
            PlayState::Stop => self.colorize("stopped", |s| s.dimmed()),
        }
    }
}

impl OutputFormatter for TextFormatter {
    fn format(&self, view: &NowPlaying) -> Result<String> {
        let mut output = String::new();

        if view.file.is_empty() {
            output.push_str(&format!("[{}] Nothing queued\n", self.state_label(view.state)));
            return Ok(output);
        }

        let display = &self.display;
        output.push_str(&format!("[{}]", self.state_label(view.state)));
        if display.show_title {
            // Untagged files show their path instead
            let title = if view.title.is_empty() {
                view.file.as_str()
            } else {
                view.title.as_str()
            };
            output.push_str(&format!(" {}", self.colorize(title, |s| s.bold())));
        }
        output.push('\n');

        if display.show_artist && !view.artist.is_empty() {
            output.push_str(&format!("  Artist: {}\n", self.colorize(&view.artist, |s| s.cyan())));
        }
        if display.show_album && !view.album.is_empty() {
            output.push_str(&format!("  Album:  {}\n", self.colorize(&view.album, |s| s.cyan())));
        }
        if display.show_filename {
            output.push_str(&format!("  File:   {}\n", view.file));
        }

        if display.show_progress && view.duration > 0.0 {
            output.push_str(&format!(
                "  {} {} / {}\n",
                progress_bar(view.progress_percent),
                format_time(view.elapsed),
                format_time(view.duration)
            ));
        }

        if display.show_art_info {
            match &view.art {
                Some(art) => {
                    let mime = art.mime_type.as_deref().unwrap_or("unknown type");
                    output.push_str(&format!("  Art:    {} ({mime})", format_bytes(art.size)));
                    if let Some(path) = &art.saved_to {
                        output.push_str(&format!(" -> {}", path.display()));
                    }
                    output.push('\n');
                }
                None => output.push_str("  Art:    none\n"),
            }
        }

        Ok(output)
    }
}

/// JSON formatter for machine-readable output
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, view: &NowPlaying) -> Result<String> {
        if self.pretty {
            Ok(serde_json::to_string_pretty(view)?)
        } else {
            Ok(serde_json::to_string(view)?)
        }
    }
}

/// Format seconds as `m:ss`, or `h:mm:ss` past an hour
pub fn format_time(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}

/// Format bytes in human-readable form
pub fn format_bytes(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;

    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

fn progress_bar(percent: f64) -> String {
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * BAR_WIDTH as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::ArtSummary;
    use std::path::PathBuf;

    fn view() -> NowPlaying {
        NowPlaying {
            title: "Song".into(),
            artist: "Artist".into(),
            album: "Album".into(),
            file: "a/song.flac".into(),
            state: PlayState::Play,
            elapsed: 65.0,
            duration: 130.0,
            progress_percent: 50.0,
            server_version: Some("0.23.5".into()),
            art: Some(ArtSummary {
                size: 2048,
                mime_type: Some("image/png".into()),
                saved_to: Some(PathBuf::from("/tmp/cover.png")),
            }),
        }
    }

    #[test]
    fn test_text_output_without_color() {
        let text = TextFormatter::new(false, &DisplayConfig::default())
            .format(&view())
            .unwrap();
        assert!(text.starts_with("[playing] Song\n"));
        assert!(text.contains("  Artist: Artist\n"));
        assert!(text.contains("1:05 / 2:10"));
        assert!(text.contains("2.0 KB (image/png) -> /tmp/cover.png"));
        assert!(!text.contains('\x1b'));
    }

    #[test]
    fn test_text_output_hides_optional_sections() {
        let display = DisplayConfig {
            show_progress: false,
            show_art_info: false,
            ..DisplayConfig::default()
        };
        let text = TextFormatter::new(false, &display).format(&view()).unwrap();
        assert!(!text.contains(" / "));
        assert!(!text.contains("Art:"));
        assert!(text.contains("  Album:  Album\n"));
    }

    fn format_with(display: DisplayConfig) -> String {
        TextFormatter::new(false, &display).format(&view()).unwrap()
    }

    #[test]
    fn test_hide_title() {
        let text = format_with(DisplayConfig {
            show_title: false,
            ..DisplayConfig::default()
        });
        assert!(text.starts_with("[playing]\n"));
        assert!(!text.contains("Song\n"));
        assert!(text.contains("  Artist: Artist\n"));
    }

    #[test]
    fn test_hide_artist() {
        let text = format_with(DisplayConfig {
            show_artist: false,
            ..DisplayConfig::default()
        });
        assert!(!text.contains("Artist:"));
        assert!(text.starts_with("[playing] Song\n"));
        assert!(text.contains("  Album:  Album\n"));
    }

    #[test]
    fn test_hide_album() {
        let text = format_with(DisplayConfig {
            show_album: false,
            ..DisplayConfig::default()
        });
        assert!(!text.contains("Album:"));
        assert!(text.contains("  Artist: Artist\n"));
    }

    #[test]
    fn test_hide_filename() {
        let text = format_with(DisplayConfig {
            show_filename: false,
            ..DisplayConfig::default()
        });
        assert!(!text.contains("File:"));
        assert!(!text.contains("a/song.flac"));
        assert!(text.contains("1:05 / 2:10"));
    }

    #[test]
    fn test_hide_progress() {
        let text = format_with(DisplayConfig {
            show_progress: false,
            ..DisplayConfig::default()
        });
        assert!(!text.contains("1:05 / 2:10"));
        assert!(!text.contains('#'));
        assert!(text.contains("  File:   a/song.flac\n"));
    }

    #[test]
    fn test_text_output_empty_queue() {
        let empty = NowPlaying {
            file: String::new(),
            state: PlayState::Stop,
            art: None,
            ..view()
        };
        let text = TextFormatter::new(false, &DisplayConfig::default())
            .format(&empty)
            .unwrap();
        assert_eq!(text, "[stopped] Nothing queued\n");
    }

    #[test]
    fn test_json_output() {
        let json = JsonFormatter::new(false).format(&view()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["title"], "Song");
        assert_eq!(value["state"], "play");
        assert_eq!(value["art"]["mime_type"], "image/png");
        assert_eq!(value["art"]["size"], 2048);
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(59.9), "0:59");
        assert_eq!(format_time(3725.0), "1:02:05");
        assert_eq!(format_time(-3.0), "0:00");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_progress_bar_bounds() {
        assert_eq!(progress_bar(0.0), format!("[{}]", "-".repeat(BAR_WIDTH)));
        assert_eq!(progress_bar(150.0), format!("[{}]", "#".repeat(BAR_WIDTH)));
    }
}
