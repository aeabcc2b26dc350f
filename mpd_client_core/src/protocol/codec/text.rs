//! `key: value` block parsing for `status` and `currentsong`

use crate::song::PlayState;
use log::{trace, warn};

/// Fields picked out of one reply block; `None` means absent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SongFields {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub file: Option<String>,
    pub duration: Option<f64>,
    pub elapsed: Option<f64>,
    pub state: Option<PlayState>,
}

/// Scan a reply body line by line for the recognised prefixes
///
/// Prefix matching is case-sensitive. Unknown lines are skipped. A numeric
/// field that fails to parse is logged and left as `None`.
pub fn parse_fields(body: &[u8]) -> SongFields {
    let mut fields = SongFields::default();

    for raw_line in body.split(|&b| b == b'\n') {
        if raw_line.is_empty() {
            continue;
        }
        let line = String::from_utf8_lossy(raw_line);

        if let Some(value) = line.strip_prefix("Title: ") {
            fields.title = Some(value.to_string());
        } else if let Some(value) = line.strip_prefix("Artist: ") {
            fields.artist = Some(value.to_string());
        } else if let Some(value) = line.strip_prefix("Album: ") {
            fields.album = Some(value.to_string());
        } else if let Some(value) = line.strip_prefix("file: ") {
            fields.file = Some(value.to_string());
        } else if let Some(value) = line.strip_prefix("duration: ") {
            fields.duration = parse_seconds("duration", value);
        } else if let Some(value) = line.strip_prefix("elapsed: ") {
            fields.elapsed = parse_seconds("elapsed", value);
        } else if let Some(value) = line.strip_prefix("state: ") {
            match value.parse() {
                Ok(state) => fields.state = Some(state),
                Err(e) => warn!("Ignoring state field: {e}"),
            }
        } else {
            trace!("Skipping line: {line}");
        }
    }

    fields
}

/// Locale-independent non-negative decimal
fn parse_seconds(field: &str, value: &str) -> Option<f64> {
    match value.trim().parse::<f64>() {
        Ok(seconds) if seconds.is_finite() && seconds >= 0.0 => Some(seconds),
        Ok(seconds) => {
            warn!("Ignoring out-of-range {field}: {seconds}");
            None
        }
        Err(e) => {
            warn!("Failed to parse {field} '{value}': {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currentsong_block() {
        let body = b"file: music/a.mp3\nLast-Modified: 2021-01-01T00:00:00Z\nArtist: Someone\nAlbum: Record\nTitle: Song A\nduration: 215.340\nPos: 0\nId: 1\n";
        let fields = parse_fields(body);

        assert_eq!(fields.file.as_deref(), Some("music/a.mp3"));
        assert_eq!(fields.title.as_deref(), Some("Song A"));
        assert_eq!(fields.artist.as_deref(), Some("Someone"));
        assert_eq!(fields.album.as_deref(), Some("Record"));
        assert_eq!(fields.duration, Some(215.34));
        assert_eq!(fields.elapsed, None);
    }

    #[test]
    fn test_status_block() {
        let body = b"volume: 80\nrepeat: 0\nstate: play\nelapsed: 12.004\nduration: 215.340\nbitrate: 320\n";
        let fields = parse_fields(body);

        assert_eq!(fields.state, Some(PlayState::Play));
        assert_eq!(fields.elapsed, Some(12.004));
        assert_eq!(fields.file, None);
    }

    #[test]
    fn test_prefix_match_is_case_sensitive() {
        let fields = parse_fields(b"title: lower\nTITLE: upper\nAlbumArtist: X\n");
        assert_eq!(fields, SongFields::default());
    }

    #[test]
    fn test_bad_numbers_left_unset() {
        let fields = parse_fields(b"duration: abc\nelapsed: -3\nstate: rewinding\n");
        assert_eq!(fields.duration, None);
        assert_eq!(fields.elapsed, None);
        assert_eq!(fields.state, None);
    }

    #[test]
    fn test_values_keep_inner_colons() {
        let fields = parse_fields(b"Title: Part 1: Intro\n");
        assert_eq!(fields.title.as_deref(), Some("Part 1: Intro"));
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let fields = parse_fields(b"Artist: Caf\xe9\n");
        assert_eq!(fields.artist.as_deref(), Some("Caf\u{fffd}"));
    }
}
