//! Builders for MPD reply bodies
//!
//! Bodies exclude the closing `OK` line; the mock server appends it.

/// Builder for a `currentsong` reply body
#[derive(Debug, Clone, Default)]
pub struct SongBuilder {
    file: String,
    title: Option<String>,
    artist: Option<String>,
    album: Option<String>,
    duration: Option<f64>,
}

impl SongBuilder {
    /// Start a song entry for `file`
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            ..Self::default()
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    pub fn duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    /// Render the `key: value` lines
    pub fn build(&self) -> Vec<u8> {
        let mut body = format!("file: {}\nLast-Modified: 2024-01-01T00:00:00Z\n", self.file);
        if let Some(artist) = &self.artist {
            body.push_str(&format!("Artist: {artist}\n"));
        }
        if let Some(album) = &self.album {
            body.push_str(&format!("Album: {album}\n"));
        }
        if let Some(title) = &self.title {
            body.push_str(&format!("Title: {title}\n"));
        }
        if let Some(duration) = self.duration {
            body.push_str(&format!("Time: {}\nduration: {duration:.3}\n", duration.round()));
        }
        body.push_str("Pos: 0\nId: 1\n");
        body.into_bytes()
    }
}

/// Builder for a `status` reply body
#[derive(Debug, Clone)]
pub struct StatusBuilder {
    state: String,
    elapsed: Option<f64>,
    duration: Option<f64>,
}

impl Default for StatusBuilder {
    fn default() -> Self {
        Self {
            state: "stop".to_string(),
            elapsed: None,
            duration: None,
        }
    }
}

impl StatusBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// `play`, `pause` or `stop`
    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.state = state.into();
        self
    }

    pub fn elapsed(mut self, seconds: f64) -> Self {
        self.elapsed = Some(seconds);
        self
    }

    pub fn duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    /// Render the `key: value` lines
    pub fn build(&self) -> Vec<u8> {
        let mut body = format!(
            "volume: 80\nrepeat: 0\nrandom: 0\nsingle: 0\nconsume: 0\nplaylist: 2\nplaylistlength: 1\nstate: {}\n",
            self.state
        );
        if let Some(elapsed) = self.elapsed {
            body.push_str(&format!("elapsed: {elapsed:.3}\n"));
        }
        if let Some(duration) = self.duration {
            body.push_str(&format!("duration: {duration:.3}\n"));
        }
        body.into_bytes()
    }
}

/// Render one binary chunk reply, including the `OK` trailer
pub fn art_chunk(total: usize, mime_type: Option<&str>, payload: &[u8]) -> Vec<u8> {
    let mut reply = format!("size: {total}\n").into_bytes();
    if let Some(mime) = mime_type {
        reply.extend_from_slice(format!("type: {mime}\n").as_bytes());
    }
    reply.extend_from_slice(format!("binary: {}\n", payload.len()).as_bytes());
    reply.extend_from_slice(payload);
    reply.extend_from_slice(b"\nOK\n");
    reply
}

/// Deterministic picture bytes of the given length
pub fn fake_picture(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
