//! Client state flags and step selection
//!
//! The client tracks a handful of independent conditions rather than one
//! linear state: authentication can be outstanding while an art fetch is
//! pending, for example. [`ClientState::next_step`] turns the flags into the
//! single protocol step to run on the next tick.

use std::fmt;

/// Independent condition flags for one client
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientState {
    /// Set on unrecoverable failure, cleared only by a reset
    pub fatal: bool,
    pub needs_connect: bool,
    pub ping_done: bool,
    pub status_done: bool,
    /// A command was written and its reply is still outstanding
    pub waiting_on_read: bool,
    pub needs_auth: bool,
    pub currentsong_done: bool,
    pub binary_limit_set: bool,
    pub art_pending: bool,
    pub readpicture_exhausted: bool,
    pub albumart_exhausted: bool,
    pub art_failed: bool,
}

/// Where an art chunk is requested from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtSource {
    /// Picture embedded in the song file
    ReadPicture,
    /// Cover file in the song's directory
    AlbumArt,
}

impl fmt::Display for ArtSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadPicture => write!(f, "readpicture"),
            Self::AlbumArt => write!(f, "albumart"),
        }
    }
}

/// The one step an `update()` tick performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Fatal,
    Connect,
    AwaitAuth,
    Ping,
    Status,
    CurrentSong,
    FetchArt(ArtSource),
    Idle,
}

impl ClientState {
    /// State of a client that has not connected yet
    pub fn disconnected() -> Self {
        Self {
            needs_connect: true,
            ..Self::default()
        }
    }

    /// State of a client that can never make progress
    pub fn failed() -> Self {
        Self {
            fatal: true,
            ..Self::default()
        }
    }

    /// Clear everything and schedule a fresh connect
    pub fn reconnecting(&mut self) {
        *self = Self::disconnected();
    }

    /// Clear the per-cycle poll flags so ping/status/currentsong run again
    pub fn clear_poll(&mut self) {
        self.ping_done = false;
        self.status_done = false;
        self.currentsong_done = false;
    }

    /// Schedule an art fetch from scratch for the current track
    pub fn schedule_art(&mut self) {
        self.art_pending = true;
        self.readpicture_exhausted = false;
        self.albumart_exhausted = false;
        self.art_failed = false;
    }

    /// Mark one art source as having nothing to offer
    ///
    /// Once both sources are exhausted the fetch is marked failed and no
    /// longer pending.
    pub fn exhaust(&mut self, source: ArtSource) {
        match source {
            ArtSource::ReadPicture => self.readpicture_exhausted = true,
            ArtSource::AlbumArt => self.albumart_exhausted = true,
        }
        if self.readpicture_exhausted && self.albumart_exhausted {
            self.fail_art();
        }
    }

    /// Abandon the art fetch for this track
    pub fn fail_art(&mut self) {
        self.art_failed = true;
        self.art_pending = false;
    }

    /// Pick the next step. `has_filename` gates the art fetch.
    pub fn next_step(&self, has_filename: bool) -> Step {
        if self.fatal {
            Step::Fatal
        } else if self.needs_connect {
            Step::Connect
        } else if self.needs_auth {
            Step::AwaitAuth
        } else if !self.ping_done {
            Step::Ping
        } else if !self.status_done {
            Step::Status
        } else if !self.currentsong_done {
            Step::CurrentSong
        } else if self.art_pending && has_filename && !self.art_failed {
            match self.art_source() {
                Some(source) => Step::FetchArt(source),
                None => Step::Idle,
            }
        } else {
            Step::Idle
        }
    }

    /// Art source to try next, `readpicture` first
    pub fn art_source(&self) -> Option<ArtSource> {
        if !self.readpicture_exhausted {
            Some(ArtSource::ReadPicture)
        } else if !self.albumart_exhausted {
            Some(ArtSource::AlbumArt)
        } else {
            None
        }
    }

    /// Check if the client may still make progress on its own
    pub fn is_ok(&self) -> bool {
        !self.fatal
    }
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = [
            (self.fatal, "fatal"),
            (self.needs_connect, "needs_connect"),
            (self.ping_done, "ping_done"),
            (self.status_done, "status_done"),
            (self.waiting_on_read, "waiting_on_read"),
            (self.needs_auth, "needs_auth"),
            (self.currentsong_done, "currentsong_done"),
            (self.binary_limit_set, "binary_limit_set"),
            (self.art_pending, "art_pending"),
            (self.readpicture_exhausted, "readpicture_exhausted"),
            (self.albumart_exhausted, "albumart_exhausted"),
            (self.art_failed, "art_failed"),
        ];

        let set: Vec<&str> = flags
            .iter()
            .filter(|(on, _)| *on)
            .map(|(_, name)| *name)
            .collect();
        if set.is_empty() {
            write!(f, "[]")
        } else {
            write!(f, "[{}]", set.join(" "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn polled() -> ClientState {
        ClientState {
            ping_done: true,
            status_done: true,
            currentsong_done: true,
            binary_limit_set: true,
            ..ClientState::default()
        }
    }

    #[test]
    fn test_step_priority_order() {
        let mut state = ClientState::disconnected();
        assert_eq!(state.next_step(false), Step::Connect);

        state.needs_connect = false;
        assert_eq!(state.next_step(false), Step::Ping);

        state.ping_done = true;
        assert_eq!(state.next_step(false), Step::Status);

        state.status_done = true;
        assert_eq!(state.next_step(false), Step::CurrentSong);

        state.currentsong_done = true;
        assert_eq!(state.next_step(false), Step::Idle);
    }

    #[test]
    fn test_fatal_overrides_everything() {
        let mut state = ClientState::disconnected();
        state.fatal = true;
        state.needs_auth = true;
        assert_eq!(state.next_step(true), Step::Fatal);
        assert!(!state.is_ok());
    }

    #[test]
    fn test_auth_blocks_polling() {
        let mut state = ClientState::default();
        state.needs_auth = true;
        state.art_pending = true;
        assert_eq!(state.next_step(true), Step::AwaitAuth);
    }

    #[test]
    fn test_art_needs_filename() {
        let mut state = polled();
        state.art_pending = true;
        assert_eq!(state.next_step(false), Step::Idle);
        assert_eq!(
            state.next_step(true),
            Step::FetchArt(ArtSource::ReadPicture)
        );
    }

    #[test]
    fn test_art_source_fallback() {
        let mut state = polled();
        state.schedule_art();

        state.exhaust(ArtSource::ReadPicture);
        assert_eq!(state.next_step(true), Step::FetchArt(ArtSource::AlbumArt));
        assert!(state.art_pending);

        state.exhaust(ArtSource::AlbumArt);
        assert!(state.art_failed);
        assert!(!state.art_pending);
        assert_eq!(state.next_step(true), Step::Idle);
    }

    #[test]
    fn test_schedule_art_resets_sources() {
        let mut state = polled();
        state.exhaust(ArtSource::ReadPicture);
        state.exhaust(ArtSource::AlbumArt);

        state.schedule_art();
        assert!(state.art_pending);
        assert!(!state.art_failed);
        assert_eq!(state.art_source(), Some(ArtSource::ReadPicture));
    }

    #[test]
    fn test_reconnecting_clears_all_flags() {
        let mut state = polled();
        state.needs_auth = true;
        state.art_pending = true;
        state.waiting_on_read = true;

        state.reconnecting();
        assert_eq!(state, ClientState::disconnected());
    }

    #[test]
    fn test_clear_poll_is_idempotent() {
        let mut once = polled();
        once.clear_poll();
        let mut twice = polled();
        twice.clear_poll();
        twice.clear_poll();
        assert_eq!(once, twice);
        assert!(once.binary_limit_set);
    }

    #[test]
    fn test_display_lists_set_flags() {
        assert_eq!(ClientState::default().to_string(), "[]");
        assert_eq!(
            ClientState::disconnected().to_string(),
            "[needs_connect]"
        );
        let mut state = ClientState::failed();
        state.needs_auth = true;
        assert_eq!(state.to_string(), "[fatal needs_auth]");
    }
}
