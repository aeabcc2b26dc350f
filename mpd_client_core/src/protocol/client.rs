//! Protocol client state machine
//!
//! [`MpdClient::update`] performs at most one protocol step per call, in
//! priority order: connect, wait for auth, `ping`, `status`, `currentsong`,
//! then cover art. Every wait inside a step is bounded by a configured
//! timeout, so the calling loop is never blocked for longer than one command
//! round trip.

use crate::ClientConfig;
use crate::address::{ipv4_from_value, parse_ipv4};
use crate::art::ArtBuffer;
use crate::protocol::codec::{
    ChunkFrame, ChunkProgress, Decoder, apply_chunk, parse_chunk, parse_fields,
};
use crate::protocol::error::{ProtocolError, Result};
use crate::protocol::messages::{ACK_PREFIX, Command, Reply, ResponseParser};
use crate::protocol::state::{ArtSource, ClientState, Step};
use crate::protocol::transport::{TcpTransport, TransportConfig, TransportStats};
use crate::security::SecureString;
use crate::song::{SongInfo, TrackChange};
use log::{debug, error, info, trace, warn};
use std::net::{SocketAddr, SocketAddrV4};
use std::time::{Duration, Instant};
use zeroize::Zeroize;

/// Extra room over the binary limit for chunk headers and trailer
const REPLY_HEADROOM: usize = 4096;

/// Smallest reply buffer, enough for any `status`/`currentsong` block
const MIN_REPLY_BUFFER: usize = 64 * 1024;

/// Client for one MPD server, driven by repeated [`update`](Self::update) calls
pub struct MpdClient {
    config: ClientConfig,
    /// `None` when the configured host did not parse
    peer: Option<SocketAddr>,
    transport: Option<TcpTransport>,
    state: ClientState,
    song: SongInfo,
    art: ArtBuffer,
    decoder: Decoder,
    /// Command written whose reply has not been fully read
    in_flight: Option<Command>,
    /// Drop the in-flight art reply instead of applying it
    discard_reply: bool,
    server_version: Option<String>,
    last_error: Option<String>,
}

impl MpdClient {
    /// Create a client. No I/O happens until the first `update()`.
    ///
    /// An unparsable host leaves the client failed immediately.
    pub fn new(config: ClientConfig) -> Self {
        let max_reply = (config.binary_limit + REPLY_HEADROOM).max(MIN_REPLY_BUFFER);
        let mut client = Self {
            peer: None,
            transport: None,
            state: ClientState::disconnected(),
            song: SongInfo::default(),
            art: ArtBuffer::new(),
            decoder: Decoder::new(max_reply),
            in_flight: None,
            discard_reply: false,
            server_version: None,
            last_error: None,
            config,
        };

        match parse_ipv4(&client.config.host) {
            Ok(value) => {
                let addr = SocketAddrV4::new(ipv4_from_value(value), client.config.port);
                debug!("MPD client for {addr}");
                client.peer = Some(SocketAddr::V4(addr));
            }
            Err(e) => {
                let e = ProtocolError::from(e);
                error!("{e}");
                client.state = ClientState::failed();
                client.last_error = Some(e.to_string());
            }
        }

        client
    }

    /// Advance the protocol by at most one step
    pub fn update(&mut self) {
        if let Err(e) = self.tick() {
            self.handle_error(e);
        }
    }

    fn tick(&mut self) -> Result<()> {
        if self.state.fatal {
            return Ok(());
        }
        if self.state.needs_connect {
            return self.connect();
        }
        if self.state.needs_auth {
            return Ok(());
        }

        if self.in_flight.is_none() {
            let Some(command) = self.next_command() else {
                return Ok(());
            };
            self.send(&command, self.config.write_timeout())?;
            self.in_flight = Some(command);
        }

        self.state.waiting_on_read = true;
        self.read_into_decoder()?;

        let Some(command) = self.in_flight.clone() else {
            return Ok(());
        };
        let finished = match &command {
            Command::Ping => self.handle_ping()?,
            Command::Status | Command::CurrentSong => self.handle_block(&command)?,
            Command::ReadPicture { .. } => self.handle_art(ArtSource::ReadPicture)?,
            Command::AlbumArt { .. } => self.handle_art(ArtSource::AlbumArt)?,
            Command::Password(_) | Command::BinaryLimit(_) => {
                return Err(ProtocolError::decoding(format!(
                    "{} is not a polling command",
                    command.name()
                )));
            }
        };

        if finished {
            self.in_flight = None;
            self.state.waiting_on_read = false;
            self.decoder.reset();
        } else {
            trace!("Reply to {} incomplete, waiting", command.name());
        }
        Ok(())
    }

    /// Map the next step to the command that performs it
    fn next_command(&self) -> Option<Command> {
        match self.state.next_step(self.song.has_file()) {
            Step::Ping => Some(Command::Ping),
            Step::Status => Some(Command::Status),
            Step::CurrentSong => Some(Command::CurrentSong),
            Step::FetchArt(source) => Some(Command::art(
                source,
                self.song.filename.clone(),
                self.art.offset(),
            )),
            Step::Fatal | Step::Connect | Step::AwaitAuth | Step::Idle => None,
        }
    }

    fn connect(&mut self) -> Result<()> {
        let peer = self.peer.ok_or(ProtocolError::NotConnected)?;
        self.close_transport();

        let transport_config = TransportConfig {
            connect_timeout: self.config.connect_timeout(),
            poll_interval: self.config.io_poll_interval(),
        };

        // Every failure while connecting is fatal, timeouts included
        match self.handshake(peer, transport_config) {
            Ok((transport, version)) => {
                info!("Connected to MPD {version} at {peer}");
                self.transport = Some(transport);
                self.server_version = Some(version);
                self.state.needs_connect = false;
                self.state.binary_limit_set = true;
                self.state.schedule_art();
                self.art.reset();
                Ok(())
            }
            Err(e) => {
                self.fail(&e);
                Ok(())
            }
        }
    }

    fn handshake(
        &self,
        peer: SocketAddr,
        config: TransportConfig,
    ) -> Result<(TcpTransport, String)> {
        let wait = self.config.connect_timeout();
        let mut transport = TcpTransport::connect(peer, config)?;

        let greeting = read_line_reply(&mut transport, wait)?;
        if !matches!(ResponseParser::parse_simple(&greeting), Reply::Ok(_)) {
            return Err(ProtocolError::unexpected_reply("OK MPD greeting", &greeting));
        }
        let version = greeting
            .split(|&b| b == b'\n')
            .next()
            .and_then(|line| line.strip_prefix(b"OK MPD "))
            .map(|v| String::from_utf8_lossy(v).into_owned())
            .unwrap_or_default();

        let limit = Command::BinaryLimit(self.config.binary_limit);
        debug!("Sending {limit}");
        transport.write_all_or_retry(&limit.encode(), self.config.write_timeout())?;
        let reply = read_line_reply(&mut transport, wait)?;
        match ResponseParser::parse_simple(&reply) {
            Reply::Ok(_) => Ok((transport, version)),
            Reply::Ack(ack) => Err(ProtocolError::Ack(ack)),
            Reply::Incomplete | Reply::Malformed => {
                Err(ProtocolError::unexpected_reply("OK", &reply))
            }
        }
    }

    fn send(&mut self, command: &Command, timeout: Duration) -> Result<()> {
        debug!("Sending {command}");
        let transport = self.transport.as_mut().ok_or(ProtocolError::NotConnected)?;
        let mut line = command.encode();
        let result = transport.write_all_or_retry(&line, timeout);
        if command.is_sensitive() {
            line.zeroize();
        }
        result
    }

    /// Read whatever is available into the decoder
    ///
    /// A timeout keeps the bytes buffered so far; the next tick resumes
    /// reading the same reply.
    fn read_into_decoder(&mut self) -> Result<()> {
        let timeout = self.config.read_timeout();
        let transport = self.transport.as_mut().ok_or(ProtocolError::NotConnected)?;
        match transport.read_until_quiescent(timeout) {
            Ok(bytes) => self.decoder.feed(&bytes),
            Err(e @ ProtocolError::ReadTimedOut(_)) => {
                if self.decoder.is_waiting_for_data() {
                    debug!(
                        "Reply stalled after {} bytes",
                        self.decoder.buffer().len()
                    );
                }
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    fn handle_ping(&mut self) -> Result<bool> {
        match ResponseParser::parse_simple(self.decoder.buffer()) {
            Reply::Ok(_) => {
                self.state.ping_done = true;
                Ok(true)
            }
            Reply::Ack(ack) => self.reject("ping", ProtocolError::Ack(ack)),
            Reply::Incomplete => Ok(false),
            Reply::Malformed => Err(ProtocolError::unexpected_reply(
                "OK",
                self.decoder.buffer(),
            )),
        }
    }

    fn handle_block(&mut self, command: &Command) -> Result<bool> {
        let fields = match ResponseParser::parse_block(self.decoder.buffer()) {
            Reply::Ok(body) => parse_fields(body),
            Reply::Ack(ack) => return self.reject(command.name(), ProtocolError::Ack(ack)),
            Reply::Incomplete => return Ok(false),
            Reply::Malformed => {
                return Err(ProtocolError::unexpected_reply(
                    "key: value block ending in OK",
                    self.decoder.buffer(),
                ));
            }
        };

        if *command == Command::Status {
            self.state.status_done = true;
            self.song.apply(fields);
            return Ok(true);
        }

        self.state.currentsong_done = true;
        match self.song.apply(fields) {
            TrackChange::Unchanged => {}
            TrackChange::Started => {
                debug!("First track: {}", self.song.filename);
                self.state.schedule_art();
            }
            TrackChange::Changed => {
                info!("Track changed to {}", self.song.filename);
                self.state.clear_poll();
                self.art.reset();
                self.state.schedule_art();
            }
        }
        Ok(true)
    }

    fn handle_art(&mut self, source: ArtSource) -> Result<bool> {
        let raw = self.decoder.buffer();

        if raw.starts_with(ACK_PREFIX) {
            return match ResponseParser::parse_simple(raw) {
                Reply::Incomplete => Ok(false),
                Reply::Ack(ack) => {
                    let stale = std::mem::take(&mut self.discard_reply);
                    let error = ProtocolError::Ack(ack);
                    if error.requires_auth() {
                        return self.reject(&source.to_string(), error);
                    }
                    if stale {
                        return Ok(true);
                    }
                    debug!("No art from {source}: {error}");
                    self.art.reset();
                    self.state.exhaust(source);
                    Ok(true)
                }
                Reply::Ok(_) | Reply::Malformed => {
                    Err(ProtocolError::unexpected_reply("ACK line", raw))
                }
            };
        }

        if self.discard_reply {
            return match parse_chunk(raw, false) {
                Ok(ChunkFrame::Incomplete) => Ok(false),
                Ok(ChunkFrame::Chunk(chunk)) => {
                    warn!("Discarding stale {source} chunk");
                    let seen = chunk.trailer.len();
                    self.decoder.expect_trailer(seen);
                    self.discard_reply = false;
                    Ok(true)
                }
                Ok(ChunkFrame::Empty) | Err(_) => {
                    self.discard_reply = false;
                    Ok(true)
                }
            };
        }

        let require_mime = source == ArtSource::ReadPicture;
        match apply_chunk(raw, &mut self.art, require_mime) {
            Ok(ChunkProgress::Incomplete) => Ok(false),
            Ok(ChunkProgress::Empty) => {
                debug!("No art from {source}");
                self.art.reset();
                self.state.exhaust(source);
                Ok(true)
            }
            Ok(ChunkProgress::Appended {
                complete,
                trailer_seen,
            }) => {
                self.decoder.expect_trailer(trailer_seen);
                if complete {
                    info!(
                        "Fetched {} bytes of art ({}) via {source}",
                        self.art.offset(),
                        self.art.mime_type().unwrap_or("unknown type")
                    );
                    self.state.art_pending = false;
                }
                Ok(true)
            }
            Err(e) => {
                warn!("Art fetch via {source} failed: {e}");
                self.art.reset();
                self.state.fail_art();
                Ok(true)
            }
        }
    }

    /// Handle an `ACK` reply to a polling command
    fn reject(&mut self, command: &str, error: ProtocolError) -> Result<bool> {
        if error.requires_auth() {
            warn!("MPD requires a password for {command}");
            self.state.needs_auth = true;
            Ok(true)
        } else {
            Err(error)
        }
    }

    fn handle_error(&mut self, error: ProtocolError) {
        if error.is_transient() {
            debug!("Retrying next tick: {error}");
        } else {
            self.fail(&error);
        }
    }

    fn fail(&mut self, error: &ProtocolError) {
        error!("MPD connection failed: {error}");
        self.close_transport();
        self.state.fatal = true;
        self.state.waiting_on_read = false;
        self.last_error = Some(error.to_string());
    }

    fn close_transport(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
        self.in_flight = None;
        self.discard_reply = false;
        self.decoder.reset_all();
    }

    /// Send the password and wait for the server to accept it
    ///
    /// Success clears the auth requirement and schedules a fresh poll. Any
    /// other outcome is fatal, except calling it with no connection or with
    /// a command still in flight.
    pub fn attempt_auth(&mut self, password: impl Into<SecureString>) -> Result<()> {
        if self.state.fatal || self.transport.is_none() {
            return Err(ProtocolError::NotConnected);
        }
        if let Some(command) = &self.in_flight {
            return Err(ProtocolError::Busy {
                command: command.name(),
            });
        }

        let command = Command::Password(password.into());
        match self.authenticate(&command) {
            Ok(()) => {
                info!("Password accepted");
                self.state.needs_auth = false;
                self.state.clear_poll();
                Ok(())
            }
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    fn authenticate(&mut self, command: &Command) -> Result<()> {
        let timeout = self.config.auth_timeout();
        let deadline = Instant::now() + timeout;
        self.send(command, timeout)?;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let transport = self.transport.as_mut().ok_or(ProtocolError::NotConnected)?;
            let bytes = transport.read_until_quiescent(remaining)?;
            self.decoder.feed(&bytes)?;

            match ResponseParser::parse_simple(self.decoder.buffer()) {
                Reply::Ok(_) => break,
                Reply::Ack(ack) => return Err(ProtocolError::Ack(ack)),
                Reply::Malformed => {
                    return Err(ProtocolError::unexpected_reply("OK", self.decoder.buffer()));
                }
                Reply::Incomplete if Instant::now() >= deadline => {
                    return Err(ProtocolError::ReadTimedOut(timeout));
                }
                Reply::Incomplete => {}
            }
        }

        self.decoder.reset();
        Ok(())
    }

    /// Force a fresh `ping`/`status`/`currentsong` cycle
    pub fn request_data_update(&mut self) {
        self.state.clear_poll();
    }

    /// Discard cached art and fetch it again from the first source
    pub fn request_refetch_album_art(&mut self) {
        self.art.reset();
        self.state.schedule_art();
        if self.in_flight.as_ref().is_some_and(Command::expects_binary) {
            self.discard_reply = true;
        }
    }

    /// Drop the connection and start over on the next `update()`
    ///
    /// Clears the fatal flag unless the host itself is invalid. Song
    /// metadata is kept; cached art is not.
    pub fn reset_connection(&mut self) {
        self.close_transport();
        self.art.reset();
        if self.peer.is_some() {
            debug!("Resetting connection");
            self.state.reconnecting();
            self.last_error = None;
        }
    }

    /// Check if the server is waiting for a password
    pub fn needs_auth(&self) -> bool {
        self.state.needs_auth
    }

    /// Check if the client has not hit a fatal error
    pub fn is_ok(&self) -> bool {
        self.state.is_ok()
    }

    pub fn state(&self) -> &ClientState {
        &self.state
    }

    pub fn song(&self) -> &SongInfo {
        &self.song
    }

    pub fn title(&self) -> &str {
        &self.song.title
    }

    pub fn artist(&self) -> &str {
        &self.song.artist
    }

    pub fn album(&self) -> &str {
        &self.song.album
    }

    pub fn filename(&self) -> &str {
        &self.song.filename
    }

    /// Track length in seconds
    pub fn duration(&self) -> f64 {
        self.song.duration
    }

    /// Elapsed seconds and the instant they were sampled at
    pub fn elapsed(&self) -> (f64, Instant) {
        (self.song.elapsed, self.song.elapsed_sampled_at)
    }

    pub fn art(&self) -> &ArtBuffer {
        &self.art
    }

    /// Finished picture bytes, if the fetch completed
    pub fn art_bytes(&self) -> Option<&[u8]> {
        self.art.is_complete().then(|| self.art.data())
    }

    pub fn art_mime_type(&self) -> Option<&str> {
        self.art.mime_type()
    }

    /// Check if a poll cycle has finished since the last data update request
    pub fn has_polled(&self) -> bool {
        self.state.ping_done && self.state.status_done && self.state.currentsong_done
    }

    /// Version from the server greeting
    pub fn server_version(&self) -> Option<&str> {
        self.server_version.as_deref()
    }

    /// Message of the error that made the client fail
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn transport_stats(&self) -> Option<&TransportStats> {
        self.transport.as_ref().map(TcpTransport::stats)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

/// Read until a full status line arrives or `timeout` runs out
fn read_line_reply(transport: &mut TcpTransport, timeout: Duration) -> Result<Vec<u8>> {
    let deadline = Instant::now() + timeout;
    let mut reply = Vec::new();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        reply.extend_from_slice(&transport.read_until_quiescent(remaining)?);
        if reply.contains(&b'\n') || Instant::now() >= deadline {
            return Ok(reply);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_invalid_address_fails_without_io() {
        for host in ["127.0.0.1.2", "127.0.1", "mpd.local"] {
            let client = MpdClient::new(ClientConfig {
                host: host.to_string(),
                ..ClientConfig::test()
            });
            assert!(!client.is_ok(), "{host} should fail");
            assert!(client.transport_stats().is_none());
            assert!(client.last_error().unwrap().contains(host));
        }
    }

    #[test]
    fn test_valid_address_starts_disconnected() {
        let client = MpdClient::new(ClientConfig::test());
        assert!(client.is_ok());
        assert!(client.state().needs_connect);
        assert!(!client.needs_auth());
    }

    #[test]
    fn test_update_on_failed_client_is_noop() {
        let mut client = MpdClient::new(ClientConfig {
            host: "999.0.0.1".to_string(),
            ..ClientConfig::test()
        });
        client.update();
        client.reset_connection();
        client.update();
        assert!(!client.is_ok());
    }

    #[test]
    fn test_request_data_update_is_idempotent() {
        let mut client = MpdClient::new(ClientConfig::test());
        client.state.ping_done = true;
        client.state.status_done = true;
        client.state.currentsong_done = true;

        client.request_data_update();
        let once = client.state().clone();
        client.request_data_update();
        assert_eq!(client.state(), &once);
        assert!(!once.ping_done && !once.status_done && !once.currentsong_done);
    }

    #[test]
    fn test_refetch_marks_in_flight_art_stale() {
        let mut client = MpdClient::new(ClientConfig::test());
        client.in_flight = Some(Command::art(ArtSource::AlbumArt, "a.flac", 4000));
        client.state.art_failed = true;

        client.request_refetch_album_art();
        assert!(client.discard_reply);
        assert!(client.state().art_pending);
        assert!(!client.state().art_failed);
        assert_eq!(client.art().offset(), 0);
    }

    #[test]
    fn test_reject_only_waits_on_permission_ack() {
        let mut client = MpdClient::new(ClientConfig::test());
        let ack = |line: &[u8]| ProtocolError::Ack(crate::protocol::AckError::parse(line).unwrap());

        let unknown = client.reject("status", ack(b"ACK [5@0] {status} unknown command"));
        assert!(matches!(unknown, Err(ProtocolError::Ack(ref a)) if a.code == 5));
        assert!(!client.needs_auth());

        let denied = client.reject("status", ack(b"ACK [4@0] {status} you don't have permission"));
        assert!(denied.unwrap());
        assert!(client.needs_auth());
    }

    #[test]
    fn test_auth_requires_connection() {
        let mut client = MpdClient::new(ClientConfig::test());
        let result = client.attempt_auth("secret");
        assert!(matches!(result, Err(ProtocolError::NotConnected)));
        assert!(client.is_ok());
    }

    #[test]
    fn test_connect_rejects_bad_greeting() {
        let listener = match TcpListener::bind("127.0.0.1:0") {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Skipping test_connect_rejects_bad_greeting due to network sandbox: {e:?}");
                return;
            }
        };
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(b"HELLO\n").unwrap();
            let mut buf = [0u8; 64];
            let _ = stream.read(&mut buf);
        });

        let mut client = MpdClient::new(ClientConfig {
            port,
            ..ClientConfig::test()
        });
        client.update();
        assert!(!client.is_ok());
        assert!(client.last_error().unwrap().contains("HELLO"));
        server.join().unwrap();
    }
}
