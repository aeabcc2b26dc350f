//! Scripted MPD server on a loopback TCP listener
//!
//! The server answers the command subset the client speaks, from state the
//! test configures up front or changes mid-test. Every received command line
//! is recorded so tests can assert on the exact sequence.

use crate::builders::{StatusBuilder, art_chunk};
use log::{debug, trace};
use std::collections::{HashMap, HashSet};
use std::io::{self, BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Poll interval of the accept and read loops
const POLL: Duration = Duration::from_millis(5);

/// Picture served by `readpicture` or `albumart`
#[derive(Debug, Clone)]
pub struct MockPicture {
    pub data: Vec<u8>,
    pub mime_type: Option<String>,
}

/// Configuration for mock behavior
#[derive(Debug, Clone)]
struct MockBehavior {
    greeting: Vec<u8>,
    password: Option<String>,
    reject_binarylimit: bool,
    status: Vec<u8>,
    currentsong: Vec<u8>,
    readpicture: Option<MockPicture>,
    albumart: Option<MockPicture>,
    /// Commands read but never answered
    silent: HashSet<String>,
    /// Write replies in two parts with a pause between them
    split_replies: bool,
    /// Leave out the `\nOK\n` after binary payloads
    omit_binary_trailer: bool,
    /// Per command: bytes written before pausing, and the pause
    stalls: HashMap<String, (usize, Duration)>,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            greeting: b"OK MPD 0.23.5\n".to_vec(),
            password: None,
            reject_binarylimit: false,
            status: StatusBuilder::new().build(),
            currentsong: Vec::new(),
            readpicture: None,
            albumart: None,
            silent: HashSet::new(),
            split_replies: false,
            omit_binary_trailer: false,
            stalls: HashMap::new(),
        }
    }
}

/// Mock MPD server for tests
///
/// ```rust,no_run
/// use mpd_test_utils::{MockMpdServer, SongBuilder};
///
/// let server = MockMpdServer::start().unwrap();
/// server.set_current_song(SongBuilder::new("a.flac").title("A").build());
/// let port = server.port();
/// ```
pub struct MockMpdServer {
    addr: SocketAddr,
    behavior: Arc<Mutex<MockBehavior>>,
    commands: Arc<Mutex<Vec<String>>>,
    connections: Arc<AtomicUsize>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl MockMpdServer {
    /// Bind `127.0.0.1:0` and start serving in a background thread
    pub fn start() -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;

        let behavior = Arc::new(Mutex::new(MockBehavior::default()));
        let commands = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let shutdown = Arc::new(AtomicBool::new(false));

        let handle = {
            let behavior = Arc::clone(&behavior);
            let commands = Arc::clone(&commands);
            let connections = Arc::clone(&connections);
            let shutdown = Arc::clone(&shutdown);
            thread::spawn(move || {
                accept_loop(listener, behavior, commands, connections, shutdown)
            })
        };

        debug!("Mock MPD server listening on {addr}");
        Ok(Self {
            addr,
            behavior,
            commands,
            connections,
            shutdown,
            handle: Some(handle),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    fn behavior(&self) -> MutexGuard<'_, MockBehavior> {
        lock(&self.behavior)
    }

    /// Replace the unsolicited greeting line
    pub fn set_greeting(&self, greeting: impl Into<Vec<u8>>) {
        self.behavior().greeting = greeting.into();
    }

    /// Require this password before `status`, `currentsong` and art commands
    pub fn require_password(&self, password: impl Into<String>) {
        self.behavior().password = Some(password.into());
    }

    /// Answer `binarylimit` with an unknown-command `ACK`
    pub fn reject_binarylimit(&self) {
        self.behavior().reject_binarylimit = true;
    }

    /// Body served for `status`
    pub fn set_status(&self, body: Vec<u8>) {
        self.behavior().status = body;
    }

    /// Body served for `currentsong`
    pub fn set_current_song(&self, body: Vec<u8>) {
        self.behavior().currentsong = body;
    }

    /// Picture embedded in the current song
    pub fn set_readpicture(&self, data: Vec<u8>, mime_type: Option<&str>) {
        self.behavior().readpicture = Some(MockPicture {
            data,
            mime_type: mime_type.map(str::to_string),
        });
    }

    /// Cover file next to the current song
    pub fn set_albumart(&self, data: Vec<u8>) {
        self.behavior().albumart = Some(MockPicture {
            data,
            mime_type: None,
        });
    }

    /// Read `command` but never reply to it
    pub fn silence(&self, command: &str) {
        self.behavior().silent.insert(command.to_string());
    }

    /// Resume replying to `command`
    pub fn unsilence(&self, command: &str) {
        self.behavior().silent.remove(command);
    }

    /// Deliver every reply in two writes
    pub fn split_replies(&self, split: bool) {
        self.behavior().split_replies = split;
    }

    /// Send binary payloads without the `OK` line after them
    pub fn omit_binary_trailer(&self, omit: bool) {
        self.behavior().omit_binary_trailer = omit;
    }

    /// Pause for `pause` after the first `at` bytes of every reply to `command`
    ///
    /// `at` of 0 delays the whole reply.
    pub fn stall_reply(&self, command: &str, at: usize, pause: Duration) {
        self.behavior()
            .stalls
            .insert(command.to_string(), (at, pause));
    }

    /// Every command line received so far, without terminators
    pub fn commands(&self) -> Vec<String> {
        lock(&self.commands).clone()
    }

    /// Received command names, in order
    pub fn command_names(&self) -> Vec<String> {
        self.commands()
            .iter()
            .map(|line| line.split(' ').next().unwrap_or_default().to_string())
            .collect()
    }

    /// How many times `name` was received
    pub fn count(&self, name: &str) -> usize {
        self.command_names().iter().filter(|n| *n == name).count()
    }

    pub fn clear_commands(&self) {
        lock(&self.commands).clear();
    }

    /// Number of accepted connections
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl Drop for MockMpdServer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn accept_loop(
    listener: TcpListener,
    behavior: Arc<Mutex<MockBehavior>>,
    commands: Arc<Mutex<Vec<String>>>,
    connections: Arc<AtomicUsize>,
    shutdown: Arc<AtomicBool>,
) {
    while !shutdown.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                debug!("Mock MPD server accepted {peer}");
                connections.fetch_add(1, Ordering::SeqCst);
                if let Err(e) = serve(stream, &behavior, &commands, &shutdown) {
                    debug!("Mock MPD connection ended: {e}");
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(POLL),
            Err(e) => {
                debug!("Mock MPD accept failed: {e}");
                return;
            }
        }
    }
}

fn serve(
    stream: TcpStream,
    behavior: &Mutex<MockBehavior>,
    commands: &Mutex<Vec<String>>,
    shutdown: &AtomicBool,
) -> io::Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(POLL))?;
    let mut writer = stream.try_clone()?;
    let mut reader = BufReader::new(stream);
    let mut session = Session::default();

    let greeting = lock(behavior).greeting.clone();
    writer.write_all(&greeting)?;

    let mut line = String::new();
    while !shutdown.load(Ordering::SeqCst) {
        match reader.read_line(&mut line) {
            Ok(0) => return Ok(()),
            Ok(_) if !line.ends_with('\n') => continue,
            Ok(_) => {}
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                continue;
            }
            Err(e) => return Err(e),
        }

        let command = line.trim_end_matches('\n').to_string();
        line.clear();
        trace!("Mock MPD received {command:?}");
        lock(commands).push(command.clone());

        let current = lock(behavior).clone();
        let name = command.split(' ').next().unwrap_or_default();
        if current.silent.contains(name) {
            continue;
        }

        let reply = session.reply(&command, &current);
        if let Some(&(at, pause)) = current.stalls.get(name) {
            let at = at.min(reply.len());
            writer.write_all(&reply[..at])?;
            writer.flush()?;
            thread::sleep(pause);
            writer.write_all(&reply[at..])?;
        } else if current.split_replies && reply.len() > 1 {
            let mid = reply.len() / 2;
            writer.write_all(&reply[..mid])?;
            writer.flush()?;
            thread::sleep(Duration::from_millis(20));
            writer.write_all(&reply[mid..])?;
        } else {
            writer.write_all(&reply)?;
        }
        writer.flush()?;
    }
    Ok(())
}

/// Per-connection protocol state
#[derive(Debug, Default)]
struct Session {
    authenticated: bool,
    binary_limit: Option<usize>,
}

impl Session {
    fn reply(&mut self, command: &str, behavior: &MockBehavior) -> Vec<u8> {
        let (name, args) = command.split_once(' ').unwrap_or((command, ""));
        let locked = behavior.password.is_some() && !self.authenticated;

        match name {
            "ping" => b"OK\n".to_vec(),
            "binarylimit" if behavior.reject_binarylimit => ack(5, name, "unknown command \"binarylimit\""),
            "binarylimit" => match args.trim().parse::<usize>() {
                Ok(limit) if limit >= 64 => {
                    self.binary_limit = Some(limit);
                    b"OK\n".to_vec()
                }
                _ => ack(2, name, "Value too small"),
            },
            "password" => {
                if behavior.password.as_deref() == Some(args) {
                    self.authenticated = true;
                    b"OK\n".to_vec()
                } else {
                    ack(3, name, "incorrect password")
                }
            }
            "status" | "currentsong" | "readpicture" | "albumart" if locked => ack(
                4,
                name,
                &format!("you don't have permission for \"{name}\""),
            ),
            "status" => with_ok(&behavior.status),
            "currentsong" => with_ok(&behavior.currentsong),
            "readpicture" | "albumart" => self.art_reply(name, args, behavior),
            _ => ack(5, name, &format!("unknown command \"{name}\"")),
        }
    }

    fn art_reply(&self, name: &str, args: &str, behavior: &MockBehavior) -> Vec<u8> {
        let Some((_path, offset)) = parse_art_args(args) else {
            return ack(2, name, "Bad argument");
        };

        let picture = if name == "readpicture" {
            match &behavior.readpicture {
                Some(picture) => picture,
                None => return b"OK\n".to_vec(),
            }
        } else {
            match &behavior.albumart {
                Some(picture) => picture,
                None => return ack(50, name, "No file exists"),
            }
        };

        let total = picture.data.len();
        if offset >= total {
            return ack(2, name, "Offset too large");
        }
        let limit = self.binary_limit.unwrap_or(8192);
        let end = (offset + limit).min(total);

        let mut reply = art_chunk(total, picture.mime_type.as_deref(), &picture.data[offset..end]);
        if behavior.omit_binary_trailer {
            reply.truncate(reply.len() - 4);
        }
        reply
    }
}

fn with_ok(body: &[u8]) -> Vec<u8> {
    let mut reply = body.to_vec();
    reply.extend_from_slice(b"OK\n");
    reply
}

fn ack(code: u16, command: &str, message: &str) -> Vec<u8> {
    format!("ACK [{code}@0] {{{command}}} {message}\n").into_bytes()
}

/// Parse `"<escaped path>" <offset>`
fn parse_art_args(args: &str) -> Option<(String, usize)> {
    let mut chars = args.strip_prefix('"')?.chars();
    let mut path = String::new();
    loop {
        match chars.next()? {
            '\\' => path.push(chars.next()?),
            '"' => break,
            c => path.push(c),
        }
    }
    let offset = chars.as_str().trim().parse().ok()?;
    Some((path, offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_parse_art_args_unescapes() {
        assert_eq!(
            parse_art_args(r#""dir/a\"b\\c.mp3" 4000"#),
            Some((r#"dir/a"b\c.mp3"#.to_string(), 4000))
        );
        assert_eq!(parse_art_args("a.mp3 0"), None);
        assert_eq!(parse_art_args(r#""unterminated 0"#), None);
    }

    #[test]
    fn test_session_permission_gate() {
        let behavior = MockBehavior {
            password: Some("pw".into()),
            ..MockBehavior::default()
        };
        let mut session = Session::default();

        assert!(session.reply("status", &behavior).starts_with(b"ACK [4@0]"));
        assert_eq!(session.reply("password nope", &behavior), ack(3, "password", "incorrect password"));
        assert_eq!(session.reply("password pw", &behavior), b"OK\n");
        assert!(session.reply("status", &behavior).ends_with(b"OK\n"));
    }

    #[test]
    fn test_art_chunks_follow_binary_limit() {
        let behavior = MockBehavior {
            readpicture: Some(MockPicture {
                data: vec![7u8; 100],
                mime_type: Some("image/png".into()),
            }),
            ..MockBehavior::default()
        };
        let mut session = Session::default();
        session.reply("binarylimit 64", &behavior);

        let first = session.reply(r#"readpicture "a.mp3" 0"#, &behavior);
        assert!(first.starts_with(b"size: 100\ntype: image/png\nbinary: 64\n"));
        let second = session.reply(r#"readpicture "a.mp3" 64"#, &behavior);
        assert!(second.starts_with(b"size: 100\ntype: image/png\nbinary: 36\n"));
        assert!(session.reply(r#"albumart "a.mp3" 0"#, &behavior).starts_with(b"ACK [50@0]"));
    }

    #[test]
    fn test_server_greets_and_records() {
        let server = match MockMpdServer::start() {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Skipping test_server_greets_and_records due to network sandbox: {e:?}");
                return;
            }
        };

        let mut stream = TcpStream::connect(server.addr()).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let mut greeting = [0u8; 14];
        stream.read_exact(&mut greeting).unwrap();
        assert_eq!(&greeting, b"OK MPD 0.23.5\n");

        stream.write_all(b"ping\n").unwrap();
        let mut reply = [0u8; 3];
        stream.read_exact(&mut reply).unwrap();
        assert_eq!(&reply, b"OK\n");
        assert_eq!(server.commands(), vec!["ping".to_string()]);
        assert_eq!(server.connections(), 1);
    }

    #[test]
    fn test_stalled_reply_arrives_in_two_parts() {
        let server = match MockMpdServer::start() {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Skipping test_stalled_reply_arrives_in_two_parts due to network sandbox: {e:?}");
                return;
            }
        };
        server.stall_reply("ping", 1, Duration::from_millis(300));

        let mut stream = TcpStream::connect(server.addr()).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let mut greeting = [0u8; 14];
        stream.read_exact(&mut greeting).unwrap();

        stream.write_all(b"ping\n").unwrap();
        let mut first = [0u8; 1];
        stream.read_exact(&mut first).unwrap();
        assert_eq!(&first, b"O");

        stream
            .set_read_timeout(Some(Duration::from_millis(100)))
            .unwrap();
        let mut rest = [0u8; 2];
        assert!(stream.read_exact(&mut rest).is_err());

        stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let mut rest = [0u8; 2];
        stream.read_exact(&mut rest).unwrap();
        assert_eq!(&rest, b"K\n");
    }
}
