//! Non-blocking TCP socket operations
//!
//! Writes retry on would-block until a deadline. Reads accumulate whatever
//! is immediately available and return once the socket goes quiet, or sleep
//! and retry while nothing has arrived yet.

use super::{READ_BUF_SIZE, TransportConfig};
use crate::protocol::error::{ProtocolError, Result};
use log::{debug, trace};
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

/// TCP transport wrapper owning at most one socket
#[derive(Debug)]
pub struct TcpTransport {
    /// The underlying stream, `None` once closed
    stream: Option<TcpStream>,
    peer: SocketAddr,
    config: TransportConfig,
    stats: TransportStats,
}

/// Transport statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TransportStats {
    /// Total write calls that completed a full buffer
    pub writes: u64,
    /// Total bytes sent
    pub bytes_sent: u64,
    /// Total bytes received
    pub bytes_received: u64,
    /// Times a read or write had to sleep on would-block
    pub would_block_retries: u64,
}

impl TcpTransport {
    /// Connect to `peer` and switch the stream to non-blocking mode
    pub fn connect(peer: SocketAddr, config: TransportConfig) -> Result<Self> {
        debug!("Connecting to {peer} (timeout {:?})", config.connect_timeout);
        let stream = TcpStream::connect_timeout(&peer, config.connect_timeout)?;
        stream.set_nodelay(true)?;
        stream.set_nonblocking(true)?;

        Ok(Self {
            stream: Some(stream),
            peer,
            config,
            stats: TransportStats::default(),
        })
    }

    /// Write every byte, sleeping on would-block until `timeout` elapses
    pub fn write_all_or_retry(&mut self, bytes: &[u8], timeout: Duration) -> Result<()> {
        let poll = self.config.poll_interval;
        let stream = self.stream.as_mut().ok_or(ProtocolError::NotConnected)?;
        let deadline = Instant::now() + timeout;
        let mut written = 0;

        while written < bytes.len() {
            match stream.write(&bytes[written..]) {
                Ok(0) => return Err(ProtocolError::PeerClosed),
                Ok(n) => written += n,
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(ProtocolError::WriteTimedOut { timeout, written });
                    }
                    self.stats.would_block_retries += 1;
                    thread::sleep(poll);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }

        self.stats.writes += 1;
        self.stats.bytes_sent += written as u64;
        trace!("Wrote {written} bytes to {}", self.peer);
        Ok(())
    }

    /// Read until the socket would block, waiting up to `timeout` for the first byte
    pub fn read_until_quiescent(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        let poll = self.config.poll_interval;
        let stream = self.stream.as_mut().ok_or(ProtocolError::NotConnected)?;
        let deadline = Instant::now() + timeout;
        let mut received = Vec::new();
        let mut chunk = [0u8; READ_BUF_SIZE];

        loop {
            match stream.read(&mut chunk) {
                Ok(0) => return Err(ProtocolError::PeerClosed),
                Ok(n) => received.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    if !received.is_empty() {
                        break;
                    }
                    if Instant::now() >= deadline {
                        return Err(ProtocolError::ReadTimedOut(timeout));
                    }
                    self.stats.would_block_retries += 1;
                    thread::sleep(poll);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }

        self.stats.bytes_received += received.len() as u64;
        trace!("Read {} bytes from {}", received.len(), self.peer);
        Ok(received)
    }

    /// Shut down and release the socket. Safe to call repeatedly.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            debug!("Closing connection to {}", self.peer);
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    /// Check if the socket is still held
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Get the peer address
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Get transport statistics
    pub fn stats(&self) -> &TransportStats {
        &self.stats
    }

    /// Reset transport statistics
    pub fn reset_stats(&mut self) {
        self.stats = TransportStats::default();
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    fn test_config() -> TransportConfig {
        TransportConfig {
            connect_timeout: Duration::from_millis(500),
            poll_interval: Duration::from_millis(1),
        }
    }

    fn pair() -> Option<(TcpTransport, TcpStream)> {
        let listener = match TcpListener::bind("127.0.0.1:0") {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Skipping transport test due to network sandbox: {e:?}");
                return None;
            }
        };
        let addr = listener.local_addr().unwrap();
        let transport = TcpTransport::connect(addr, test_config()).unwrap();
        let (server, _) = listener.accept().unwrap();
        Some((transport, server))
    }

    #[test]
    fn test_read_returns_available_bytes() {
        let Some((mut transport, mut server)) = pair() else {
            return;
        };

        server.write_all(b"OK MPD 0.23.5\n").unwrap();
        let reply = transport
            .read_until_quiescent(Duration::from_millis(500))
            .unwrap();
        assert_eq!(reply, b"OK MPD 0.23.5\n");
        assert_eq!(transport.stats().bytes_received, 14);
    }

    #[test]
    fn test_read_times_out_when_silent() {
        let Some((mut transport, _server)) = pair() else {
            return;
        };

        let start = Instant::now();
        let result = transport.read_until_quiescent(Duration::from_millis(30));
        assert!(matches!(result, Err(ProtocolError::ReadTimedOut(_))));
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert!(transport.stats().would_block_retries > 0);
    }

    #[test]
    fn test_read_detects_peer_close() {
        let Some((mut transport, server)) = pair() else {
            return;
        };

        drop(server);
        let result = transport.read_until_quiescent(Duration::from_millis(500));
        assert!(matches!(
            result,
            Err(ProtocolError::PeerClosed) | Err(ProtocolError::Io(_))
        ));
    }

    #[test]
    fn test_write_reaches_peer() {
        let Some((mut transport, mut server)) = pair() else {
            return;
        };

        transport
            .write_all_or_retry(b"ping\n", Duration::from_millis(100))
            .unwrap();
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping\n");
        assert_eq!(transport.stats().writes, 1);
        assert_eq!(transport.stats().bytes_sent, 5);
    }

    #[test]
    fn test_close_is_idempotent() {
        let Some((mut transport, _server)) = pair() else {
            return;
        };

        transport.close();
        transport.close();
        assert!(!transport.is_open());
        assert!(matches!(
            transport.read_until_quiescent(Duration::from_millis(10)),
            Err(ProtocolError::NotConnected)
        ));
        assert!(matches!(
            transport.write_all_or_retry(b"ping\n", Duration::from_millis(10)),
            Err(ProtocolError::NotConnected)
        ));
    }

    #[test]
    fn test_reset_stats() {
        let Some((mut transport, _server)) = pair() else {
            return;
        };

        transport
            .write_all_or_retry(b"status\n", Duration::from_millis(100))
            .unwrap();
        transport.reset_stats();
        assert_eq!(transport.stats(), &TransportStats::default());
    }
}
