//! The single-owner WebSocket client. One `WsClient` belongs to
//! exactly one session; the `mutex` the design calls for is this crate's
//! `&mut self` borrow checker enforcement instead of a runtime lock — the
//! background task is the only thread that ever touches a given client, so
//! there is nothing left to serialise at this layer.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::{Duration, Instant};

use vspeak_core::{CoreError, WsConfig};

use crate::frame::{self, DecodeOutcome, Frame, Opcode};
use crate::handshake;
use crate::transport::{connect_tcp, WsTransport};

/// Connection lifecycle (`WsClient`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
    Error,
}

/// A client-side WebSocket connection, generic over the transport so tests
/// can substitute [`crate::transport::mock::MockTransport`] for a real
/// `TcpStream`.
pub struct WsClient<T: WsTransport = TcpStream> {
    cfg: WsConfig,
    stream: Option<T>,
    state: ConnState,
    last_activity: Instant,
    retry_count: u32,
    /// Bytes read from the socket but not yet assembled into a full frame.
    recv_buf: Vec<u8>,
}

impl WsClient<TcpStream> {
    /// `create(cfg)`: allocates buffers, starts `Disconnected`.
    #[must_use]
    pub fn new(cfg: WsConfig) -> Self {
        Self {
            cfg,
            stream: None,
            state: ConnState::Disconnected,
            last_activity: Instant::now(),
            retry_count: 0,
            recv_buf: Vec::new(),
        }
    }

    /// Open the TCP connection and run the opening handshake.
    pub fn connect(&mut self) -> Result<bool, CoreError> {
        self.state = ConnState::Connecting;
        let tcp = connect_tcp(&self.cfg.host, self.cfg.port, self.cfg.connect_timeout)
        .map_err(|e| CoreError::Socket(e.to_string()))?;
        tcp.set_nodelay(true).ok();
        self.connect_over(tcp)
    }
}

impl<T: WsTransport> WsClient<T> {
    /// Build a client around an already-established transport (used by
    /// `test-util` callers that hand in a [`crate::transport::mock::MockTransport`]
    /// half of a pair instead of going through `connect`).
    #[must_use]
    pub fn from_transport(cfg: WsConfig, transport: T) -> Result<Self, CoreError> {
        let mut client = Self {
            cfg,
            stream: None,
            state: ConnState::Disconnected,
            last_activity: Instant::now(),
            retry_count: 0,
            recv_buf: Vec::new(),
        };
        client.connect_over(transport)?;
        Ok(client)
    }

    fn connect_over(&mut self, mut transport: T) -> Result<bool, CoreError> {
        let accepted = handshake::perform(&mut transport, &self.cfg.host, self.cfg.port, &self.cfg.path)?;
        if !accepted {
            self.state = ConnState::Error;
            return Ok(false);
        }
        transport
        .set_read_timeout(Some(self.cfg.recv_poll_timeout))
        .map_err(|e| CoreError::Socket(e.to_string()))?;
        transport
        .set_write_timeout(Some(self.cfg.send_timeout))
        .map_err(|e| CoreError::Socket(e.to_string()))?;
        self.stream = Some(transport);
        self.state = ConnState::Connected;
        self.retry_count = 0;
        self.last_activity = Instant::now();
        Ok(true)
    }

    /// `connect_with_retry()`: up to `max_retries + 1` attempts.
    pub fn connect_with_retry(&mut self) -> Result<bool, CoreError>
    where
    T: ConnectableFresh,
    {
        for attempt in 0..=self.cfg.max_retries {
            match T::fresh_connect(self) {
                Ok(true) => return Ok(true),
                Ok(false) | Err(_) => {
                    self.retry_count = attempt + 1;
                    if attempt < self.cfg.max_retries {
                        thread::sleep(self.cfg.retry_delay);
                    }
                }
            }
        }
        self.state = ConnState::Error;
        Err(CoreError::AllRetriesExhausted)
    }

    /// `is_connected()`.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == ConnState::Connected
    }

    #[must_use]
    pub fn state(&self) -> ConnState {
        self.state
    }

    fn require_connected(&mut self) -> Result<&mut T, CoreError> {
        if self.state != ConnState::Connected {
            return Err(CoreError::Socket("not connected".into()));
        }
        self.stream.as_mut().ok_or_else(|| CoreError::Socket("not connected".into()))
    }

    fn send_frame(&mut self, frame: &Frame) -> Result<bool, CoreError> {
        if frame.payload.len() > self.cfg.max_frame_size {
            return Err(CoreError::FrameTooLarge(frame.payload.len()));
        }
        let bytes = frame::encode(frame);
        let stream = self.require_connected()?;
        match stream.write_all(&bytes) {
            Ok(()) => {
                self.last_activity = Instant::now();
                Ok(true)
            }
            Err(e) => {
                self.fail();
                Err(CoreError::Socket(e.to_string()))
            }
        }
    }

    /// `send_text(data)`.
    pub fn send_text(&mut self, data: impl Into<Vec<u8>>) -> Result<bool, CoreError> {
        self.send_frame(&Frame::text(data.into()))
    }

    /// `send_binary(data)`.
    pub fn send_binary(&mut self, data: impl Into<Vec<u8>>) -> Result<bool, CoreError> {
        self.send_frame(&Frame::binary(data.into()))
    }

    /// `send_ping()`: empty payload.
    pub fn send_ping(&mut self) -> Result<bool, CoreError> {
        self.send_frame(&Frame::ping(Vec::new()))
    }

    /// `send_close(code, reason)`.
    pub fn send_close(&mut self, code: u16, reason: &str) -> Result<bool, CoreError> {
        self.send_frame(&Frame::close(code, reason))
    }

    /// `receive_frame()`: blocks at most `recv_poll_timeout`. A PING
    /// triggers an internal PONG before the frame is handed back; a CLOSE
    /// moves the connection to `Closing` so the owning session treats
    /// further reads as EOF.
    pub fn receive_frame(&mut self) -> Result<Option<Frame>, CoreError> {
        if self.state != ConnState::Connected {
            return Err(CoreError::Socket("not connected".into()));
        }

        // Try to decode a frame already buffered before touching the
        // socket again.
        if let Some(frame) = self.try_decode_buffered()? {
            return self.post_process(frame);
        }

        let mut chunk = [0u8; 4096];
        let stream = self.stream.as_mut().expect("checked Connected above");
        match stream.read(&mut chunk) {
            Ok(0) => {
                // Peer closed the TCP connection outright.
                self.state = ConnState::Closing;
                Ok(None)
            }
            Ok(n) => {
                self.recv_buf.extend_from_slice(&chunk[..n]);
                self.last_activity = Instant::now();
                match self.try_decode_buffered()? {
                    Some(frame) => self.post_process(frame),
                    None => Ok(None),
                }
            }
            Err(e) if is_timeout(&e) => Ok(None),
            Err(e) => {
                self.fail();
                Err(CoreError::Socket(e.to_string()))
            }
        }
    }

    fn try_decode_buffered(&mut self) -> Result<Option<Frame>, CoreError> {
        match frame::decode(&self.recv_buf, self.cfg.max_frame_size) {
            Ok(DecodeOutcome::Frame { frame, consumed }) => {
                self.recv_buf.drain(..consumed);
                Ok(Some(frame))
            }
            Ok(DecodeOutcome::Incomplete) => Ok(None),
            Err(e) => {
                self.fail();
                Err(e)
            }
        }
    }

    fn post_process(&mut self, frame: Frame) -> Result<Option<Frame>, CoreError> {
        match frame.opcode {
            Opcode::Ping => {
                self.send_frame(&Frame::pong(frame.payload.clone()))?;
                Ok(Some(frame))
            }
            Opcode::Close => {
                self.state = ConnState::Closing;
                Ok(Some(frame))
            }
            _ => Ok(Some(frame)),
        }
    }

    /// `poll(timeout)`: true iff a byte is readable within `timeout` — either
    /// already buffered from a prior read, or arrived over the socket before
    /// the timeout elapses. Bytes read during the probe are kept in
    /// `recv_buf`, so a later `receive_frame` still sees them.
    pub fn poll(&mut self, timeout: Duration) -> Result<bool, CoreError> {
        if !self.recv_buf.is_empty() {
            return Ok(true);
        }
        if self.state != ConnState::Connected {
            return Ok(false);
        }
        let recv_poll_timeout = self.cfg.recv_poll_timeout;
        let stream = self.require_connected()?;
        stream
        .set_read_timeout(Some(timeout))
        .map_err(|e| CoreError::Socket(e.to_string()))?;
        let mut chunk = [0u8; 4096];
        let read_result = stream.read(&mut chunk);
        match read_result {
            Ok(0) => {
                self.state = ConnState::Closing;
                Ok(false)
            }
            Ok(n) => {
                self.recv_buf.extend_from_slice(&chunk[..n]);
                self.last_activity = Instant::now();
                if let Some(stream) = self.stream.as_mut() {
                    let _ = stream.set_read_timeout(Some(recv_poll_timeout));
                }
                Ok(true)
            }
            Err(e) if is_timeout(&e) => {
                if let Some(stream) = self.stream.as_mut() {
                    let _ = stream.set_read_timeout(Some(recv_poll_timeout));
                }
                Ok(false)
            }
            Err(e) => {
                self.fail();
                Err(CoreError::Socket(e.to_string()))
            }
        }
    }

    /// `ensure_connected()`: true iff `Connected` after at most one
    /// retry cycle.
    pub fn ensure_connected(&mut self) -> Result<bool, CoreError>
    where
    T: ConnectableFresh,
    {
        if self.is_connected() {
            return Ok(true);
        }
        self.connect_with_retry()
    }

    /// `disconnect(send_close_flag)`: best-effort CLOSE, then close
    /// the socket and transition to `Disconnected`.
    pub fn disconnect(&mut self, send_close: bool) {
        if send_close && self.state == ConnState::Connected {
            let _ = self.send_close(1000, "bye");
        }
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown();
        }
        self.recv_buf.clear();
        self.state = ConnState::Disconnected;
    }

    fn fail(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown();
        }
        self.state = ConnState::Error;
    }

    #[must_use]
    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }
}

/// Reconnection needs a way to mint a brand-new transport of the same kind
/// every retry attempt. Real `TcpStream`s dial out again; mock transports
/// in tests have no "redial" concept and simply report whatever state
/// they're already in.
pub trait ConnectableFresh: WsTransport + Sized {
    fn fresh_connect(client: &mut WsClient<Self>) -> Result<bool, CoreError>;
}

impl ConnectableFresh for TcpStream {
    fn fresh_connect(client: &mut WsClient<Self>) -> Result<bool, CoreError> {
        let tcp = connect_tcp(&client.cfg.host, client.cfg.port, client.cfg.connect_timeout)
        .map_err(|e| CoreError::Socket(e.to_string()))?;
        tcp.set_nodelay(true).ok();
        client.connect_over(tcp)
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

#[cfg(feature = "test-util")]
impl ConnectableFresh for crate::transport::mock::MockTransport {
    fn fresh_connect(_client: &mut WsClient<Self>) -> Result<bool, CoreError> {
        // Mocks can't redial a fresh TCP connection; tests that need retry
        // coverage exercise real-TCP paths or assert on state instead.
        Ok(false)
    }
}

#[cfg(all(test, feature = "test-util"))]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;

    fn connected_pair() -> (WsClient<MockTransport>, MockTransport) {
        let (client_side, server_side) = MockTransport::pair();
        let cfg = WsConfig::default();
        let client = WsClient::from_transport(cfg, client_side).unwrap();
        (client, server_side)
    }

    #[test]
    fn handshake_over_mock_transport_connects() {
        let (client, _server) = connected_pair();
        assert!(client.is_connected());
    }

    #[test]
    fn send_text_then_binary_round_trip_via_decoder() {
        let (mut client, mut server) = connected_pair();
        assert!(client.send_text(b"hello".to_vec()).unwrap());

        let mut buf = Vec::new();
        server.read_to_end(&mut buf).ok();
        match frame::decode(&buf, 1024 * 1024).unwrap() {
            DecodeOutcome::Frame { frame, .. } => {
                assert_eq!(frame.opcode, Opcode::Text);
                assert_eq!(frame.payload, b"hello");
            }
            DecodeOutcome::Incomplete => panic!("expected full frame"),
        }
    }

    #[test]
    fn receive_frame_returns_none_on_no_data() {
        let (mut client, _server) = connected_pair();
        assert!(client.receive_frame().unwrap().is_none());
    }

    #[test]
    fn receive_frame_surfaces_binary_payload_sent_by_peer() {
        let (mut client, mut server) = connected_pair();
        let bytes = frame::encode(&Frame::binary(vec![1, 2, 3, 4]));
        server.write_all(&bytes).unwrap();

        let frame = client.receive_frame().unwrap().expect("a frame");
        assert_eq!(frame.opcode, Opcode::Binary);
        assert_eq!(frame.payload, vec![1, 2, 3, 4]);
    }

    #[test]
    fn ping_triggers_automatic_pong() {
        let (mut client, mut server) = connected_pair();
        let bytes = frame::encode(&Frame::ping(b"abcd".to_vec()));
        server.write_all(&bytes).unwrap();

        let frame = client.receive_frame().unwrap().expect("the ping itself");
        assert_eq!(frame.opcode, Opcode::Ping);

        let mut echoed = Vec::new();
        server.read_to_end(&mut echoed).ok();
        match frame::decode(&echoed, 1024 * 1024).unwrap() {
            DecodeOutcome::Frame { frame, .. } => {
                assert_eq!(frame.opcode, Opcode::Pong);
                assert_eq!(frame.payload, b"abcd");
            }
            DecodeOutcome::Incomplete => panic!("expected the auto-pong"),
        }
    }

    #[test]
    fn close_from_peer_transitions_to_closing() {
        let (mut client, mut server) = connected_pair();
        let bytes = frame::encode(&Frame::close(1000, "bye"));
        server.write_all(&bytes).unwrap();

        let frame = client.receive_frame().unwrap().expect("close frame");
        assert_eq!(frame.opcode, Opcode::Close);
        assert_eq!(client.state(), ConnState::Closing);
    }

    #[test]
    fn disconnect_resets_to_disconnected() {
        let (mut client, _server) = connected_pair();
        client.disconnect(false);
        assert_eq!(client.state(), ConnState::Disconnected);
        assert!(!client.is_connected());
    }

    #[test]
    fn oversized_payload_is_rejected_before_send() {
        let (mut client, _server) = connected_pair();
        let cfg_max = client.cfg.max_frame_size;
        let err = client.send_binary(vec![0u8; cfg_max + 1]).unwrap_err();
        assert!(matches!(err, CoreError::FrameTooLarge(_)));
    }
}
