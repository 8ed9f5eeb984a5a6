//! The byte-stream abstraction [`WsClient`] drives. A real connection is a
//! blocking `TcpStream` with a read timeout set to `recv_poll_timeout`
//! ("blocking socket with a short recv timeout equal to
//! the poll interval", resolving the source's non-blocking-socket-with-
//! blocking-recv inconsistency in favour of one coherent mode). Tests
//! substitute an in-memory duplex pipe via the `test-util` feature.

use std::io;
use std::net::TcpStream;
use std::time::Duration;

/// Everything [`crate::client::WsClient`] needs from a byte stream: connect,
/// timeout-bounded read, write, and close. A trait so tests can swap in an
/// in-memory transport without touching the client state machine.
pub trait WsTransport: io::Read + io::Write + Send {
    /// Set the timeout applied to subsequent `read` calls; `None` blocks
    /// indefinitely.
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;

    /// Set the timeout applied to subsequent `write` calls (`WsConfig.send_timeout`);
    /// `None` blocks indefinitely.
    fn set_write_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;

    /// Best-effort shutdown of both halves of the stream.
    fn shutdown(&mut self);
}

impl WsTransport for TcpStream {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }

    fn set_write_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_write_timeout(self, timeout)
    }

    fn shutdown(&mut self) {
        let _ = TcpStream::shutdown(self, std::net::Shutdown::Both);
    }
}

/// Open a TCP connection with an upper bound on connect latency
/// (`WsConfig.connect_timeout`).
pub fn connect_tcp(host: &str, port: u16, connect_timeout: Duration) -> io::Result<TcpStream> {
    use std::net::ToSocketAddrs;

    let addr = (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no address resolved"))?;
    TcpStream::connect_timeout(&addr, connect_timeout)
}

#[cfg(feature = "test-util")]
pub mod mock {
    //! An in-memory duplex transport used by `vspeak-session`'s tests so
    //! they can drive a [`crate::client::WsClient`] without a real TCP
    //! server. Two instances created by [`pair`] are cross-wired: writes to
    //! one arrive as reads on the other.

    use std::collections::VecDeque;
    use std::io::{self, Read, Write};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::WsTransport;

    #[derive(Default)]
    struct Pipe {
        buf: VecDeque<u8>,
        closed: bool,
    }

    /// One end of an in-memory duplex pipe.
    pub struct MockTransport {
        inbound: Arc<Mutex<Pipe>>,
        outbound: Arc<Mutex<Pipe>>,
    }

    impl MockTransport {
        /// Build two cross-wired ends: `a`'s writes become `b`'s reads and
        /// vice versa.
        #[must_use]
        pub fn pair() -> (Self, Self) {
            let side_a = Arc::new(Mutex::new(Pipe::default()));
            let side_b = Arc::new(Mutex::new(Pipe::default()));
            let a = Self { inbound: side_a.clone(), outbound: side_b.clone() };
            let b = Self { inbound: side_b, outbound: side_a };
            (a, b)
        }
    }

    impl Read for MockTransport {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let mut pipe = self.inbound.lock().unwrap();
            if pipe.buf.is_empty() {
                if pipe.closed {
                    return Ok(0);
                }
                return Err(io::Error::new(io::ErrorKind::WouldBlock, "no data"));
            }
            let n = buf.len().min(pipe.buf.len());
            for slot in buf.iter_mut().take(n) {
                *slot = pipe.buf.pop_front().unwrap();
            }
            Ok(n)
        }
    }

    impl Write for MockTransport {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let mut pipe = self.outbound.lock().unwrap();
            pipe.buf.extend(buf.iter().copied());
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl WsTransport for MockTransport {
        fn set_read_timeout(&mut self, _timeout: Option<Duration>) -> io::Result<()> {
            // The mock never blocks: empty reads surface as `WouldBlock`
            // immediately, which `WsClient::receive_frame` already treats
            // as "no data yet" regardless of a configured timeout.
            Ok(())
        }

        fn set_write_timeout(&mut self, _timeout: Option<Duration>) -> io::Result<()> {
            Ok(())
        }

        fn shutdown(&mut self) {
            self.inbound.lock().unwrap().closed = true;
            self.outbound.lock().unwrap().closed = true;
        }
    }
}
