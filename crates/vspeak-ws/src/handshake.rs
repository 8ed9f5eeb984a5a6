//! Opening handshake. Builds the upgrade request and decides
//! acceptance from the status line alone — `Sec-WebSocket-Accept` is
//! deliberately not validated, matching the source this
//! design is carried over from.

use std::io::{BufRead, BufReader, Read, Write};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use vspeak_core::CoreError;

/// Generate the `Sec-WebSocket-Key` header value: 16 random bytes, base64.
#[must_use]
pub fn generate_key() -> String {
    let raw: [u8; 16] = rand::random();
    BASE64.encode(raw)
}

/// Render the upgrade request exactly as specified.
#[must_use]
pub fn build_request(host: &str, port: u16, path: &str, key: &str) -> String {
    format!(
        "GET {path} HTTP/1.1\r\n\
        Host: {host}:{port}\r\n\
        Upgrade: websocket\r\n\
        Connection: Upgrade\r\n\
        Sec-WebSocket-Key: {key}\r\n\
        Sec-WebSocket-Version: 13\r\n\
        \r\n"
    )
}

/// Send the handshake request and read the response status line plus
/// headers (discarded past the blank line). Acceptance is decided purely
/// by the presence of `"101"` in the status line; a strict
/// implementer could additionally verify `Sec-WebSocket-Accept` against
/// `base64(sha1(key || GUID))`, but this design does not.
pub fn perform<S: Read + Write>(stream: &mut S, host: &str, port: u16, path: &str) -> Result<bool, CoreError> {
    let key = generate_key();
    let request = build_request(host, port, path, &key);
    stream
    .write_all(request.as_bytes())
    .map_err(|e| CoreError::Socket(e.to_string()))?;

    let mut reader = BufReader::new(stream);
    let mut status_line = String::new();
    reader
    .read_line(&mut status_line)
    .map_err(|e| CoreError::Socket(e.to_string()))?;

    if status_line.is_empty() {
        return Err(CoreError::HandshakeFailed("connection closed before any response".into()));
    }

    // Drain headers up to the blank line terminating the response.
    loop {
        let mut line = String::new();
        let n = reader
        .read_line(&mut line)
        .map_err(|e| CoreError::Socket(e.to_string()))?;
        if n == 0 || line == "\r\n" || line == "\n" {
            break;
        }
    }

    Ok(status_line.contains("101"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// A duplex mock stream: writes go to `sent`, reads come from `inbound`.
    /// Separate buffers because `perform` both writes the request and reads
    /// the response on the same handle.
    struct DuplexMock {
        inbound: Cursor<Vec<u8>>,
        sent: Vec<u8>,
    }

    impl Read for DuplexMock {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.inbound.read(buf)
        }
    }

    impl Write for DuplexMock {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.sent.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn request_matches_literal_format() {
        let req = build_request("localhost", 8080, "/tts", "abc123==");
        assert!(req.starts_with("GET /tts HTTP/1.1\r\n"));
        assert!(req.contains("Host: localhost:8080\r\n"));
        assert!(req.contains("Sec-WebSocket-Key: abc123==\r\n"));
        assert!(req.contains("Sec-WebSocket-Version: 13\r\n"));
        assert!(req.ends_with("\r\n\r\n"));
    }

    #[test]
    fn accepts_101_switching_protocols() {
        let response = b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\r\n";
        let mut mock = DuplexMock {
            inbound: Cursor::new(response.to_vec()),
            sent: Vec::new(),
        };
        let accepted = perform(&mut mock, "localhost", 8080, "/tts").unwrap();
        assert!(accepted);
        assert!(String::from_utf8(mock.sent).unwrap().starts_with("GET /tts HTTP/1.1\r\n"));
    }

    #[test]
    fn rejects_non_101() {
        let response = b"HTTP/1.1 404 Not Found\r\n\r\n";
        let mut mock = DuplexMock {
            inbound: Cursor::new(response.to_vec()),
            sent: Vec::new(),
        };
        let accepted = perform(&mut mock, "localhost", 8080, "/tts").unwrap();
        assert!(!accepted);
    }
}
