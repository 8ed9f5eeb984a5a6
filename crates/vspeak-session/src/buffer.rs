//! Audio buffer (§4.3): a bounded byte ring between a
//! producer (the background task for synth, the host's audio-write
//! callback for recog) and a consumer (the host's audio-read callback for
//! synth, the background task for recog). No signalling — callers poll.

use std::sync::Mutex;

/// Outcome of a [`AudioBuffer::read`] attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Copied exactly the requested number of bytes.
    Full,
    /// Copied fewer than requested; `read_pos` advanced by that many.
    Partial(usize),
    /// Nothing was available to copy; `read_pos` unchanged.
    Empty,
}

struct Inner {
    data: Vec<u8>,
    write_pos: usize,
    read_pos: usize,
    complete: bool,
}

/// A fixed-capacity byte ring with producer/consumer positions and a
/// completion flag (`AudioBuffer`). Never wraps: writes past capacity
/// are dropped with a logged warning rather than overwriting unread data.
pub struct AudioBuffer {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl AudioBuffer {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                    data: vec![0u8; capacity],
                    write_pos: 0,
                    read_pos: 0,
                    complete: false,
            }),
            capacity,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append `bytes` under lock. Drop-tail with a logged warning if the
    /// remaining capacity is insufficient — the buffer never wraps and
    /// never partially writes (§8 boundary behaviour).
    pub fn write(&self, bytes: &[u8]) {
        let mut inner = self.inner.lock().unwrap();
        let remaining = inner.data.len() - inner.write_pos;
        if bytes.len() > remaining {
            tracing::warn!(
                requested = bytes.len(),
                remaining,
                "audio buffer overflow, dropping payload"
            );
            return;
        }
        let start = inner.write_pos;
        inner.data[start..start + bytes.len()].copy_from_slice(bytes);
        inner.write_pos += bytes.len();
    }

    /// Try to copy exactly `n` bytes starting at `read_pos` into a
    /// freshly-allocated buffer. A `Partial` read advances `read_pos` by
    /// however many bytes were actually available.
    #[must_use]
    pub fn read(&self, n: usize) -> (ReadOutcome, Vec<u8>) {
        let mut inner = self.inner.lock().unwrap();
        let available = inner.write_pos - inner.read_pos;
        if available == 0 {
            return (ReadOutcome::Empty, Vec::new());
        }
        let take = n.min(available);
        let start = inner.read_pos;
        let out = inner.data[start..start + take].to_vec();
        inner.read_pos += take;
        let outcome = if take == n { ReadOutcome::Full } else { ReadOutcome::Partial(take) };
        (outcome, out)
    }

    /// Advance `read_pos` all the way to `write_pos` without copying
    /// anything — used when draining a partial tail frame (/// `stream_read`: "advance read_pos to write_pos").
    pub fn skip_to_end(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.read_pos = inner.write_pos;
    }

    pub fn mark_complete(&self) {
        self.inner.lock().unwrap().complete = true;
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.inner.lock().unwrap().complete
    }

    /// Reset to an empty, non-complete buffer (new `SPEAK`/`RECOGNIZE`, or
    /// a `STOP` flush).
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.write_pos = 0;
        inner.read_pos = 0;
        inner.complete = false;
    }

    /// `available()` = `write_pos - read_pos`.
    #[must_use]
    pub fn available(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.write_pos - inner.read_pos
    }

    /// Whether any bytes have ever been written since the last `clear()`,
    /// regardless of how much has since been drained. Used by the
    /// idle-poll timeout: partial audio already collected should
    /// complete normally rather than error out, even if the host has
    /// already drained all of it.
    #[must_use]
    pub fn has_received_any(&self) -> bool {
        self.inner.lock().unwrap().write_pos > 0
    }

    /// Copy out everything currently unread without advancing `read_pos`
    /// — used by the recognizer's `SendAudioBatch` snapshot, which
    /// reads the accumulated length under lock before sending and only
    /// clears the buffer once the send itself is decided.
    #[must_use]
    pub fn snapshot_unread(&self) -> Vec<u8> {
        let inner = self.inner.lock().unwrap();
        inner.data[inner.read_pos..inner.write_pos].to_vec()
    }

    /// Bytes available from `start` to `write_pos`, used by the
    /// recognizer to track how much of the buffer is still unstreamed
    /// past its own `stream_pos` cursor — independent of
    /// `read_pos`, which the streaming chunker never touches.
    #[must_use]
    pub fn len_from(&self, start: usize) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.write_pos.saturating_sub(start)
    }

    /// Copy out `data[start..write_pos]`, clamped to whatever is actually
    /// present. Used for the final `SendAudioBatch` tail send, which
    /// subtracts whatever was already streamed chunk-by-chunk
    /// (on the recognizer's streaming-mode completion
    /// path).
    #[must_use]
    pub fn slice_from(&self, start: usize) -> Vec<u8> {
        let inner = self.inner.lock().unwrap();
        let start = start.min(inner.write_pos);
        inner.data[start..inner.write_pos].to_vec()
    }

    /// Copy out up to `len` bytes starting at `start`, clamped to
    /// `write_pos` — used by the streaming chunker to cut fixed-size
    /// pieces off the tail without disturbing `read_pos`.
    #[must_use]
    pub fn slice_len(&self, start: usize, len: usize) -> Vec<u8> {
        let inner = self.inner.lock().unwrap();
        let start = start.min(inner.write_pos);
        let end = (start + len).min(inner.write_pos);
        inner.data[start..end].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_full_read_round_trips() {
        let buf = AudioBuffer::new(16);
        buf.write(b"hello");
        let (outcome, data) = buf.read(5);
        assert_eq!(outcome, ReadOutcome::Full);
        assert_eq!(data, b"hello");
        assert_eq!(buf.available(), 0);
    }

    #[test]
    fn partial_read_advances_by_available_only() {
        let buf = AudioBuffer::new(16);
        buf.write(b"hi");
        let (outcome, data) = buf.read(5);
        assert_eq!(outcome, ReadOutcome::Partial(2));
        assert_eq!(data, b"hi");
    }

    #[test]
    fn empty_read_does_not_advance() {
        let buf = AudioBuffer::new(16);
        let (outcome, data) = buf.read(5);
        assert_eq!(outcome, ReadOutcome::Empty);
        assert!(data.is_empty());
    }

    #[test]
    fn overflow_write_is_dropped_not_truncated() {
        let buf = AudioBuffer::new(4);
        buf.write(b"12345");
        assert_eq!(buf.available(), 0);
    }

    #[test]
    fn skip_to_end_drains_without_copy() {
        let buf = AudioBuffer::new(16);
        buf.write(b"abcdef");
        buf.skip_to_end();
        assert_eq!(buf.available(), 0);
    }

    #[test]
    fn clear_resets_positions_and_complete_flag() {
        let buf = AudioBuffer::new(16);
        buf.write(b"abc");
        buf.mark_complete();
        buf.clear();
        assert_eq!(buf.available(), 0);
        assert!(!buf.is_complete());
    }

    #[test]
    fn invariant_read_pos_never_exceeds_write_pos() {
        let buf = AudioBuffer::new(8);
        buf.write(b"ab");
        let (_, _) = buf.read(10);
        assert_eq!(buf.available(), 0);
        let (outcome, _) = buf.read(1);
        assert_eq!(outcome, ReadOutcome::Empty);
    }
}
