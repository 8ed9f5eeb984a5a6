//! Error taxonomy. These are the *kinds* the design calls out. `vspeak-ws`
//! and `vspeak-session` both use this one enum directly rather than
//! defining their own — there's no separate wire/transport error type that
//! needs converting at a crate boundary, just the one taxonomy the host
//! ultimately needs a cause from.

/// The stable set of failure kinds a completion cause or a `MethodFailed`
/// response can be attributed to.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// Invalid engine/channel parameter (e.g. a bogus port or path).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// TCP create/connect/send/recv failure.
    #[error("socket error: {0}")]
    Socket(String),

    /// The opening handshake did not report `101 Switching Protocols`.
    #[error("websocket handshake failed: {0}")]
    HandshakeFailed(String),

    /// An inbound frame declared a payload larger than `max_frame_size`.
    #[error("frame too large: {0} bytes")]
    FrameTooLarge(usize),

    /// A masked frame was missing its mask, or an unmasked frame arrived
    /// where one was required.
    #[error("mask protocol error")]
    MaskProtocolError,

    /// The peer closed or truncated the connection mid-frame.
    #[error("short read decoding frame")]
    ShortRead,

    /// An inbound payload did not fit in the audio buffer; it was dropped.
    #[error("audio buffer overflow, payload dropped")]
    BufferOverflow,

    /// A no-input timer fired before any speech was detected.
    #[error("no-input timeout")]
    NoInputTimeout,

    /// A session-level wall-clock budget (`MAX_SPEAK_DURATION`,
    /// `MAX_RECOGNIZE_DURATION`) elapsed before completion.
    #[error("maximum duration exceeded")]
    MaxDurationExceeded,

    /// All configured reconnection attempts were exhausted.
    #[error("all retries exhausted")]
    AllRetriesExhausted,

    /// A completion or response was about to be emitted twice for the same
    /// request. Never expected to occur; kept as a debug-time assertion
    /// trip-wire rather than a silently-swallowed condition.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl CoreError {
    /// Best-effort classification used by sessions deciding whether a
    /// failure should surface as `MethodFailed` (no completion sent yet) or
    /// as a completion event with a specific cause.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Socket(_) | Self::HandshakeFailed(_))
    }
}
