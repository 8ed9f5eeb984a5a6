//! The host plugin contract, expressed as traits.
//!
//! Everything in this module describes an *external collaborator*: the
//! MRCP message codec, the transport stack, and the media pipeline are all
//! out of scope and are represented here only by the narrow interface the
//! session state machines need from them. A concrete adapter (the
//! `vspeak-plugin` crate) implements these traits against whatever host SDK
//! is actually linked in; tests implement them with simple recorders.

use crate::completion::CompletionCause;

/// Opaque identifier for a channel (one per MRCP resource session).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub u64);

/// Engine-level capability set: `open`/`close` are answered
/// asynchronously via these two callbacks, mirroring
/// `open_respond(engine, ok)` / `close_respond(engine)` in the host SDK.
pub trait EngineHost: Send + Sync {
    /// Answer a pending engine `open` request.
    fn open_respond(&self, ok: bool);
    /// Answer a pending engine `close` request.
    fn close_respond(&self);
}

/// Channel-level capability set. A response or event is dispatched
/// via `message_send`; each request the host passed to `process_request`
/// MUST eventually produce exactly one response message, with subsequent
/// events (`START-OF-INPUT`, `SPEAK-COMPLETE`, `RECOGNITION-COMPLETE`) sent
/// as separate `message_send` calls.
pub trait ChannelHost: Send + Sync {
    /// Answer a pending channel `open` request.
    fn open_respond(&self, ok: bool);
    /// Answer a pending channel `close` request.
    fn close_respond(&self);
    /// Dispatch a response or an out-of-band event to the MRCP client.
    fn message_send(&self, msg: HostMessage);
}

/// Every message a session can hand the host via `message_send`.
///
/// This intentionally does not model MRCP wire syntax (headers, request
/// lines) — that is the codec's job, out of scope here. It models
/// exactly the distinctions the session state machines make.
#[derive(Debug, Clone, PartialEq)]
pub enum HostMessage {
    /// Immediate synchronous success response (`SET-PARAMS`, `GET-PARAMS`,
    /// `PAUSE`, `RESUME`, `START-INPUT-TIMERS`, the flushed `STOP`
    /// response).
    Complete,
    /// A request could not be started at all; no completion will follow.
    MethodFailed {
        /// Human-readable reason, surfaced for logging/introspection only.
        reason: String,
    },
    /// `SPEAK` accepted and is now in progress.
    SpeakInProgress,
    /// `RECOGNIZE` accepted and is now in progress.
    RecognizeInProgress,
    /// Recognizer detected the start of user speech.
    StartOfInput,
    /// Terminal synthesis event; sent exactly once per accepted `SPEAK`.
    SpeakComplete { cause: CompletionCause },
    /// Terminal recognition event; sent exactly once per accepted
    /// `RECOGNIZE`. `body`/`content_type` are populated only on success.
    RecognitionComplete {
        cause: CompletionCause,
        body: Option<String>,
        content_type: Option<&'static str>,
    },
}

/// Synthesizer request dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum SynthRequest {
    /// Parameters are accepted for log/introspection only in this design
    /// (Open Question: `SET-PARAMS` does not flow into the next
    /// `SPEAK`, whose envelope is built from headers on the request
    /// itself).
    SetParams { voice: Option<String>, speed: Option<f32>, pitch: Option<f32>, volume: Option<f32> },
    GetParams,
    Speak {
        text: String,
        voice: Option<String>,
        speed: Option<f32>,
        pitch: Option<f32>,
        volume: Option<f32>,
        session_id: Option<String>,
    },
    Stop,
    BargeIn,
    Pause,
    Resume,
}

/// Recognizer request dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum RecogRequest {
    Recognize {
        start_input_timers: bool,
        no_input_timeout_ms: Option<u32>,
        speech_complete_timeout_ms: Option<u32>,
    },
    Stop,
    StartInputTimers,
    SetParams,
    GetParams,
    DefineGrammar,
}
