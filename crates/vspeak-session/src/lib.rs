//! Session state machines, the audio ring buffer, the TTS wire envelope,
//! and the background task loop they all run on (§3).
//!
//! `vspeak-core` describes the shapes that cross the host/task/socket
//! boundaries; `vspeak-ws` speaks the wire protocol; this crate is where
//! the two meet the actual synthesizer/recognizer behaviour.

#![deny(unsafe_code)]

pub mod buffer;
pub mod recog;
pub mod synth;
pub mod task;
pub mod wire;

pub use buffer::{AudioBuffer, ReadOutcome};
pub use recog::RecogSession;
pub use synth::SynthSession;
pub use task::{Envelope, Task, TaskHandler, TaskMessage, TaskSender};
pub use wire::TtsRequest;
