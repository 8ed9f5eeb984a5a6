//! The MRCP synthesizer/recognizer resource-engine pair (§6.1).
//!
//! `vspeak-core` describes the host plugin contract and domain types,
//! `vspeak-ws` speaks RFC 6455, and `vspeak-session` owns the per-channel
//! state machines. This crate is the composition root: it turns engine-level
//! parameters into a running [`synth_engine::SynthEngine`] or
//! [`recog_engine::RecogEngine`], each holding one background task and one
//! channel registry, and supplies the two ambient adapters the session
//! layer treats as black boxes — a default voice-activity detector and
//! process-level logging.
//!
//! The MRCP message codec, transport, and SIP/RTSP signalling stack are out
//! of scope; a real plugin binary links this crate and adapts its
//! `ChannelHost`/`EngineHost` implementations to whatever host SDK is
//! actually present.

#![deny(unsafe_code)]

pub mod detector;
pub mod engine;
pub mod logging;
pub mod params;
pub mod recog_engine;
pub mod registry;
pub mod synth_engine;

pub use detector::EnergyDetector;
pub use params::EngineParams;
pub use recog_engine::RecogEngine;
pub use synth_engine::SynthEngine;
