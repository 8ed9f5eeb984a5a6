//! Voice-activity detector contract ("treated as a black-box detector
//! with three event outputs"). The detector's internals are out of scope;
//! `RecogSession` only needs to feed it frames and react to the three
//! events it can produce.

/// The three events a detector can emit for a given audio frame, per the
/// table in §4.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorEvent {
    /// First edge of speech in an utterance.
    Activity,
    /// End of utterance (speech followed by enough silence).
    Inactivity,
    /// The no-input timer elapsed before any speech was observed.
    NoInput,
}

/// Black-box voice-activity detector. `vspeak-session` depends only on this
/// trait; a concrete neural or energy-based implementation is an adapter
/// detail, same as the host media/transport stacks.
pub trait ActivityDetector: Send {
    /// Feed one frame of sink-stream audio (raw bytes, sink codec's native
    /// format) and get back at most one event.
    fn process_frame(&mut self, frame: &[u8]) -> Option<DetectorEvent>;

    /// Start the no-input timer (`START-INPUT-TIMERS`, or implicitly on
    /// `RECOGNIZE` when `Start-Input-Timers: true`).
    fn start_input_timers(&mut self, no_input_timeout_ms: u32);

    /// Push a `Speech-Complete-Timeout` header value (`RECOGNIZE`
    /// headers) into the detector's end-of-utterance logic. Default no-op
    /// so a detector that doesn't distinguish this from its built-in
    /// silence threshold doesn't have to implement it.
    fn set_speech_complete_timeout(&mut self, _speech_complete_timeout_ms: u32) {}

    /// Reset all internal state (new `RECOGNIZE`, or `STOP`).
    fn reset(&mut self);
}
