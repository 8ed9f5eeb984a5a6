//! A default [`ActivityDetector`] adapter ("Voice-activity detection
//! internals [are] treated as a black-box detector with three event
//! outputs" — out of scope for the core, but a running engine still needs
//! *some* concrete detector to instantiate a [`RecogSession`](vspeak_session::RecogSession)
//! with). This is the same fallback strategy the voice pipeline this
//! workspace grew out of uses when no neural VAD model is loaded: simple
//! RMS energy thresholding over 16-bit mono LPCM, with a state machine of
//! `Listening -> SpeechDetected -> SilenceAfterSpeech -> Listening`.
//!
//! A deployment that wants a neural VAD swaps this out for its own
//! `ActivityDetector` implementation; nothing in `vspeak-session` depends
//! on this type by name.

use std::time::{Duration, Instant};

use vspeak_core::{ActivityDetector, DetectorEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    Listening,
    SpeechDetected,
    SilenceAfterSpeech,
}

/// RMS-threshold voice-activity detector over 16-bit signed LE mono LPCM.
pub struct EnergyDetector {
    /// RMS amplitude (0..=32767-ish) above which a frame counts as speech.
    threshold: f32,
    min_silence: Duration,
    state: GateState,
    silence_since: Option<Instant>,
    no_input_deadline: Option<Instant>,
    speech_started: bool,
}

impl EnergyDetector {
    /// `threshold` is an RMS amplitude on the 16-bit PCM scale; 400-800 is
    /// a reasonable range for a quiet room over a phone-quality capture.
    #[must_use]
    pub fn new(threshold: f32, min_silence: Duration) -> Self {
        Self {
            threshold,
            min_silence,
            state: GateState::Listening,
            silence_since: None,
            no_input_deadline: None,
            speech_started: false,
        }
    }

    fn rms(frame: &[u8]) -> f32 {
        if frame.len() < 2 {
            return 0.0;
        }
        let samples = frame.chunks_exact(2).map(|b| i16::from_le_bytes([b[0], b[1]]) as f64);
        let mut sum_sq = 0.0f64;
        let mut count = 0u64;
        for s in samples {
            sum_sq += s * s;
            count += 1;
        }
        if count == 0 {
            return 0.0;
        }
        (sum_sq / count as f64).sqrt() as f32
    }
}

impl Default for EnergyDetector {
    fn default() -> Self {
        Self::new(500.0, Duration::from_millis(700))
    }
}

impl ActivityDetector for EnergyDetector {
    fn process_frame(&mut self, frame: &[u8]) -> Option<DetectorEvent> {
        let now = Instant::now();

        if let Some(deadline) = self.no_input_deadline {
            if !self.speech_started && now >= deadline {
                self.no_input_deadline = None;
                return Some(DetectorEvent::NoInput);
            }
        }

        let loud = Self::rms(frame) >= self.threshold;

        match self.state {
            GateState::Listening => {
                if loud {
                    self.state = GateState::SpeechDetected;
                    self.speech_started = true;
                    self.no_input_deadline = None;
                    return Some(DetectorEvent::Activity);
                }
                None
            }
            GateState::SpeechDetected => {
                if !loud {
                    self.state = GateState::SilenceAfterSpeech;
                    self.silence_since = Some(now);
                }
                None
            }
            GateState::SilenceAfterSpeech => {
                if loud {
                    self.state = GateState::SpeechDetected;
                    self.silence_since = None;
                    return None;
                }
                let since = self.silence_since.unwrap_or(now);
                if now.duration_since(since) >= self.min_silence {
                    self.state = GateState::Listening;
                    self.silence_since = None;
                    return Some(DetectorEvent::Inactivity);
                }
                None
            }
        }
    }

    fn start_input_timers(&mut self, no_input_timeout_ms: u32) {
        self.no_input_deadline = Some(Instant::now() + Duration::from_millis(u64::from(no_input_timeout_ms)));
    }

    fn set_speech_complete_timeout(&mut self, speech_complete_timeout_ms: u32) {
        self.min_silence = Duration::from_millis(u64::from(speech_complete_timeout_ms));
    }

    fn reset(&mut self) {
        self.state = GateState::Listening;
        self.silence_since = None;
        self.no_input_deadline = None;
        self.speech_started = false;
    }
}
