//! Completion causes (§7) — the enumeration every `SPEAK-COMPLETE` and
//! `RECOGNITION-COMPLETE` event carries exactly one of.

use serde::{Deserialize, Serialize};

/// Why a request reached its terminal state.
///
/// Only a subset is meaningful per resource: synthesis only ever reports
/// `Normal` or `Error`; recognition additionally reports `NoInputTimeout`
/// and, in principle, `TooMuchSpeech` (not triggered by this design, kept
/// for parity with the MRCP completion-cause registry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionCause {
    /// The request ran to completion without incident.
    Normal,
    /// A socket, protocol, or timeout failure terminated the request.
    Error,
    /// A recognizer's no-input timer fired before speech was detected.
    NoInputTimeout,
    /// Reserved for parity with the MRCP cause registry; this design does
    /// not itself ever compute a "too much speech" condition.
    TooMuchSpeech,
}

impl CompletionCause {
    /// Whether the request should be considered to have produced usable
    /// output (`Normal`) as opposed to having been aborted.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Normal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        for cause in [
            CompletionCause::Normal,
            CompletionCause::Error,
            CompletionCause::NoInputTimeout,
            CompletionCause::TooMuchSpeech,
        ] {
            let json = serde_json::to_string(&cause).unwrap();
            assert_eq!(serde_json::from_str::<CompletionCause>(&json).unwrap(), cause);
        }
    }
}
