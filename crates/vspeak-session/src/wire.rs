//! Outbound TTS request envelope. A plain `#[derive(Serialize)]`
//! struct, same as the rest of this workspace's JSON payloads — `serde_json`
//! already produces the exact escaping the design calls for (`"`, `\`,
//! the usual short escapes, and `\u00xx` lowercase-hex for any other
//! control byte), so there is no reason to hand-roll it.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct TtsRequest<'a> {
    pub action: &'static str,
    pub text: &'a str,
    pub voice: &'a str,
    pub speed: f32,
    pub pitch: f32,
    pub volume: f32,
    pub sample_rate: u32,
    pub format: &'static str,
    pub session_id: &'a str,
}

impl<'a> TtsRequest<'a> {
    #[must_use]
    pub fn new(text: &'a str, sample_rate: u32, session_id: &'a str) -> Self {
        Self {
            action: "tts",
            text,
            voice: "default",
            speed: 1.0,
            pitch: 1.0,
            volume: 1.0,
            sample_rate,
            format: "pcm",
            session_id,
        }
    }

    #[must_use]
    pub fn with_voice(mut self, voice: Option<&'a str>) -> Self {
        if let Some(v) = voice {
            self.voice = v;
        }
        self
    }

    #[must_use]
    pub fn with_speed(mut self, speed: Option<f32>) -> Self {
        if let Some(v) = speed {
            self.speed = v;
        }
        self
    }

    #[must_use]
    pub fn with_pitch(mut self, pitch: Option<f32>) -> Self {
        if let Some(v) = pitch {
            self.pitch = v;
        }
        self
    }

    #[must_use]
    pub fn with_volume(mut self, volume: Option<f32>) -> Self {
        if let Some(v) = volume {
            self.volume = v;
        }
        self
    }

    /// Minified JSON ("UTF-8 JSON, minified").
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("TtsRequest always serializes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_matches_literal_envelope() {
        let req = TtsRequest::new("hi", 8000, "sid-1");
        let json = req.to_json();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["action"], "tts");
        assert_eq!(value["text"], "hi");
        assert_eq!(value["voice"], "default");
        assert_eq!(value["speed"], 1.0);
        assert_eq!(value["pitch"], 1.0);
        assert_eq!(value["volume"], 1.0);
        assert_eq!(value["sample_rate"], 8000);
        assert_eq!(value["format"], "pcm");
        assert_eq!(value["session_id"], "sid-1");
    }

    #[test]
    fn json_hostile_text_escapes_and_round_trips() {
        let text = "\"\\\n";
        let req = TtsRequest::new(text, 8000, "");
        let json = req.to_json();
        assert!(json.contains(r#""text":"\"\\\n""#));
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["text"], text);
    }

    #[test]
    fn control_bytes_escape_as_lowercase_u00xx() {
        let text = "\u{0001}";
        let req = TtsRequest::new(text, 8000, "");
        let json = req.to_json();
        assert!(json.contains("\\u0001"));
    }
}
