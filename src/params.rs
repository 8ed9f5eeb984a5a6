//! Engine-level configuration surface: the string key/value
//! parameters a plugin binary reads from the (out-of-scope, §1) XML
//! configuration loader and hands to `create_channel`. `ConfigError`
//! surfaces at that point as a failed construction.

use std::collections::HashMap;

use vspeak_core::{AudioBufferConfig, CoreError, WsConfig};

/// Parsed and validated engine parameters for one resource (synthesizer or
/// recognizer). `ws.path` and `audio.capacity` start from resource-specific
/// defaults before `ws-path` / `max-audio-size` overrides apply.
#[derive(Debug, Clone)]
pub struct EngineParams {
    pub ws: WsConfig,
    pub audio: AudioBufferConfig,
    /// `streaming`: recognizer-only, ignored by the synthesizer.
    pub streaming: bool,
}

impl EngineParams {
    /// Defaults for the synthesizer resource: `ws-path` = `/tts`,
    /// `max-audio-size` default 2 MiB.
    #[must_use]
    pub fn synth_defaults() -> Self {
        Self {
            ws: WsConfig {
                path: "/tts".to_string(),
                ..WsConfig::default()
            },
            audio: AudioBufferConfig::synth_default(),
            streaming: false,
        }
    }

    /// Defaults for the recognizer resource: `ws-path` = `/asr`,
    /// `max-audio-size` default 512 KiB.
    #[must_use]
    pub fn recog_defaults() -> Self {
        Self {
            ws: WsConfig {
                path: "/asr".to_string(),
                ..WsConfig::default()
            },
            audio: AudioBufferConfig::recog_default(),
            streaming: false,
        }
    }

    /// Apply a `key -> value` parameter map over these defaults.
    /// Unrecognised keys are ignored, matching `WsConfig::apply_param`'s
    /// own policy; `streaming` is the one key this type interprets itself
    /// since it isn't part of `WsConfig`/`AudioBufferConfig`.
    pub fn apply(mut self, raw: &HashMap<String, String>) -> Result<Self, CoreError> {
        for (key, value) in raw {
            match key.as_str() {
                "streaming" => self.streaming = value.eq_ignore_ascii_case("true"),
                "max-audio-size" => {
                    let bytes: usize = value
                    .parse()
                    .map_err(|_| CoreError::Config(format!("invalid max-audio-size: {value}")))?;
                    self.audio.apply_max_audio_size(bytes)?;
                }
                _ => self.ws.apply_param(key, value)?,
            }
        }
        Ok(self)
    }
}
