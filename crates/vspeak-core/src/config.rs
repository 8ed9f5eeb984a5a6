//! Configuration surfaces (`WsConfig`, §6.3 engine parameters).

use std::time::Duration;

use crate::error::CoreError;

/// Hard ceiling on audio buffer capacity regardless of what a channel asks
/// for.
pub const MAX_AUDIO_BUFFER_BYTES: usize = 50 * 1024 * 1024;

/// Default capacity for a synthesizer's audio buffer.
pub const DEFAULT_SYNTH_AUDIO_BUFFER_BYTES: usize = 2 * 1024 * 1024;

/// Default capacity for a recognizer's audio buffer.
pub const DEFAULT_RECOG_AUDIO_BUFFER_BYTES: usize = 512 * 1024;

/// WebSocket client configuration (`WsConfig`). Every field has a
/// documented default so engine parameters can override only what
/// they care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsConfig {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub connect_timeout: Duration,
    pub recv_poll_timeout: Duration,
    pub send_timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub max_frame_size: usize,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
            path: "/".to_string(),
            connect_timeout: Duration::from_secs(30),
            recv_poll_timeout: Duration::from_millis(100),
            send_timeout: Duration::from_secs(10),
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            max_frame_size: 1024 * 1024,
        }
    }
}

impl WsConfig {
    /// Apply an engine-level `ws-host` / `ws-port` / `ws-path` parameter
    ///. Unknown keys are ignored by the caller; this only validates
    /// the handful the core recognises.
    pub fn apply_param(&mut self, key: &str, value: &str) -> Result<(), CoreError> {
        match key {
            "ws-host" => {
                if value.is_empty() {
                    return Err(CoreError::Config("ws-host must not be empty".into()));
                }
                self.host = value.to_string();
            }
            "ws-port" => {
                self.port = value
                .parse()
                .map_err(|_| CoreError::Config(format!("invalid ws-port: {value}")))?;
            }
            "ws-path" => {
                if !value.starts_with('/') {
                    return Err(CoreError::Config(format!(
                                "ws-path must start with '/': {value}"
                    )));
                }
                self.path = value.to_string();
            }
            _ => {}
        }
        Ok(())
    }
}

/// Per-resource audio buffer sizing (§6.3 `max-audio-size`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioBufferConfig {
    pub capacity: usize,
}

impl AudioBufferConfig {
    #[must_use]
    pub const fn synth_default() -> Self {
        Self {
            capacity: DEFAULT_SYNTH_AUDIO_BUFFER_BYTES,
        }
    }

    #[must_use]
    pub const fn recog_default() -> Self {
        Self {
            capacity: DEFAULT_RECOG_AUDIO_BUFFER_BYTES,
        }
    }

    /// Apply a `max-audio-size` engine parameter, clamped to the hard
    /// ceiling.
    pub fn apply_max_audio_size(&mut self, bytes: usize) -> Result<(), CoreError> {
        if bytes == 0 {
            return Err(CoreError::Config("max-audio-size must be > 0".into()));
        }
        self.capacity = bytes.min(MAX_AUDIO_BUFFER_BYTES);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = WsConfig::default();
        assert_eq!(cfg.host, "localhost");
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.path, "/");
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.max_frame_size, 1024 * 1024);
    }

    #[test]
    fn max_audio_size_is_clamped_to_hard_ceiling() {
        let mut cfg = AudioBufferConfig::synth_default();
        cfg.apply_max_audio_size(200 * 1024 * 1024).unwrap();
        assert_eq!(cfg.capacity, MAX_AUDIO_BUFFER_BYTES);
    }

    #[test]
    fn ws_port_rejects_non_numeric() {
        let mut cfg = WsConfig::default();
        assert!(cfg.apply_param("ws-port", "not-a-port").is_err());
    }
}
