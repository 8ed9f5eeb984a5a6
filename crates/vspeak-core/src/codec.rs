//! Negotiated audio codec descriptor. The core advertises LPCM at
//! 8 kHz and 16 kHz; the actual rate and frame size are obtained from the
//! host at request time via a codec-descriptor accessor.

/// 16-bit signed little-endian mono LPCM, described by sample rate and the
/// frame size the host's audio callbacks will read/write at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecDescriptor {
    /// Samples per second (8000 or 16000 in this design).
    pub sample_rate: u32,
    /// Bytes per audio frame (e.g. 320 for 20 ms @ 8 kHz, 16-bit mono).
    pub frame_size: usize,
}

impl CodecDescriptor {
    /// 20 ms frame at 8 kHz, 16-bit mono (320 bytes).
    #[must_use]
    pub const fn pcm_8k() -> Self {
        Self {
            sample_rate: 8_000,
            frame_size: 320,
        }
    }

    /// 20 ms frame at 16 kHz, 16-bit mono (640 bytes).
    #[must_use]
    pub const fn pcm_16k() -> Self {
        Self {
            sample_rate: 16_000,
            frame_size: 640,
        }
    }

    /// Bytes consumed by `ms` milliseconds of audio at this codec's rate
    /// (16-bit mono, so 2 bytes/sample).
    #[must_use]
    pub const fn bytes_for_millis(&self, ms: u32) -> usize {
        (self.sample_rate as usize / 1000) * ms as usize * 2
    }
}
