//! Shared engine-level bookkeeping used by both
//! [`crate::synth_engine::SynthEngine`] and
//! [`crate::recog_engine::RecogEngine`] (`create_channel(engine,
//! pool) -> channel`).

use std::sync::atomic::{AtomicU64, Ordering};

use vspeak_core::ChannelId;

/// Mints a fresh [`ChannelId`] per `create_channel` call. One per engine;
/// channel ids are never reused within a process lifetime, which keeps a
/// stale task message that targets an already-destroyed channel from ever
/// being misrouted to a newer channel that happens to reuse the same id.
#[derive(Default)]
pub struct ChannelIdAllocator {
    next: AtomicU64,
}

impl ChannelIdAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> ChannelId {
        ChannelId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_strictly_increasing_and_never_reused() {
        let alloc = ChannelIdAllocator::new();
        let a = alloc.next();
        let b = alloc.next();
        let c = alloc.next();
        assert!(a < b && b < c);
    }
}
