//! The map from [`ChannelId`] to a live session that every engine keeps
//! ("the channel is co-owned with the host"). Shared by
//! [`crate::synth_engine`] and [`crate::recog_engine`] so both engines get
//! the same insert/lookup/remove discipline under one lock.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use vspeak_core::ChannelId;

/// Thread-safe `ChannelId -> Arc<Session>` table.
///
/// A background-task message whose channel has already been destroyed
/// finds nothing here and is silently dropped — the session it would have
/// acted on no longer exists to receive it.
pub struct ChannelRegistry<S> {
    inner: RwLock<HashMap<ChannelId, Arc<S>>>,
}

impl<S> Default for ChannelRegistry<S> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<S> ChannelRegistry<S> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, channel: ChannelId, session: Arc<S>) {
        self.inner.write().unwrap().insert(channel, session);
    }

    #[must_use]
    pub fn get(&self, channel: ChannelId) -> Option<Arc<S>> {
        self.inner.read().unwrap().get(&channel).cloned()
    }

    /// `destroy(channel)`: drop the engine's reference. Any task
    /// message already queued for this channel becomes a silent no-op.
    pub fn remove(&self, channel: ChannelId) -> Option<Arc<S>> {
        self.inner.write().unwrap().remove(&channel)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
