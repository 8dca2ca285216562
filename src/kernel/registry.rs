use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

pub type OwnerId = Uuid;

/// A source of primary audio that can be told to yield.
pub trait PrimaryAudio: Send + Sync {
    fn owner_id(&self) -> OwnerId;

    /// A newer owner took the slot. Called outside the registry lock.
    fn preempt(&self, by: OwnerId);
}

struct Registration {
    id: OwnerId,
    owner: Arc<dyn PrimaryAudio>,
}

/// Single owner of primary audio per process.
///
/// Passed explicitly to every playback session; clones share the slot.
/// Engine callbacks may land on another thread than navigation calls, so
/// the read-modify-write of the slot happens under a mutex. Ambient audio
/// (reading bed) never registers here.
#[derive(Clone, Default)]
pub struct PlaybackRegistry {
    slot: Arc<Mutex<Option<Registration>>>,
}

impl PlaybackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Registration>> {
        // A panicking holder cannot leave the slot half-written.
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Install `owner`, pausing whoever held the slot before.
    /// Returns the preempted owner, if any.
    pub fn begin_playback(&self, owner: Arc<dyn PrimaryAudio>) -> Option<OwnerId> {
        let id = owner.owner_id();
        let previous = self.lock().replace(Registration { id, owner });

        match previous {
            Some(prev) if prev.id != id => {
                info!("Primary audio {} preempted by {}", prev.id, id);
                prev.owner.preempt(id);
                Some(prev.id)
            }
            _ => None,
        }
    }

    /// Clear the slot only if `id` still owns it; late calls from an
    /// evicted owner are ignored.
    pub fn end_playback(&self, id: OwnerId) -> bool {
        let mut slot = self.lock();
        match slot.as_ref() {
            Some(current) if current.id == id => {
                *slot = None;
                true
            }
            _ => {
                debug!("Ignoring end_playback from non-owner {}", id);
                false
            }
        }
    }

    pub fn current_owner(&self) -> Option<OwnerId> {
        self.lock().as_ref().map(|r| r.id)
    }
}
