use std::sync::{Arc, Mutex};

use interlinear::kernel::registry::{OwnerId, PlaybackRegistry, PrimaryAudio};
use uuid::Uuid;

struct FakeOwner {
    id: OwnerId,
    preempted_by: Mutex<Vec<OwnerId>>,
}

impl FakeOwner {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            preempted_by: Mutex::new(Vec::new()),
        })
    }

    fn preemptions(&self) -> Vec<OwnerId> {
        self.preempted_by.lock().unwrap().clone()
    }
}

impl PrimaryAudio for FakeOwner {
    fn owner_id(&self) -> OwnerId {
        self.id
    }

    fn preempt(&self, by: OwnerId) {
        self.preempted_by.lock().unwrap().push(by);
    }
}

#[test]
fn test_new_owner_preempts_previous() {
    let registry = PlaybackRegistry::new();
    let first = FakeOwner::new();
    let second = FakeOwner::new();

    assert_eq!(registry.begin_playback(first.clone()), None);
    assert_eq!(registry.begin_playback(second.clone()), Some(first.id));

    assert_eq!(first.preemptions(), vec![second.id]);
    assert!(second.preemptions().is_empty());
    assert_eq!(registry.current_owner(), Some(second.id));
}

#[test]
fn test_reregistering_same_owner_is_not_a_preemption() {
    let registry = PlaybackRegistry::new();
    let owner = FakeOwner::new();

    registry.begin_playback(owner.clone());
    assert_eq!(registry.begin_playback(owner.clone()), None);
    assert!(owner.preemptions().is_empty());
}

#[test]
fn test_late_end_from_evicted_owner_is_ignored() {
    let registry = PlaybackRegistry::new();
    let first = FakeOwner::new();
    let second = FakeOwner::new();
    registry.begin_playback(first.clone());
    registry.begin_playback(second.clone());

    assert!(!registry.end_playback(first.id));
    assert_eq!(registry.current_owner(), Some(second.id));

    assert!(registry.end_playback(second.id));
    assert_eq!(registry.current_owner(), None);
}

#[test]
fn test_clones_share_the_slot_across_threads() {
    let registry = PlaybackRegistry::new();
    let owners: Vec<Arc<FakeOwner>> = (0..8).map(|_| FakeOwner::new()).collect();

    let handles: Vec<_> = owners
        .iter()
        .cloned()
        .map(|owner| {
            let registry = registry.clone();
            std::thread::spawn(move || {
                registry.begin_playback(owner);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // Exactly one owner holds the slot; every other one was told to yield.
    let current = registry.current_owner().unwrap();
    let preempted: usize = owners.iter().map(|o| o.preemptions().len()).sum();
    assert_eq!(preempted, owners.len() - 1);
    assert!(owners.iter().any(|o| o.id == current && o.preemptions().is_empty()));
}
