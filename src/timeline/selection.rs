use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionChange {
    pub previous: Option<String>,
    pub current: Option<String>,
    pub generation: u64,
}

#[derive(Debug, Default)]
struct Shared {
    active: RwLock<Option<String>>,
    generation: AtomicU64,
    subscribers: Mutex<Vec<Sender<SelectionChange>>>,
}

/// Single active-block id shared by the map, time axis and text list of one preview.
///
/// Clones point at the same cell. Writes go through [`SelectionCoordinator::set_active`];
/// readers either call [`SelectionCoordinator::active`] each frame or subscribe.
#[derive(Debug, Clone, Default)]
pub struct SelectionCoordinator {
    shared: Arc<Shared>,
}

impl SelectionCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<String> {
        self.shared.active.read().clone()
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.shared.active.read().as_deref() == Some(id)
    }

    /// Bumped on every change; lets polling consumers skip redraws.
    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::Acquire)
    }

    /// Replaces the active id. Returns true when the value changed.
    pub fn set_active<S: Into<String>>(&self, id: Option<S>) -> bool {
        let next = id.map(Into::into).filter(|id| !id.is_empty());
        let change = {
            let mut active = self.shared.active.write();
            if *active == next {
                return false;
            }
            let previous = std::mem::replace(&mut *active, next.clone());
            let generation = self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1;
            SelectionChange {
                previous,
                current: next,
                generation,
            }
        };
        tracing::trace!(?change, "timeline selection changed");
        self.broadcast(change);
        true
    }

    pub fn clear(&self) -> bool {
        self.set_active::<String>(None)
    }

    pub fn hover_enter(&self, id: &str) -> bool {
        self.set_active(Some(id))
    }

    /// Clears the selection only if `id` is still the active one, so a leave
    /// that arrives after entering another block does not wipe it.
    pub fn hover_leave(&self, id: &str) -> bool {
        if !self.is_active(id) {
            return false;
        }
        self.clear()
    }

    pub fn subscribe(&self) -> Receiver<SelectionChange> {
        let (tx, rx) = unbounded();
        self.shared.subscribers.lock().push(tx);
        rx
    }

    fn broadcast(&self, change: SelectionChange) {
        let mut subscribers = self.shared.subscribers.lock();
        subscribers.retain(|tx| tx.send(change.clone()).is_ok());
    }
}
