//! Handle arena
//!
//! Storage for the remote objects of one secure unit. Deallocation is two
//! explicit steps: [`HandleArena::release`] queues an object and
//! [`HandleArena::reclaim`] frees everything queued. Nothing is freed
//! implicitly when a handle goes out of scope.

use dashmap::mapref::one::Ref;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use vfl_types::{ObjectId, ObjectRef, UnitError, UnitId, UnitResult};

/// Remote objects owned by one unit, keyed by slot
pub struct HandleArena<T> {
    unit: UnitId,
    next: AtomicU64,
    live: DashMap<ObjectId, T>,
    pending: DashMap<ObjectId, T>,
}

impl<T> HandleArena<T> {
    pub fn new(unit: UnitId) -> Self {
        Self {
            unit,
            next: AtomicU64::new(1),
            live: DashMap::new(),
            pending: DashMap::new(),
        }
    }

    pub fn unit(&self) -> UnitId {
        self.unit
    }

    /// Store an object and mint its reference
    pub fn insert(&self, object: T) -> ObjectRef {
        let id = ObjectId(self.next.fetch_add(1, Ordering::Relaxed));
        self.live.insert(id, object);
        ObjectRef::new(self.unit, id)
    }

    /// Borrow a live object
    pub fn get(&self, object: &ObjectRef) -> UnitResult<Ref<'_, ObjectId, T>> {
        if object.unit != self.unit {
            return Err(UnitError::StaleHandle(*object));
        }
        self.live
            .get(&object.object)
            .ok_or(UnitError::UnknownObject(*object))
    }

    /// Queue an object for deallocation.
    ///
    /// Unknown, foreign, or already released references are logged and
    /// ignored, so release can be repeated.
    pub fn release(&self, object: ObjectRef) -> bool {
        if object.unit != self.unit {
            tracing::warn!(object = %object, "Ignoring release of a foreign object");
            return false;
        }
        match self.live.remove(&object.object) {
            Some((id, value)) => {
                self.pending.insert(id, value);
                tracing::trace!(object = %object, "Object queued for reclaim");
                true
            }
            None => {
                tracing::debug!(object = %object, "Release of unknown or released object ignored");
                false
            }
        }
    }

    /// Free every queued object, returning how many were freed
    pub fn reclaim(&self) -> usize {
        let ids: Vec<ObjectId> = self.pending.iter().map(|e| *e.key()).collect();
        let mut freed = 0;
        for id in ids {
            if self.pending.remove(&id).is_some() {
                freed += 1;
            }
        }
        freed
    }

    /// Objects still reachable through a handle
    pub fn live(&self) -> usize {
        self.live.len()
    }

    /// Objects released but not yet reclaimed
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Drop everything, returning how many objects were still live
    pub fn clear(&self) -> usize {
        let leaked = self.live.len();
        self.live.clear();
        self.pending.clear();
        leaked
    }
}
