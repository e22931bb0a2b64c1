//! Process-wide store of last committed view snapshots.
//!
//! Each view owns one slot keyed by its name. A slot outlives the view's
//! mount, so navigating away and back starts from the last known data
//! instead of a loading state. The store starts empty, fills on the first
//! successful commit per view and is never torn down during a session;
//! tests inject a fresh one or call [`ViewStore::reset`].

use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub type SharedViewStore = Arc<ViewStore>;

/// What a view last committed: the snapshot plus the coalesced payloads it
/// was built from (used to detect "unchanged" on the next round).
#[derive(Clone, Debug)]
pub struct CachedView<S> {
    pub snapshot: S,
    pub payloads: Vec<Arc<Value>>,
}

#[derive(Default)]
pub struct ViewStore {
    slots: Mutex<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl ViewStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the slot for `view`, if it holds a snapshot of type `S`
    pub fn load<S>(&self, view: &str) -> Option<CachedView<S>>
    where
        S: Clone + Send + Sync + 'static,
    {
        let slot = self
            .slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(view)
            .cloned()?;
        slot.downcast_ref::<CachedView<S>>().cloned()
    }

    /// Replace the slot for `view`
    pub fn save<S>(&self, view: &str, cached: CachedView<S>)
    where
        S: Clone + Send + Sync + 'static,
    {
        self.slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(view.to_string(), Arc::new(cached));
    }

    pub fn contains(&self, view: &str) -> bool {
        self.slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(view)
    }

    /// Drop every slot
    pub fn reset(&self) {
        self.slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}
