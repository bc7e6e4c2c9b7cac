//! [`PoseDirectory`] – shared map of entity identifier → world pose.
//!
//! An external pose feed writes to the directory at its own cadence while
//! the detection cycle reads it once per tick.  The map is kept behind an
//! `Arc` and swapped copy-on-write: [`PoseDirectory::snapshot`] only clones
//! the `Arc`, so a reader holds an immutable, internally consistent view
//! that no later `replace`/`merge`/`remove` can alter.  The lock is held
//! just long enough to swap or clone that pointer.
//!
//! Entries are ordered by identifier, so iterating a snapshot is
//! reproducible.

use std::collections::BTreeMap;
use std::sync::Arc;

use logicam_perception::Pose3;
use parking_lot::RwLock;
use tracing::trace;

type EntityMap = BTreeMap<String, Pose3>;

#[derive(Debug, Default)]
struct DirectoryState {
    entries: Arc<EntityMap>,
    generation: u64,
}

/// Thread-safe, cloneable handle to the tracked entity set.  All clones
/// share the same underlying directory.
#[derive(Debug, Clone, Default)]
pub struct PoseDirectory {
    state: Arc<RwLock<DirectoryState>>,
}

impl PoseDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically swap in a complete new entity set.
    pub fn replace<I, K>(&self, mapping: I)
    where
        I: IntoIterator<Item = (K, Pose3)>,
        K: Into<String>,
    {
        let entries: EntityMap = mapping.into_iter().map(|(k, v)| (k.into(), v)).collect();
        let count = entries.len();
        let mut state = self.state.write();
        state.entries = Arc::new(entries);
        state.generation += 1;
        trace!(entities = count, generation = state.generation, "pose directory replaced");
    }

    /// Insert or overwrite the given entries, keeping all others.
    pub fn merge<I, K>(&self, updates: I)
    where
        I: IntoIterator<Item = (K, Pose3)>,
        K: Into<String>,
    {
        let updates: Vec<(String, Pose3)> =
            updates.into_iter().map(|(k, v)| (k.into(), v)).collect();
        if updates.is_empty() {
            return;
        }
        let mut state = self.state.write();
        Arc::make_mut(&mut state.entries).extend(updates);
        state.generation += 1;
    }

    /// Remove one entity, returning its last pose.
    pub fn remove(&self, id: &str) -> Option<Pose3> {
        let mut state = self.state.write();
        if !state.entries.contains_key(id) {
            return None;
        }
        let removed = Arc::make_mut(&mut state.entries).remove(id);
        state.generation += 1;
        removed
    }

    /// An isolated view of the directory at this instant.
    pub fn snapshot(&self) -> PoseSnapshot {
        let state = self.state.read();
        PoseSnapshot {
            entries: Arc::clone(&state.entries),
            generation: state.generation,
        }
    }

    pub fn get(&self, id: &str) -> Option<Pose3> {
        self.state.read().entries.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state.read().entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Incremented by every mutation; equal generations mean equal content.
    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }
}

/// Immutable view returned by [`PoseDirectory::snapshot`].
#[derive(Debug, Clone)]
pub struct PoseSnapshot {
    entries: Arc<EntityMap>,
    generation: u64,
}

impl PoseSnapshot {
    /// Entries in ascending identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Pose3)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, id: &str) -> Option<&Pose3> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}
