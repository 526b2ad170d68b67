//! Per-shard set of entity ids.
//!
//! Ids are stored unboxed in an open-addressing table (`hashbrown`'s SwissTable),
//! which doubles its capacity once the load threshold is exceeded. A single shard can
//! hold millions of ids, so nothing here allocates per element.
//!
//! The table sits behind a [`parking_lot::Mutex`]. The owning shard is the only writer;
//! the aggregator takes the same lock for the duration of one read pass. Scrapes are rare
//! compared to gateway events, so the writer almost never contends.

use crate::events::EntityId;
use hashbrown::HashSet;
use parking_lot::Mutex;

/// The ids a single shard currently knows about.
#[derive(Debug, Default)]
pub struct ShardLocalIdSet {
    ids: Mutex<HashSet<EntityId>>,
}

impl ShardLocalIdSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a set that can hold `capacity` ids before growing.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ids: Mutex::new(HashSet::with_capacity(capacity)),
        }
    }

    /// Adds `id`. Returns `false` if it was already present.
    pub fn insert(&self, id: EntityId) -> bool {
        self.ids.lock().insert(id)
    }

    /// Removes `id`. Returns `false` if it was not present.
    pub fn remove(&self, id: EntityId) -> bool {
        self.ids.lock().remove(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.ids.lock().contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.lock().is_empty()
    }

    /// Visits every id while holding the lock. The writer is blocked until `f` has seen
    /// all of them, so keep `f` cheap.
    ///
    /// The lock is not reentrant: calling any method of this set from `f` deadlocks. Use
    /// [`snapshot`](Self::snapshot) to modify the set while walking its ids.
    pub fn for_each(&self, f: impl FnMut(EntityId)) {
        self.ids.lock().iter().copied().for_each(f);
    }

    /// Adds every id of this set to `target`.
    pub fn union_into(&self, target: &mut HashSet<EntityId>) {
        let ids = self.ids.lock();
        target.reserve(ids.len());
        target.extend(ids.iter().copied());
    }

    /// Copies the current ids out of the set.
    ///
    /// The copy can be iterated any number of times and is unaffected by later writes.
    pub fn snapshot(&self) -> IdSnapshot {
        let ids = self.ids.lock();
        IdSnapshot {
            ids: ids.iter().copied().collect(),
        }
    }
}

impl FromIterator<EntityId> for ShardLocalIdSet {
    fn from_iter<I: IntoIterator<Item = EntityId>>(iter: I) -> Self {
        Self {
            ids: Mutex::new(iter.into_iter().collect()),
        }
    }
}

/// Point-in-time copy of a [`ShardLocalIdSet`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdSnapshot {
    ids: Vec<EntityId>,
}

impl IdSnapshot {
    pub fn iter(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.ids.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl<'a> IntoIterator for &'a IdSnapshot {
    type Item = EntityId;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, EntityId>>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.iter().copied()
    }
}

impl IntoIterator for IdSnapshot {
    type Item = EntityId;
    type IntoIter = std::vec::IntoIter<EntityId>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.into_iter()
    }
}
