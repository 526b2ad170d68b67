//! Process-wide table of the shards that are currently connected.

use crate::{
    error::MetricsError,
    events::ShardId,
    id_set::ShardLocalIdSet,
};
use hashbrown::{HashMap, hash_map::Entry};
use parking_lot::RwLock;
use std::sync::Arc;

/// Maps every live shard to its [`ShardLocalIdSet`].
///
/// Sets are shared through an [`Arc`]. Detaching only drops the registry's reference, so an
/// aggregation that already listed the shard keeps reading a valid set until it is done.
#[derive(Debug, Default)]
pub struct ShardRegistry {
    shards: RwLock<HashMap<ShardId, Arc<ShardLocalIdSet>>>,
}

impl ShardRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `set` as the id set of `shard_id`.
    ///
    /// # Errors
    /// Returns [`MetricsError::DuplicateShard`] if the shard is already attached. The
    /// existing entry is left untouched.
    pub fn attach(&self, shard_id: ShardId, set: Arc<ShardLocalIdSet>) -> Result<(), MetricsError> {
        match self.shards.write().entry(shard_id) {
            Entry::Occupied(_) => Err(MetricsError::DuplicateShard { shard_id }),
            Entry::Vacant(entry) => {
                entry.insert(set);
                Ok(())
            }
        }
    }

    /// Attaches a fresh, empty set for `shard_id` and returns it.
    ///
    /// # Errors
    /// Returns [`MetricsError::DuplicateShard`] if the shard is already attached.
    pub fn connect(&self, shard_id: ShardId) -> Result<Arc<ShardLocalIdSet>, MetricsError> {
        let set = Arc::new(ShardLocalIdSet::new());
        self.attach(shard_id, Arc::clone(&set))?;
        Ok(set)
    }

    /// Removes the shard, returning its set if it was attached.
    pub fn detach(&self, shard_id: ShardId) -> Option<Arc<ShardLocalIdSet>> {
        self.shards.write().remove(&shard_id)
    }

    pub fn get(&self, shard_id: ShardId) -> Option<Arc<ShardLocalIdSet>> {
        self.shards.read().get(&shard_id).cloned()
    }

    pub fn contains(&self, shard_id: ShardId) -> bool {
        self.shards.read().contains_key(&shard_id)
    }

    pub fn len(&self) -> usize {
        self.shards.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.read().is_empty()
    }

    /// Returns the shards attached at call time.
    ///
    /// Entries are copied out under the read lock, so attaches and detaches that happen
    /// while the result is consumed are not reflected in it.
    pub fn list_live(&self) -> LiveShards {
        let shards = self.shards.read();
        LiveShards {
            entries: shards
                .iter()
                .map(|(shard_id, set)| (*shard_id, Arc::clone(set)))
                .collect::<Vec<_>>()
                .into_iter(),
        }
    }
}

/// Iterator over the shards returned by [`ShardRegistry::list_live`].
#[derive(Debug)]
pub struct LiveShards {
    entries: std::vec::IntoIter<(ShardId, Arc<ShardLocalIdSet>)>,
}

impl Iterator for LiveShards {
    type Item = (ShardId, Arc<ShardLocalIdSet>);

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl ExactSizeIterator for LiveShards {}
