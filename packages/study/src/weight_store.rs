//! Weight persistence and reconciliation
//!
//! `WeightStore` turns the raw key-value provider into per-partition weight
//! maps. Loading is a pure merge against the catalog's key set; saving writes
//! the whole map verbatim.

use std::collections::BTreeSet;

use hsk_algo::{sanitize_weights, WeightMap};

use crate::catalog::PartitionKey;
use crate::storage::{KeyValueStore, StorageError, StorageResult};

pub struct WeightStore<S> {
    store: S,
}

impl<S: KeyValueStore> WeightStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Underlying key-value provider
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Load the partition's weights and reconcile them with `valid_keys`.
    ///
    /// Every valid key missing from storage is added at the default weight;
    /// stored keys that are no longer valid are kept. A value that cannot be
    /// parsed is treated as absent. Nothing is written back.
    pub fn load(
        &self,
        partition: &PartitionKey,
        valid_keys: &BTreeSet<String>,
    ) -> StorageResult<WeightMap> {
        let storage_key = partition.storage_key();

        let mut weights = match self.store.get(&storage_key)? {
            Some(raw) => match serde_json::from_str::<WeightMap>(&raw) {
                Ok(weights) => weights,
                Err(err) => {
                    tracing::warn!(
                        partition = %partition,
                        error = %err,
                        "persisted weights are corrupt, reinitializing"
                    );
                    WeightMap::new()
                }
            },
            None => WeightMap::new(),
        };

        let repaired = sanitize_weights(&mut weights);
        if repaired > 0 {
            tracing::warn!(partition = %partition, repaired, "clamped out-of-range weights");
        }

        let added = weights.fill_missing(valid_keys);
        tracing::debug!(
            partition = %partition,
            total = weights.len(),
            added,
            "weights loaded"
        );

        Ok(weights)
    }

    /// Load and split into the draft pool (keys in `valid_keys`) and the
    /// dormant stale keys that are only carried along on save.
    pub fn load_split(
        &self,
        partition: &PartitionKey,
        valid_keys: &BTreeSet<String>,
    ) -> StorageResult<(WeightMap, WeightMap)> {
        let mut pool = self.load(partition, valid_keys)?;
        let dormant = pool.retain_keys(valid_keys);
        Ok((pool, dormant))
    }

    /// Persist the full mapping for a partition (last write wins)
    pub fn save(&self, partition: &PartitionKey, weights: &WeightMap) -> StorageResult<()> {
        let raw = serde_json::to_string(weights)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.store.set(&partition.storage_key(), &raw)?;
        tracing::trace!(partition = %partition, count = weights.len(), "weights saved");
        Ok(())
    }

    /// Overwrite the partition with every valid key at the default weight
    pub fn reset(
        &self,
        partition: &PartitionKey,
        valid_keys: &BTreeSet<String>,
    ) -> StorageResult<WeightMap> {
        let weights = WeightMap::with_keys(valid_keys.iter().cloned());
        self.save(partition, &weights)?;
        tracing::info!(partition = %partition, count = weights.len(), "weights reset");
        Ok(weights)
    }
}
