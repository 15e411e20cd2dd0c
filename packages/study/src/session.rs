//! Study session
//!
//! Drives one learner through review rounds: activate a partition, draft an
//! item, take the learner's verdict, reinforce and commit. This is the only
//! surface a presenter needs.

use std::collections::BTreeSet;

use hsk_algo::{
    diagnose_weights, ranked_probabilities, DraftError, Drafter, ReinforceReport,
    ReviewOutcome, WeightDiagnostics, WeightMap,
};
use serde::Serialize;

use crate::catalog::{CatalogProvider, PartitionKey, StudyItem, StudyMode};
use crate::storage::{KeyValueStore, StorageError};
use crate::weight_store::WeightStore;

/// Preference key remembering the last studied level
pub const LAST_LEVEL_KEY: &str = "last_hsk";
/// Preference key remembering the last studied mode
pub const LAST_MODE_KEY: &str = "last_mode";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("nothing to study in {0}")]
    EmptyPartition(PartitionKey),
    #[error("no partition is active")]
    NoActivePartition,
    #[error("`{0}` was not drafted this round")]
    NotDrafted(String),
    #[error("`{0}` was already reviewed this round")]
    AlreadyReviewed(String),
    #[error("{0} mode cannot record a failure")]
    OutcomeNotAllowed(StudyMode),
    #[error("item `{0}` is missing from the catalog")]
    MissingItem(String),
    #[error(transparent)]
    Draft(#[from] DraftError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// What `activate` found
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivationSummary {
    pub partition: PartitionKey,
    /// Items in the draft pool
    pub item_count: usize,
    /// Persisted weights whose key left the catalog
    pub stale_count: usize,
}

/// An item handed to the presenter for this round
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftedItem {
    pub key: String,
    pub item: StudyItem,
    /// Draft probability the item had when it was picked
    pub probability: f64,
}

/// Read the last studied level and mode from `kv`; missing or unreadable
/// values fall back to `default` piecewise.
pub fn remembered_partition<S: KeyValueStore + ?Sized>(kv: &S, default: &PartitionKey) -> PartitionKey {
    let level = kv
        .get(LAST_LEVEL_KEY)
        .ok()
        .flatten()
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| default.level.clone());
    let mode = kv
        .get(LAST_MODE_KEY)
        .ok()
        .flatten()
        .and_then(|m| m.parse::<StudyMode>().ok())
        .unwrap_or(default.mode);
    PartitionKey::new(level, mode)
}

struct Round {
    key: String,
    reviewed: bool,
}

struct ActivePartition {
    key: PartitionKey,
    /// Weights of keys present in the catalog; the only keys that get drafted
    pool: WeightMap,
    /// Persisted weights for keys no longer in the catalog, kept for commit
    dormant: WeightMap,
    round: Option<Round>,
}

pub struct StudySession<C, S> {
    catalog: C,
    store: WeightStore<S>,
    drafter: Drafter,
    active: Option<ActivePartition>,
}

impl<C: CatalogProvider, S: KeyValueStore> StudySession<C, S> {
    pub fn new(catalog: C, store: WeightStore<S>, drafter: Drafter) -> Self {
        Self {
            catalog,
            store,
            drafter,
            active: None,
        }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn weight_store(&self) -> &WeightStore<S> {
        &self.store
    }

    // ==================== Preferences ====================

    /// The partition studied last time, falling back to `default` piecewise
    pub fn remembered_partition(&self, default: &PartitionKey) -> PartitionKey {
        remembered_partition(self.store.store(), default)
    }

    fn remember(&self, partition: &PartitionKey) {
        let kv = self.store.store();
        let result = kv
            .set(LAST_LEVEL_KEY, &partition.level)
            .and_then(|_| kv.set(LAST_MODE_KEY, partition.mode.as_str()));
        if let Err(err) = result {
            tracing::warn!(partition = %partition, error = %err, "failed to remember partition");
        }
    }

    // ==================== Partition lifecycle ====================

    /// Make `partition` the active one, loading and reconciling its weights
    pub fn activate(&mut self, partition: PartitionKey) -> Result<ActivationSummary, SessionError> {
        let valid = self.catalog.valid_keys(&partition);
        let (pool, dormant) = self.store.load_split(&partition, &valid)?;

        for key in dormant.keys() {
            tracing::debug!(partition = %partition, key, "stale key dropped from draft pool");
        }

        let summary = ActivationSummary {
            partition: partition.clone(),
            item_count: pool.len(),
            stale_count: dormant.len(),
        };

        tracing::info!(
            partition = %partition,
            items = summary.item_count,
            stale = summary.stale_count,
            "partition activated"
        );

        self.remember(&partition);
        self.active = Some(ActivePartition {
            key: partition,
            pool,
            dormant,
            round: None,
        });

        Ok(summary)
    }

    pub fn active_partition(&self) -> Option<&PartitionKey> {
        self.active.as_ref().map(|a| &a.key)
    }

    /// Draft-pool weights of the active partition
    pub fn weights(&self) -> Option<&WeightMap> {
        self.active.as_ref().map(|a| &a.pool)
    }

    pub fn diagnostics(&self) -> Option<WeightDiagnostics> {
        self.weights().map(diagnose_weights)
    }

    /// The `top` most likely next items, highest probability first
    pub fn likely_next(&self, top: usize) -> Vec<(String, f64)> {
        self.weights()
            .map(|weights| ranked_probabilities(weights, top))
            .unwrap_or_default()
    }

    /// Put every item of the active partition back to the default weight
    pub fn reset_active(&mut self) -> Result<ActivationSummary, SessionError> {
        let active = self.active.as_mut().ok_or(SessionError::NoActivePartition)?;
        let valid: BTreeSet<String> = self.catalog.valid_keys(&active.key);

        active.pool = self.store.reset(&active.key, &valid)?;
        active.dormant = WeightMap::new();
        active.round = None;

        Ok(ActivationSummary {
            partition: active.key.clone(),
            item_count: active.pool.len(),
            stale_count: 0,
        })
    }

    // ==================== Rounds ====================

    /// Pick the next item. Any unfinished round is abandoned without
    /// touching weights.
    pub fn draft(&mut self) -> Result<DraftedItem, SessionError> {
        let active = self.active.as_mut().ok_or(SessionError::NoActivePartition)?;

        let key = match self.drafter.draft(&active.pool) {
            Ok(key) => key,
            Err(DraftError::EmptyPartition) => {
                return Err(SessionError::EmptyPartition(active.key.clone()))
            }
            Err(err) => return Err(err.into()),
        };

        let item = self
            .catalog
            .item(&active.key, &key)
            .ok_or_else(|| SessionError::MissingItem(key.clone()))?;

        let total = active.pool.total();
        let probability = active.pool.get(&key).map(|w| w / total).unwrap_or(0.0);

        tracing::debug!(partition = %active.key, key = %key, probability, "item drafted");

        active.round = Some(Round {
            key: key.clone(),
            reviewed: false,
        });

        Ok(DraftedItem {
            key,
            item,
            probability,
        })
    }

    /// Record the learner's verdict for the drafted item and commit weights.
    ///
    /// Allowed once per drafted key per round; failures only in quiz modes.
    pub fn reinforce(
        &mut self,
        key: &str,
        outcome: ReviewOutcome,
    ) -> Result<ReinforceReport, SessionError> {
        let active = self.active.as_mut().ok_or(SessionError::NoActivePartition)?;

        let round = match active.round.as_mut() {
            Some(round) if round.key == key => round,
            _ => return Err(SessionError::NotDrafted(key.to_string())),
        };
        if round.reviewed {
            return Err(SessionError::AlreadyReviewed(key.to_string()));
        }
        if outcome == ReviewOutcome::Failure && !active.key.mode.is_quiz() {
            return Err(SessionError::OutcomeNotAllowed(active.key.mode));
        }

        let report = self.drafter.reinforce(&mut active.pool, key, outcome)?;
        round.reviewed = true;

        Self::commit(&self.store, active)?;
        Ok(report)
    }

    fn commit(store: &WeightStore<S>, active: &ActivePartition) -> Result<(), SessionError> {
        let mut merged = active.pool.clone();
        merged.merge(&active.dormant);
        store.save(&active.key, &merged)?;
        Ok(())
    }
}
