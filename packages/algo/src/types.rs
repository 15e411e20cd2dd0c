//! Common Types and Constants
//!
//! Shared data structures used by the drafter and the sanitizer.

use std::collections::btree_map;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ==================== Constants ====================

/// Weight given to an item that has never been reviewed
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// Ceiling that routine reinforcement never pushes a weight past
pub const WEIGHT_CEILING: f64 = 1.0;

/// Weight assigned to an item answered incorrectly
pub const FAILURE_WEIGHT: f64 = 2.0;

/// Smallest weight an item may carry; keeps every item drawable
pub const WEIGHT_FLOOR: f64 = 1e-3;

// ==================== Weight Map ====================

/// Per-partition mapping from item key to drafting weight.
///
/// Keys iterate in sorted order, which gives the drafter's linear scan a stable
/// walk order for reproducible seeded tests. Serializes as a flat JSON object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightMap {
    weights: BTreeMap<String, f64>,
}

impl WeightMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a mapping with every key at [`DEFAULT_WEIGHT`]
    pub fn with_keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            weights: keys
                .into_iter()
                .map(|k| (k.into(), DEFAULT_WEIGHT))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.weights.get(key).copied()
    }

    /// Insert or overwrite a weight, returning the previous value
    pub fn insert(&mut self, key: impl Into<String>, weight: f64) -> Option<f64> {
        self.weights.insert(key.into(), weight)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.weights.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.weights.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(k, w)| (k.as_str(), *w))
    }

    pub fn iter_mut(&mut self) -> btree_map::IterMut<'_, String, f64> {
        self.weights.iter_mut()
    }

    /// Sum of all weights
    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }

    /// Insert every key from `keys` that is not already present at
    /// [`DEFAULT_WEIGHT`]. Existing weights are left untouched.
    ///
    /// Returns the number of keys added.
    pub fn fill_missing<'a, I>(&mut self, keys: I) -> usize
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut added = 0;
        for key in keys {
            if !self.weights.contains_key(key) {
                self.weights.insert(key.clone(), DEFAULT_WEIGHT);
                added += 1;
            }
        }
        added
    }

    /// Keep only the keys in `valid`, returning the entries that were removed
    pub fn retain_keys(&mut self, valid: &BTreeSet<String>) -> WeightMap {
        let (kept, removed): (BTreeMap<_, _>, BTreeMap<_, _>) =
            std::mem::take(&mut self.weights)
                .into_iter()
                .partition(|(k, _)| valid.contains(k));
        self.weights = kept;
        WeightMap { weights: removed }
    }

    /// Copy every entry of `other` into this mapping, overwriting on conflict
    pub fn merge(&mut self, other: &WeightMap) {
        for (k, w) in &other.weights {
            self.weights.insert(k.clone(), *w);
        }
    }
}

impl FromIterator<(String, f64)> for WeightMap {
    fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
        Self {
            weights: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a WeightMap {
    type Item = (&'a String, &'a f64);
    type IntoIter = btree_map::Iter<'a, String, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.weights.iter()
    }
}

// ==================== Review Types ====================

/// Result of a single review as reported by the learner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewOutcome {
    Success,
    Failure,
}

impl FromStr for ReviewOutcome {
    type Err = String;

    /// Accepts the stored names and the learner's y/n answers (also `s`/`sim`, `nao`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "success" | "pass" | "correct" | "y" | "yes" | "s" | "sim" => Ok(ReviewOutcome::Success),
            "failure" | "fail" | "incorrect" | "n" | "no" | "nao" | "não" => Ok(ReviewOutcome::Failure),
            other => Err(format!("unknown review outcome `{other}`")),
        }
    }
}

impl ReviewOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewOutcome::Success => "success",
            ReviewOutcome::Failure => "failure",
        }
    }
}

/// Success-path parameters, chosen by how many items compete in a partition
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Weight the reviewed item drops to
    pub min_weight: f64,
    /// Amount every other item recovers by
    pub increment: f64,
}

impl PolicyConfig {
    /// Staircase lookup: larger catalogs suppress harder and recover faster
    pub fn for_item_count(n: usize) -> Self {
        let (min_weight, increment) = match n {
            0..=29 => (0.1, 0.01),
            30..=89 => (0.05, 0.02),
            90..=179 => (0.02, 0.03),
            _ => (0.01, 0.05),
        };
        Self {
            min_weight,
            increment,
        }
    }
}

/// What a reinforcement call changed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReinforceReport {
    /// Reviewed item key
    pub key: String,
    pub outcome: ReviewOutcome,
    /// Policy used on the success path; `None` for failures
    pub policy: Option<PolicyConfig>,
    /// Weight of the reviewed key before the update
    pub previous_weight: f64,
    /// Weight of the reviewed key after the update
    pub new_weight: f64,
    /// Number of other keys whose weight changed
    pub recovered: usize,
}

/// Health summary of a weight mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightDiagnostics {
    pub is_healthy: bool,
    pub count: usize,
    pub total: f64,
    pub min_weight: f64,
    pub max_weight: f64,
    /// Keys above the ceiling (failed and not yet re-reviewed)
    pub elevated_count: usize,
    /// Keys below the ceiling (recently reviewed successfully)
    pub suppressed_count: usize,
    pub has_nan: bool,
    pub has_inf: bool,
    pub message: String,
}

// ==================== Tests ====================
