//! Weighted Drafting Implementation
//!
//! This module picks the next flashcard to review and nudges weights after each
//! review. It approximates spaced repetition without timestamps.
//!
//! Core principles:
//! - Every item in a partition carries a positive weight
//! - Selection probability is proportional to weight (linear-scan sampler)
//! - A correct answer sharply suppresses the item and lets every other item recover
//! - A wrong answer pushes the item to `FAILURE_WEIGHT` so it resurfaces soon
//!
//! The drafter never persists anything: callers hand it a mapping by `&mut`
//! and commit the result themselves.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

use crate::types::{
    PolicyConfig, ReinforceReport, ReviewOutcome, WeightMap, FAILURE_WEIGHT, WEIGHT_CEILING,
};

// ==================== Errors ====================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DraftError {
    /// The partition has no items; callers show a "nothing to study" state
    #[error("partition has no items to draft")]
    EmptyPartition,

    /// The weights sum to zero, a negative number or a non-finite value
    #[error("weights are degenerate (total = {0})")]
    DegenerateWeights(f64),

    #[error("unknown item key: {0}")]
    UnknownKey(String),
}

// ==================== Options ====================

/// Drafter configuration options
#[derive(Clone, Debug, Default)]
pub struct DrafterOptions {
    /// Random seed for reproducibility (optional)
    pub seed: Option<u64>,
}

// ==================== Main Implementation ====================

/// Weighted-random item drafter
pub struct Drafter {
    rng: ChaCha8Rng,
}

impl Drafter {
    /// Create a drafter seeded from OS entropy
    pub fn new() -> Self {
        Self::with_options(DrafterOptions::default())
    }

    pub fn with_options(options: DrafterOptions) -> Self {
        let rng = match options.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        Self { rng }
    }

    /// Create a drafter with a specific seed (for testing)
    pub fn with_seed(seed: u64) -> Self {
        Self::with_options(DrafterOptions { seed: Some(seed) })
    }

    // ==================== Selection ====================

    /// Draw one key with probability `w_k / Σw`.
    ///
    /// Draws `r` uniformly from `[0, Σw)` and walks the keys in sorted order,
    /// subtracting each weight; the first key that drives the remainder below
    /// zero wins. If rounding leaves the remainder at or above zero after the
    /// last key, the last key is returned.
    pub fn draft(&mut self, weights: &WeightMap) -> Result<String, DraftError> {
        let last_key = weights.keys().last().ok_or(DraftError::EmptyPartition)?;

        let total = weights.total();
        if !total.is_finite() || total <= 0.0 {
            return Err(DraftError::DegenerateWeights(total));
        }

        let mut remainder = self.rng.gen::<f64>() * total;

        for (key, weight) in weights.iter() {
            remainder -= weight;
            if remainder < 0.0 {
                return Ok(key.to_string());
            }
        }

        tracing::trace!(remainder, "draft walk exhausted, falling back to last key");
        Ok(last_key.to_string())
    }

    // ==================== Reinforcement ====================

    /// Apply the post-review update for `key` to the whole mapping.
    ///
    /// Success: `key` drops to the policy's `min_weight`; every other key at or
    /// below the ceiling gains `increment` (capped at 1.0). Keys above the
    /// ceiling take the `2 × increment` recovery branch under the same cap,
    /// which never lowers them: an elevated key only comes down when it is
    /// itself reviewed successfully.
    ///
    /// Failure: `key` is set to `FAILURE_WEIGHT`; nothing else changes.
    pub fn reinforce(
        &mut self,
        weights: &mut WeightMap,
        key: &str,
        outcome: ReviewOutcome,
    ) -> Result<ReinforceReport, DraftError> {
        let previous_weight = weights
            .get(key)
            .ok_or_else(|| DraftError::UnknownKey(key.to_string()))?;

        let report = match outcome {
            ReviewOutcome::Success => {
                let policy = PolicyConfig::for_item_count(weights.len());
                let mut recovered = 0;

                for (k, w) in weights.iter_mut() {
                    if k == key {
                        *w = policy.min_weight;
                        continue;
                    }
                    let next = recover(*w, policy.increment);
                    if next != *w {
                        recovered += 1;
                    }
                    *w = next;
                }

                ReinforceReport {
                    key: key.to_string(),
                    outcome,
                    policy: Some(policy),
                    previous_weight,
                    new_weight: policy.min_weight,
                    recovered,
                }
            }
            ReviewOutcome::Failure => {
                weights.insert(key, FAILURE_WEIGHT);
                ReinforceReport {
                    key: key.to_string(),
                    outcome,
                    policy: None,
                    previous_weight,
                    new_weight: FAILURE_WEIGHT,
                    recovered: 0,
                }
            }
        };

        tracing::debug!(
            key,
            outcome = outcome.as_str(),
            previous = previous_weight,
            new = report.new_weight,
            recovered = report.recovered,
            "weights reinforced"
        );

        Ok(report)
    }
}

impl Default for Drafter {
    fn default() -> Self {
        Self::new()
    }
}

/// Recovery step for a key that was not the one reviewed
fn recover(weight: f64, increment: f64) -> f64 {
    if weight > WEIGHT_CEILING {
        weight.max((weight + 2.0 * increment).min(WEIGHT_CEILING))
    } else {
        (weight + increment).min(WEIGHT_CEILING)
    }
}

/// Probability each key would be drafted next, in walk order
pub fn selection_probabilities(weights: &WeightMap) -> Vec<(String, f64)> {
    let total = weights.total();
    if !total.is_finite() || total <= 0.0 {
        return Vec::new();
    }
    weights
        .iter()
        .map(|(k, w)| (k.to_string(), w / total))
        .collect()
}

/// The `top` most likely next keys, highest probability first; ties in key order
pub fn ranked_probabilities(weights: &WeightMap, top: usize) -> Vec<(String, f64)> {
    let mut probs = selection_probabilities(weights);
    probs.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    probs.truncate(top);
    probs
}

// ==================== Unit Tests ====================
