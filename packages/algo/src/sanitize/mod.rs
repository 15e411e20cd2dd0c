//! Weight Sanitization
//!
//! Numerical guards for weights coming back from storage.
//!
//! Functions:
//! - Single weight clamping
//! - Whole-map sanitization
//! - Weight map health diagnostics

use crate::types::{
    WeightDiagnostics, WeightMap, DEFAULT_WEIGHT, FAILURE_WEIGHT, WEIGHT_CEILING, WEIGHT_FLOOR,
};

/// 检查权重表是否包含无效值 (NaN, Inf 或非正数)
pub fn has_invalid_weights(weights: &WeightMap) -> bool {
    weights
        .iter()
        .any(|(_, w)| !w.is_finite() || w <= 0.0 || w > FAILURE_WEIGHT)
}

/// 将单个权重限制在 (0, FAILURE_WEIGHT] 区间
pub fn sanitize_weight(weight: f64) -> f64 {
    if !weight.is_finite() {
        DEFAULT_WEIGHT
    } else if weight <= 0.0 {
        WEIGHT_FLOOR
    } else if weight < WEIGHT_FLOOR {
        WEIGHT_FLOOR
    } else if weight > FAILURE_WEIGHT {
        FAILURE_WEIGHT
    } else {
        weight
    }
}

/// 清理整张权重表，返回被修改的条目数
pub fn sanitize_weights(weights: &mut WeightMap) -> usize {
    let mut changed = 0;
    for (_, w) in weights.iter_mut() {
        let clean = sanitize_weight(*w);
        // NaN != NaN, so compare bit patterns
        if clean.to_bits() != w.to_bits() {
            *w = clean;
            changed += 1;
        }
    }
    changed
}

/// 诊断权重表健康状态
pub fn diagnose_weights(weights: &WeightMap) -> WeightDiagnostics {
    let mut has_nan = false;
    let mut has_inf = false;
    let mut non_positive = false;
    let mut min_weight = f64::MAX;
    let mut max_weight = f64::MIN;
    let mut total = 0.0;
    let mut elevated_count = 0;
    let mut suppressed_count = 0;

    for (_, w) in weights.iter() {
        if w.is_nan() {
            has_nan = true;
            continue;
        }
        if w.is_infinite() {
            has_inf = true;
            continue;
        }
        if w <= 0.0 {
            non_positive = true;
        }
        min_weight = min_weight.min(w);
        max_weight = max_weight.max(w);
        total += w;
        if w > WEIGHT_CEILING {
            elevated_count += 1;
        } else if w < WEIGHT_CEILING {
            suppressed_count += 1;
        }
    }

    let is_healthy = !has_nan && !has_inf && !non_positive && !weights.is_empty();

    let message = if weights.is_empty() {
        "Partition has no items".to_string()
    } else if has_nan {
        "Weights contain NaN values".to_string()
    } else if has_inf {
        "Weights contain infinite values".to_string()
    } else if non_positive {
        "Weights contain non-positive values".to_string()
    } else {
        format!(
            "{} items, {} suppressed, {} awaiting re-review",
            weights.len(),
            suppressed_count,
            elevated_count
        )
    };

    WeightDiagnostics {
        is_healthy,
        count: weights.len(),
        total,
        min_weight: if min_weight == f64::MAX { 0.0 } else { min_weight },
        max_weight: if max_weight == f64::MIN { 0.0 } else { max_weight },
        elevated_count,
        suppressed_count,
        has_nan,
        has_inf,
        message,
    }
}
