//! Distance metrics and scalar vector kernels.
//!
//! All distances follow the "lower is closer" convention: squared Euclidean
//! is used directly (no sqrt in hot paths) and cosine similarity is flipped
//! into `1 - similarity`. Arithmetic is single-precision and scalar.

use crate::config::NORM_EPSILON;
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Distance metric used for vector similarity computation.
///
/// All metrics return a value where **lower is closer**.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Metric {
    /// Squared Euclidean distance (L2²). Range: \[0, ∞).
    #[default]
    #[serde(rename = "L2")]
    L2,
    /// Cosine distance: `1 - cosine_similarity`. Range: \[0, 2\].
    #[serde(rename = "COSINE")]
    Cosine,
}

impl Metric {
    /// Compute the distance between two vectors under this metric.
    #[inline]
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::L2 => l2_sq(a, b),
            Metric::Cosine => cosine_distance(a, b),
        }
    }
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "l2" | "L2" => Ok(Metric::L2),
            "cosine" | "COSINE" => Ok(Metric::Cosine),
            other => Err(Error::InvalidMetric(other.to_string())),
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Metric::L2 => write!(f, "l2"),
            Metric::Cosine => write!(f, "cosine"),
        }
    }
}

/// Squared L2 distance: `Σ(aᵢ - bᵢ)²`.
#[inline]
pub fn l2_sq(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let mut sum = 0.0f32;
    for i in 0..a.len() {
        let d = a[i] - b[i];
        sum += d * d;
    }
    sum
}

/// Dot product: `Σ aᵢ·bᵢ`.
#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let mut sum = 0.0f32;
    for i in 0..a.len() {
        sum += a[i] * b[i];
    }
    sum
}

/// L2 norm: `√dot(a, a)`.
#[inline]
pub fn norm(a: &[f32]) -> f32 {
    dot(a, a).sqrt()
}

/// Scale `v` to unit length in place. Near-zero vectors are left unchanged.
pub fn normalize_inplace(v: &mut [f32]) {
    let n = norm(v);
    if n < NORM_EPSILON {
        return;
    }
    let inv = 1.0 / n;
    for x in v.iter_mut() {
        *x *= inv;
    }
}

/// Cosine similarity: `dot(a, b) / (‖a‖·‖b‖)`, or 0 when either norm is ~0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let denom = norm(a) * norm(b);
    if denom < NORM_EPSILON {
        return 0.0;
    }
    dot(a, b) / denom
}

/// Cosine distance: `1 - cosine_similarity`, or 0 when either norm is ~0
/// (degenerate vectors compare as identical rather than maximally far).
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let denom = norm(a) * norm(b);
    if denom < NORM_EPSILON {
        return 0.0;
    }
    1.0 - dot(a, b) / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_sq_sanity() {
        let a = [1.0, 0.0];
        let b = [2.0, 0.0];
        let c = [0.0, 1.0];
        assert_eq!(l2_sq(&a, &b), 1.0);
        assert_eq!(l2_sq(&a, &c), 2.0);
        assert_eq!(l2_sq(&a, &a), 0.0);
    }

    #[test]
    fn test_cosine_distance_sanity() {
        let a = [1.0, 0.0];
        let b = [2.0, 0.0];
        let c = [0.0, 1.0];
        // same direction, regardless of magnitude
        assert!(cosine_distance(&a, &b).abs() < 1e-6);
        // orthogonal
        assert!((cosine_distance(&a, &c) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_self_distance_zero() {
        let a = [0.3, -0.7, 0.2];
        assert!(cosine_distance(&a, &a).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_scale_invariance() {
        let a = [0.5, 1.5, -2.0];
        let scaled: Vec<f32> = a.iter().map(|x| x * 3.25).collect();
        assert!(cosine_distance(&a, &scaled).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_norm_distance_is_zero() {
        let z = [0.0, 0.0, 0.0];
        let a = [1.0, 2.0, 3.0];
        assert_eq!(cosine_distance(&z, &a), 0.0);
        assert_eq!(cosine_similarity(&z, &a), 0.0);
    }

    #[test]
    fn test_normalize() {
        let mut v = [3.0, 4.0];
        normalize_inplace(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
        assert!((norm(&v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_zero_vector_unchanged() {
        let mut v = [0.0, 0.0, 0.0];
        normalize_inplace(&mut v);
        assert_eq!(v, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_metric_dispatch() {
        let a = [1.0, 0.0];
        let c = [0.0, 1.0];
        assert_eq!(Metric::L2.distance(&a, &c), 2.0);
        assert!((Metric::Cosine.distance(&a, &c) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_metric_from_str() {
        assert_eq!("l2".parse::<Metric>().unwrap(), Metric::L2);
        assert_eq!("COSINE".parse::<Metric>().unwrap(), Metric::Cosine);
        assert!("manhattan".parse::<Metric>().is_err());
    }
}
