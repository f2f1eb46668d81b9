//! Distance metrics for point comparison.

use serde::{Deserialize, Serialize};

use crate::point::Point;

/// Distance metric used by a tree, persisted by name in the tree envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Cosine distance: `1 - dot(a,b) / (|a| * |b|)`, using the cached norms.
    Cosine,
    /// Euclidean (L2) distance.
    Euclidean,
}

impl DistanceMetric {
    /// The persisted name of this metric.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Euclidean => "euclidean",
        }
    }

    /// Resolves a persisted name back to a metric.
    ///
    /// Unknown names resolve to `None`; callers must validate before use,
    /// at construction or after decode.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "cosine" => Some(Self::Cosine),
            "euclidean" => Some(Self::Euclidean),
            _ => None,
        }
    }

    /// Computes the distance between two points under this metric.
    #[must_use]
    pub fn distance(self, a: &Point, b: &Point) -> f32 {
        match self {
            Self::Cosine => cosine_distance(a, b),
            Self::Euclidean => euclidean_distance(a, b),
        }
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Cosine distance using the points' cached magnitudes.
///
/// Zero-magnitude vectors are a known edge case: the result is a plain
/// numeric value (1.0), never an error.
#[must_use]
pub fn cosine_distance(a: &Point, b: &Point) -> f32 {
    let dot: f32 = a
        .vector()
        .iter()
        .zip(b.vector().iter())
        .map(|(x, y)| x * y)
        .sum();

    let denom = a.magnitude() * b.magnitude();
    if denom == 0.0 {
        1.0
    } else {
        1.0 - dot / denom
    }
}

/// Standard L2 distance.
#[must_use]
pub fn euclidean_distance(a: &Point, b: &Point) -> f32 {
    a.vector()
        .iter()
        .zip(b.vector().iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}
