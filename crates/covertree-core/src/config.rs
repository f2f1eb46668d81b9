//! Tree construction parameters with boundary validation.

use serde::{Deserialize, Serialize};

use crate::distance::DistanceMetric;
use crate::error::{Error, Result};

/// Construction parameters for a cover tree.
///
/// `base` controls how fast the covering radius shrinks per level. A base
/// at or below 1 makes the level-expansion loop degenerate, so validation
/// rejects it at the boundary instead of accepting it silently.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Radius growth factor per level; must be finite and `> 1`.
    pub base: f32,
    /// Distance metric, persisted by name in the tree envelope.
    pub metric: DistanceMetric,
}

impl TreeConfig {
    /// Creates a config; call [`TreeConfig::validate`] or hand it to the
    /// tree constructor to check it.
    #[must_use]
    pub fn new(base: f32, metric: DistanceMetric) -> Self {
        Self { base, metric }
    }

    /// Fails fast on a degenerate base.
    pub fn validate(&self) -> Result<()> {
        if !self.base.is_finite() || self.base <= 1.0 {
            return Err(Error::Config(format!(
                "base must be a finite value > 1, got {}",
                self.base
            )));
        }
        Ok(())
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            base: 2.0,
            metric: DistanceMetric::Cosine,
        }
    }
}
