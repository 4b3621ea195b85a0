//! Anisotropic jitter filter on marker translations.
//!
//! Single planar markers give noisy depth, so the Z threshold is the loosest
//! and X the tightest.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Per-axis motion thresholds in meters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterThresholds {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for FilterThresholds {
    fn default() -> Self {
        Self {
            x: 0.001,
            y: 0.002,
            z: 0.015,
        }
    }
}

impl FilterThresholds {
    /// All thresholds finite and non-negative.
    pub fn validate(&self) -> bool {
        [self.x, self.y, self.z]
            .iter()
            .all(|t| t.is_finite() && *t >= 0.0)
    }

    /// True if any axis moved strictly more than its threshold.
    pub fn exceeded_by(&self, delta: &Vector3<f64>) -> bool {
        delta.x.abs() > self.x || delta.y.abs() > self.y || delta.z.abs() > self.z
    }
}

/// Last raw translation seen for one marker.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum FilterState {
    #[default]
    Unset,
    Last(Vector3<f64>),
}

impl FilterState {
    /// Decide whether `sample` is real motion, then remember it.
    ///
    /// The first sample is always accepted. Afterwards a sample is accepted
    /// when it differs from the *previous raw sample* by more than a
    /// threshold on any axis. The stored sample is replaced even when the
    /// new one is rejected, so slow sub-threshold drift is never accepted on
    /// its own.
    pub fn update(&mut self, sample: &Vector3<f64>, thresholds: &FilterThresholds) -> bool {
        let accept = match self {
            Self::Unset => true,
            Self::Last(prev) => thresholds.exceeded_by(&(sample - *prev)),
        };
        *self = Self::Last(*sample);
        accept
    }

    pub fn last(&self) -> Option<&Vector3<f64>> {
        match self {
            Self::Unset => None,
            Self::Last(v) => Some(v),
        }
    }
}
