//! Interactive nudging of the rendered model.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Translation step per key press, in model units.
pub const OFFSET_STEP: f64 = 0.1;
/// Scale-factor step per key press.
pub const SCALE_STEP: f64 = 0.1;
/// Lower bound on the scale factor.
pub const MIN_SCALE_FACTOR: f64 = 0.1;

/// User adjustments applied on top of every mesh binding.
///
/// The offset is expressed in the scaled model frame and the scale factor
/// multiplies the binding's own scale.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayAdjust {
    pub offset: Vector3<f64>,
    pub scale_factor: f64,
}

impl Default for OverlayAdjust {
    fn default() -> Self {
        Self {
            offset: Vector3::zeros(),
            scale_factor: 1.0,
        }
    }
}

impl OverlayAdjust {
    /// Apply one key press. Returns `false` for keys with no binding.
    ///
    /// `w`/`s` move along x, `a`/`d` along y, `=`/`-` grow and shrink.
    pub fn apply_key(&mut self, key: char) -> bool {
        match key {
            'w' => self.offset.x -= OFFSET_STEP,
            's' => self.offset.x += OFFSET_STEP,
            'a' => self.offset.y -= OFFSET_STEP,
            'd' => self.offset.y += OFFSET_STEP,
            '=' | '+' => self.scale_factor += SCALE_STEP,
            '-' => self.scale_factor = (self.scale_factor - SCALE_STEP).max(MIN_SCALE_FACTOR),
            _ => return false,
        }
        true
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
