//! Noise filtering for distance increments.

use crate::config::DEFAULT_MAX_INCREMENT_M;

/// Decides whether a computed increment is real movement or GPS noise.
///
/// An increment is accepted only when `0 < distance < max_increment_m`.
/// Zero (no movement), negative, NaN and oversized jumps are all rejected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcceptancePolicy {
    pub max_increment_m: f64,
}

impl AcceptancePolicy {
    pub fn new(max_increment_m: f64) -> Self {
        Self { max_increment_m }
    }

    pub fn accepts(&self, distance: f64) -> bool {
        distance > 0.0 && distance < self.max_increment_m
    }
}

impl Default for AcceptancePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_INCREMENT_M)
    }
}

/// Accept/reject with the default 100 m threshold.
pub fn accept(distance: f64) -> bool {
    AcceptancePolicy::default().accepts(distance)
}
