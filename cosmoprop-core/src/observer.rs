//! Observer plane

use crate::candidate::Candidate;
use serde::{Deserialize, Serialize};

/// One-dimensional observer: detects candidates that reach `x ≤ 0`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observer {
    /// Stop propagating a candidate once it has been recorded
    pub deactivate_on_detection: bool,
}

impl Default for Observer {
    fn default() -> Self {
        Self {
            deactivate_on_detection: true,
        }
    }
}

impl Observer {
    pub fn detects(&self, candidate: &Candidate) -> bool {
        candidate.current.position.x <= 0.0
    }

    /// Remaining distance to the plane along the direction of motion
    pub fn step_limit(&self, candidate: &Candidate) -> f64 {
        let x = candidate.current.position.x;
        let towards = -candidate.current.direction.x;
        if x > 0.0 && towards > 0.0 {
            x / towards
        } else {
            f64::INFINITY
        }
    }
}
