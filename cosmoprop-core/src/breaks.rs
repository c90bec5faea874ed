//! Break conditions

use crate::candidate::Candidate;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Stateless predicate that ends a candidate's propagation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BreakCondition {
    /// Energy below the threshold (eV)
    MinimumEnergy { energy: f64 },
    MaximumSteps { steps: u64 },
    /// Trajectory length beyond the limit (m)
    MaximumTrajectoryLength { length: f64 },
}

impl BreakCondition {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            BreakCondition::MinimumEnergy { energy } if !(energy.is_finite() && energy >= 0.0) => {
                Err(ConfigError::InvalidParameter(format!(
                    "minimum energy must be finite and non-negative, got {energy}"
                )))
            }
            BreakCondition::MaximumSteps { steps: 0 } => Err(ConfigError::InvalidParameter(
                "maximum step count must be at least 1".into(),
            )),
            BreakCondition::MaximumTrajectoryLength { length } if !(length > 0.0) => {
                Err(ConfigError::InvalidParameter(format!(
                    "maximum trajectory length must be positive, got {length}"
                )))
            }
            _ => Ok(()),
        }
    }

    pub fn is_met(&self, candidate: &Candidate) -> bool {
        match *self {
            BreakCondition::MinimumEnergy { energy } => candidate.energy() < energy,
            BreakCondition::MaximumSteps { steps } => candidate.step_count >= steps,
            BreakCondition::MaximumTrajectoryLength { length } => {
                candidate.trajectory_length >= length
            }
        }
    }

    /// Whether this condition alone ends every trajectory
    pub fn bounds_trajectory(&self) -> bool {
        match *self {
            BreakCondition::MinimumEnergy { .. } => false,
            BreakCondition::MaximumSteps { .. } => true,
            BreakCondition::MaximumTrajectoryLength { length } => length.is_finite(),
        }
    }

    /// Distance the candidate may still travel before this condition
    /// triggers on its own
    pub fn step_limit(&self, candidate: &Candidate) -> f64 {
        match *self {
            BreakCondition::MaximumTrajectoryLength { length } => {
                (length - candidate.trajectory_length).max(0.0)
            }
            _ => f64::INFINITY,
        }
    }
}

/// Index of the first condition met by `candidate`, if any
pub fn first_met(conditions: &[BreakCondition], candidate: &Candidate) -> Option<usize> {
    conditions.iter().position(|c| c.is_met(candidate))
}
