//! Straight-line propagation in one dimension

use crate::candidate::Candidate;
use crate::cosmology::Cosmology;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Moves candidates along their direction by a bounded step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Propagator {
    pub min_step: f64,
    pub max_step: f64,
}

impl Propagator {
    pub fn new(min_step: f64, max_step: f64) -> Result<Self, ConfigError> {
        let propagator = Self { min_step, max_step };
        propagator.validate()?;
        Ok(propagator)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [("min_step", self.min_step), ("max_step", self.max_step)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NonPositiveStep { name, value });
            }
        }
        if self.min_step > self.max_step {
            return Err(ConfigError::StepBoundsInverted {
                min: self.min_step,
                max: self.max_step,
            });
        }
        Ok(())
    }

    /// Step size for a requested limit: the limit clamped to the bounds
    pub fn choose_step(&self, limit: f64) -> f64 {
        limit.min(self.max_step).max(self.min_step)
    }

    /// Advance `candidate` by its (limited) next-step hint and update its
    /// redshift. Returns the step taken (m).
    pub fn propagate(&self, candidate: &mut Candidate, cosmology: &dyn Cosmology) -> f64 {
        let step = self.choose_step(candidate.next_step);
        let state = &mut candidate.current;
        state.position += state.direction * step;
        candidate.trajectory_length += step;
        candidate.step_count += 1;
        candidate.redshift = cosmology.redshift_at(state.position.x.max(0.0));
        candidate.next_step = self.max_step;
        step
    }
}
