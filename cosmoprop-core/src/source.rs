//! Primary emission
//!
//! A [`Source`] is assembled from independent attribute generators. Every
//! primary draws only from the random stream it is handed, so a fixed seed
//! reproduces the same sequence of primaries.

use crate::candidate::{Candidate, ParticleState};
use crate::cosmology::Cosmology;
use crate::error::ConfigError;
use crate::particle::ParticleId;
use glam::DVec3;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Distance (m) from the observer plane at which primaries start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PositionModel {
    Fixed { distance: f64 },
    Uniform1D { min: f64, max: f64 },
}

impl PositionModel {
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match *self {
            PositionModel::Fixed { distance } => distance,
            PositionModel::Uniform1D { min, max } => min + (max - min) * rng.random::<f64>(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EnergyModel {
    Fixed { energy: f64 },
    /// `dN/dE ∝ E^index` on `[min, max]`; index -1 is flat in log E
    PowerLaw { min: f64, max: f64, index: f64 },
}

impl EnergyModel {
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match *self {
            EnergyModel::Fixed { energy } => energy,
            EnergyModel::PowerLaw { min, max, index } => {
                let u: f64 = rng.random();
                let a = index + 1.0;
                let e = if a.abs() < 1e-9 {
                    min * (max / min).powf(u)
                } else {
                    let lo = min.powf(a);
                    let hi = max.powf(a);
                    (lo + u * (hi - lo)).powf(1.0 / a)
                };
                e.clamp(min, max)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpeciesModel {
    Fixed { id: ParticleId },
    /// Species drawn with probability proportional to the weights
    Composition { entries: Vec<(ParticleId, f64)> },
}

impl SpeciesModel {
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> ParticleId {
        match self {
            SpeciesModel::Fixed { id } => *id,
            SpeciesModel::Composition { entries } => {
                let total: f64 = entries.iter().map(|(_, w)| w).sum();
                let mut u = rng.random::<f64>() * total;
                for (id, w) in entries {
                    if u < *w {
                        return *id;
                    }
                    u -= w;
                }
                entries[entries.len() - 1].0
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub position: PositionModel,
    /// Emission direction; -x points at the observer
    pub direction: DVec3,
    /// Derive the redshift from the emission distance
    pub redshift_from_position: bool,
    pub energy: EnergyModel,
    pub species: SpeciesModel,
}

impl Source {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.position {
            PositionModel::Fixed { distance } if !(distance.is_finite() && distance >= 0.0) => {
                return Err(ConfigError::InvalidParameter(format!(
                    "source distance must be finite and non-negative, got {distance}"
                )));
            }
            PositionModel::Uniform1D { min, max }
                if !(min.is_finite() && max.is_finite() && 0.0 <= min && min < max) =>
            {
                return Err(ConfigError::InvalidParameter(format!(
                    "source distance range [{min}, {max}] is empty or negative"
                )));
            }
            _ => {}
        }

        if !self.direction.is_finite() || self.direction.length_squared() == 0.0 {
            return Err(ConfigError::InvalidParameter(
                "source direction must be a non-zero vector".into(),
            ));
        }

        match self.energy {
            EnergyModel::Fixed { energy } if !(energy.is_finite() && energy > 0.0) => {
                return Err(ConfigError::InvalidParameter(format!(
                    "source energy must be positive, got {energy}"
                )));
            }
            EnergyModel::PowerLaw { min, max, index } => {
                if !(min > 0.0 && min < max && max.is_finite()) {
                    return Err(ConfigError::EmptyEnergyRange { min, max });
                }
                if !index.is_finite() {
                    return Err(ConfigError::InvalidParameter(
                        "spectral index must be finite".into(),
                    ));
                }
            }
            _ => {}
        }

        match &self.species {
            SpeciesModel::Fixed { id } if !id.is_known() => {
                return Err(ConfigError::UnknownSpecies(id.0.to_string()));
            }
            SpeciesModel::Composition { entries } => {
                if entries.is_empty() || entries.iter().any(|(_, w)| !(*w > 0.0)) {
                    return Err(ConfigError::InvalidParameter(
                        "composition needs positive weights".into(),
                    ));
                }
                if let Some((id, _)) = entries.iter().find(|(id, _)| !id.is_known()) {
                    return Err(ConfigError::UnknownSpecies(id.0.to_string()));
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Emit one primary for cascade `primary_index`
    pub fn emit<R: Rng + ?Sized>(
        &self,
        cosmology: &dyn Cosmology,
        primary_index: u64,
        rng: &mut R,
    ) -> Candidate {
        let distance = self.position.sample(rng);
        let energy = self.energy.sample(rng);
        let id = self.species.sample(rng);
        let redshift = if self.redshift_from_position {
            cosmology.redshift_at(distance)
        } else {
            0.0
        };
        let state = ParticleState::new(id, energy, DVec3::new(distance, 0.0, 0.0), self.direction);
        Candidate::primary(state, redshift, primary_index)
    }
}
