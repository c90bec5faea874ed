//! Per-species dispersion relations
//!
//! Interaction thresholds depend on the energy-momentum relation of every
//! particle taking part. The standard relation is `E² = p² + m²`; the
//! Lorentz-violating alternative adds a term suppressed by the Planck
//! energy, `E² = p² + m² + χ pⁿ⁺² / E_Plⁿ`.

use crate::particle::ParticleId;
use crate::units::PLANCK_ENERGY;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DispersionRelation {
    #[default]
    Special,
    LorentzViolating { order: u32, coefficient: f64 },
}

impl DispersionRelation {
    pub fn is_standard(&self) -> bool {
        match self {
            DispersionRelation::Special => true,
            DispersionRelation::LorentzViolating { coefficient, .. } => *coefficient == 0.0,
        }
    }

    /// Deviation of `E² - p²` from `m²` at the given energy (eV²)
    pub fn mass_shift(&self, energy: f64) -> f64 {
        match *self {
            DispersionRelation::Special => 0.0,
            DispersionRelation::LorentzViolating { order, coefficient } => {
                let n = order as i32;
                coefficient * energy * energy * (energy / PLANCK_ENERGY).powi(n)
            }
        }
    }

    /// Effective invariant mass squared `E² - p²` of a particle with rest mass `mass`
    pub fn effective_mass_squared(&self, mass: f64, energy: f64) -> f64 {
        mass * mass + self.mass_shift(energy)
    }

    /// Momentum of a particle with the given energy (eV)
    pub fn momentum(&self, mass: f64, energy: f64) -> f64 {
        let p2 = energy * energy - self.effective_mass_squared(mass, energy);
        p2.max(0.0).sqrt()
    }
}

/// Mapping from species to dispersion relation.
///
/// Species without an entry follow the standard relation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KinematicsMap {
    relations: BTreeMap<ParticleId, DispersionRelation>,
}

impl KinematicsMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: ParticleId, relation: DispersionRelation) {
        self.relations.insert(id, relation);
    }

    pub fn with(mut self, id: ParticleId, relation: DispersionRelation) -> Self {
        self.add(id, relation);
        self
    }

    pub fn relation(&self, id: ParticleId) -> DispersionRelation {
        self.relations.get(&id).copied().unwrap_or_default()
    }

    /// True when every species uses the standard relation
    pub fn is_standard(&self) -> bool {
        self.relations.values().all(DispersionRelation::is_standard)
    }

    pub fn entries(&self) -> impl Iterator<Item = (ParticleId, DispersionRelation)> + '_ {
        self.relations.iter().map(|(id, rel)| (*id, *rel))
    }
}
