//! Candidate: one particle history in flight

use crate::interactions::ProcessKind;
use crate::particle::ParticleId;
use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Kinematic state of a particle at one moment of its history
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParticleState {
    pub id: ParticleId,
    /// Lab-frame energy (eV)
    pub energy: f64,
    /// Position (m); the observer plane is x = 0
    pub position: DVec3,
    /// Unit direction of motion
    pub direction: DVec3,
}

impl ParticleState {
    pub fn new(id: ParticleId, energy: f64, position: DVec3, direction: DVec3) -> Self {
        Self {
            id,
            energy,
            position,
            direction: direction.normalize_or_zero(),
        }
    }

    /// Distance from the observer plane along x (m)
    pub fn distance(&self) -> f64 {
        self.position.x
    }
}

/// How a candidate came into existence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    Primary,
    Secondary { process: ProcessKind, generation: u32 },
}

impl Origin {
    pub fn generation(&self) -> u32 {
        match self {
            Origin::Primary => 0,
            Origin::Secondary { generation, .. } => *generation,
        }
    }

    /// Short tag written to the output's tag column
    pub fn tag(&self) -> &'static str {
        match self {
            Origin::Primary => "PRIM",
            Origin::Secondary { process, .. } => process.tag(),
        }
    }
}

/// A single simulated particle history
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub current: ParticleState,
    /// State of the primary at emission
    pub source: ParticleState,
    /// State of the parent when this candidate was created
    pub creator: ParticleState,
    pub redshift: f64,
    weight: f64,
    /// Path length travelled so far (m)
    pub trajectory_length: f64,
    /// Step size hint for the next propagation step (m)
    pub next_step: f64,
    pub step_count: u64,
    pub active: bool,
    pub origin: Origin,
    /// Index of the primary whose cascade this candidate belongs to
    pub primary_index: u64,
    /// Serial number within that cascade; the primary is 0
    pub serial: u64,
    pub parent_serial: u64,
}

impl Candidate {
    /// A fresh primary as produced by the source
    pub fn primary(state: ParticleState, redshift: f64, primary_index: u64) -> Self {
        Self {
            current: state,
            source: state,
            creator: state,
            redshift,
            weight: 1.0,
            trajectory_length: 0.0,
            next_step: f64::INFINITY,
            step_count: 0,
            active: true,
            origin: Origin::Primary,
            primary_index,
            serial: 0,
            parent_serial: 0,
        }
    }

    /// Create a secondary at the current position of `self`.
    ///
    /// `weight_factor` multiplies the parent's weight (1 without thinning).
    /// The serial number is assigned when the secondary is queued.
    pub fn spawn_secondary(
        &self,
        id: ParticleId,
        energy: f64,
        weight_factor: f64,
        process: ProcessKind,
    ) -> Candidate {
        let state = ParticleState {
            id,
            energy,
            position: self.current.position,
            direction: self.current.direction,
        };
        Candidate {
            current: state,
            source: self.source,
            creator: self.current,
            redshift: self.redshift,
            weight: self.weight * weight_factor,
            trajectory_length: 0.0,
            next_step: f64::INFINITY,
            step_count: 0,
            active: true,
            origin: Origin::Secondary {
                process,
                generation: self.origin.generation() + 1,
            },
            primary_index: self.primary_index,
            serial: 0,
            parent_serial: self.serial,
        }
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Multiply the statistical weight; the factor must be positive
    pub fn scale_weight(&mut self, factor: f64) {
        debug_assert!(factor > 0.0, "weight factor must be positive, got {factor}");
        self.weight *= factor;
    }

    pub fn id(&self) -> ParticleId {
        self.current.id
    }

    pub fn energy(&self) -> f64 {
        self.current.energy
    }

    /// Energy per nucleon for nuclei, plain energy otherwise
    pub fn lorentz_energy(&self) -> f64 {
        match self.current.id.mass_number() {
            0 => self.current.energy,
            a => self.current.energy / a as f64,
        }
    }

    /// Shrink the next step to at most `distance`
    pub fn limit_next_step(&mut self, distance: f64) {
        if distance < self.next_step {
            self.next_step = distance;
        }
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }

    pub fn is_primary(&self) -> bool {
        matches!(self.origin, Origin::Primary)
    }
}
