//! Interaction modules
//!
//! One module instance per physical process and photon field. Discrete
//! processes propose a sampled free path and, when the candidate gets that
//! far, transform it and emit secondaries. Continuous processes scale the
//! candidate's energy over every step and only ever limit the step size.

mod continuous;
mod nuclear;
mod pair_production;
mod inverse_compton;
mod photo_pion;

pub use continuous::{ElectronPairProduction, RedshiftLoss};
pub use inverse_compton::InverseCompton;
pub use nuclear::{NuclearDecay, PhotoDisintegration};
pub use pair_production::PairProduction;
pub use photo_pion::PhotoPion;

use crate::background::PhotonField;
use crate::candidate::Candidate;
use crate::error::ConfigError;
use crate::kinematics::KinematicsMap;
use crate::particle::ParticleId;
use crate::physics_data::{FractionSpectrum, MissingDataCache, MissingDataLog, PhysicsData};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Physical process identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessKind {
    PairProduction,
    InverseCompton,
    PhotoDisintegration,
    PhotoPion,
    ElectronPairProduction,
    NuclearDecay,
    Redshift,
}

impl ProcessKind {
    pub fn name(self) -> &'static str {
        match self {
            ProcessKind::PairProduction => "pair_production",
            ProcessKind::InverseCompton => "inverse_compton",
            ProcessKind::PhotoDisintegration => "photo_disintegration",
            ProcessKind::PhotoPion => "photo_pion",
            ProcessKind::ElectronPairProduction => "electron_pair_production",
            ProcessKind::NuclearDecay => "nuclear_decay",
            ProcessKind::Redshift => "redshift",
        }
    }

    pub fn from_name(name: &str) -> Option<ProcessKind> {
        let kind = match name {
            "pair_production" => ProcessKind::PairProduction,
            "inverse_compton" => ProcessKind::InverseCompton,
            "photo_disintegration" => ProcessKind::PhotoDisintegration,
            "photo_pion" => ProcessKind::PhotoPion,
            "electron_pair_production" => ProcessKind::ElectronPairProduction,
            "nuclear_decay" => ProcessKind::NuclearDecay,
            "redshift" => ProcessKind::Redshift,
            _ => return None,
        };
        Some(kind)
    }

    /// Tag written to the output for secondaries created by this process
    pub fn tag(self) -> &'static str {
        match self {
            ProcessKind::PairProduction => "PP",
            ProcessKind::InverseCompton => "ICS",
            ProcessKind::PhotoDisintegration => "PD",
            ProcessKind::PhotoPion => "PPP",
            ProcessKind::ElectronPairProduction => "EPP",
            ProcessKind::NuclearDecay => "ND",
            ProcessKind::Redshift => "Z",
        }
    }

    /// Whether the process needs a photon background
    pub fn needs_field(self) -> bool {
        !matches!(self, ProcessKind::NuclearDecay | ProcessKind::Redshift)
    }
}

impl fmt::Display for ProcessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Statistical thinning of secondaries.
///
/// A secondary carrying fraction `x` of its parent's energy survives with
/// probability `max(f, x)` and has its weight divided by that probability,
/// so the expected weight of every secondary class is unchanged. `f = 1`
/// keeps everything at unit weight factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Thinning(f64);

impl Thinning {
    pub fn new(factor: f64) -> Result<Self, ConfigError> {
        if factor > 0.0 && factor <= 1.0 {
            Ok(Self(factor))
        } else {
            Err(ConfigError::InvalidThinning(factor))
        }
    }

    pub fn disabled() -> Self {
        Self(1.0)
    }

    pub fn factor(self) -> f64 {
        self.0
    }

    pub fn is_enabled(self) -> bool {
        self.0 < 1.0
    }

    pub fn survival_probability(self, fraction: f64) -> f64 {
        if !self.is_enabled() {
            return 1.0;
        }
        fraction.clamp(0.0, 1.0).max(self.0)
    }

    /// Weight factor for a kept secondary, or `None` if it is dropped
    pub fn select<R: Rng + ?Sized>(self, fraction: f64, rng: &mut R) -> Option<f64> {
        let p = self.survival_probability(fraction);
        if p >= 1.0 {
            return Some(1.0);
        }
        if rng.random::<f64>() < p {
            Some(1.0 / p)
        } else {
            None
        }
    }
}

impl Default for Thinning {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Read-only resources shared by every module during a run
#[derive(Clone, Copy)]
pub struct InteractionContext<'a> {
    pub physics: &'a dyn PhysicsData,
    pub kinematics: &'a KinematicsMap,
    pub missing: &'a MissingDataLog,
    /// Misses already seen by this worker
    pub seen: &'a MissingDataCache,
}

impl<'a> InteractionContext<'a> {
    /// Free path from the provider; missing data counts as "never happens"
    pub fn mean_free_path(
        &self,
        process: ProcessKind,
        species: ParticleId,
        energy: f64,
        redshift: f64,
        field: Option<PhotonField>,
    ) -> f64 {
        match self
            .physics
            .mean_free_path(process, species, energy, redshift, field)
        {
            Ok(length) if length > 0.0 => length,
            Ok(_) => f64::INFINITY,
            Err(missing) => {
                self.seen.report(&missing, self.missing);
                f64::INFINITY
            }
        }
    }

    /// Provider spectrum if there is one for this tuple
    pub fn spectrum(
        &self,
        process: ProcessKind,
        species: ParticleId,
        energy: f64,
    ) -> Option<&'a FractionSpectrum> {
        self.physics.secondary_spectrum(process, species, energy).ok()
    }
}

/// Secondaries produced during one interaction
#[derive(Debug, Default)]
pub struct Secondaries {
    pub queue: Vec<Candidate>,
    /// Secondaries discarded by thinning
    pub thinned: u64,
}

impl Secondaries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a secondary of `parent` after the thinning decision.
    ///
    /// `parent_energy` is the parent's energy before the interaction.
    #[allow(clippy::too_many_arguments)]
    pub fn emit<R: Rng + ?Sized>(
        &mut self,
        parent: &Candidate,
        parent_energy: f64,
        id: ParticleId,
        energy: f64,
        thinning: Thinning,
        process: ProcessKind,
        rng: &mut R,
    ) {
        if energy <= 0.0 {
            return;
        }
        match thinning.select(energy / parent_energy, rng) {
            Some(factor) => {
                let mut secondary = parent.spawn_secondary(id, energy, factor, process);
                secondary.creator.energy = parent_energy;
                self.queue.push(secondary);
            }
            None => self.thinned += 1,
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// What a module asks of the next propagation step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepProposal {
    /// Requested maximum step (m); infinite when the module has no opinion
    pub distance: f64,
    /// Whether reaching `distance` triggers a discrete interaction
    pub discrete: bool,
}

impl StepProposal {
    pub fn none() -> Self {
        Self {
            distance: f64::INFINITY,
            discrete: false,
        }
    }
}

/// Sample an exponentially distributed distance with the given mean
pub fn sample_free_path<R: Rng + ?Sized>(mean_free_path: f64, rng: &mut R) -> f64 {
    if !mean_free_path.is_finite() {
        return f64::INFINITY;
    }
    let u: f64 = rng.random();
    -mean_free_path * (1.0 - u).ln()
}

/// Closed set of interaction modules
#[derive(Debug, Clone, PartialEq)]
pub enum Interaction {
    PairProduction(PairProduction),
    InverseCompton(InverseCompton),
    PhotoDisintegration(PhotoDisintegration),
    PhotoPion(PhotoPion),
    ElectronPairProduction(ElectronPairProduction),
    NuclearDecay(NuclearDecay),
    Redshift(RedshiftLoss),
}

impl Interaction {
    pub fn kind(&self) -> ProcessKind {
        match self {
            Interaction::PairProduction(_) => ProcessKind::PairProduction,
            Interaction::InverseCompton(_) => ProcessKind::InverseCompton,
            Interaction::PhotoDisintegration(_) => ProcessKind::PhotoDisintegration,
            Interaction::PhotoPion(_) => ProcessKind::PhotoPion,
            Interaction::ElectronPairProduction(_) => ProcessKind::ElectronPairProduction,
            Interaction::NuclearDecay(_) => ProcessKind::NuclearDecay,
            Interaction::Redshift(_) => ProcessKind::Redshift,
        }
    }

    pub fn field(&self) -> Option<PhotonField> {
        match self {
            Interaction::PairProduction(m) => Some(m.field),
            Interaction::InverseCompton(m) => Some(m.field),
            Interaction::PhotoDisintegration(m) => Some(m.field),
            Interaction::PhotoPion(m) => Some(m.field),
            Interaction::ElectronPairProduction(m) => Some(m.field),
            Interaction::NuclearDecay(_) | Interaction::Redshift(_) => None,
        }
    }

    pub fn is_continuous(&self) -> bool {
        matches!(
            self,
            Interaction::ElectronPairProduction(_) | Interaction::Redshift(_)
        )
    }

    /// Distance this module allows the candidate to travel next
    pub fn propose<R: Rng + ?Sized>(
        &self,
        candidate: &Candidate,
        ctx: &InteractionContext<'_>,
        rng: &mut R,
    ) -> StepProposal {
        let discrete = |mfp: f64, rng: &mut R| StepProposal {
            distance: sample_free_path(mfp, rng),
            discrete: true,
        };
        match self {
            Interaction::PairProduction(m) => discrete(m.mean_free_path(candidate, ctx), rng),
            Interaction::InverseCompton(m) => discrete(m.mean_free_path(candidate, ctx), rng),
            Interaction::PhotoDisintegration(m) => {
                discrete(m.mean_free_path(candidate, ctx), rng)
            }
            Interaction::PhotoPion(m) => discrete(m.mean_free_path(candidate, ctx), rng),
            Interaction::NuclearDecay(m) => discrete(m.mean_free_path(candidate, ctx), rng),
            Interaction::ElectronPairProduction(m) => StepProposal {
                distance: m.step_limit(candidate, ctx),
                discrete: false,
            },
            Interaction::Redshift(_) => StepProposal::none(),
        }
    }

    /// Continuous energy change over a step of length `step` that started at
    /// redshift `redshift_before`
    pub fn apply_continuous(
        &self,
        candidate: &mut Candidate,
        step: f64,
        redshift_before: f64,
        ctx: &InteractionContext<'_>,
    ) {
        match self {
            Interaction::ElectronPairProduction(m) => m.apply(candidate, step, ctx),
            Interaction::Redshift(m) => m.apply(candidate, redshift_before),
            _ => {}
        }
    }

    /// Perform the discrete interaction on `candidate`
    pub fn interact<R: Rng + ?Sized>(
        &self,
        candidate: &mut Candidate,
        ctx: &InteractionContext<'_>,
        rng: &mut R,
        out: &mut Secondaries,
    ) {
        match self {
            Interaction::PairProduction(m) => m.interact(candidate, ctx, rng, out),
            Interaction::InverseCompton(m) => m.interact(candidate, ctx, rng, out),
            Interaction::PhotoDisintegration(m) => m.interact(candidate, rng, out),
            Interaction::PhotoPion(m) => m.interact(candidate, ctx, rng, out),
            Interaction::NuclearDecay(m) => m.interact(candidate, ctx, rng, out),
            Interaction::ElectronPairProduction(_) | Interaction::Redshift(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_thinning_bounds() {
        assert!(Thinning::new(0.0).is_err());
        assert!(Thinning::new(1.5).is_err());
        assert!(Thinning::new(f64::NAN).is_err());
        assert!(Thinning::new(1.0).is_ok());
        assert!(!Thinning::disabled().is_enabled());
    }

    #[test]
    fn test_disabled_thinning_keeps_everything() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            assert_eq!(Thinning::disabled().select(1e-6, &mut rng), Some(1.0));
        }
    }

    #[test]
    fn test_thinning_preserves_expected_weight() {
        let thinning = Thinning::new(0.1).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let n = 200_000;
        let total: f64 = (0..n)
            .filter_map(|_| thinning.select(0.01, &mut rng))
            .sum();
        // Each trial contributes 1 in expectation; std of the mean ≈ 3/sqrt(n)
        let mean = total / n as f64;
        assert!((mean - 1.0).abs() < 0.03, "mean weight {mean}");
    }

    #[test]
    fn test_high_fraction_secondaries_survive_more_often() {
        let thinning = Thinning::new(0.1).unwrap();
        assert_eq!(thinning.survival_probability(0.01), 0.1);
        assert_eq!(thinning.survival_probability(0.6), 0.6);
    }

    #[test]
    fn test_free_path_mean() {
        let mut rng = StdRng::seed_from_u64(9);
        let n = 100_000;
        let mean: f64 = (0..n).map(|_| sample_free_path(2.0, &mut rng)).sum::<f64>() / n as f64;
        assert!((mean - 2.0).abs() < 0.05, "mean {mean}");
        assert!(sample_free_path(f64::INFINITY, &mut rng).is_infinite());
    }

    #[test]
    fn test_process_names() {
        for name in ["pair_production", "photo_pion", "redshift"] {
            assert_eq!(ProcessKind::from_name(name).unwrap().name(), name);
        }
        assert!(ProcessKind::from_name("bremsstrahlung").is_none());
        assert!(!ProcessKind::Redshift.needs_field());
    }
}
