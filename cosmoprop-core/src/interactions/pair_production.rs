use super::{InteractionContext, ProcessKind, Secondaries, Thinning};
use crate::background::PhotonField;
use crate::candidate::Candidate;
use crate::particle::ParticleId;
use crate::physics_data::FractionSpectrum;
use crate::units::ELECTRON_MASS;
use rand::Rng;

/// Breit-Wheeler pair production, γ γ_bg → e⁺ e⁻
#[derive(Debug, Clone, PartialEq)]
pub struct PairProduction {
    pub field: PhotonField,
    pub thinning: Thinning,
    /// Queue the produced pair as secondaries
    pub emit_electrons: bool,
}

impl PairProduction {
    pub fn new(field: PhotonField) -> Self {
        Self {
            field,
            thinning: Thinning::disabled(),
            emit_electrons: true,
        }
    }

    pub fn with_thinning(mut self, thinning: Thinning) -> Self {
        self.thinning = thinning;
        self
    }

    pub fn with_secondaries(mut self, emit: bool) -> Self {
        self.emit_electrons = emit;
        self
    }

    /// Lowest background photon energy (eV) that can convert a photon of
    /// energy `energy`, under the configured dispersion relations.
    ///
    /// Head-on collisions give `s = 4 E ε + (E² - p²)_γ`; the pair needs
    /// `s ≥ 4 (E² - p²)_e` evaluated at half the photon energy each.
    pub fn threshold_photon_energy(&self, energy: f64, ctx: &InteractionContext<'_>) -> f64 {
        let kin = ctx.kinematics;
        let photon_shift = kin.relation(ParticleId::PHOTON).mass_shift(energy);
        let half = 0.5 * energy;
        let electron_mass2 = 0.5
            * (kin
                .relation(ParticleId::ELECTRON)
                .effective_mass_squared(ELECTRON_MASS, half)
                + kin
                    .relation(ParticleId::POSITRON)
                    .effective_mass_squared(ELECTRON_MASS, half));
        (4.0 * electron_mass2 - photon_shift) / (4.0 * energy)
    }

    /// Photon energy that has the same threshold under standard kinematics
    fn equivalent_energy(&self, energy: f64, redshift: f64, ctx: &InteractionContext<'_>) -> f64 {
        if ctx.kinematics.is_standard() {
            return energy;
        }
        let threshold = self.threshold_photon_energy(energy, ctx);
        if threshold <= 0.0 {
            // Every background photon is above threshold
            return f64::INFINITY;
        }
        if threshold > self.field.max_photon_energy(redshift) {
            return 0.0;
        }
        ELECTRON_MASS * ELECTRON_MASS / threshold
    }

    pub fn mean_free_path(&self, candidate: &Candidate, ctx: &InteractionContext<'_>) -> f64 {
        if !candidate.id().is_photon() {
            return f64::INFINITY;
        }
        let energy = self.equivalent_energy(candidate.energy(), candidate.redshift, ctx);
        if energy <= 0.0 {
            return f64::INFINITY;
        }
        ctx.mean_free_path(
            ProcessKind::PairProduction,
            ParticleId::PHOTON,
            energy,
            candidate.redshift,
            Some(self.field),
        )
    }

    pub fn interact<R: Rng + ?Sized>(
        &self,
        candidate: &mut Candidate,
        ctx: &InteractionContext<'_>,
        rng: &mut R,
        out: &mut Secondaries,
    ) {
        if !candidate.id().is_photon() {
            return;
        }
        let energy = candidate.energy();
        if self.emit_electrons {
            let fraction = ctx
                .spectrum(ProcessKind::PairProduction, ParticleId::PHOTON, energy)
                .unwrap_or(&FractionSpectrum::PairShape)
                .sample(rng);
            let electron = energy * fraction;
            let positron = energy - electron;
            out.emit(
                candidate,
                energy,
                ParticleId::ELECTRON,
                electron,
                self.thinning,
                ProcessKind::PairProduction,
                rng,
            );
            out.emit(
                candidate,
                energy,
                ParticleId::POSITRON,
                positron,
                self.thinning,
                ProcessKind::PairProduction,
                rng,
            );
        }
        candidate.deactivate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinematics::{DispersionRelation, KinematicsMap};
    use crate::tests::test_helpers::{photon, ContextFixture};
    use crate::units::{MPC, PEV, TEV};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_standard_threshold() {
        let fixture = ContextFixture::new();
        let pp = PairProduction::new(PhotonField::Cmb);
        let e = 1.0 * TEV;
        let expected = ELECTRON_MASS * ELECTRON_MASS / e;
        let th = pp.threshold_photon_energy(e, &fixture.context());
        assert!((th - expected).abs() / expected < 1e-12);
    }

    #[test]
    fn test_photon_mass_shift_lowers_threshold() {
        let liv = DispersionRelation::LorentzViolating {
            order: 1,
            coefficient: 10.0,
        };
        let fixture =
            ContextFixture::new().with_kinematics(KinematicsMap::new().with(ParticleId::PHOTON, liv));
        let pp = PairProduction::new(PhotonField::Cmb);
        let e = 10.0 * PEV;
        let standard = ELECTRON_MASS * ELECTRON_MASS / e;
        assert!(pp.threshold_photon_energy(e, &fixture.context()) < standard);
    }

    #[test]
    fn test_electron_mass_shift_raises_threshold() {
        let liv = DispersionRelation::LorentzViolating {
            order: 1,
            coefficient: 10.0,
        };
        let fixture = ContextFixture::new().with_kinematics(
            KinematicsMap::new()
                .with(ParticleId::ELECTRON, liv)
                .with(ParticleId::POSITRON, liv),
        );
        let pp = PairProduction::new(PhotonField::Cmb);
        let e = 10.0 * PEV;
        let standard = ELECTRON_MASS * ELECTRON_MASS / e;
        assert!(pp.threshold_photon_energy(e, &fixture.context()) > standard);
    }

    #[test]
    fn test_only_photons_interact() {
        let fixture = ContextFixture::new().with_constant_rate(
            ProcessKind::PairProduction,
            PhotonField::Cmb,
            ParticleId::PHOTON,
            1.0 / MPC,
        );
        let pp = PairProduction::new(PhotonField::Cmb);
        let ctx = fixture.context();
        let mut electron = photon(PEV, 10.0 * MPC);
        electron.current.id = ParticleId::ELECTRON;
        assert!(pp.mean_free_path(&electron, &ctx).is_infinite());
        let mfp = pp.mean_free_path(&photon(PEV, 10.0 * MPC), &ctx);
        assert!((mfp - MPC).abs() / MPC < 1e-9);
    }

    #[test]
    fn test_conversion_conserves_energy() {
        let fixture = ContextFixture::new();
        let pp = PairProduction::new(PhotonField::Cmb);
        let mut rng = StdRng::seed_from_u64(3);
        let mut candidate = photon(PEV, 10.0 * MPC);
        let mut out = Secondaries::new();
        pp.interact(&mut candidate, &fixture.context(), &mut rng, &mut out);
        assert!(!candidate.active);
        assert_eq!(out.len(), 2);
        let total: f64 = out.queue.iter().map(|c| c.energy()).sum();
        assert!((total - PEV).abs() / PEV < 1e-12);
        assert!(out.queue.iter().all(|c| c.weight() == 1.0));
        assert_eq!(out.queue[0].id(), ParticleId::ELECTRON);
        assert_eq!(out.queue[1].id(), ParticleId::POSITRON);
    }

    #[test]
    fn test_no_secondaries_when_disabled() {
        let fixture = ContextFixture::new();
        let pp = PairProduction::new(PhotonField::Cmb).with_secondaries(false);
        let mut rng = StdRng::seed_from_u64(3);
        let mut candidate = photon(PEV, MPC);
        let mut out = Secondaries::new();
        pp.interact(&mut candidate, &fixture.context(), &mut rng, &mut out);
        assert!(!candidate.active);
        assert!(out.is_empty());
    }
}
