use super::{InteractionContext, ProcessKind, Secondaries, Thinning};
use crate::background::PhotonField;
use crate::candidate::Candidate;
use crate::particle::ParticleId;
use crate::units::ELECTRON_MASS;
use rand::Rng;

/// Inverse Compton scattering of background photons off e±
#[derive(Debug, Clone, PartialEq)]
pub struct InverseCompton {
    pub field: PhotonField,
    pub thinning: Thinning,
    /// Queue the up-scattered photons as secondaries
    pub emit_photons: bool,
}

impl InverseCompton {
    pub fn new(field: PhotonField) -> Self {
        Self {
            field,
            thinning: Thinning::disabled(),
            emit_photons: true,
        }
    }

    pub fn with_thinning(mut self, thinning: Thinning) -> Self {
        self.thinning = thinning;
        self
    }

    pub fn with_secondaries(mut self, emit: bool) -> Self {
        self.emit_photons = emit;
        self
    }

    /// Lepton energy giving the same centre-of-mass energy against a typical
    /// background photon under standard kinematics
    fn equivalent_energy(&self, candidate: &Candidate, ctx: &InteractionContext<'_>) -> f64 {
        let energy = candidate.energy();
        let shift = ctx.kinematics.relation(candidate.id()).mass_shift(energy);
        if shift == 0.0 {
            return energy;
        }
        let eps = self.field.mean_photon_energy(candidate.redshift);
        energy + shift / (4.0 * eps)
    }

    pub fn mean_free_path(&self, candidate: &Candidate, ctx: &InteractionContext<'_>) -> f64 {
        if !candidate.id().is_electron() {
            return f64::INFINITY;
        }
        let energy = self.equivalent_energy(candidate, ctx);
        if energy <= 0.0 {
            return f64::INFINITY;
        }
        ctx.mean_free_path(
            ProcessKind::InverseCompton,
            candidate.id(),
            energy,
            candidate.redshift,
            Some(self.field),
        )
    }

    /// Mean fraction of the lepton energy handed to the photon: Thomson
    /// scaling `4 E ε / 3 m²`, saturating in the Klein-Nishina regime
    pub fn mean_transfer(&self, energy: f64, redshift: f64) -> f64 {
        let eps = self.field.mean_photon_energy(redshift);
        let t = 4.0 * energy * eps / (3.0 * ELECTRON_MASS * ELECTRON_MASS);
        t / (1.0 + t)
    }

    pub fn interact<R: Rng + ?Sized>(
        &self,
        candidate: &mut Candidate,
        ctx: &InteractionContext<'_>,
        rng: &mut R,
        out: &mut Secondaries,
    ) {
        if !candidate.id().is_electron() {
            return;
        }
        let energy = candidate.energy();
        let transfer = match ctx.spectrum(ProcessKind::InverseCompton, candidate.id(), energy) {
            Some(spectrum) => spectrum.sample(rng),
            None => self.mean_transfer(energy, candidate.redshift),
        };
        // The lepton must keep something; a full transfer would be a conversion
        let photon = energy * transfer.min(1.0 - f64::EPSILON);
        if self.emit_photons {
            out.emit(
                candidate,
                energy,
                ParticleId::PHOTON,
                photon,
                self.thinning,
                ProcessKind::InverseCompton,
                rng,
            );
        }
        candidate.current.energy = energy - photon;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics_data::FractionSpectrum;
    use crate::tests::test_helpers::{electron, ContextFixture};
    use crate::units::{GEV, MPC, TEV};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_thomson_regime_transfer_is_small() {
        let ics = InverseCompton::new(PhotonField::Cmb);
        let y = ics.mean_transfer(1.0 * GEV, 0.0);
        assert!(y > 0.0 && y < 1e-2, "y = {y}");
        let kn = ics.mean_transfer(1e21, 0.0);
        assert!(kn > 0.9);
    }

    #[test]
    fn test_lepton_loses_what_photon_gains() {
        let fixture = ContextFixture::new().with_physics(|p| {
            p.with_spectrum(
                ProcessKind::InverseCompton,
                ParticleId::ELECTRON,
                FractionSpectrum::Fixed { fraction: 0.25 },
            )
        });
        let ics = InverseCompton::new(PhotonField::Cmb);
        let mut rng = StdRng::seed_from_u64(1);
        let mut lepton = electron(TEV, MPC);
        let mut out = Secondaries::new();
        ics.interact(&mut lepton, &fixture.context(), &mut rng, &mut out);
        assert!(lepton.active);
        assert!((lepton.energy() - 0.75 * TEV).abs() < 1.0);
        assert_eq!(out.len(), 1);
        assert_eq!(out.queue[0].id(), ParticleId::PHOTON);
        assert!((out.queue[0].energy() - 0.25 * TEV).abs() < 1.0);
        assert_eq!(out.queue[0].creator.energy, TEV);
    }

    #[test]
    fn test_nucleus_is_ignored() {
        let fixture = ContextFixture::new().with_constant_rate(
            ProcessKind::InverseCompton,
            PhotonField::Cmb,
            ParticleId::ELECTRON,
            1.0 / MPC,
        );
        let ics = InverseCompton::new(PhotonField::Cmb);
        let mut proton = electron(TEV, MPC);
        proton.current.id = ParticleId::PROTON;
        let ctx = fixture.context();
        assert!(ics.mean_free_path(&proton, &ctx).is_infinite());
        let mut rng = StdRng::seed_from_u64(1);
        let mut out = Secondaries::new();
        ics.interact(&mut proton, &ctx, &mut rng, &mut out);
        assert_eq!(proton.energy(), TEV);
        assert!(out.is_empty());
    }
}
