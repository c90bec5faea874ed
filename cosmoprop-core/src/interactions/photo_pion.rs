use super::{InteractionContext, ProcessKind, Secondaries, Thinning};
use crate::background::PhotonField;
use crate::candidate::Candidate;
use crate::particle::ParticleId;
use crate::physics_data::FractionSpectrum;
use rand::Rng;

/// Inelasticity used when the provider has no spectrum
const DEFAULT_INELASTICITY: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pion {
    Neutral,
    Plus,
    Minus,
}

/// Photo-pion production on nucleons, N γ_bg → N' π
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoPion {
    pub field: PhotonField,
    pub emit_photons: bool,
    pub emit_neutrinos: bool,
    pub emit_electrons: bool,
}

impl PhotoPion {
    pub fn new(field: PhotonField) -> Self {
        Self {
            field,
            emit_photons: true,
            emit_neutrinos: true,
            emit_electrons: true,
        }
    }

    pub fn with_secondaries(mut self, emit: bool) -> Self {
        self.emit_photons = emit;
        self.emit_neutrinos = emit;
        self.emit_electrons = emit;
        self
    }

    pub fn mean_free_path(&self, candidate: &Candidate, ctx: &InteractionContext<'_>) -> f64 {
        if !candidate.id().is_nucleus() {
            return f64::INFINITY;
        }
        ctx.mean_free_path(
            ProcessKind::PhotoPion,
            candidate.id(),
            candidate.energy(),
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
        let id = candidate.id();
        if !id.is_nucleus() {
            return;
        }
        let (a, z) = (id.mass_number(), id.charge_number());
        let energy = candidate.energy();
        let nucleon_energy = energy / a as f64;
        let on_proton = rng.random::<f64>() < z as f64 / a as f64;

        let inelasticity = ctx
            .spectrum(ProcessKind::PhotoPion, ParticleId::PROTON, nucleon_energy)
            .unwrap_or(&FractionSpectrum::Fixed {
                fraction: DEFAULT_INELASTICITY,
            })
            .sample(rng)
            .min(0.999);

        // Δ resonance isospin weights: 2/3 neutral pion, 1/3 charge exchange
        let charge_exchange = rng.random::<f64>() < 1.0 / 3.0;
        let (out_nucleon, pion) = match (on_proton, charge_exchange) {
            (true, false) => (ParticleId::PROTON, Pion::Neutral),
            (true, true) => (ParticleId::NEUTRON, Pion::Plus),
            (false, false) => (ParticleId::NEUTRON, Pion::Neutral),
            (false, true) => (ParticleId::PROTON, Pion::Minus),
        };
        let pion_energy = inelasticity * nucleon_energy;
        let nucleon_after = nucleon_energy - pion_energy;

        self.emit_pion_products(candidate, energy, pion, pion_energy, rng, out);

        if a == 1 {
            candidate.current.id = out_nucleon;
            candidate.current.energy = nucleon_after;
        } else {
            let Some(remnant) = ParticleId::nucleus(a - 1, z - u32::from(on_proton)) else {
                return;
            };
            out.emit(
                candidate,
                energy,
                out_nucleon,
                nucleon_after,
                Thinning::disabled(),
                ProcessKind::PhotoPion,
                rng,
            );
            candidate.current.id = remnant;
            candidate.current.energy = energy - nucleon_energy;
        }
    }

    /// π⁰ → γγ, π± → μ± ν → e± + three neutrinos, energy shared equally
    fn emit_pion_products<R: Rng + ?Sized>(
        &self,
        candidate: &Candidate,
        parent_energy: f64,
        pion: Pion,
        pion_energy: f64,
        rng: &mut R,
        out: &mut Secondaries,
    ) {
        let emit = |out: &mut Secondaries, rng: &mut R, id: ParticleId, e: f64| {
            out.emit(
                candidate,
                parent_energy,
                id,
                e,
                Thinning::disabled(),
                ProcessKind::PhotoPion,
                rng,
            )
        };
        match pion {
            Pion::Neutral => {
                if self.emit_photons {
                    emit(out, rng, ParticleId::PHOTON, 0.5 * pion_energy);
                    emit(out, rng, ParticleId::PHOTON, 0.5 * pion_energy);
                }
            }
            Pion::Plus | Pion::Minus => {
                let quarter = 0.25 * pion_energy;
                let (lepton, nu_e, nu_mu_a, nu_mu_b) = if pion == Pion::Plus {
                    (
                        ParticleId::POSITRON,
                        ParticleId::NU_E,
                        ParticleId::NU_MU,
                        ParticleId::ANTI_NU_MU,
                    )
                } else {
                    (
                        ParticleId::ELECTRON,
                        ParticleId::ANTI_NU_E,
                        ParticleId::ANTI_NU_MU,
                        ParticleId::NU_MU,
                    )
                };
                if self.emit_electrons {
                    emit(out, rng, lepton, quarter);
                }
                if self.emit_neutrinos {
                    for nu in [nu_e, nu_mu_a, nu_mu_b] {
                        emit(out, rng, nu, quarter);
                    }
                }
            }
        }
    }
}
