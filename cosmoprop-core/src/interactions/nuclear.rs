//! Processes that change the mass or charge number of a nucleus

use super::{InteractionContext, ProcessKind, Secondaries, Thinning};
use crate::background::PhotonField;
use crate::candidate::Candidate;
use crate::particle::ParticleId;
use crate::physics_data::DecayMode;
use crate::units::ELECTRON_MASS;
use rand::Rng;

/// Remove `da` nucleons of which `dz` are protons from the candidate,
/// emitting them as a single fragment with the same Lorentz factor.
///
/// Returns false (and leaves the candidate alone) if the split is not
/// possible.
fn split_off<R: Rng + ?Sized>(
    candidate: &mut Candidate,
    da: u32,
    dz: u32,
    process: ProcessKind,
    rng: &mut R,
    out: &mut Secondaries,
) -> bool {
    let id = candidate.id();
    let (a, z) = (id.mass_number(), id.charge_number());
    if da >= a || dz > z || dz > da {
        return false;
    }
    let (Some(fragment), Some(remnant)) =
        (ParticleId::nucleus(da, dz), ParticleId::nucleus(a - da, z - dz))
    else {
        return false;
    };
    let energy = candidate.energy();
    let fragment_energy = energy * da as f64 / a as f64;
    out.emit(
        candidate,
        energy,
        fragment,
        fragment_energy,
        Thinning::disabled(),
        process,
        rng,
    );
    candidate.current.id = remnant;
    candidate.current.energy = energy - fragment_energy;
    true
}

/// Photo-disintegration of nuclei: single-nucleon emission
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoDisintegration {
    pub field: PhotonField,
}

impl PhotoDisintegration {
    pub fn new(field: PhotonField) -> Self {
        Self { field }
    }

    pub fn mean_free_path(&self, candidate: &Candidate, ctx: &InteractionContext<'_>) -> f64 {
        let id = candidate.id();
        if !id.is_nucleus() || id.mass_number() < 2 {
            return f64::INFINITY;
        }
        ctx.mean_free_path(
            ProcessKind::PhotoDisintegration,
            id,
            candidate.energy(),
            candidate.redshift,
            Some(self.field),
        )
    }

    pub fn interact<R: Rng + ?Sized>(
        &self,
        candidate: &mut Candidate,
        rng: &mut R,
        out: &mut Secondaries,
    ) {
        let id = candidate.id();
        if !id.is_nucleus() || id.mass_number() < 2 {
            return;
        }
        let (a, z) = (id.mass_number() as f64, id.charge_number() as f64);
        let proton = rng.random::<f64>() < z / a;
        split_off(
            candidate,
            1,
            u32::from(proton),
            ProcessKind::PhotoDisintegration,
            rng,
            out,
        );
    }
}

/// Decay of unstable nuclei and free neutrons
#[derive(Debug, Clone, PartialEq)]
pub struct NuclearDecay {
    pub emit_electrons: bool,
    pub emit_neutrinos: bool,
}

impl Default for NuclearDecay {
    fn default() -> Self {
        Self {
            emit_electrons: true,
            emit_neutrinos: true,
        }
    }
}

impl NuclearDecay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secondaries(mut self, emit: bool) -> Self {
        self.emit_electrons = emit;
        self.emit_neutrinos = emit;
        self
    }

    pub fn mean_free_path(&self, candidate: &Candidate, ctx: &InteractionContext<'_>) -> f64 {
        let id = candidate.id();
        if !id.is_nucleus() || ctx.physics.decay(id).is_none() {
            return f64::INFINITY;
        }
        ctx.mean_free_path(
            ProcessKind::NuclearDecay,
            id,
            candidate.energy(),
            candidate.redshift,
            None,
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
        let Some(mode) = ctx.physics.decay(id).and_then(|d| d.pick_channel(rng)) else {
            return;
        };
        let (a, z) = (id.mass_number(), id.charge_number());
        match mode {
            DecayMode::BetaMinus => self.beta(candidate, z + 1, true, rng, out),
            DecayMode::BetaPlus if z > 0 => self.beta(candidate, z - 1, false, rng, out),
            DecayMode::ProtonEmission => {
                split_off(candidate, 1, 1, ProcessKind::NuclearDecay, rng, out);
            }
            DecayMode::NeutronEmission => {
                split_off(candidate, 1, 0, ProcessKind::NuclearDecay, rng, out);
            }
            DecayMode::AlphaEmission if a > 4 => {
                split_off(candidate, 4, 2, ProcessKind::NuclearDecay, rng, out);
            }
            _ => log::debug!("decay mode {mode:?} not possible for {id}"),
        }
    }

    /// β decay keeping the nucleus' Lorentz factor. The e± and neutrino
    /// share the energy released equally.
    fn beta<R: Rng + ?Sized>(
        &self,
        candidate: &mut Candidate,
        new_z: u32,
        minus: bool,
        rng: &mut R,
        out: &mut Secondaries,
    ) {
        let id = candidate.id();
        let Some(daughter) = ParticleId::nucleus(id.mass_number(), new_z) else {
            return;
        };
        let energy = candidate.energy();
        let gamma = energy / id.rest_mass();
        let q = (id.rest_mass() - daughter.rest_mass()).max(ELECTRON_MASS);
        let lepton_energy = 0.5 * gamma * q;
        let daughter_energy = (gamma * daughter.rest_mass()).min(energy - 2.0 * lepton_energy);
        if daughter_energy <= 0.0 {
            return;
        }

        let (charged, neutrino) = if minus {
            (ParticleId::ELECTRON, ParticleId::ANTI_NU_E)
        } else {
            (ParticleId::POSITRON, ParticleId::NU_E)
        };
        let never_thin = Thinning::disabled();
        if self.emit_electrons {
            out.emit(
                candidate,
                energy,
                charged,
                lepton_energy,
                never_thin,
                ProcessKind::NuclearDecay,
                rng,
            );
        }
        if self.emit_neutrinos {
            out.emit(
                candidate,
                energy,
                neutrino,
                lepton_energy,
                never_thin,
                ProcessKind::NuclearDecay,
                rng,
            );
        }
        candidate.current.id = daughter;
        candidate.current.energy = daughter_energy;
    }
}
