//! Particle species identifiers
//!
//! Species follow the PDG numbering scheme. Nuclei use the ten-digit form
//! `100ZZZAAAI` (here always with isomer level 0), so a proton is
//! `1000010010` and iron-56 is `1000260560`.

use crate::units::{ELECTRON_MASS, NEUTRON_MASS, PROTON_MASS};
use serde::{Deserialize, Serialize};
use std::fmt;

/// PDG-style particle code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticleId(pub i32);

impl ParticleId {
    pub const PHOTON: ParticleId = ParticleId(22);
    pub const ELECTRON: ParticleId = ParticleId(11);
    pub const POSITRON: ParticleId = ParticleId(-11);
    pub const NU_E: ParticleId = ParticleId(12);
    pub const ANTI_NU_E: ParticleId = ParticleId(-12);
    pub const NU_MU: ParticleId = ParticleId(14);
    pub const ANTI_NU_MU: ParticleId = ParticleId(-14);
    pub const NU_TAU: ParticleId = ParticleId(16);
    pub const ANTI_NU_TAU: ParticleId = ParticleId(-16);
    pub const PROTON: ParticleId = ParticleId(1_000_010_010);
    pub const NEUTRON: ParticleId = ParticleId(1_000_000_010);

    /// Nucleus code from mass number `a` and charge number `z`
    pub fn nucleus(a: u32, z: u32) -> Option<ParticleId> {
        if a == 0 || z > a || a > 999 {
            return None;
        }
        Some(ParticleId(1_000_000_000 + (z as i32) * 10_000 + (a as i32) * 10))
    }

    pub fn is_nucleus(self) -> bool {
        self.0 >= 1_000_000_000
    }

    pub fn is_photon(self) -> bool {
        self == Self::PHOTON
    }

    /// Charged leptons only (e±)
    pub fn is_electron(self) -> bool {
        self.0.abs() == 11
    }

    pub fn is_neutrino(self) -> bool {
        matches!(self.0.abs(), 12 | 14 | 16)
    }

    pub fn is_lepton(self) -> bool {
        self.is_electron() || self.is_neutrino()
    }

    /// Mass number A (0 for non-nuclei)
    pub fn mass_number(self) -> u32 {
        if self.is_nucleus() {
            ((self.0 / 10) % 1000) as u32
        } else {
            0
        }
    }

    /// Charge number Z (0 for non-nuclei)
    pub fn charge_number(self) -> u32 {
        if self.is_nucleus() {
            ((self.0 / 10_000) % 1000) as u32
        } else {
            0
        }
    }

    /// Rest energy in eV
    pub fn rest_mass(self) -> f64 {
        if self.is_nucleus() {
            let z = self.charge_number() as f64;
            let n = (self.mass_number() - self.charge_number()) as f64;
            z * PROTON_MASS + n * NEUTRON_MASS
        } else if self.is_electron() {
            ELECTRON_MASS
        } else {
            0.0
        }
    }

    /// Resolve a species name used in run scripts
    pub fn from_name(name: &str) -> Option<ParticleId> {
        let id = match name {
            "photon" | "gamma" => Self::PHOTON,
            "electron" => Self::ELECTRON,
            "positron" => Self::POSITRON,
            "proton" => Self::PROTON,
            "neutron" => Self::NEUTRON,
            "nu_e" => Self::NU_E,
            "anti_nu_e" => Self::ANTI_NU_E,
            "nu_mu" => Self::NU_MU,
            "anti_nu_mu" => Self::ANTI_NU_MU,
            "nu_tau" => Self::NU_TAU,
            "anti_nu_tau" => Self::ANTI_NU_TAU,
            _ => return None,
        };
        Some(id)
    }

    /// Whether this code names something the engine can propagate
    pub fn is_known(self) -> bool {
        self.is_photon()
            || self.is_lepton()
            || (self.is_nucleus()
                && self.mass_number() > 0
                && self.charge_number() <= self.mass_number())
    }
}

impl fmt::Display for ParticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::PHOTON => write!(f, "photon"),
            Self::ELECTRON => write!(f, "electron"),
            Self::POSITRON => write!(f, "positron"),
            Self::PROTON => write!(f, "proton"),
            Self::NEUTRON => write!(f, "neutron"),
            id if id.is_nucleus() => {
                write!(f, "nucleus(A={}, Z={})", id.mass_number(), id.charge_number())
            }
            id => write!(f, "{}", id.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nucleus_codes() {
        assert_eq!(ParticleId::nucleus(1, 1), Some(ParticleId::PROTON));
        assert_eq!(ParticleId::nucleus(1, 0), Some(ParticleId::NEUTRON));
        let iron = ParticleId::nucleus(56, 26).unwrap();
        assert_eq!(iron.0, 1_000_260_560);
        assert_eq!(iron.mass_number(), 56);
        assert_eq!(iron.charge_number(), 26);
        assert!(ParticleId::nucleus(2, 3).is_none());
    }

    #[test]
    fn test_classification() {
        assert!(ParticleId::PHOTON.is_photon());
        assert!(ParticleId::POSITRON.is_electron());
        assert!(ParticleId::ANTI_NU_MU.is_neutrino());
        assert!(!ParticleId::PHOTON.is_nucleus());
        assert_eq!(ParticleId::ELECTRON.mass_number(), 0);
        assert!(!ParticleId(999).is_known());
    }

    #[test]
    fn test_names() {
        assert_eq!(ParticleId::from_name("photon"), Some(ParticleId(22)));
        assert_eq!(ParticleId::from_name("pion"), None);
        assert_eq!(ParticleId::PROTON.to_string(), "proton");
    }
}
