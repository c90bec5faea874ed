//! Unit constants
//!
//! Base units are the electronvolt for energy, the metre for length and the
//! second for time. Multiply a number by a constant to convert into base
//! units, divide to convert back: `10.0 * GEV`, `distance / MPC`.

pub const EV: f64 = 1.0;
pub const KEV: f64 = 1e3 * EV;
pub const MEV: f64 = 1e6 * EV;
pub const GEV: f64 = 1e9 * EV;
pub const TEV: f64 = 1e12 * EV;
pub const PEV: f64 = 1e15 * EV;
pub const EEV: f64 = 1e18 * EV;
pub const ZEV: f64 = 1e21 * EV;

pub const METER: f64 = 1.0;
pub const KILOMETER: f64 = 1e3 * METER;
pub const PARSEC: f64 = 3.085_677_581_491_367e16 * METER;
pub const KPC: f64 = 1e3 * PARSEC;
pub const MPC: f64 = 1e6 * PARSEC;
pub const GPC: f64 = 1e9 * PARSEC;

pub const SECOND: f64 = 1.0;

/// Speed of light (m/s)
pub const C_LIGHT: f64 = 299_792_458.0 * METER / SECOND;

/// Electron rest energy (eV)
pub const ELECTRON_MASS: f64 = 510_998.950 * EV;
/// Proton rest energy (eV)
pub const PROTON_MASS: f64 = 938.272_088 * MEV;
/// Neutron rest energy (eV)
pub const NEUTRON_MASS: f64 = 939.565_420 * MEV;
/// Charged pion rest energy (eV)
pub const PION_MASS: f64 = 139.570 * MEV;
/// Planck energy (eV), the scale of Lorentz-violating terms
pub const PLANCK_ENERGY: f64 = 1.220_890e28 * EV;

/// Look up an energy unit by its script suffix
pub fn energy_unit(name: &str) -> Option<f64> {
    match name {
        "eV" => Some(EV),
        "keV" => Some(KEV),
        "MeV" => Some(MEV),
        "GeV" => Some(GEV),
        "TeV" => Some(TEV),
        "PeV" => Some(PEV),
        "EeV" => Some(EEV),
        "ZeV" => Some(ZEV),
        _ => None,
    }
}

/// Look up a length unit by its script suffix
pub fn length_unit(name: &str) -> Option<f64> {
    match name {
        "m" => Some(METER),
        "km" => Some(KILOMETER),
        "pc" => Some(PARSEC),
        "kpc" => Some(KPC),
        "Mpc" => Some(MPC),
        "Gpc" => Some(GPC),
        _ => None,
    }
}
