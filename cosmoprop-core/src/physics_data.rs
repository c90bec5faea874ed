//! Physics data provider
//!
//! Interaction rates and secondary distributions are supplied data, not
//! computed here. [`PhysicsData`] is the seam; [`TabulatedPhysics`] is the
//! implementation backed by z = 0 rate tables that the CLI loads from JSON.

use crate::background::PhotonField;
use crate::error::{ConfigError, DataUnavailable};
use crate::interactions::ProcessKind;
use crate::particle::ParticleId;
use crate::units::C_LIGHT;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Read-only source of interaction lengths and secondary distributions
pub trait PhysicsData: Send + Sync {
    /// Mean free path (m) of `process` for a particle of `species` and lab
    /// energy `energy` (eV) at redshift `redshift`.
    ///
    /// `Ok(f64::INFINITY)` means the process cannot happen (below threshold).
    /// For continuous losses the value is the energy-loss length `E / (dE/dx)`.
    fn mean_free_path(
        &self,
        process: ProcessKind,
        species: ParticleId,
        energy: f64,
        redshift: f64,
        field: Option<PhotonField>,
    ) -> Result<f64, DataUnavailable>;

    /// Distribution of the energy fraction handed to the leading secondary
    fn secondary_spectrum(
        &self,
        process: ProcessKind,
        species: ParticleId,
        energy: f64,
    ) -> Result<&FractionSpectrum, DataUnavailable>;

    /// Decay properties of an unstable species
    fn decay(&self, species: ParticleId) -> Option<&DecayData>;
}

/// Interaction rate (1/m) at z = 0 on a log10-energy grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    log10_energy: Vec<f64>,
    rate: Vec<f64>,
}

impl RateTable {
    pub fn new(log10_energy: Vec<f64>, rate: Vec<f64>) -> Result<Self, ConfigError> {
        let table = Self { log10_energy, rate };
        table.validate()?;
        Ok(table)
    }

    /// Same rate at every energy above `threshold` (eV)
    pub fn constant(threshold: f64, rate: f64) -> Self {
        let lo = threshold.log10();
        Self {
            log10_energy: vec![lo, lo + 12.0],
            rate: vec![rate, rate],
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.log10_energy.len() < 2 || self.log10_energy.len() != self.rate.len() {
            return Err(ConfigError::InvalidTable(
                "rate table needs at least two points and matching lengths".into(),
            ));
        }
        if self.log10_energy.windows(2).any(|w| w[1] <= w[0]) {
            return Err(ConfigError::InvalidTable(
                "rate table energies must be strictly ascending".into(),
            ));
        }
        if self.rate.iter().any(|r| !r.is_finite() || *r < 0.0) {
            return Err(ConfigError::InvalidTable(
                "rates must be finite and non-negative".into(),
            ));
        }
        Ok(())
    }

    /// Rate at energy `energy`; zero below the grid, clamped above it
    pub fn rate_at(&self, energy: f64) -> f64 {
        if energy <= 0.0 {
            return 0.0;
        }
        let x = energy.log10();
        match self.log10_energy.first() {
            Some(&lo) if x >= lo && self.rate.len() == self.log10_energy.len() => {}
            _ => return 0.0,
        }
        crate::cosmology::interpolate(x, &self.log10_energy, &self.rate)
    }
}

/// Distribution of an energy fraction in (0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FractionSpectrum {
    Fixed { fraction: f64 },
    Uniform { min: f64, max: f64 },
    /// Inverse CDF: `quantiles[i]` is the fraction at cumulative probability
    /// `i / (len - 1)`
    Tabulated { quantiles: Vec<f64> },
    /// High-energy pair-production shape `1 - 4/3 x (1 - x)`
    PairShape,
}

impl FractionSpectrum {
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let x = match self {
            FractionSpectrum::Fixed { fraction } => *fraction,
            FractionSpectrum::Uniform { min, max } => min + (max - min) * rng.random::<f64>(),
            FractionSpectrum::Tabulated { quantiles } => {
                let u = rng.random::<f64>() * (quantiles.len() - 1) as f64;
                let idx = (u as usize).min(quantiles.len() - 2);
                let t = u - idx as f64;
                quantiles[idx] + t * (quantiles[idx + 1] - quantiles[idx])
            }
            FractionSpectrum::PairShape => loop {
                // Envelope is flat at 1; the shape's minimum is 2/3 at x = 1/2
                let x: f64 = rng.random();
                let f = 1.0 - 4.0 / 3.0 * x * (1.0 - x);
                if rng.random::<f64>() <= f {
                    break x;
                }
            },
        };
        x.clamp(f64::MIN_POSITIVE, 1.0)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let ok = match self {
            FractionSpectrum::Fixed { fraction } => *fraction > 0.0 && *fraction <= 1.0,
            FractionSpectrum::Uniform { min, max } => 0.0 <= *min && min < max && *max <= 1.0,
            FractionSpectrum::Tabulated { quantiles } => {
                quantiles.len() >= 2
                    && quantiles.windows(2).all(|w| w[1] >= w[0])
                    && quantiles[0] >= 0.0
                    && quantiles[quantiles.len() - 1] <= 1.0
            }
            FractionSpectrum::PairShape => true,
        };
        if ok {
            Ok(())
        } else {
            Err(ConfigError::InvalidTable(format!(
                "fraction spectrum out of range: {self:?}"
            )))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecayMode {
    BetaMinus,
    BetaPlus,
    ProtonEmission,
    NeutronEmission,
    AlphaEmission,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecayChannel {
    pub mode: DecayMode,
    pub branching: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecayData {
    /// Mean rest-frame lifetime (s)
    pub lifetime: f64,
    pub channels: Vec<DecayChannel>,
}

impl DecayData {
    /// Free neutron: β⁻ with τ = 879.4 s
    pub fn free_neutron() -> Self {
        Self {
            lifetime: 879.4,
            channels: vec![DecayChannel {
                mode: DecayMode::BetaMinus,
                branching: 1.0,
            }],
        }
    }

    /// Pick a channel with probability proportional to its branching ratio
    pub fn pick_channel<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<DecayMode> {
        let total: f64 = self.channels.iter().map(|c| c.branching).sum();
        if total <= 0.0 {
            return None;
        }
        let mut u = rng.random::<f64>() * total;
        for channel in &self.channels {
            if u < channel.branching {
                return Some(channel.mode);
            }
            u -= channel.branching;
        }
        self.channels.last().map(|c| c.mode)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct RateKey {
    process: ProcessKind,
    field: Option<PhotonField>,
    species: ParticleId,
}

/// One rate table in the serialised form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateEntry {
    pub process: ProcessKind,
    #[serde(default)]
    pub field: Option<PhotonField>,
    pub species: ParticleId,
    #[serde(flatten)]
    pub table: RateTable,
}

/// One secondary spectrum in the serialised form, valid from `min_energy` up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumEntry {
    pub process: ProcessKind,
    pub species: ParticleId,
    #[serde(default)]
    pub min_energy: f64,
    pub spectrum: FractionSpectrum,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecayEntry {
    pub species: ParticleId,
    #[serde(flatten)]
    pub data: DecayData,
}

/// On-disk layout of a physics table file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhysicsTables {
    #[serde(default)]
    pub rates: Vec<RateEntry>,
    #[serde(default)]
    pub spectra: Vec<SpectrumEntry>,
    #[serde(default)]
    pub decays: Vec<DecayEntry>,
}

/// Physics data backed by rate tables at z = 0.
///
/// Redshift dependence assumes a background whose photon number density
/// scales as (1+z)³ with energies scaling as (1+z), which gives
/// `rate(E, z) = (1+z)³ · rate((1+z) E, 0)`.
#[derive(Debug, Clone)]
pub struct TabulatedPhysics {
    rates: HashMap<RateKey, RateTable>,
    spectra: HashMap<(ProcessKind, ParticleId), Vec<(f64, FractionSpectrum)>>,
    decays: HashMap<ParticleId, DecayData>,
}

impl Default for TabulatedPhysics {
    fn default() -> Self {
        Self::new()
    }
}

impl TabulatedPhysics {
    /// Empty provider that only knows the free neutron decay
    pub fn new() -> Self {
        let mut decays = HashMap::new();
        decays.insert(ParticleId::NEUTRON, DecayData::free_neutron());
        Self {
            rates: HashMap::new(),
            spectra: HashMap::new(),
            decays,
        }
    }

    pub fn from_tables(tables: PhysicsTables) -> Result<Self, ConfigError> {
        let mut physics = Self::new();
        for entry in tables.rates {
            entry.table.validate()?;
            physics.add_rate(entry.process, entry.field, entry.species, entry.table);
        }
        for entry in tables.spectra {
            entry.spectrum.validate()?;
            physics.add_spectrum(entry.process, entry.species, entry.min_energy, entry.spectrum);
        }
        for entry in tables.decays {
            if !(entry.data.lifetime > 0.0) || entry.data.channels.is_empty() {
                return Err(ConfigError::InvalidTable(format!(
                    "decay data for {} needs a positive lifetime and at least one channel",
                    entry.species
                )));
            }
            physics.decays.insert(entry.species, entry.data);
        }
        Ok(physics)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let tables: PhysicsTables = serde_json::from_str(json)
            .map_err(|e| ConfigError::InvalidTable(e.to_string()))?;
        Self::from_tables(tables)
    }

    pub fn add_rate(
        &mut self,
        process: ProcessKind,
        field: Option<PhotonField>,
        species: ParticleId,
        table: RateTable,
    ) {
        self.rates.insert(
            RateKey {
                process,
                field,
                species,
            },
            table,
        );
    }

    pub fn with_rate(
        mut self,
        process: ProcessKind,
        field: Option<PhotonField>,
        species: ParticleId,
        table: RateTable,
    ) -> Self {
        self.add_rate(process, field, species, table);
        self
    }

    pub fn add_spectrum(
        &mut self,
        process: ProcessKind,
        species: ParticleId,
        min_energy: f64,
        spectrum: FractionSpectrum,
    ) {
        let entries = self.spectra.entry((process, species)).or_default();
        entries.push((min_energy, spectrum));
        entries.sort_by(|a, b| a.0.total_cmp(&b.0));
    }

    pub fn with_spectrum(
        mut self,
        process: ProcessKind,
        species: ParticleId,
        spectrum: FractionSpectrum,
    ) -> Self {
        self.add_spectrum(process, species, 0.0, spectrum);
        self
    }

    pub fn with_decay(mut self, species: ParticleId, data: DecayData) -> Self {
        self.decays.insert(species, data);
        self
    }

    /// Table for `species`, falling back to the charge conjugate for leptons
    fn table(
        &self,
        process: ProcessKind,
        field: Option<PhotonField>,
        species: ParticleId,
    ) -> Option<&RateTable> {
        let key = RateKey {
            process,
            field,
            species,
        };
        self.rates.get(&key).or_else(|| {
            if species.is_lepton() {
                self.rates.get(&RateKey {
                    species: ParticleId(-species.0),
                    ..key
                })
            } else {
                None
            }
        })
    }

    /// Rate (1/m) at z = 0 including nucleus-to-nucleon mappings
    fn rate_z0(
        &self,
        process: ProcessKind,
        species: ParticleId,
        energy: f64,
        field: Option<PhotonField>,
    ) -> Option<f64> {
        if let Some(table) = self.table(process, field, species) {
            return Some(table.rate_at(energy));
        }
        if !species.is_nucleus() {
            return None;
        }
        let a = species.mass_number() as f64;
        let z = species.charge_number() as f64;
        match process {
            ProcessKind::PhotoPion => {
                let proton = self.table(process, field, ParticleId::PROTON)?;
                let neutron = self.table(process, field, ParticleId::NEUTRON).unwrap_or(proton);
                let e_nucleon = energy / a;
                Some(z * proton.rate_at(e_nucleon) + (a - z) * neutron.rate_at(e_nucleon))
            }
            ProcessKind::ElectronPairProduction if z > 0.0 => {
                let proton = self.table(process, field, ParticleId::PROTON)?;
                Some(proton.rate_at(energy / a) * z * z / a)
            }
            _ => None,
        }
    }
}

impl PhysicsData for TabulatedPhysics {
    fn mean_free_path(
        &self,
        process: ProcessKind,
        species: ParticleId,
        energy: f64,
        redshift: f64,
        field: Option<PhotonField>,
    ) -> Result<f64, DataUnavailable> {
        let unavailable = DataUnavailable {
            process,
            species,
            field,
        };
        if process == ProcessKind::NuclearDecay {
            let data = self.decay(species).ok_or(unavailable)?;
            let gamma = energy / species.rest_mass();
            return Ok(gamma * C_LIGHT * data.lifetime);
        }

        let zp1 = 1.0 + redshift;
        let rate = self
            .rate_z0(process, species, zp1 * energy, field)
            .ok_or(unavailable)?
            * zp1.powi(3);
        if rate > 0.0 {
            Ok(1.0 / rate)
        } else {
            Ok(f64::INFINITY)
        }
    }

    fn secondary_spectrum(
        &self,
        process: ProcessKind,
        species: ParticleId,
        energy: f64,
    ) -> Result<&FractionSpectrum, DataUnavailable> {
        let entries = self
            .spectra
            .get(&(process, species))
            .or_else(|| self.spectra.get(&(process, ParticleId(-species.0))))
            .ok_or(DataUnavailable {
                process,
                species,
                field: None,
            })?;
        let idx = entries
            .partition_point(|(min_energy, _)| *min_energy <= energy)
            .saturating_sub(1);
        Ok(&entries[idx].1)
    }

    fn decay(&self, species: ParticleId) -> Option<&DecayData> {
        self.decays.get(&species)
    }
}

/// Remembers which missing-data tuples have already been reported so each
/// one is logged once per run
#[derive(Debug, Default)]
pub struct MissingDataLog {
    seen: Mutex<HashSet<DataUnavailable>>,
}

impl MissingDataLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log `missing` unless it was already reported. Returns true if logged.
    pub fn report(&self, missing: &DataUnavailable) -> bool {
        let mut seen = match self.seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if seen.insert(*missing) {
            log::warn!("{missing}; treating the process as inapplicable");
            true
        } else {
            false
        }
    }

    pub fn reported(&self) -> usize {
        self.seen.lock().map(|s| s.len()).unwrap_or(0)
    }
}

/// Single-thread memo in front of a [`MissingDataLog`]. Repeated misses
/// stay local; only the first miss of a tuple takes the shared lock.
#[derive(Debug, Default)]
pub struct MissingDataCache {
    seen: RefCell<HashSet<DataUnavailable>>,
}

impl MissingDataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward `missing` to `log` the first time this cache sees it.
    /// Returns true if it was logged.
    pub fn report(&self, missing: &DataUnavailable, log: &MissingDataLog) -> bool {
        let first = self.seen.borrow_mut().insert(*missing);
        first && log.report(missing)
    }
}
