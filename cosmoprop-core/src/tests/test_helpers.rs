//! Test helper utilities shared by unit and integration tests

use crate::background::PhotonField;
use crate::candidate::{Candidate, ParticleState};
use crate::engine::RunSummary;
use crate::interactions::{InteractionContext, ProcessKind};
use crate::kinematics::KinematicsMap;
use crate::output::EventRecord;
use crate::particle::ParticleId;
use crate::physics_data::{MissingDataCache, MissingDataLog, PhysicsData, RateTable, TabulatedPhysics};
use crate::units::EV;
use glam::DVec3;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Check if two floating point values are approximately equal within tolerance
pub fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol
}

/// Relative comparison for values spanning many orders of magnitude
pub fn approx_eq_rel(a: f64, b: f64, rel: f64) -> bool {
    if a == b {
        return true;
    }
    (a - b).abs() <= rel * a.abs().max(b.abs())
}

/// Load expected output from a file
pub fn load_expected(path: &str) -> Result<String, Box<dyn std::error::Error>> {
    Ok(fs::read_to_string(path)?)
}

/// Write expected output to a file (for initial generation)
pub fn write_expected(path: &str, content: &str) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = Path::new(path).parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(fs::write(path, content)?)
}

fn heading_to_observer(id: ParticleId, energy: f64, distance: f64) -> Candidate {
    let state = ParticleState::new(
        id,
        energy,
        DVec3::new(distance, 0.0, 0.0),
        DVec3::new(-1.0, 0.0, 0.0),
    );
    Candidate::primary(state, 0.0, 0)
}

/// Primary photon at `distance` moving toward the observer
pub fn photon(energy: f64, distance: f64) -> Candidate {
    heading_to_observer(ParticleId::PHOTON, energy, distance)
}

/// Primary electron at `distance` moving toward the observer
pub fn electron(energy: f64, distance: f64) -> Candidate {
    heading_to_observer(ParticleId::ELECTRON, energy, distance)
}

/// Primary nucleus (A, Z) at `distance` moving toward the observer
pub fn nucleus(a: u32, z: u32, energy: f64, distance: f64) -> Candidate {
    let id = ParticleId::nucleus(a, z)
        .unwrap_or_else(|| panic!("invalid nucleus A={a} Z={z}"));
    heading_to_observer(id, energy, distance)
}

/// Tables with a single energy-independent rate above 1 eV
pub fn physics_with_rate(
    process: ProcessKind,
    field: PhotonField,
    species: ParticleId,
    rate: f64,
) -> TabulatedPhysics {
    TabulatedPhysics::new().with_rate(
        process,
        Some(field),
        species,
        RateTable::constant(EV, rate),
    )
}

/// Owns everything an `InteractionContext` borrows
pub struct ContextFixture {
    pub physics: TabulatedPhysics,
    pub kinematics: KinematicsMap,
    pub missing: MissingDataLog,
    pub seen: MissingDataCache,
}

impl Default for ContextFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextFixture {
    pub fn new() -> Self {
        Self {
            physics: TabulatedPhysics::new(),
            kinematics: KinematicsMap::new(),
            missing: MissingDataLog::new(),
            seen: MissingDataCache::new(),
        }
    }

    pub fn with_kinematics(mut self, kinematics: KinematicsMap) -> Self {
        self.kinematics = kinematics;
        self
    }

    pub fn with_constant_rate(
        mut self,
        process: ProcessKind,
        field: PhotonField,
        species: ParticleId,
        rate: f64,
    ) -> Self {
        self.physics
            .add_rate(process, Some(field), species, RateTable::constant(EV, rate));
        self
    }

    pub fn with_physics(mut self, f: impl FnOnce(TabulatedPhysics) -> TabulatedPhysics) -> Self {
        self.physics = f(self.physics);
        self
    }

    pub fn context(&self) -> InteractionContext<'_> {
        InteractionContext {
            physics: &self.physics,
            kinematics: &self.kinematics,
            missing: &self.missing,
            seen: &self.seen,
        }
    }
}

/// Run a script from source with the given physics tables and collect
/// every record in memory
pub fn run_script_source(
    source: &str,
    physics: TabulatedPhysics,
) -> Result<(RunSummary, Vec<EventRecord>), Box<dyn std::error::Error>> {
    let physics: Arc<dyn PhysicsData> = Arc::new(physics);
    Ok(crate::runtime::run_script(source, physics)?)
}

/// Run a script file against a JSON table file
pub fn run_script_file(
    script: &str,
    tables: &str,
) -> Result<(RunSummary, Vec<EventRecord>), Box<dyn std::error::Error>> {
    let src = fs::read_to_string(script)?;
    let physics = TabulatedPhysics::from_json(&fs::read_to_string(tables)?)?;
    run_script_source(&src, physics)
}

/// Records in a stable order, independent of worker scheduling
pub fn sorted_records(mut records: Vec<EventRecord>) -> Vec<EventRecord> {
    records.sort_by_key(|r| (r.primary_index, r.serial));
    records
}

/// Convert records to JSON string for golden tests
pub fn records_to_json(records: &[EventRecord]) -> String {
    let sorted = sorted_records(records.to_vec());
    serde_json::to_string_pretty(&sorted).unwrap_or_default()
}
