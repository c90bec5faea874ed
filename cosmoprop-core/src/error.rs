//! Error types shared across the engine

use crate::background::PhotonField;
use crate::interactions::ProcessKind;
use crate::parser::ParseError;
use crate::particle::ParticleId;
use std::fmt;
use thiserror::Error;

/// Invalid run configuration, detected before any candidate exists
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("empty energy range: min {min} eV must be below max {max} eV")]
    EmptyEnergyRange { min: f64, max: f64 },
    #[error("step bound '{name}' must be positive and finite, got {value}")]
    NonPositiveStep { name: &'static str, value: f64 },
    #[error("minimum step {min} m exceeds maximum step {max} m")]
    StepBoundsInverted { min: f64, max: f64 },
    #[error("thinning factor must lie in (0, 1], got {0}")]
    InvalidThinning(f64),
    #[error("unknown species '{0}'")]
    UnknownSpecies(String),
    #[error("unknown process '{0}'")]
    UnknownProcess(String),
    #[error("unknown photon background '{0}'")]
    UnknownBackground(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("missing required section '{0}'")]
    MissingSection(&'static str),
    #[error("nothing ends propagation: add an observer facing the source direction, or a max_steps or max_length break")]
    UnboundedPropagation,
    #[error("invalid physics table: {0}")]
    InvalidTable(String),
    #[error("{} configuration errors: {}", .0.len(), join_errors(.0))]
    Multiple(Vec<ConfigError>),
}

fn join_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// The physics data provider has nothing for this tuple; the process is
/// treated as inapplicable (infinite free path)
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
#[error("no {process} data for {species}{}", FieldLabel(.field))]
pub struct DataUnavailable {
    pub process: ProcessKind,
    pub species: ParticleId,
    pub field: Option<PhotonField>,
}

struct FieldLabel<'a>(&'a Option<PhotonField>);

impl fmt::Display for FieldLabel<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(field) => write!(f, " on {field}"),
            None => Ok(()),
        }
    }
}

/// The output sink failed to persist a record
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to write event record: {0}")]
    Io(#[from] std::io::Error),
    #[error("output sink is closed")]
    Closed,
    #[error("output sink lock poisoned")]
    Poisoned,
}

/// Anything that aborts a run
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Output(#[from] OutputError),
    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),
}
