//! Run configuration
//!
//! A `RunConfig` is what a run script parses into. It can also be written
//! or read directly as JSON.

use crate::background::PhotonField;
use crate::breaks::BreakCondition;
use crate::cosmology::{Cosmology, FlatLambdaCdm, StaticUniverse};
use crate::engine::RunOptions;
use crate::error::ConfigError;
use crate::interactions::{
    ElectronPairProduction, InverseCompton, Interaction, NuclearDecay, PairProduction,
    PhotoDisintegration, PhotoPion, ProcessKind, RedshiftLoss, Thinning,
};
use crate::kinematics::KinematicsMap;
use crate::observer::Observer;
use crate::output::OutputColumns;
use crate::propagator::Propagator;
use crate::source::Source;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One interaction module as declared in a script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionConfig {
    pub process: ProcessKind,
    #[serde(default)]
    pub field: Option<PhotonField>,
    #[serde(default = "no_thinning")]
    pub thinning: f64,
    #[serde(default = "emit_secondaries")]
    pub secondaries: bool,
}

fn no_thinning() -> f64 {
    1.0
}

fn emit_secondaries() -> bool {
    true
}

impl InteractionConfig {
    pub fn new(process: ProcessKind, field: Option<PhotonField>) -> Self {
        Self {
            process,
            field,
            thinning: 1.0,
            secondaries: true,
        }
    }

    fn required_field(&self) -> Result<PhotonField, ConfigError> {
        self.field.ok_or_else(|| {
            ConfigError::InvalidParameter(format!("{} needs a photon field", self.process))
        })
    }

    /// Instantiate the module
    pub fn build(&self) -> Result<Interaction, ConfigError> {
        let thinning = Thinning::new(self.thinning)?;
        if thinning.is_enabled()
            && !matches!(
                self.process,
                ProcessKind::PairProduction | ProcessKind::InverseCompton
            )
        {
            return Err(ConfigError::InvalidParameter(format!(
                "{} does not support thinning",
                self.process
            )));
        }
        if !self.process.needs_field() && self.field.is_some() {
            return Err(ConfigError::InvalidParameter(format!(
                "{} does not take a photon field",
                self.process
            )));
        }

        let interaction = match self.process {
            ProcessKind::PairProduction => Interaction::PairProduction(
                PairProduction::new(self.required_field()?)
                    .with_thinning(thinning)
                    .with_secondaries(self.secondaries),
            ),
            ProcessKind::InverseCompton => Interaction::InverseCompton(
                InverseCompton::new(self.required_field()?)
                    .with_thinning(thinning)
                    .with_secondaries(self.secondaries),
            ),
            ProcessKind::PhotoDisintegration => Interaction::PhotoDisintegration(
                PhotoDisintegration::new(self.required_field()?),
            ),
            ProcessKind::PhotoPion => Interaction::PhotoPion(
                PhotoPion::new(self.required_field()?).with_secondaries(self.secondaries),
            ),
            ProcessKind::ElectronPairProduction => Interaction::ElectronPairProduction(
                ElectronPairProduction::new(self.required_field()?),
            ),
            ProcessKind::NuclearDecay => {
                Interaction::NuclearDecay(NuclearDecay::new().with_secondaries(self.secondaries))
            }
            ProcessKind::Redshift => Interaction::Redshift(RedshiftLoss),
        };
        Ok(interaction)
    }
}

/// Everything needed to set up and execute a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub events: u64,
    pub seed: u64,
    /// 0 uses every available core
    pub threads: usize,
    pub source: Option<Source>,
    pub kinematics: KinematicsMap,
    pub interactions: Vec<InteractionConfig>,
    pub propagator: Option<Propagator>,
    pub breaks: Vec<BreakCondition>,
    pub observer: Option<Observer>,
    pub output: OutputColumns,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            events: 1,
            seed: 0,
            threads: 0,
            source: None,
            kinematics: KinematicsMap::new(),
            interactions: Vec::new(),
            propagator: None,
            breaks: Vec::new(),
            observer: None,
            output: OutputColumns::default(),
        }
    }
}

impl RunConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::InvalidParameter(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::InvalidParameter(e.to_string()))
    }

    /// Whether the run needs an expanding universe
    pub fn uses_expansion(&self) -> bool {
        self.source.as_ref().is_some_and(|s| s.redshift_from_position)
            || self
                .interactions
                .iter()
                .any(|i| i.process == ProcessKind::Redshift)
    }

    pub fn cosmology(&self) -> Arc<dyn Cosmology> {
        if self.uses_expansion() {
            Arc::new(FlatLambdaCdm::default())
        } else {
            Arc::new(StaticUniverse)
        }
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            threads: self.threads,
            seed: self.seed,
            ..RunOptions::default()
        }
    }
}
