use crate::analyzer::{analyze_config, validate_config};
use crate::config::RunConfig;
use crate::diagnostics::Diagnostics;
use crate::engine::{ModuleList, RunOptions, RunSummary};
use crate::error::{ConfigError, SimulationError};
use crate::output::{EventRecord, MemorySink, OutputSink};
use crate::parser::{parse_script, ParseError};
use crate::physics_data::PhysicsData;
use crate::source::Source;
use std::sync::Arc;

/// A validated, ready-to-run setup
pub struct Simulation {
    pub config: RunConfig,
    pub source: Source,
    pub modules: ModuleList,
}

impl Simulation {
    /// Run with the options the configuration asks for
    pub fn run(&self, sink: &mut dyn OutputSink) -> Result<RunSummary, SimulationError> {
        self.run_with(sink, &self.config.run_options())
    }

    pub fn run_with(
        &self,
        sink: &mut dyn OutputSink,
        options: &RunOptions,
    ) -> Result<RunSummary, SimulationError> {
        self.modules
            .run(&self.source, self.config.events, sink, options)
    }
}

/// Build the module list for `config`, refusing any configuration with
/// errors
pub fn build_module_list(
    config: &RunConfig,
    physics: Arc<dyn PhysicsData>,
) -> Result<ModuleList, ConfigError> {
    validate_config(config)?;
    let propagator = config
        .propagator
        .ok_or(ConfigError::MissingSection("propagator"))?;

    let mut modules = ModuleList::new(propagator, physics)
        .with_cosmology(config.cosmology())
        .with_kinematics(config.kinematics.clone());
    for interaction in &config.interactions {
        modules.add(interaction.build()?);
    }
    for condition in &config.breaks {
        modules.add_break(*condition);
    }
    if let Some(observer) = config.observer {
        modules.set_observer(observer);
    }
    Ok(modules)
}

pub fn build_simulation(
    config: RunConfig,
    physics: Arc<dyn PhysicsData>,
) -> Result<Simulation, ConfigError> {
    let modules = build_module_list(&config, physics)?;
    let source = config
        .source
        .clone()
        .ok_or(ConfigError::MissingSection("source"))?;
    Ok(Simulation {
        config,
        source,
        modules,
    })
}

/// Main entry point: parse and run a script, keeping records in memory
pub fn run_script(
    source: &str,
    physics: Arc<dyn PhysicsData>,
) -> Result<(RunSummary, Vec<EventRecord>), SimulationError> {
    let config = parse_script(source)?;
    let simulation = build_simulation(config, physics)?;
    let mut sink = MemorySink::new();
    let summary = simulation.run(&mut sink)?;
    Ok((summary, sink.records))
}

/// Parse and analyze a script without running it
pub fn check_script(source: &str) -> Result<Diagnostics, ParseError> {
    let config = parse_script(source)?;
    Ok(analyze_config(&config))
}
