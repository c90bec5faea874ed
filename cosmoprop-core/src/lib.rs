//! One-dimensional Monte Carlo propagation of high-energy particles
//! through cosmological photon backgrounds.

pub mod analyzer;
pub mod background;
pub mod breaks;
pub mod candidate;
pub mod config;
pub mod cosmology;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod interactions;
pub mod kinematics;
pub mod observer;
pub mod output;
pub mod parser;
pub mod particle;
pub mod physics_data;
pub mod propagator;
pub mod runtime;
pub mod source;
pub mod units;

pub use analyzer::{analyze_config, validate_config};
pub use candidate::{Candidate, Origin, ParticleState};
pub use config::{InteractionConfig, RunConfig};
pub use diagnostics::{Diagnostic, DiagnosticSeverity, Diagnostics, SourceLocation, Span};
pub use engine::{ModuleList, RunOptions, RunSummary};
pub use error::{ConfigError, DataUnavailable, OutputError, SimulationError};
pub use output::{EventRecord, MemorySink, OutputColumns, OutputSink, TextSink};
pub use parser::{parse_script, ParseError};
pub use particle::ParticleId;
pub use physics_data::{PhysicsData, TabulatedPhysics};
pub use runtime::{build_module_list, build_simulation, check_script, run_script, Simulation};

// Test helpers module (public for integration tests)
// Always compiled - integration tests are separate crates and need access
pub mod tests;
