//! Static checks on a run configuration
//!
//! Everything here runs before the first candidate is emitted, so a bad
//! configuration never produces partial output.

use crate::config::RunConfig;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::engine::ends_propagation;
use crate::error::ConfigError;
use crate::interactions::ProcessKind;
use crate::kinematics::DispersionRelation;
use std::collections::HashSet;

/// Every fatal problem in `config`
pub fn config_errors(config: &RunConfig) -> Vec<ConfigError> {
    let mut errors = Vec::new();

    match &config.source {
        None => errors.push(ConfigError::MissingSection("source")),
        Some(source) => {
            if let Err(e) = source.validate() {
                errors.push(e);
            }
        }
    }

    match &config.propagator {
        None => errors.push(ConfigError::MissingSection("propagator")),
        Some(propagator) => {
            if let Err(e) = propagator.validate() {
                errors.push(e);
            }
        }
    }

    for interaction in &config.interactions {
        if let Err(e) = interaction.build() {
            errors.push(e);
        }
    }

    for condition in &config.breaks {
        if let Err(e) = condition.validate() {
            errors.push(e);
        }
    }

    for (id, relation) in config.kinematics.entries() {
        if let DispersionRelation::LorentzViolating { order, coefficient } = relation {
            if !coefficient.is_finite() {
                errors.push(ConfigError::InvalidParameter(format!(
                    "dispersion coefficient for {id} must be finite"
                )));
            }
            if order > 4 {
                errors.push(ConfigError::InvalidParameter(format!(
                    "dispersion order {order} for {id} is out of range (0..=4)"
                )));
            }
        }
    }

    if let Some(source) = &config.source {
        if !ends_propagation(config.observer.as_ref(), &config.breaks, source.direction) {
            errors.push(ConfigError::UnboundedPropagation);
        }
    }

    if !(config.output.energy_scale > 0.0 && config.output.length_scale > 0.0) {
        errors.push(ConfigError::InvalidParameter(
            "output scales must be positive".into(),
        ));
    }

    errors
}

/// Analyze a configuration and return diagnostics
pub fn analyze_config(config: &RunConfig) -> Diagnostics {
    let mut diagnostics = Diagnostics::new();

    for error in config_errors(config) {
        diagnostics.push(Diagnostic::error(error.to_string(), None));
    }

    if config.events == 0 {
        diagnostics.push(Diagnostic::warning("run emits no primaries (events 0)", None));
    }

    if config.observer.is_none() {
        diagnostics.push(Diagnostic::warning(
            "no observer declared: nothing will be recorded",
            None,
        ));
    }

    let mut seen = HashSet::new();
    for interaction in &config.interactions {
        if !seen.insert((interaction.process, interaction.field)) {
            let field = interaction
                .field
                .map(|f| format!(" on {f}"))
                .unwrap_or_default();
            diagnostics.push(Diagnostic::warning(
                format!("{}{field} declared more than once", interaction.process),
                None,
            ));
        }
        if interaction.thinning < 1.0 && !interaction.secondaries {
            diagnostics.push(Diagnostic::warning(
                format!(
                    "thinning on {} has no effect when its secondaries are discarded",
                    interaction.process
                ),
                None,
            ));
        }
    }

    let has_leptonic = config.interactions.iter().any(|i| {
        matches!(
            i.process,
            ProcessKind::PairProduction | ProcessKind::InverseCompton
        )
    });
    if !config.kinematics.is_standard() && !has_leptonic {
        diagnostics.push(Diagnostic::warning(
            "modified kinematics only affect pair production and inverse Compton scattering",
            None,
        ));
    }

    diagnostics
}

/// Ok when `config` can be run; otherwise every problem at once
pub fn validate_config(config: &RunConfig) -> Result<(), ConfigError> {
    let mut errors = config_errors(config);
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ConfigError::Multiple(errors)),
    }
}
