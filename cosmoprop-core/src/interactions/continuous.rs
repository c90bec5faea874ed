//! Continuous (non-stochastic) energy losses

use super::{InteractionContext, ProcessKind};
use crate::background::PhotonField;
use crate::candidate::Candidate;

/// Adiabatic loss from cosmological expansion.
///
/// Energy scales with `(1+z)`, so a step from `z₀` to `z₁` multiplies the
/// energy by `(1+z₁)/(1+z₀)`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RedshiftLoss;

impl RedshiftLoss {
    pub fn apply(&self, candidate: &mut Candidate, redshift_before: f64) {
        let ratio = (1.0 + candidate.redshift) / (1.0 + redshift_before);
        // Propagation only ever moves toward lower redshift
        if ratio < 1.0 {
            candidate.current.energy *= ratio;
        }
    }
}

/// Fraction of the loss length a single step may cover
const STEP_FRACTION: f64 = 0.1;

/// Bethe-Heitler e± pair production by charged nuclei, treated as a
/// continuous loss with the provider's energy-loss length
#[derive(Debug, Clone, PartialEq)]
pub struct ElectronPairProduction {
    pub field: PhotonField,
}

impl ElectronPairProduction {
    pub fn new(field: PhotonField) -> Self {
        Self { field }
    }

    fn loss_length(&self, candidate: &Candidate, ctx: &InteractionContext<'_>) -> f64 {
        let id = candidate.id();
        if !id.is_nucleus() || id.charge_number() == 0 {
            return f64::INFINITY;
        }
        ctx.mean_free_path(
            ProcessKind::ElectronPairProduction,
            id,
            candidate.energy(),
            candidate.redshift,
            Some(self.field),
        )
    }

    /// Keep each step short compared with the loss length
    pub fn step_limit(&self, candidate: &Candidate, ctx: &InteractionContext<'_>) -> f64 {
        STEP_FRACTION * self.loss_length(candidate, ctx)
    }

    pub fn apply(&self, candidate: &mut Candidate, step: f64, ctx: &InteractionContext<'_>) {
        let length = self.loss_length(candidate, ctx);
        if length.is_finite() {
            candidate.current.energy *= (-step / length).exp();
        }
    }
}
