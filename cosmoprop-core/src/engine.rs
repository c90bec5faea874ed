//! Module list: the step loop and the candidate work queue

use crate::breaks::{first_met, BreakCondition};
use crate::candidate::Candidate;
use crate::cosmology::{Cosmology, StaticUniverse};
use crate::error::{ConfigError, OutputError, SimulationError};
use crate::interactions::{Interaction, InteractionContext, ProcessKind, Secondaries};
use crate::kinematics::{DispersionRelation, KinematicsMap};
use crate::observer::Observer;
use crate::output::{EventRecord, OutputSink, SharedSink};
use crate::physics_data::{MissingDataCache, MissingDataLog, PhysicsData};
use crate::propagator::Propagator;
use crate::source::Source;
use glam::DVec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// How a run is executed
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Worker threads; 0 uses every available core, 1 runs inline
    pub threads: usize,
    pub seed: u64,
    pub show_progress: bool,
    /// Set from anywhere to stop the run; checked before every step
    pub stop_flag: Arc<AtomicBool>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            threads: 0,
            seed: 0,
            show_progress: false,
            stop_flag: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Totals for a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunSummary {
    pub emitted: u64,
    pub observed: u64,
    pub secondaries: u64,
    pub thinned: u64,
    pub total_weight: f64,
    pub cancelled: bool,
}

impl RunSummary {
    fn merge(mut self, other: RunSummary) -> RunSummary {
        self.emitted += other.emitted;
        self.observed += other.observed;
        self.secondaries += other.secondaries;
        self.thinned += other.thinned;
        self.total_weight += other.total_weight;
        self.cancelled |= other.cancelled;
        self
    }
}

/// What happened to a candidate during one step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    pub step: f64,
    /// Sampled distance to the nearest discrete interaction
    pub next_interaction: f64,
    pub interaction: Option<ProcessKind>,
}

/// Records and counters from one primary and all its secondaries
#[derive(Debug, Default)]
pub struct Cascade {
    pub records: Vec<EventRecord>,
    pub summary: RunSummary,
}

/// Owns the per-step pipeline: propagate, interact, observe, break
pub struct ModuleList {
    pub propagator: Propagator,
    pub interactions: Vec<Interaction>,
    pub observer: Option<Observer>,
    pub breaks: Vec<BreakCondition>,
    cosmology: Arc<dyn Cosmology>,
    physics: Arc<dyn PhysicsData>,
    kinematics: KinematicsMap,
    missing: MissingDataLog,
}

impl ModuleList {
    pub fn new(propagator: Propagator, physics: Arc<dyn PhysicsData>) -> Self {
        Self {
            propagator,
            interactions: Vec::new(),
            observer: None,
            breaks: Vec::new(),
            cosmology: Arc::new(StaticUniverse),
            physics,
            kinematics: KinematicsMap::new(),
            missing: MissingDataLog::new(),
        }
    }

    pub fn with_cosmology(mut self, cosmology: Arc<dyn Cosmology>) -> Self {
        self.cosmology = cosmology;
        self
    }

    pub fn with_kinematics(mut self, kinematics: KinematicsMap) -> Self {
        self.kinematics = kinematics;
        self
    }

    pub fn add(&mut self, interaction: Interaction) {
        self.interactions.push(interaction);
    }

    pub fn add_break(&mut self, condition: BreakCondition) {
        self.breaks.push(condition);
    }

    pub fn set_observer(&mut self, observer: Observer) {
        self.observer = Some(observer);
    }

    pub fn cosmology(&self) -> &dyn Cosmology {
        &*self.cosmology
    }

    pub fn kinematics(&self) -> &KinematicsMap {
        &self.kinematics
    }

    /// Number of distinct missing-data tuples seen so far
    pub fn missing_data_reports(&self) -> usize {
        self.missing.reported()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.propagator.validate()?;
        for condition in &self.breaks {
            condition.validate()?;
        }
        for (id, relation) in self.kinematics.entries() {
            if let DispersionRelation::LorentzViolating { coefficient, .. } = relation {
                if !coefficient.is_finite() {
                    return Err(ConfigError::InvalidParameter(format!(
                        "dispersion coefficient for {id} must be finite"
                    )));
                }
            }
        }
        Ok(())
    }

    fn context<'a>(&'a self, seen: &'a MissingDataCache) -> InteractionContext<'a> {
        InteractionContext {
            physics: &*self.physics,
            kinematics: &self.kinematics,
            missing: &self.missing,
            seen,
        }
    }

    /// Advance `candidate` by one step and apply whatever interaction the
    /// step reaches. Secondaries go to `out`.
    pub fn step<R: Rng + ?Sized>(
        &self,
        candidate: &mut Candidate,
        rng: &mut R,
        out: &mut Secondaries,
    ) -> StepReport {
        let seen = MissingDataCache::new();
        self.step_with(&self.context(&seen), candidate, rng, out)
    }

    fn step_with<R: Rng + ?Sized>(
        &self,
        ctx: &InteractionContext<'_>,
        candidate: &mut Candidate,
        rng: &mut R,
        out: &mut Secondaries,
    ) -> StepReport {
        let mut nearest: Option<(usize, f64)> = None;
        for (idx, module) in self.interactions.iter().enumerate() {
            let proposal = module.propose(candidate, ctx, rng);
            candidate.limit_next_step(proposal.distance);
            if proposal.discrete && proposal.distance < nearest.map_or(f64::INFINITY, |n| n.1) {
                nearest = Some((idx, proposal.distance));
            }
        }
        if let Some(observer) = &self.observer {
            candidate.limit_next_step(observer.step_limit(candidate));
        }
        for condition in &self.breaks {
            candidate.limit_next_step(condition.step_limit(candidate));
        }

        let redshift_before = candidate.redshift;
        let step = self.propagator.propagate(candidate, &*self.cosmology);

        for module in self.interactions.iter().filter(|m| m.is_continuous()) {
            module.apply_continuous(candidate, step, redshift_before, ctx);
        }

        let mut interaction = None;
        if let Some((idx, distance)) = nearest {
            if distance <= step {
                let module = &self.interactions[idx];
                module.interact(candidate, ctx, rng, out);
                interaction = Some(module.kind());
            }
        }

        StepReport {
            step,
            next_interaction: nearest.map_or(f64::INFINITY, |n| n.1),
            interaction,
        }
    }

    /// Propagate a primary and every secondary it spawns until all are
    /// inactive
    pub fn run_cascade<R: Rng + ?Sized>(
        &self,
        primary: Candidate,
        rng: &mut R,
        stop: &AtomicBool,
    ) -> Cascade {
        let mut cascade = Cascade::default();
        cascade.summary.emitted = 1;
        let mut queue = WorkQueue::new(primary);
        let seen = MissingDataCache::new();
        let ctx = self.context(&seen);

        while let Some(mut candidate) = queue.stack.pop() {
            if first_met(&self.breaks, &candidate).is_some() {
                continue;
            }
            if !self.follow(&ctx, &mut candidate, rng, stop, &mut cascade, &mut queue) {
                cascade.summary.cancelled = true;
                break;
            }
        }
        cascade
    }

    /// Step one candidate until it is inactive, queueing its secondaries.
    /// Returns false if `stop` was raised first.
    fn follow<R: Rng + ?Sized>(
        &self,
        ctx: &InteractionContext<'_>,
        candidate: &mut Candidate,
        rng: &mut R,
        stop: &AtomicBool,
        cascade: &mut Cascade,
        queue: &mut WorkQueue,
    ) -> bool {
        while candidate.active {
            if stop.load(Ordering::Relaxed) {
                return false;
            }
            let was_detected = self
                .observer
                .as_ref()
                .is_some_and(|obs| obs.detects(candidate));

            let mut out = Secondaries::new();
            self.step_with(ctx, candidate, rng, &mut out);
            cascade.summary.thinned += out.thinned;
            cascade.summary.secondaries += out.queue.len() as u64;
            for secondary in out.queue {
                queue.push(secondary);
            }
            if !candidate.active {
                break;
            }

            // Observer before break conditions
            if let Some(observer) = &self.observer {
                let crossed = !was_detected || candidate.step_count == 1;
                if crossed && observer.detects(candidate) {
                    let record = EventRecord::from_candidate(candidate);
                    cascade.summary.observed += 1;
                    cascade.summary.total_weight += record.weight;
                    cascade.records.push(record);
                    if observer.deactivate_on_detection {
                        candidate.deactivate();
                        break;
                    }
                }
            }

            if let Some(idx) = first_met(&self.breaks, candidate) {
                log::debug!(
                    "candidate {}/{} ({}) stopped by {:?}",
                    candidate.primary_index,
                    candidate.serial,
                    candidate.id(),
                    self.breaks[idx]
                );
                candidate.deactivate();
            }
        }
        true
    }

    /// True when every candidate emitted along `direction` is guaranteed
    /// to go inactive
    pub fn terminates(&self, direction: DVec3) -> bool {
        ends_propagation(self.observer.as_ref(), &self.breaks, direction)
    }

    /// Emit `count` primaries from `source` and propagate them, appending
    /// detected candidates to `sink`
    pub fn run(
        &self,
        source: &Source,
        count: u64,
        sink: &mut dyn OutputSink,
        options: &RunOptions,
    ) -> Result<RunSummary, SimulationError> {
        self.validate()?;
        source.validate()?;
        if !self.terminates(source.direction) {
            return Err(ConfigError::UnboundedPropagation.into());
        }
        log::info!(
            "starting run: {count} primaries, {} interaction modules, seed {}",
            self.interactions.len(),
            options.seed
        );

        let progress = Progress::new(count, options.show_progress);
        let result = {
            let shared = SharedSink::new(sink);
            let work = |index: u64| -> Result<RunSummary, OutputError> {
                if options.stop_flag.load(Ordering::Relaxed) {
                    return Ok(RunSummary {
                        cancelled: true,
                        ..RunSummary::default()
                    });
                }
                let mut rng = primary_rng(options.seed, index);
                let primary = source.emit(&*self.cosmology, index, &mut rng);
                let cascade = self.run_cascade(primary, &mut rng, &options.stop_flag);
                if let Err(e) = shared.write_batch(&cascade.records) {
                    options.stop_flag.store(true, Ordering::Relaxed);
                    return Err(e);
                }
                progress.tick();
                Ok(cascade.summary)
            };

            let result = if options.threads == 1 {
                (0..count)
                    .map(&work)
                    .try_fold(RunSummary::default(), |acc, s| s.map(|s| acc.merge(s)))
            } else {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(options.threads)
                    .build()
                    .map_err(|e| SimulationError::WorkerPool(e.to_string()))?;
                pool.install(|| {
                    (0..count)
                        .into_par_iter()
                        .map(&work)
                        .try_reduce(RunSummary::default, |a, b| Ok(a.merge(b)))
                })
            };
            log::debug!("{} records written", shared.written());
            result
        };

        match result {
            Ok(summary) => {
                sink.flush()?;
                log::info!(
                    "run finished: {} emitted, {} observed, {} secondaries ({} thinned){}",
                    summary.emitted,
                    summary.observed,
                    summary.secondaries,
                    summary.thinned,
                    if summary.cancelled { ", cancelled" } else { "" }
                );
                Ok(summary)
            }
            Err(e) => {
                // Keep whatever already reached the sink intact
                if let Err(close_err) = sink.close() {
                    log::error!("closing output after write failure also failed: {close_err}");
                }
                Err(e.into())
            }
        }
    }
}

/// LIFO stack of candidates still to propagate; hands out serial numbers
struct WorkQueue {
    stack: Vec<Candidate>,
    next_serial: u64,
}

impl WorkQueue {
    fn new(primary: Candidate) -> Self {
        Self {
            next_serial: primary.serial + 1,
            stack: vec![primary],
        }
    }

    fn push(&mut self, mut secondary: Candidate) {
        secondary.serial = self.next_serial;
        self.next_serial += 1;
        self.stack.push(secondary);
    }
}

/// Whether propagation is bounded: either a step or length cap, or an
/// observer that removes what it records and a direction that reaches it
pub fn ends_propagation(
    observer: Option<&Observer>,
    breaks: &[BreakCondition],
    direction: DVec3,
) -> bool {
    breaks.iter().any(BreakCondition::bounds_trajectory)
        || observer.is_some_and(|obs| obs.deactivate_on_detection && direction.x < 0.0)
}

/// Independent random stream for primary `index`
pub fn primary_rng(seed: u64, index: u64) -> StdRng {
    StdRng::seed_from_u64(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ index)
}

/// Logs progress every tenth of the run
struct Progress {
    total: u64,
    done: AtomicU64,
    enabled: bool,
}

impl Progress {
    fn new(total: u64, enabled: bool) -> Self {
        Self {
            total,
            done: AtomicU64::new(0),
            enabled,
        }
    }

    fn tick(&self) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        if !self.enabled || self.total == 0 {
            return;
        }
        let every = (self.total / 10).max(1);
        if done % every == 0 || done == self.total {
            log::info!(
                "progress: {done}/{} primaries ({:.0}%)",
                self.total,
                100.0 * done as f64 / self.total as f64
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background::PhotonField;
    use crate::interactions::{InverseCompton, PairProduction};
    use crate::output::MemorySink;
    use crate::particle::ParticleId;
    use crate::physics_data::{FractionSpectrum, RateTable, TabulatedPhysics};
    use crate::source::{EnergyModel, PositionModel, SpeciesModel};
    use crate::tests::test_helpers::{electron, photon, physics_with_rate};
    use crate::units::{EV, GEV, KPC, MPC, PEV, TEV};
    use std::thread;
    use std::time::Duration;

    fn pp_list(rate: f64) -> ModuleList {
        let physics = physics_with_rate(
            ProcessKind::PairProduction,
            PhotonField::Cmb,
            ParticleId::PHOTON,
            rate,
        );
        let mut list = ModuleList::new(Propagator::new(0.1 * KPC, MPC).unwrap(), Arc::new(physics));
        list.add(Interaction::PairProduction(PairProduction::new(PhotonField::Cmb)));
        list.set_observer(Observer::default());
        list
    }

    #[test]
    fn test_step_stays_within_bounds_and_before_interaction() {
        let list = pp_list(1.0 / (2.0 * MPC));
        let mut rng = StdRng::seed_from_u64(17);
        for _ in 0..500 {
            let mut c = photon(PEV, 50.0 * MPC);
            let mut out = Secondaries::new();
            let report = list.step(&mut c, &mut rng, &mut out);
            assert!(report.step >= 0.1 * KPC && report.step <= MPC);
            if report.next_interaction >= 0.1 * KPC {
                assert!(report.step <= report.next_interaction);
            }
            assert_eq!(report.interaction.is_some(), !c.active);
        }
    }

    #[test]
    fn test_cascade_converts_photon() {
        let list = pp_list(1.0 / MPC);
        let mut rng = StdRng::seed_from_u64(1);
        let stop = AtomicBool::new(false);
        let cascade = list.run_cascade(photon(PEV, 100.0 * MPC), &mut rng, &stop);
        // With a 1 Mpc free path over 100 Mpc the photon converts almost surely
        assert_eq!(cascade.summary.secondaries, 2);
        assert!(cascade.records.iter().all(|r| r.id.is_electron()));
        assert_eq!(cascade.summary.observed, 2);
    }

    #[test]
    fn test_stop_flag_cancels() {
        let list = pp_list(1.0 / MPC);
        let mut rng = StdRng::seed_from_u64(1);
        let stop = AtomicBool::new(true);
        let cascade = list.run_cascade(photon(GEV, MPC), &mut rng, &stop);
        assert!(cascade.summary.cancelled);
        assert!(cascade.records.is_empty());
    }

    #[test]
    fn test_primary_rng_streams_differ() {
        let a: u64 = primary_rng(1, 0).random();
        let b: u64 = primary_rng(1, 1).random();
        let c: u64 = primary_rng(1, 0).random();
        assert_ne!(a, b);
        assert_eq!(a, c);
    }

    /// Electrons halve their energy about once per Mpc and stop below
    /// `threshold`
    fn halving_list(threshold: f64) -> ModuleList {
        let physics = TabulatedPhysics::new()
            .with_rate(
                ProcessKind::InverseCompton,
                Some(PhotonField::Cmb),
                ParticleId::ELECTRON,
                RateTable::constant(EV, 1.0 / MPC),
            )
            .with_spectrum(
                ProcessKind::InverseCompton,
                ParticleId::ELECTRON,
                FractionSpectrum::Fixed { fraction: 0.5 },
            );
        let mut list = ModuleList::new(Propagator::new(KPC, 10.0 * MPC).unwrap(), Arc::new(physics));
        list.add(Interaction::InverseCompton(
            InverseCompton::new(PhotonField::Cmb).with_secondaries(false),
        ));
        list.set_observer(Observer::default());
        list.add_break(BreakCondition::MinimumEnergy { energy: threshold });
        list
    }

    #[test]
    fn test_min_energy_deactivates_on_crossing_step() {
        let threshold = 300.0 * GEV;
        let list = halving_list(threshold);

        // Same stream stepped by hand up to the first step below threshold
        let mut manual = electron(TEV, 1000.0 * MPC);
        let mut rng = StdRng::seed_from_u64(9);
        while manual.energy() >= threshold {
            list.step(&mut manual, &mut rng, &mut Secondaries::new());
        }
        assert!(manual.current.position.x > 0.0);

        let stop = AtomicBool::new(false);
        let seen = MissingDataCache::new();
        let ctx = list.context(&seen);
        let mut cascade = Cascade::default();
        let mut candidate = electron(TEV, 1000.0 * MPC);
        let mut queue = WorkQueue::new(candidate.clone());
        queue.stack.clear();
        let mut rng = StdRng::seed_from_u64(9);
        assert!(list.follow(&ctx, &mut candidate, &mut rng, &stop, &mut cascade, &mut queue));
        assert!(!candidate.active);
        assert_eq!(candidate.step_count, manual.step_count);
        assert_eq!(candidate.current.position, manual.current.position);
        assert!((candidate.energy() - 0.25 * TEV).abs() < 1e-9 * TEV);

        // Inactive: no further steps or interactions
        let (steps, position, energy) = (
            candidate.step_count,
            candidate.current.position,
            candidate.energy(),
        );
        assert!(list.follow(&ctx, &mut candidate, &mut rng, &stop, &mut cascade, &mut queue));
        assert_eq!(candidate.step_count, steps);
        assert_eq!(candidate.current.position, position);
        assert_eq!(candidate.energy(), energy);
        assert!(cascade.records.is_empty());
        assert!(queue.stack.is_empty());
    }

    #[test]
    fn test_stop_flag_interrupts_candidate_in_flight() {
        // Nothing ends this photon's trajectory
        let list = ModuleList::new(Propagator::new(KPC, MPC).unwrap(), Arc::new(TabulatedPhysics::new()));
        let stop = AtomicBool::new(false);
        let cascade = thread::scope(|scope| {
            let worker = scope.spawn(|| {
                let mut rng = StdRng::seed_from_u64(3);
                list.run_cascade(photon(GEV, MPC), &mut rng, &stop)
            });
            thread::sleep(Duration::from_millis(50));
            stop.store(true, Ordering::Relaxed);
            worker.join().unwrap()
        });
        assert!(cascade.summary.cancelled);
        assert!(cascade.records.is_empty());
    }

    #[test]
    fn test_run_refuses_unbounded_propagation() {
        let mut list = pp_list(1.0 / MPC);
        let sideways = Source {
            position: PositionModel::Fixed { distance: MPC },
            direction: DVec3::Y,
            redshift_from_position: false,
            energy: EnergyModel::Fixed { energy: GEV },
            species: SpeciesModel::Fixed {
                id: ParticleId::PHOTON,
            },
        };
        let mut sink = MemorySink::new();
        let options = RunOptions {
            threads: 1,
            ..RunOptions::default()
        };
        assert!(matches!(
            list.run(&sideways, 1, &mut sink, &options),
            Err(SimulationError::Config(ConfigError::UnboundedPropagation))
        ));

        list.add_break(BreakCondition::MaximumSteps { steps: 50 });
        let summary = list.run(&sideways, 2, &mut sink, &options).unwrap();
        assert_eq!(summary.emitted, 2);
    }
}
