//! End-to-end runs of small propagation scenarios

use cosmoprop_core::background::PhotonField;
use cosmoprop_core::candidate::Origin;
use cosmoprop_core::engine::{ModuleList, RunOptions};
use cosmoprop_core::interactions::{Interaction, PairProduction, ProcessKind, Thinning};
use cosmoprop_core::observer::Observer;
use cosmoprop_core::output::MemorySink;
use cosmoprop_core::propagator::Propagator;
use cosmoprop_core::source::{EnergyModel, PositionModel, Source, SpeciesModel};
use cosmoprop_core::tests::test_helpers::{approx_eq_rel, physics_with_rate, run_script_file};
use cosmoprop_core::units::{GEV, KPC, MPC, PEV};
use cosmoprop_core::ParticleId;
use glam::DVec3;
use std::path::PathBuf;
use std::sync::Arc;

fn test_data_path(filename: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("data");
    path.push(filename);
    path
}

fn run_data_script(
    filename: &str,
) -> (cosmoprop_core::RunSummary, Vec<cosmoprop_core::EventRecord>) {
    let script = test_data_path(filename);
    let tables = test_data_path("tables.json");
    run_script_file(script.to_str().unwrap(), tables.to_str().unwrap())
        .unwrap_or_else(|e| panic!("{filename} failed: {e}"))
}

#[test]
fn test_photons_on_observer_plane_are_recorded_unchanged() {
    let (summary, records) = run_data_script("photons_at_observer.crp");

    assert_eq!(summary.emitted, 100);
    assert_eq!(records.len(), 100);
    for record in &records {
        assert_eq!(record.id, ParticleId::PHOTON);
        assert_eq!(record.energy, 10.0 * GEV);
        assert_eq!(record.weight, 1.0);
        assert_eq!(record.origin, Origin::Primary);
    }
}

#[test]
fn test_pev_photon_converts_or_arrives_intact() {
    let (summary, records) = run_data_script("pev_photon.crp");
    assert_eq!(summary.emitted, 1);

    let photons: Vec<_> = records.iter().filter(|r| r.id.is_photon()).collect();
    assert!(photons.len() <= 1);
    for photon in &photons {
        assert!(photon.energy <= PEV);
        assert_eq!(photon.origin, Origin::Primary);
    }

    if photons.is_empty() {
        // Converted: the pair carries the full photon energy to the observer
        assert_eq!(records.len(), 2);
        let total: f64 = records.iter().map(|r| r.energy).sum();
        assert!(approx_eq_rel(total, PEV, 1e-9), "pair energy {total}");
        assert!(records.iter().all(|r| r.creator_id == ParticleId::PHOTON));
        assert!(records.iter().all(|r| r.weight == 1.0));
    }
}

#[test]
fn test_unthinned_weights_are_one() {
    let (_, records) = run_data_script("pev_photon.crp");
    assert!(records.iter().all(|r| r.weight == 1.0));
}

#[test]
fn test_cascade_energies_never_exceed_primary() {
    let (summary, records) = run_data_script("gamma_cascade.crp");
    assert_eq!(summary.emitted, 200);
    assert!(summary.secondaries > 0);
    for record in &records {
        assert!(record.energy <= record.source_energy * (1.0 + 1e-12));
        assert!(record.weight >= 1.0);
        if record.origin == Origin::Primary {
            assert_eq!(record.weight, 1.0);
        }
    }
}

#[test]
fn test_proton_run_keeps_energy_below_source() {
    let (summary, records) = run_data_script("proton_ppp.crp");
    assert_eq!(summary.emitted, 50);
    for record in &records {
        assert!(record.energy <= record.source_energy * (1.0 + 1e-12));
        if record.id.is_nucleus() {
            assert_eq!(record.id.mass_number(), 1);
        }
    }
}

/// Half of the primaries convert before reaching the observer; with
/// thinning the summed pair weight must still match two per conversion.
#[test]
fn test_thinned_weights_match_unthinned_expectation() {
    let mean_free_path = 10.0 * MPC;
    let distance = std::f64::consts::LN_2 * mean_free_path;
    let physics = physics_with_rate(
        ProcessKind::PairProduction,
        PhotonField::Cmb,
        ParticleId::PHOTON,
        1.0 / mean_free_path,
    );

    let mut modules = ModuleList::new(Propagator::new(KPC, MPC).unwrap(), Arc::new(physics));
    modules.add(Interaction::PairProduction(
        PairProduction::new(PhotonField::Cmb).with_thinning(Thinning::new(0.1).unwrap()),
    ));
    modules.set_observer(Observer::default());

    let source = Source {
        position: PositionModel::Fixed { distance },
        direction: DVec3::NEG_X,
        redshift_from_position: false,
        energy: EnergyModel::Fixed { energy: PEV },
        species: SpeciesModel::Fixed {
            id: ParticleId::PHOTON,
        },
    };

    let primaries = 10_000u64;
    let mut sink = MemorySink::new();
    let options = RunOptions {
        seed: 2024,
        ..RunOptions::default()
    };
    let summary = modules.run(&source, primaries, &mut sink, &options).unwrap();

    let surviving_photons = sink.records.iter().filter(|r| r.id.is_photon()).count() as f64;
    let pair_weight: f64 = sink
        .records
        .iter()
        .filter(|r| r.id.is_electron())
        .map(|r| r.weight)
        .sum();
    let conversions = primaries as f64 - surviving_photons;

    // About half convert
    assert!((conversions / primaries as f64 - 0.5).abs() < 0.05);
    assert!(summary.thinned > 0);

    // Monte Carlo error of the summed weight from the per-primary spread
    let n = primaries as f64;
    let mut per_primary = vec![0.0; primaries as usize];
    for record in sink.records.iter().filter(|r| r.id.is_electron()) {
        per_primary[record.primary_index as usize] += record.weight;
    }
    let mean = pair_weight / n;
    let variance = per_primary.iter().map(|w| (w - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let sigma = (n * variance).sqrt();
    // Per-primary variance is about 3.3, so sigma should be near 180
    assert!(sigma > 100.0 && sigma < 300.0, "sigma {sigma}");

    let expected = 2.0 * n * 0.5;
    assert!(
        (pair_weight - expected).abs() < 3.0 * sigma,
        "pair weight {pair_weight}, expected {expected} within 3 sigma ({sigma})"
    );
    // Thinning only ever raises weights
    assert!(sink.records.iter().all(|r| r.weight >= 1.0));
}
