//! End-to-end screening runs against fixture receptors and fake engines.

use std::path::Path;
use std::sync::Arc;

use ferroscreen_common::{EngineCommand, ScreenConfig, ScreenError, StaticGraph, TargetSpec};
use ferroscreen_molecules::pipeline::ScreeningPipeline;
use ferroscreen_molecules::pocket::GridOrigin;
use ferroscreen_ranker::{BaselineCompound, SetMembership, StaticBaselineProvider};
use ferroscreen_test_utils as fixtures;

fn offline_config(root: &Path) -> ScreenConfig {
    let mut config = ScreenConfig::default();
    config.engines.vina = EngineCommand::new("no-such-vina");
    config.engines.fpocket = EngineCommand::new("no-such-fpocket");
    config.engines.obabel = EngineCommand::new("no-such-obabel");
    config.engines.meeko = EngineCommand::new("no-such-meeko");
    config.engines.gbsa = EngineCommand::new("no-such-gbsa");
    config.output.receptor_dir = root.to_path_buf();
    config.output.docking_dir = root.join("docking");
    config.output.report_dir = root.join("reports");
    config.execution.work_dir = Some(root.join("work"));
    config
}

fn target() -> TargetSpec {
    TargetSpec::new("KRAS", Some("KRAS_G12C"))
}

#[tokio::test]
async fn test_offline_run_uses_synthetic_docking_and_fallback_energy() {
    let dir = tempfile::tempdir().unwrap();
    fixtures::write_receptor(dir.path(), "KRAS_G12C.pdb").unwrap();
    let mut config = offline_config(dir.path());
    config.library.smiles = Some(
        fixtures::write_smiles_list(dir.path(), "ligands.csv", &[("ethanol", "CCO"), ("benzene", "c1ccccc1")]).unwrap(),
    );

    let pipeline = ScreeningPipeline::new(config, None).unwrap();
    assert!(pipeline.is_synthetic());
    let report = pipeline.run(&target()).await.unwrap();

    assert_eq!(report.grid.origin, GridOrigin::BoundingBox);
    assert!(report.grid.size.iter().all(|s| *s >= 18.0));

    let candidates: Vec<_> = report.candidates().collect();
    assert_eq!(candidates.len(), 2);
    for row in &candidates {
        assert_eq!(row.docking_source.as_deref(), Some("synthetic"));
        assert_eq!(row.energy_source.as_deref(), Some("fallback (engine_unavailable)"));
        let score = row.docking_score.unwrap();
        assert!((-12.0..=-4.0).contains(&score));
        assert!(row.composite.is_some());
    }
    // synthetic baseline is always present
    assert_eq!(report.table.iter().filter(|r| r.set == SetMembership::Baseline).count(), 3);

    let written = pipeline.write_reports(&report).unwrap();
    assert_eq!(written.len(), 2);
    assert!(written.iter().all(|p| p.is_file()));
}

#[tokio::test]
async fn test_offline_runs_are_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    fixtures::write_receptor(dir.path(), "KRAS_G12C.pdb").unwrap();
    let mut config = offline_config(dir.path());
    config.library.smiles = Some(
        fixtures::write_smiles_list(dir.path(), "ligands.csv", &[("a", "CCO"), ("b", "CC(=O)O"), ("c", "c1ccncc1")])
            .unwrap(),
    );
    let pipeline = ScreeningPipeline::new(config, None).unwrap();
    let first = pipeline.run(&target()).await.unwrap();
    let second = pipeline.run(&target()).await.unwrap();
    assert_eq!(first.table, second.table);
    assert_ne!(first.run_id, second.run_id);
}

#[tokio::test]
async fn test_missing_receptor_fails_only_that_target() {
    let dir = tempfile::tempdir().unwrap();
    fixtures::write_receptor(dir.path(), "KRAS_G12C.pdb").unwrap();
    let config = offline_config(dir.path());
    let graph = StaticGraph::new()
        .with_compound("KRAS", "sotorasib_fragment", "CC(=O)N")
        .with_compound("EGFR", "other", "CCO");
    let baseline = StaticBaselineProvider::new().with("KRAS", BaselineCompound::new("sotorasib", -9.0, -48.0, 3.2));

    let pipeline = ScreeningPipeline::new(config, Some(Arc::new(baseline)))
        .unwrap()
        .with_graph(Arc::new(graph));
    let outcomes = pipeline
        .run_many(&[TargetSpec::new("EGFR", Some("EGFR_L858R")), target()])
        .await;

    assert_eq!(outcomes.len(), 2);
    assert!(matches!(outcomes[0].1, Err(ScreenError::MissingUpstreamArtifact(_))));
    let report = outcomes[1].1.as_ref().unwrap();
    let ids: Vec<&str> = report.table.iter().map(|r| r.compound_id.as_str()).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&"sotorasib"));
    assert!(ids.contains(&"sotorasib_fragment"));
}

#[tokio::test]
async fn test_explicit_grid_wins() {
    let dir = tempfile::tempdir().unwrap();
    fixtures::write_receptor(dir.path(), "KRAS_G12C.pdb").unwrap();
    let mut config = offline_config(dir.path());
    config.library.smiles = Some(fixtures::write_smiles_list(dir.path(), "ligands.csv", &[("a", "CCO")]).unwrap());
    config.docking.grid_center = Some([1.0, 2.0, 3.0]);
    config.docking.grid_size = Some([20.0, 20.0, 20.0]);
    let report = ScreeningPipeline::new(config, None).unwrap().run(&target()).await.unwrap();
    assert_eq!(report.grid.origin, GridOrigin::Explicit);
    assert_eq!(report.grid.center, [1.0, 2.0, 3.0]);
}

#[cfg(unix)]
#[tokio::test]
async fn test_run_with_fake_engines() {
    let dir = tempfile::tempdir().unwrap();
    let bin = dir.path().join("bin");
    std::fs::create_dir_all(&bin).unwrap();
    fixtures::write_receptor(dir.path(), "KRAS_G12C.pdb").unwrap();

    let mut config = offline_config(dir.path());
    config.library.smiles = Some(
        fixtures::write_smiles_list(dir.path(), "ligands.csv", &[("a", "CCO"), ("b", "CCO"), ("c", "c1ccccc1")])
            .unwrap(),
    );
    config.engines.vina = fixtures::fake_vina(&bin, &[("a", Some(-9.5)), ("c", None)], -8.0).unwrap();
    config.engines.obabel = fixtures::fake_obabel(&bin).unwrap();
    config.engines.gbsa = fixtures::fake_gbsa(&bin, -1500.0, -1400.0, -57.75).unwrap();
    config.engines.fpocket = fixtures::fake_fpocket(&bin, [5.0, 5.0, 5.0], 3.0).unwrap();

    let pipeline = ScreeningPipeline::new(config, None).unwrap();
    assert!(!pipeline.is_synthetic());
    let report = pipeline.run(&target()).await.unwrap();

    assert_eq!(report.grid.origin, GridOrigin::PocketDetector);
    assert_eq!(report.grid.size, [10.0, 10.0, 10.0]);

    let row = |id: &str| report.table.iter().find(|r| r.compound_id == id).unwrap();
    assert_eq!(row("a").docking_score, Some(-9.5));
    assert_eq!(row("a").docking_source.as_deref(), Some("engine"));
    assert_eq!(row("a").delta_g, Some(-42.25));
    assert_eq!(row("a").energy_source.as_deref(), Some("computed"));
    assert_eq!(row("b").docking_score, Some(-8.0));
    assert_eq!(row("b").delta_g, Some(-42.25));

    // failed docking: no score, fallback energy
    assert_eq!(row("c").docking_score, None);
    assert_eq!(row("c").docking_source.as_deref(), Some("failed"));
    assert_eq!(row("c").energy_source.as_deref(), Some("fallback (no_pose)"));

    // one parameterization per distinct SMILES with a pose
    assert_eq!(fixtures::parameterize_calls(&bin), vec!["CCO".to_string()]);
    assert!(dir.path().join("KRAS_G12C.pdbqt").is_file());
    assert!(dir.path().join("docking").join("KRAS_G12C_a_out.pdbqt").is_file());
    assert!(dir.path().join("docking").join("docking_results_KRAS_G12C.csv").is_file());
}
