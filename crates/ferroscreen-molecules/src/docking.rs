//! Molecular docking using AutoDock Vina, with a seeded synthetic scorer
//! when Vina is not installed.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use futures_util::stream::{self, StreamExt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use ferroscreen_common::screen_config::DockingConfig;
use ferroscreen_common::{EngineCommand, ProcessSandbox, Result, ScreenError};

use crate::ligand::{LigandLibrary, LigandPreparer, LigandRecord};
use crate::pdb::ReceptorTarget;
use crate::pocket::SearchGrid;
use crate::{file_safe, round2};

/// Lower and upper bound of synthetic affinities (kcal/mol).
pub const SYNTHETIC_RANGE: (f64, f64) = (-12.0, -4.0);

/// Affinity recorded when a Vina invocation fails.
pub const FAILED_AFFINITY: f64 = 0.0;

/// Where a docking score came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DockingSource {
    Engine,
    Synthetic,
    Failed,
}

impl std::fmt::Display for DockingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Engine => "engine",
            Self::Synthetic => "synthetic",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Best docking score for one ligand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DockingResult {
    pub ligand_id: String,
    /// kcal/mol, lower is better
    pub affinity: f64,
    pub pose: Option<PathBuf>,
    pub source: DockingSource,
}

/// Docking backend, fixed when the orchestrator is built.
#[derive(Debug, Clone, PartialEq)]
pub enum DockingMode {
    Engine(EngineCommand),
    Synthetic { seed: u64 },
}

impl DockingMode {
    /// Real docking when the Vina binary is present, synthetic otherwise.
    pub fn resolve(vina: EngineCommand, seed: u64) -> Self {
        if ProcessSandbox::is_available(&vina) {
            Self::Engine(vina)
        } else {
            warn!("{} not found; docking scores will be synthetic (seed {})", vina.program, seed);
            Self::Synthetic { seed }
        }
    }
}

/// Reads the top-ranked affinity from Vina's result table.
pub fn parse_vina_affinity(stdout: &str) -> Option<f64> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("1 "))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|token| token.parse().ok())
}

/// `n` affinities drawn uniformly from [`SYNTHETIC_RANGE`], rounded to 2 dp.
pub fn synthetic_scores(seed: u64, n: usize) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let (low, high) = SYNTHETIC_RANGE;
    (0..n).map(|_| round2(rng.gen_range(low..=high))).collect()
}

pub struct DockingOrchestrator {
    mode: DockingMode,
    preparer: LigandPreparer,
    sandbox: ProcessSandbox,
    exhaustiveness: u32,
    top_k: usize,
    workers: usize,
    out_dir: PathBuf,
}

impl DockingOrchestrator {
    /// Resolves the docking mode once from the Vina command.
    pub fn new(
        vina: EngineCommand,
        preparer: LigandPreparer,
        sandbox: ProcessSandbox,
        config: &DockingConfig,
        workers: usize,
        out_dir: PathBuf,
    ) -> Self {
        let mode = DockingMode::resolve(vina, config.seed);
        info!("Docking mode: {}", match mode {
            DockingMode::Engine(_) => "vina",
            DockingMode::Synthetic { .. } => "synthetic",
        });
        Self {
            mode,
            preparer,
            sandbox,
            exhaustiveness: config.exhaustiveness,
            top_k: config.top_k,
            workers: workers.max(1),
            out_dir,
        }
    }

    pub fn mode(&self) -> &DockingMode {
        &self.mode
    }

    pub fn preparer(&self) -> &LigandPreparer {
        &self.preparer
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Docks every ligand into `grid`, returning results sorted by affinity
    /// (best first) and capped at `top_k`. Ligands that cannot be prepared
    /// are left out; Vina failures are kept with [`FAILED_AFFINITY`].
    pub async fn dock(
        &self,
        library: &LigandLibrary,
        grid: &SearchGrid,
        receptor: &ReceptorTarget,
    ) -> Result<Vec<DockingResult>> {
        info!("Docking {} ligands against {}", library.len(), receptor.id);
        std::fs::create_dir_all(&self.out_dir)?;

        let mut results = match &self.mode {
            DockingMode::Synthetic { seed } => synthetic_scores(*seed, library.len())
                .into_iter()
                .zip(library.iter())
                .map(|(affinity, ligand)| DockingResult {
                    ligand_id: ligand.id.clone(),
                    affinity,
                    pose: None,
                    source: DockingSource::Synthetic,
                })
                .collect::<Vec<_>>(),
            DockingMode::Engine(vina) => {
                let receptor_pdbqt = self.preparer.prepare_receptor(receptor).await?;
                let outcomes: Vec<Option<DockingResult>> = stream::iter(library.iter())
                    .map(|ligand| self.dock_ligand(vina, ligand, grid, &receptor_pdbqt, &receptor.id))
                    .buffered(self.workers)
                    .collect()
                    .await;
                outcomes.into_iter().flatten().collect()
            }
        };

        results.sort_by(|a, b| a.affinity.total_cmp(&b.affinity));
        results.truncate(self.top_k);
        self.write_table(&receptor.id, &results)?;

        let failed = results.iter().filter(|r| r.source == DockingSource::Failed).count();
        info!("Docked {} ligands ({} failed)", results.len(), failed);
        Ok(results)
    }

    /// `None` when the ligand could not be prepared.
    async fn dock_ligand(
        &self,
        vina: &EngineCommand,
        ligand: &LigandRecord,
        grid: &SearchGrid,
        receptor_pdbqt: &Path,
        receptor_stem: &str,
    ) -> Option<DockingResult> {
        let failed = || DockingResult {
            ligand_id: ligand.id.clone(),
            affinity: FAILED_AFFINITY,
            pose: None,
            source: DockingSource::Failed,
        };
        let scratch = match self.sandbox.scoped_dir(&ligand.id) {
            Ok(dir) => dir,
            Err(e) => {
                warn!("No scratch directory for {}: {}", ligand.id, e);
                return Some(failed());
            }
        };
        let prepared = match self.preparer.prepare(ligand, scratch.path()).await {
            Ok(path) => path,
            Err(e) => {
                warn!("Excluding {} from docking: {}", ligand.id, e);
                return None;
            }
        };

        let stem = file_safe(&ligand.id);
        let out = scratch.path().join(format!("{stem}_out.pdbqt"));
        let affinity = match self.run_vina(vina, receptor_pdbqt, &prepared, grid, &out, scratch.path()).await {
            Ok(affinity) => affinity,
            Err(e) => {
                warn!("Vina failed for {}: {}", ligand.id, e);
                return Some(failed());
            }
        };

        let dest = self.out_dir.join(format!("{}_{}_out.pdbqt", file_safe(receptor_stem), stem));
        let pose = match std::fs::copy(&out, &dest) {
            Ok(_) => Some(dest),
            Err(e) => {
                warn!("Pose for {} not kept: {}", ligand.id, e);
                None
            }
        };
        debug!("{} docked at {:.2} kcal/mol", ligand.id, affinity);
        Some(DockingResult {
            ligand_id: ligand.id.clone(),
            affinity,
            pose,
            source: DockingSource::Engine,
        })
    }

    async fn run_vina(
        &self,
        vina: &EngineCommand,
        receptor: &Path,
        ligand: &Path,
        grid: &SearchGrid,
        out: &Path,
        cwd: &Path,
    ) -> Result<f64> {
        let mut args: Vec<OsString> = vec![
            "--receptor".into(),
            receptor.into(),
            "--ligand".into(),
            ligand.into(),
        ];
        for (axis, k) in [("x", 0), ("y", 1), ("z", 2)] {
            args.push(format!("--center_{axis}").into());
            args.push(format!("{:.3}", grid.center[k]).into());
        }
        for (axis, k) in [("x", 0), ("y", 1), ("z", 2)] {
            args.push(format!("--size_{axis}").into());
            args.push(format!("{:.3}", grid.size[k]).into());
        }
        args.extend([
            "--exhaustiveness".into(),
            self.exhaustiveness.to_string().into(),
            "--num_modes".into(),
            "1".into(),
            "--out".into(),
            out.into(),
        ]);
        let output = self.sandbox.run("vina", vina, args, cwd).await?;
        parse_vina_affinity(&output.stdout)
            .ok_or_else(|| ScreenError::invocation("vina", "no result table in output"))
    }

    /// Writes `docking_results_<receptor>.csv`, one file per receptor.
    fn write_table(&self, receptor_stem: &str, results: &[DockingResult]) -> Result<()> {
        let path = self.out_dir.join(format!("docking_results_{}.csv", file_safe(receptor_stem)));
        let mut writer = csv::Writer::from_path(&path)?;
        for result in results {
            writer.serialize(result)?;
        }
        writer.flush()?;
        debug!("Wrote {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferroscreen_test_utils as fixtures;
    use std::time::Duration;

    const VINA_OUTPUT: &str = "\
AutoDock Vina v1.2.5
mode |   affinity | dist from best mode
     | (kcal/mol) | rmsd l.b.| rmsd u.b.
-----+------------+----------+----------
   1       -8.412          0          0
   2       -7.9        1.204      2.113
";

    fn library() -> LigandLibrary {
        LigandLibrary::from_records(vec![
            LigandRecord::new("a", "CCO"),
            LigandRecord::new("b", "c1ccccc1"),
            LigandRecord::new("c", "CC(=O)O"),
        ])
    }

    fn grid() -> SearchGrid {
        SearchGrid::explicit([5.0, 5.0, 5.0], [18.0, 18.0, 18.0]).unwrap()
    }

    fn no_tools(sandbox: ProcessSandbox) -> LigandPreparer {
        LigandPreparer::new(EngineCommand::new("no-such-meeko"), EngineCommand::new("no-such-obabel"), sandbox)
    }

    #[test]
    fn test_parse_vina_affinity() {
        assert_eq!(parse_vina_affinity(VINA_OUTPUT), Some(-8.412));
        assert_eq!(parse_vina_affinity("no table here\n"), None);
        assert_eq!(parse_vina_affinity("   1       n/a\n"), None);
    }

    #[test]
    fn test_synthetic_scores_are_reproducible_and_bounded() {
        let first = synthetic_scores(42, 50);
        assert_eq!(first, synthetic_scores(42, 50));
        assert_ne!(first, synthetic_scores(43, 50));
        assert!(first.iter().all(|s| (-12.0..=-4.0).contains(s)));
    }

    #[test]
    fn test_missing_vina_selects_synthetic_mode() {
        let mode = DockingMode::resolve(EngineCommand::new("no-such-vina-binary"), 42);
        assert_eq!(mode, DockingMode::Synthetic { seed: 42 });
    }

    #[tokio::test]
    async fn test_synthetic_dock_is_sorted_and_capped() {
        let dir = tempfile::tempdir().unwrap();
        let receptor = ReceptorTarget::load(&fixtures::write_receptor(dir.path(), "G12C.pdb").unwrap()).unwrap();
        let config = DockingConfig { top_k: 2, ..DockingConfig::default() };
        let orchestrator = DockingOrchestrator::new(
            EngineCommand::new("no-such-vina-binary"),
            no_tools(ProcessSandbox::default()),
            ProcessSandbox::default(),
            &config,
            2,
            dir.path().join("docking"),
        );

        let results = orchestrator.dock(&library(), &grid(), &receptor).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].affinity <= results[1].affinity);
        assert!(results.iter().all(|r| r.source == DockingSource::Synthetic && r.pose.is_none()));

        let mut expected = synthetic_scores(42, 3);
        expected.sort_by(f64::total_cmp);
        assert_eq!(results[0].affinity, expected[0]);
        assert!(dir.path().join("docking").join("docking_results_G12C.csv").is_file());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_engine_dock_records_failures() {
        let dir = tempfile::tempdir().unwrap();
        let receptor = ReceptorTarget::load(&fixtures::write_receptor(dir.path(), "G12C.pdb").unwrap()).unwrap();
        let vina = fixtures::fake_vina(dir.path(), &[("a", Some(-9.1)), ("b", None)], -7.0).unwrap();
        let obabel = fixtures::fake_obabel(dir.path()).unwrap();
        let sandbox = ProcessSandbox::new(Duration::from_secs(20), 0, Some(dir.path().join("work")));
        let preparer = LigandPreparer::new(EngineCommand::new("no-such-meeko"), obabel, sandbox.clone());
        let out_dir = dir.path().join("docking");
        let orchestrator =
            DockingOrchestrator::new(vina, preparer, sandbox, &DockingConfig::default(), 2, out_dir.clone());
        assert!(matches!(orchestrator.mode(), DockingMode::Engine(_)));

        let results = orchestrator.dock(&library(), &grid(), &receptor).await.unwrap();
        let summary: Vec<(&str, f64, DockingSource)> =
            results.iter().map(|r| (r.ligand_id.as_str(), r.affinity, r.source)).collect();
        assert_eq!(
            summary,
            vec![
                ("a", -9.1, DockingSource::Engine),
                ("c", -7.0, DockingSource::Engine),
                ("b", 0.0, DockingSource::Failed),
            ]
        );
        assert_eq!(results[0].pose.as_deref(), Some(out_dir.join("G12C_a_out.pdbqt").as_path()));
        assert!(out_dir.join("G12C_a_out.pdbqt").is_file());
        assert!(results[2].pose.is_none());
        // receptor prepared once, next to the PDB
        assert!(dir.path().join("G12C.pdbqt").is_file());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unprepared_ligands_are_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let receptor_path = fixtures::write_receptor(dir.path(), "G12C.pdb").unwrap();
        std::fs::write(receptor_path.with_extension("pdbqt"), "REMARK prepared\n").unwrap();
        let receptor = ReceptorTarget::load(&receptor_path).unwrap();
        let vina = fixtures::fake_vina(dir.path(), &[], -7.0).unwrap();
        let orchestrator = DockingOrchestrator::new(
            vina,
            no_tools(ProcessSandbox::default()),
            ProcessSandbox::default(),
            &DockingConfig::default(),
            2,
            dir.path().join("docking"),
        );
        let results = orchestrator.dock(&library(), &grid(), &receptor).await.unwrap();
        assert!(results.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_prep_failure_excluded_while_vina_failure_kept() {
        let dir = tempfile::tempdir().unwrap();
        let receptor = ReceptorTarget::load(&fixtures::write_receptor(dir.path(), "G12C.pdb").unwrap()).unwrap();
        let vina = fixtures::fake_vina(dir.path(), &[("a", Some(-9.1)), ("c", None)], -7.0).unwrap();
        let obabel = fixtures::fake_obabel_failing(dir.path(), &["b"]).unwrap();
        let sandbox = ProcessSandbox::new(Duration::from_secs(20), 0, Some(dir.path().join("work")));
        let preparer = LigandPreparer::new(EngineCommand::new("no-such-meeko"), obabel, sandbox.clone());
        let out_dir = dir.path().join("docking");
        let orchestrator =
            DockingOrchestrator::new(vina, preparer, sandbox, &DockingConfig::default(), 2, out_dir.clone());

        let results = orchestrator.dock(&library(), &grid(), &receptor).await.unwrap();
        let summary: Vec<(&str, f64, DockingSource)> =
            results.iter().map(|r| (r.ligand_id.as_str(), r.affinity, r.source)).collect();
        assert_eq!(
            summary,
            vec![("a", -9.1, DockingSource::Engine), ("c", FAILED_AFFINITY, DockingSource::Failed)]
        );

        let table = std::fs::read_to_string(out_dir.join("docking_results_G12C.csv")).unwrap();
        assert_eq!(table.lines().count(), 3);
        assert!(!table.lines().any(|l| l.starts_with("b,")));
    }

    #[tokio::test]
    async fn test_tables_are_kept_per_receptor() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("docking");
        let orchestrator = DockingOrchestrator::new(
            EngineCommand::new("no-such-vina-binary"),
            no_tools(ProcessSandbox::default()),
            ProcessSandbox::default(),
            &DockingConfig::default(),
            2,
            out_dir.clone(),
        );
        for name in ["KRAS_G12C.pdb", "EGFR_L858R.pdb"] {
            let receptor = ReceptorTarget::load(&fixtures::write_receptor(dir.path(), name).unwrap()).unwrap();
            orchestrator.dock(&library(), &grid(), &receptor).await.unwrap();
        }
        assert!(out_dir.join("docking_results_KRAS_G12C.csv").is_file());
        assert!(out_dir.join("docking_results_EGFR_L858R.csv").is_file());
    }
}
