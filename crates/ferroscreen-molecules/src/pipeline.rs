//! Orchestrator for one screening run per target.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use ferroscreen_common::{GraphQuery, ProcessSandbox, Result, ScreenConfig, ScreenError, TargetSpec};
use ferroscreen_ranker::{BaselineProvider, CompoundEvaluator, CsvBaselineProvider};

use crate::admet::AdmetScorer;
use crate::docking::{DockingMode, DockingOrchestrator};
use crate::energy::BindingEnergyEstimator;
use crate::ligand::{LigandLibrary, LigandPreparer};
use crate::pdb::{self, ReceptorTarget};
use crate::pocket::PocketGridResolver;
use crate::report::{CsvReporter, MarkdownReporter, Reporter, ScreeningReport};
use crate::scoring;

/// Engines and collaborators, resolved once and shared by every target.
pub struct ScreeningContext {
    pub config: ScreenConfig,
    pub sandbox: ProcessSandbox,
    pub resolver: PocketGridResolver,
    pub docking: DockingOrchestrator,
    pub energy: BindingEnergyEstimator,
    pub admet: AdmetScorer,
    pub baseline: Option<Arc<dyn BaselineProvider>>,
    pub graph: Option<Arc<dyn GraphQuery>>,
}

impl ScreeningContext {
    /// Validates `config` and resolves every engine mode once. Without an
    /// explicit provider the baseline comes from `evaluation.baseline_csv`.
    pub fn new(config: ScreenConfig, baseline: Option<Arc<dyn BaselineProvider>>) -> Result<Self> {
        config.validate()?;
        let sandbox = ProcessSandbox::from_config(&config.execution);
        let workers = config.execution.parallel_workers;

        let resolver = PocketGridResolver::new(
            config.docking.pocket_mode,
            config.engines.fpocket.clone(),
            sandbox.clone(),
            config.docking.bbox_margin,
            config.docking.pocket_margin,
        );
        let preparer = LigandPreparer::new(config.engines.meeko.clone(), config.engines.obabel.clone(), sandbox.clone());
        let docking = DockingOrchestrator::new(
            config.engines.vina.clone(),
            preparer,
            sandbox.clone(),
            &config.docking,
            workers,
            config.output.docking_dir.clone(),
        );
        let energy = BindingEnergyEstimator::from_config(config.engines.gbsa.clone(), &config.energy, sandbox.clone(), workers)?;

        let baseline = match (baseline, &config.evaluation.baseline_csv) {
            (Some(provider), _) => Some(provider),
            (None, Some(path)) => Some(Arc::new(CsvBaselineProvider::from_path(path)?) as Arc<dyn BaselineProvider>),
            (None, None) => None,
        };

        Ok(Self {
            config,
            sandbox,
            resolver,
            docking,
            energy,
            admet: AdmetScorer::new(),
            baseline,
            graph: None,
        })
    }
}

pub struct ScreeningPipeline {
    ctx: ScreeningContext,
}

impl ScreeningPipeline {
    /// Builds the pipeline and its shared context.
    pub fn new(config: ScreenConfig, baseline: Option<Arc<dyn BaselineProvider>>) -> Result<Self> {
        Ok(Self {
            ctx: ScreeningContext::new(config, baseline)?,
        })
    }

    /// Knowledge graph used when no library file is configured.
    pub fn with_graph(mut self, graph: Arc<dyn GraphQuery>) -> Self {
        self.ctx.graph = Some(graph);
        self
    }

    pub fn context(&self) -> &ScreeningContext {
        &self.ctx
    }

    /// SDF first, then a SMILES list, then compounds targeting the gene in
    /// the knowledge graph.
    pub async fn load_library(&self, target: &TargetSpec) -> Result<LigandLibrary> {
        let library_cfg = &self.ctx.config.library;
        if let Some(sdf) = &library_cfg.sdf {
            return LigandLibrary::from_sdf(sdf);
        }
        if let Some(smiles) = &library_cfg.smiles {
            return LigandLibrary::from_smiles_file(smiles);
        }
        if let Some(graph) = &self.ctx.graph {
            return LigandLibrary::from_graph(graph.as_ref(), &target.gene).await;
        }
        Err(ScreenError::Config(
            "no ligand library configured (library.sdf, library.smiles or a knowledge graph)".to_string(),
        ))
    }

    /// Screens one target end to end.
    pub async fn run(&self, target: &TargetSpec) -> Result<ScreeningReport> {
        let ctx = &self.ctx;
        info!("Screening target {}", target);

        let receptor_path = pdb::resolve_receptor(&ctx.config.output.receptor_dir, target.variant())?;
        let receptor = ReceptorTarget::load(&receptor_path)?;

        let library = self.load_library(target).await?;
        if library.is_empty() {
            warn!("Ligand library for {} is empty", target);
        }

        let profiles = ctx.admet.score_batch(library.iter().map(|l| l.smiles.as_str()));
        let admet: HashMap<String, _> = library.iter().map(|l| l.id.clone()).zip(profiles).collect();

        let grid = ctx.resolver.resolve_for_run(&receptor, ctx.config.explicit_grid()).await?;
        info!(
            "Search grid ({:?}): center {:?}, size {:?}",
            grid.origin, grid.center, grid.size
        );

        let docked = ctx.docking.dock(&library, &grid, &receptor).await?;
        let mut compounds = scoring::merge(docked, &library, &admet);

        let energies = ctx.energy.batch(&receptor, &scoring::energy_inputs(&compounds)).await;
        scoring::attach_energies(&mut compounds, energies);

        let evaluator = CompoundEvaluator::new(&target.gene, ctx.baseline.as_deref());
        let records = evaluator.compare(scoring::to_evaluation_records(&compounds));

        let report = ScreeningReport::new(target.clone(), grid, records, &compounds);
        info!(
            "Finished {}: {} candidates, run {}",
            target,
            report.candidates().count(),
            report.run_id
        );
        Ok(report)
    }

    /// Screens each target independently; one failure does not stop the rest.
    pub async fn run_many(&self, targets: &[TargetSpec]) -> Vec<(TargetSpec, Result<ScreeningReport>)> {
        let mut outcomes = Vec::with_capacity(targets.len());
        for target in targets {
            let outcome = self.run(target).await;
            if let Err(e) = &outcome {
                warn!("Screening {} failed: {}", target, e);
            }
            outcomes.push((target.clone(), outcome));
        }
        outcomes
    }

    /// CSV report, plus the Markdown summary when enabled.
    pub fn write_reports(&self, report: &ScreeningReport) -> Result<Vec<PathBuf>> {
        let out_dir = &self.ctx.config.output.report_dir;
        let mut written = vec![CsvReporter.write(report, out_dir)?];
        if self.ctx.config.output.markdown {
            written.push(MarkdownReporter::new()?.write(report, out_dir)?);
        }
        Ok(written)
    }

    /// True when docking runs without a Vina binary.
    pub fn is_synthetic(&self) -> bool {
        matches!(self.ctx.docking.mode(), DockingMode::Synthetic { .. })
    }
}
