//! Binding free energy from single-point implicit-solvent evaluations:
//! ΔG = E(complex) − [E(receptor) + E(ligand)].
//!
//! The force-field work is done by an external engine (an OpenMM-GBSA style
//! CLI). When it is missing or an evaluation cannot be made, a seeded
//! fallback value is recorded together with the reason.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::TempDir;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use ferroscreen_common::screen_config::EnergyConfig;
use ferroscreen_common::{EngineCommand, ProcessSandbox, Result, ScreenError};

use crate::pdb::{self, ReceptorTarget};
use crate::round2;

/// Lower and upper bound of fallback ΔG values (kcal/mol).
pub const FALLBACK_RANGE: (f64, f64) = (-65.0, -25.0);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    EngineUnavailable,
    NoPose,
    PoseParse,
    EmptySubset,
    Evaluation(String),
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EngineUnavailable => f.write_str("engine_unavailable"),
            Self::NoPose => f.write_str("no_pose"),
            Self::PoseParse => f.write_str("pose_parse"),
            Self::EmptySubset => f.write_str("empty_subset"),
            Self::Evaluation(reason) => write!(f, "evaluation: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergySource {
    Computed,
    Fallback(FallbackReason),
}

impl EnergySource {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

impl std::fmt::Display for EnergySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Computed => f.write_str("computed"),
            Self::Fallback(reason) => write!(f, "fallback ({reason})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingEnergyResult {
    pub ligand_id: String,
    /// kcal/mol
    pub delta_g: f64,
    pub source: EnergySource,
}

/// One docked complex to evaluate.
#[derive(Debug, Clone)]
pub struct EnergyInput {
    pub ligand_id: String,
    pub smiles: String,
    pub pose: Option<PathBuf>,
}

/// Force-field engine contract.
#[async_trait]
pub trait EnergyEngine: Send + Sync {
    /// Writes a small-molecule force-field template for `smiles` to `out`.
    async fn parameterize(&self, smiles: &str, out: &Path, work_dir: &Path) -> Result<()>;

    /// Single-point implicit-solvent energy of `pdb`, in kcal/mol.
    async fn single_point(&self, pdb: &Path, template: Option<&Path>, work_dir: &Path) -> Result<f64>;
}

/// Reads the first number on the first line starting with `ENERGY`.
pub fn parse_energy(stdout: &str) -> Option<f64> {
    let line = stdout.lines().map(str::trim).find(|l| l.starts_with("ENERGY"))?;
    line["ENERGY".len()..]
        .split(|c: char| c.is_whitespace() || c == ':' || c == '=')
        .find_map(|token| token.parse().ok())
}

/// [`EnergyEngine`] backed by a command-line tool with `parameterize` and
/// `energy` subcommands.
pub struct GbsaCli {
    command: EngineCommand,
    sandbox: ProcessSandbox,
    config: EnergyConfig,
}

impl GbsaCli {
    /// Wraps a GBSA-style CLI with `parameterize` and `energy` subcommands.
    pub fn new(command: EngineCommand, sandbox: ProcessSandbox, config: EnergyConfig) -> Self {
        Self { command, sandbox, config }
    }
}

#[async_trait]
impl EnergyEngine for GbsaCli {
    async fn parameterize(&self, smiles: &str, out: &Path, work_dir: &Path) -> Result<()> {
        let args: Vec<OsString> = vec![
            "parameterize".into(),
            "--smiles".into(),
            smiles.into(),
            "--forcefield".into(),
            self.config.ligand_forcefield.as_str().into(),
            "--out".into(),
            out.into(),
        ];
        self.sandbox.run("gbsa", &self.command, args, work_dir).await?;
        if !out.is_file() {
            return Err(ScreenError::invocation("gbsa", "parameterize wrote no template"));
        }
        Ok(())
    }

    async fn single_point(&self, pdb: &Path, template: Option<&Path>, work_dir: &Path) -> Result<f64> {
        let mut args: Vec<OsString> = vec![
            "energy".into(),
            "--pdb".into(),
            pdb.into(),
            "--forcefield".into(),
            self.config.protein_forcefield.as_str().into(),
            "--implicit-solvent".into(),
            self.config.implicit_solvent.as_str().into(),
        ];
        if let Some(template) = template {
            args.push("--template".into());
            args.push(template.into());
        }
        let output = self.sandbox.run("gbsa", &self.command, args, work_dir).await?;
        parse_energy(&output.stdout).ok_or_else(|| ScreenError::invocation("gbsa", "no ENERGY line in output"))
    }
}

/// Energy backend, fixed at construction.
pub enum EnergyMode {
    Engine(Arc<dyn EnergyEngine>),
    Fallback,
}

pub struct BindingEnergyEstimator {
    mode: EnergyMode,
    sandbox: ProcessSandbox,
    seed: u64,
    workers: usize,
    template_dir: TempDir,
    /// SHA-256 of the SMILES → template path
    templates: Mutex<HashMap<String, PathBuf>>,
}

impl BindingEnergyEstimator {
    /// Uses the configured CLI when its program is available.
    pub fn from_config(
        gbsa: EngineCommand,
        config: &EnergyConfig,
        sandbox: ProcessSandbox,
        workers: usize,
    ) -> Result<Self> {
        let mode = if ProcessSandbox::is_available(&gbsa) {
            EnergyMode::Engine(Arc::new(GbsaCli::new(gbsa, sandbox.clone(), config.clone())))
        } else {
            warn!("{} not found; binding energies will use fallback values", gbsa.program);
            EnergyMode::Fallback
        };
        Self::new(mode, sandbox, config.seed, workers)
    }

    /// Builds an estimator around an already resolved mode.
    pub fn new(mode: EnergyMode, sandbox: ProcessSandbox, seed: u64, workers: usize) -> Result<Self> {
        let template_dir = sandbox.scoped_dir("templates")?;
        info!(
            "Energy mode: {}",
            match mode {
                EnergyMode::Engine(_) => "engine",
                EnergyMode::Fallback => "fallback",
            }
        );
        Ok(Self {
            mode,
            sandbox,
            seed,
            workers: workers.max(1),
            template_dir,
            templates: Mutex::new(HashMap::new()),
        })
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.mode, EnergyMode::Fallback)
    }

    /// One result per input, in input order.
    pub async fn batch(&self, receptor: &ReceptorTarget, inputs: &[EnergyInput]) -> Vec<BindingEnergyResult> {
        info!("Estimating binding energies for {} complexes", inputs.len());
        let outcomes: Vec<std::result::Result<f64, FallbackReason>> = match &self.mode {
            EnergyMode::Fallback => inputs.iter().map(|_| Err(FallbackReason::EngineUnavailable)).collect(),
            EnergyMode::Engine(engine) => {
                let engine = engine.as_ref();
                let failed_templates = self.parameterize_unique(engine, inputs).await;
                stream::iter(inputs.iter())
                    .map(|input| self.evaluate(engine, receptor, input, &failed_templates))
                    .buffered(self.workers)
                    .collect()
                    .await
            }
        };

        // fallback draws happen in row order so results do not depend on scheduling
        let mut rng = StdRng::seed_from_u64(self.seed);
        let (low, high) = FALLBACK_RANGE;
        let results: Vec<BindingEnergyResult> = inputs
            .iter()
            .zip(outcomes)
            .map(|(input, outcome)| match outcome {
                Ok(delta_g) => BindingEnergyResult {
                    ligand_id: input.ligand_id.clone(),
                    delta_g,
                    source: EnergySource::Computed,
                },
                Err(reason) => {
                    debug!("Fallback ΔG for {}: {}", input.ligand_id, reason);
                    BindingEnergyResult {
                        ligand_id: input.ligand_id.clone(),
                        delta_g: round2(rng.gen_range(low..=high)),
                        source: EnergySource::Fallback(reason),
                    }
                }
            })
            .collect();

        let fallbacks = results.iter().filter(|r| r.source.is_fallback()).count();
        info!("Binding energies: {} computed, {} fallback", results.len() - fallbacks, fallbacks);
        results
    }

    /// Parameterizes each distinct SMILES with a pose once. Returns the
    /// failure reason per SMILES hash that could not be parameterized.
    async fn parameterize_unique(
        &self,
        engine: &dyn EnergyEngine,
        inputs: &[EnergyInput],
    ) -> HashMap<String, String> {
        let mut failures = HashMap::new();
        let mut templates = self.templates.lock().await;
        for input in inputs.iter().filter(|i| i.pose.is_some()) {
            let key = smiles_key(&input.smiles);
            if templates.contains_key(&key) || failures.contains_key(&key) {
                continue;
            }
            let out = self.template_dir.path().join(format!("{key}.xml"));
            match engine.parameterize(&input.smiles, &out, self.template_dir.path()).await {
                Ok(()) => {
                    debug!("Parameterized {}", input.smiles);
                    templates.insert(key, out);
                }
                Err(e) => {
                    warn!("Parameterization failed for {}: {}", input.smiles, e);
                    failures.insert(key, e.to_string());
                }
            }
        }
        failures
    }

    async fn evaluate(
        &self,
        engine: &dyn EnergyEngine,
        receptor: &ReceptorTarget,
        input: &EnergyInput,
        failed_templates: &HashMap<String, String>,
    ) -> std::result::Result<f64, FallbackReason> {
        let pose_path = input.pose.as_deref().ok_or(FallbackReason::NoPose)?;
        let key = smiles_key(&input.smiles);
        if let Some(reason) = failed_templates.get(&key) {
            return Err(FallbackReason::Evaluation(format!("parameterization: {reason}")));
        }
        let template = self.templates.lock().await.get(&key).cloned();

        let pose = std::fs::read_to_string(pose_path).map_err(|_| FallbackReason::PoseParse)?;
        if pdb::parse_pdbqt(&pose).is_empty() {
            return Err(FallbackReason::PoseParse);
        }
        let complex = pdb::assemble_complex(&receptor.atoms, &pose);
        let (protein, ligand) = pdb::split_complex(&complex);
        if protein.is_empty() || ligand.is_empty() {
            return Err(FallbackReason::EmptySubset);
        }

        let evaluation = |e: ScreenError| FallbackReason::Evaluation(e.to_string());
        let scratch = self.sandbox.scoped_dir(&input.ligand_id).map_err(evaluation)?;
        let work = scratch.path();
        let complex_pdb = work.join("complex.pdb");
        let receptor_pdb = work.join("receptor.pdb");
        let ligand_pdb = work.join("ligand.pdb");
        for (path, atoms) in [(&complex_pdb, &complex), (&receptor_pdb, &protein), (&ligand_pdb, &ligand)] {
            std::fs::write(path, pdb::write_pdb(atoms)).map_err(|e| evaluation(e.into()))?;
        }

        let template = template.as_deref();
        let e_complex = engine.single_point(&complex_pdb, template, work).await.map_err(evaluation)?;
        let e_receptor = engine.single_point(&receptor_pdb, None, work).await.map_err(evaluation)?;
        let e_ligand = engine.single_point(&ligand_pdb, template, work).await.map_err(evaluation)?;
        let delta_g = round2(e_complex - (e_receptor + e_ligand));
        debug!("{}: ΔG = {:.2} kcal/mol", input.ligand_id, delta_g);
        Ok(delta_g)
    }
}

fn smiles_key(smiles: &str) -> String {
    format!("{:x}", Sha256::digest(smiles.as_bytes()))
}
