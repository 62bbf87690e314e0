//! Run configuration for a compound screen.
//!
//! Loaded from YAML, JSON or TOML; every section has serde defaults so a
//! minimal file only needs the target. Environment variables (optionally from
//! a `.env` file loaded by the binary) override engine paths.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, ScreenError};

/// Complete screening run configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScreenConfig {
    /// Targets to screen
    #[serde(default)]
    pub targets: Vec<TargetSpec>,

    /// Where candidate ligands come from
    #[serde(default)]
    pub library: LibraryConfig,

    /// External engine commands
    #[serde(default)]
    pub engines: EngineConfig,

    /// Grid and docking options
    #[serde(default)]
    pub docking: DockingConfig,

    /// Binding-energy options
    #[serde(default)]
    pub energy: EnergyConfig,

    /// Baseline / evaluation options
    #[serde(default)]
    pub evaluation: EvaluationConfig,

    /// Execution options
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Output options
    #[serde(default)]
    pub output: OutputConfig,
}

// ── Target Specification ─────────────────────────────────────────────────────

/// A receptor to screen against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSpec {
    /// Gene symbol used for baseline lookup and KG queries (e.g., "KRAS")
    pub gene: String,

    /// Variant label used to locate the receptor file (e.g., "KRAS_G12C").
    /// Defaults to the gene symbol.
    pub variant: Option<String>,
}

impl TargetSpec {
    pub fn new(gene: &str, variant: Option<&str>) -> Self {
        Self {
            gene: gene.to_string(),
            variant: variant.map(|v| v.to_string()),
        }
    }

    /// Parse `GENE` or `GENE:VARIANT`.
    pub fn parse(spec: &str) -> Result<Self> {
        let mut parts = spec.splitn(2, ':');
        let gene = parts.next().map(str::trim).unwrap_or_default();
        if gene.is_empty() {
            return Err(ScreenError::Config(format!("empty target spec '{spec}'")));
        }
        let variant = parts.next().map(str::trim).filter(|v| !v.is_empty());
        Ok(Self::new(gene, variant))
    }

    pub fn variant(&self) -> &str {
        self.variant.as_deref().unwrap_or(&self.gene)
    }
}

impl std::fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.variant {
            Some(v) => write!(f, "{} ({})", self.gene, v),
            None => write!(f, "{}", self.gene),
        }
    }
}

// ── Library ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Multi-record SDF library
    pub sdf: Option<PathBuf>,

    /// SMILES list, one `id,smiles` or bare `smiles` per line
    pub smiles: Option<PathBuf>,
}

// ── Engines ───────────────────────────────────────────────────────────────────

/// An external program plus leading arguments, e.g. `python mk_prepare_ligand.py`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl EngineCommand {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: vec![],
        }
    }

    pub fn with_args(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_vina")]
    pub vina: EngineCommand,

    #[serde(default = "default_fpocket")]
    pub fpocket: EngineCommand,

    #[serde(default = "default_obabel")]
    pub obabel: EngineCommand,

    #[serde(default = "default_meeko")]
    pub meeko: EngineCommand,

    #[serde(default = "default_gbsa")]
    pub gbsa: EngineCommand,
}

fn default_vina() -> EngineCommand { EngineCommand::new("vina") }
fn default_fpocket() -> EngineCommand { EngineCommand::new("fpocket") }
fn default_obabel() -> EngineCommand { EngineCommand::new("obabel") }
fn default_meeko() -> EngineCommand { EngineCommand::new("mk_prepare_ligand.py") }
fn default_gbsa() -> EngineCommand { EngineCommand::new("openmm-gbsa") }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            vina: default_vina(),
            fpocket: default_fpocket(),
            obabel: default_obabel(),
            meeko: default_meeko(),
            gbsa: default_gbsa(),
        }
    }
}

// ── Docking ───────────────────────────────────────────────────────────────────

/// How the docking search box is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PocketMode {
    /// fpocket when installed, bounding box otherwise
    #[default]
    Auto,
    BoundingBox,
    #[serde(rename = "fpocket")]
    FPocket,
}

impl std::str::FromStr for PocketMode {
    type Err = ScreenError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "bbox" | "bounding_box" => Ok(Self::BoundingBox),
            "fpocket" => Ok(Self::FPocket),
            other => Err(ScreenError::Config(format!("unknown pocket mode '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockingConfig {
    #[serde(default)]
    pub pocket_mode: PocketMode,

    /// Margin added to the receptor bounding box (Å)
    #[serde(default = "default_bbox_margin")]
    pub bbox_margin: f64,

    /// Margin added to 2·radius of a detected pocket (Å)
    #[serde(default = "default_pocket_margin")]
    pub pocket_margin: f64,

    /// Explicit grid center; bypasses pocket resolution together with `grid_size`
    pub grid_center: Option<[f64; 3]>,
    pub grid_size: Option<[f64; 3]>,

    #[serde(default = "default_exhaustiveness")]
    pub exhaustiveness: u32,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Seed for the synthetic scorer used when Vina is absent
    #[serde(default = "default_docking_seed")]
    pub seed: u64,
}

fn default_bbox_margin() -> f64 { 8.0 }
fn default_pocket_margin() -> f64 { 4.0 }
fn default_exhaustiveness() -> u32 { 8 }
fn default_top_k() -> usize { 500 }
fn default_docking_seed() -> u64 { 42 }

impl Default for DockingConfig {
    fn default() -> Self {
        Self {
            pocket_mode: PocketMode::default(),
            bbox_margin: default_bbox_margin(),
            pocket_margin: default_pocket_margin(),
            grid_center: None,
            grid_size: None,
            exhaustiveness: default_exhaustiveness(),
            top_k: default_top_k(),
            seed: default_docking_seed(),
        }
    }
}

// ── Energy ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnergyConfig {
    /// Protein force field passed to the energy engine
    #[serde(default = "default_protein_ff")]
    pub protein_forcefield: String,

    /// Small-molecule force field used for ligand parameterization
    #[serde(default = "default_ligand_ff")]
    pub ligand_forcefield: String,

    #[serde(default = "default_solvent")]
    pub implicit_solvent: String,

    /// Seed for fallback ΔG sampling
    #[serde(default = "default_energy_seed")]
    pub seed: u64,
}

fn default_protein_ff() -> String { "amber14-all.xml".to_string() }
fn default_ligand_ff() -> String { "openff-2.1.0".to_string() }
fn default_solvent() -> String { "OBC2".to_string() }
fn default_energy_seed() -> u64 { 7 }

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            protein_forcefield: default_protein_ff(),
            ligand_forcefield: default_ligand_ff(),
            implicit_solvent: default_solvent(),
            seed: default_energy_seed(),
        }
    }
}

// ── Evaluation ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// CSV with columns gene, compound_id, docking_score, delta_g, sa_score
    pub baseline_csv: Option<PathBuf>,
}

// ── Execution ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Number of concurrent per-ligand engine invocations
    #[serde(default = "default_workers")]
    pub parallel_workers: usize,

    /// Timeout for a single engine invocation, in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Immediate retries of a failed engine invocation
    #[serde(default)]
    pub max_retries: u32,

    /// Root for per-ligand scratch directories (system temp dir when unset)
    pub work_dir: Option<PathBuf>,
}

fn default_workers() -> usize { 4 }
fn default_timeout() -> u64 { 600 }

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            parallel_workers: default_workers(),
            timeout_secs: default_timeout(),
            max_retries: 0,
            work_dir: None,
        }
    }
}

// ── Output ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory holding `<variant>*.pdb` receptors and fpocket outputs
    #[serde(default = "default_receptor_dir")]
    pub receptor_dir: PathBuf,

    /// Docking poses and intermediate tables
    #[serde(default = "default_docking_dir")]
    pub docking_dir: PathBuf,

    /// Final reports
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,

    /// Also render a Markdown summary next to the CSV
    #[serde(default = "default_true")]
    pub markdown: bool,
}

fn default_receptor_dir() -> PathBuf { PathBuf::from("outputs") }
fn default_docking_dir() -> PathBuf { PathBuf::from("outputs/docking") }
fn default_report_dir() -> PathBuf { PathBuf::from("outputs/reports") }
fn default_true() -> bool { true }

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            receptor_dir: default_receptor_dir(),
            docking_dir: default_docking_dir(),
            report_dir: default_report_dir(),
            markdown: true,
        }
    }
}

// ── Helper Methods ─────────────────────────────────────────────────────────────

impl ScreenConfig {
    /// Load from a YAML, JSON or TOML file, chosen by extension.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        let config: Self = match ext.as_str() {
            "json" => serde_json::from_str(&content)?,
            "toml" => toml::from_str(&content)?,
            "yaml" | "yml" => serde_yaml::from_str(&content)?,
            other => {
                return Err(ScreenError::Config(format!(
                    "unsupported config extension '{other}' for {}",
                    path.display()
                )))
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Save to YAML file
    pub fn to_yaml(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply engine-path overrides from the environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        let slots: [(&str, &mut EngineCommand); 5] = [
            ("AUTODOCK_VINA_BIN", &mut self.engines.vina),
            ("FPOCKET_BIN", &mut self.engines.fpocket),
            ("OBABEL_BIN", &mut self.engines.obabel),
            ("MEEKO_BIN", &mut self.engines.meeko),
            ("GBSA_BIN", &mut self.engines.gbsa),
        ];
        for (key, slot) in slots {
            if let Some(program) = lookup(key).filter(|v| !v.trim().is_empty()) {
                *slot = EngineCommand::new(program.trim());
            }
        }
        if let Some(dir) = lookup("FERROSCREEN_OUTPUT_DIR").filter(|v| !v.trim().is_empty()) {
            let root = PathBuf::from(dir.trim());
            self.output.docking_dir = root.join("docking");
            self.output.report_dir = root.join("reports");
            self.output.receptor_dir = root;
        }
    }

    /// Reject configurations that cannot produce a valid run.
    pub fn validate(&self) -> Result<()> {
        if self.docking.bbox_margin <= 0.0 || self.docking.pocket_margin <= 0.0 {
            return Err(ScreenError::Config("grid margins must be > 0".to_string()));
        }
        if self.docking.top_k == 0 {
            return Err(ScreenError::Config("docking.top_k must be > 0".to_string()));
        }
        if self.execution.parallel_workers == 0 {
            return Err(ScreenError::Config("execution.parallel_workers must be > 0".to_string()));
        }
        match (self.docking.grid_center, self.docking.grid_size) {
            (Some(_), Some(size)) if size.iter().any(|s| *s <= 0.0) => {
                return Err(ScreenError::Config("docking.grid_size components must be > 0".to_string()));
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(ScreenError::Config(
                    "docking.grid_center and docking.grid_size must be given together".to_string(),
                ));
            }
            _ => {}
        }
        Ok(())
    }

    /// Explicit grid, when both center and size are configured.
    pub fn explicit_grid(&self) -> Option<([f64; 3], [f64; 3])> {
        self.docking.grid_center.zip(self.docking.grid_size)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
