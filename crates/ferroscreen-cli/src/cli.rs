use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "ferroscreen - in-silico compound screening: pocket grids, docking, ADMET heuristics and binding-energy ranking"
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Screen a ligand library against one or more targets and write reports.
    Screen(ScreenArgs),
    /// Derive the docking search grid for a receptor.
    Grid(GridArgs),
    /// Print ADMET heuristics for SMILES strings.
    Admet(AdmetArgs),
    /// Write a configuration file with every default filled in.
    InitConfig(InitConfigArgs),
}

#[derive(Args, Debug)]
pub struct ScreenArgs {
    /// Run configuration (YAML, JSON or TOML).
    #[arg(short, long, value_name = "PATH")]
    pub config: PathBuf,

    /// Target as GENE or GENE:VARIANT; repeatable. Overrides `targets` in the config.
    #[arg(short, long = "target", value_name = "GENE[:VARIANT]")]
    pub targets: Vec<String>,

    /// Ligand library; `.sdf` files are read as SDF, anything else as a SMILES list.
    #[arg(short, long, value_name = "PATH")]
    pub library: Option<PathBuf>,

    /// Keep only the best N docking results.
    #[arg(long, value_name = "N")]
    pub top_k: Option<usize>,

    /// Concurrent engine invocations.
    #[arg(short = 'j', long, value_name = "NUM")]
    pub workers: Option<usize>,
}

#[derive(Args, Debug)]
pub struct GridArgs {
    /// Receptor PDB file.
    #[arg(short, long, value_name = "PATH")]
    pub receptor: PathBuf,

    /// Pocket mode: auto, bbox or fpocket.
    #[arg(short, long, default_value = "auto")]
    pub mode: String,

    /// Margin added to the receptor bounding box (Å).
    #[arg(long, default_value_t = 8.0)]
    pub margin: f64,
}

#[derive(Args, Debug)]
pub struct AdmetArgs {
    /// One or more SMILES strings.
    #[arg(short, long, required = true, num_args = 1..)]
    pub smiles: Vec<String>,
}

#[derive(Args, Debug)]
pub struct InitConfigArgs {
    /// Where to write the YAML file.
    #[arg(short, long, default_value = "ferroscreen.yaml")]
    pub out: PathBuf,
}
