//! ferroscreen: in-silico compound screening.
//! Entry point for the command-line binary.

mod cli;

use std::path::Path;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ferroscreen_common::{ProcessSandbox, ScreenConfig, TargetSpec};
use ferroscreen_molecules::admet::AdmetScorer;
use ferroscreen_molecules::pdb::ReceptorTarget;
use ferroscreen_molecules::pipeline::ScreeningPipeline;
use ferroscreen_molecules::pocket::PocketGridResolver;

use cli::{AdmetArgs, Cli, Commands, GridArgs, InitConfigArgs, ScreenArgs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ferroscreen=debug,info")),
        )
        .init();

    let cli = Cli::parse();
    info!("ferroscreen {}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Screen(args) => screen(args).await,
        Commands::Grid(args) => grid(args).await,
        Commands::Admet(args) => admet(args),
        Commands::InitConfig(args) => init_config(args),
    }
}

fn load_config(args: &ScreenArgs) -> anyhow::Result<ScreenConfig> {
    let mut config = ScreenConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    config.apply_env_overrides();

    if !args.targets.is_empty() {
        config.targets = args
            .targets
            .iter()
            .map(|t| TargetSpec::parse(t))
            .collect::<Result<_, _>>()?;
    }
    if let Some(library) = &args.library {
        let is_sdf = library
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("sdf"));
        if is_sdf {
            config.library.sdf = Some(library.clone());
            config.library.smiles = None;
        } else {
            config.library.smiles = Some(library.clone());
            config.library.sdf = None;
        }
    }
    if let Some(top_k) = args.top_k {
        config.docking.top_k = top_k;
    }
    if let Some(workers) = args.workers {
        config.execution.parallel_workers = workers;
    }
    config.validate()?;
    Ok(config)
}

async fn screen(args: ScreenArgs) -> anyhow::Result<()> {
    let config = load_config(&args)?;
    if config.targets.is_empty() {
        bail!("no targets given (use --target or `targets` in the config)");
    }
    let targets = config.targets.clone();
    let pipeline = ScreeningPipeline::new(config, None)?;

    let outcomes = pipeline.run_many(&targets).await;
    let mut failed = 0;
    for (target, outcome) in &outcomes {
        match outcome {
            Ok(report) => {
                for path in pipeline.write_reports(report)? {
                    println!("{}\t{}", target, path.display());
                }
            }
            Err(e) => {
                failed += 1;
                error!("{}: {}", target, e);
            }
        }
    }
    if failed > 0 {
        bail!("{} of {} targets failed", failed, outcomes.len());
    }
    Ok(())
}

async fn grid(args: GridArgs) -> anyhow::Result<()> {
    let mut config = ScreenConfig::default();
    config.apply_env_overrides();
    let receptor = ReceptorTarget::load(&args.receptor)?;
    let resolver = PocketGridResolver::new(
        args.mode.parse()?,
        config.engines.fpocket.clone(),
        ProcessSandbox::from_config(&config.execution),
        args.margin,
        config.docking.pocket_margin,
    );
    let grid = resolver.resolve(&receptor).await?;
    println!("{}", serde_json::to_string_pretty(&grid)?);
    Ok(())
}

fn admet(args: AdmetArgs) -> anyhow::Result<()> {
    let scorer = AdmetScorer::new();
    for smiles in &args.smiles {
        let profile = scorer.score(smiles);
        if profile.sa_score.is_none() {
            warn!("Could not parse {}", smiles);
        }
        let row = serde_json::json!({ "smiles": smiles, "admet": profile });
        println!("{}", serde_json::to_string(&row)?);
    }
    Ok(())
}

fn init_config(args: InitConfigArgs) -> anyhow::Result<()> {
    write_default_config(&args.out)?;
    println!("{}", args.out.display());
    Ok(())
}

fn write_default_config(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    let mut config = ScreenConfig::default();
    config.targets.push(TargetSpec::new("KRAS", Some("KRAS_G12C")));
    config.to_yaml(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ferroscreen.yaml");
        write_default_config(&path).unwrap();
        let config = ScreenConfig::load(&path).unwrap();
        assert_eq!(config.targets, vec![TargetSpec::new("KRAS", Some("KRAS_G12C"))]);
        assert!(write_default_config(&path).is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ferroscreen.yaml");
        write_default_config(&path).unwrap();
        let args = ScreenArgs {
            config: path,
            targets: vec!["EGFR:EGFR_L858R".to_string()],
            library: Some(dir.path().join("lib.SDF")),
            top_k: Some(10),
            workers: None,
        };
        let config = load_config(&args).unwrap();
        assert_eq!(config.targets[0].variant(), "EGFR_L858R");
        assert!(config.library.sdf.is_some());
        assert_eq!(config.docking.top_k, 10);
    }
}
