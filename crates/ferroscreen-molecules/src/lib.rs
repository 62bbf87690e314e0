//! ferroscreen-molecules: In-silico compound screening.
//!
//! Stages of one screening run:
//! 1. Resolving the receptor structure and its docking search grid (bounding box / fpocket)
//! 2. Loading and preparing the ligand library (SDF, SMILES list or knowledge graph)
//! 3. ADMET heuristics from 2D structure
//! 4. Molecular docking (AutoDock Vina, or a seeded synthetic fallback)
//! 5. Implicit-solvent binding-energy estimation
//! 6. Baseline-anchored evaluation and reporting

pub mod pdb;
pub mod pocket;
pub mod chem;
pub mod ligand;
pub mod docking;
pub mod admet;
pub mod energy;
pub mod scoring;
pub mod pipeline;
pub mod report;

pub use ferroscreen_common::{Result, ScreenError};

/// Rounds to two decimal places.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// File-name-safe form of a ligand or receptor id.
pub(crate) fn file_safe(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect()
}
