//! Reference compounds that anchor the normalisation for a target.
//!
//! Providers are constructed once by the caller and passed to the evaluator;
//! nothing here caches lazily on first use.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use ferroscreen_common::error::Result;

/// One reference compound with its known metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineCompound {
    pub compound_id: String,
    pub docking_score: Option<f64>,
    pub delta_g: Option<f64>,
    pub sa_score: Option<f64>,
}

impl BaselineCompound {
    pub fn new(compound_id: &str, docking_score: f64, delta_g: f64, sa_score: f64) -> Self {
        Self {
            compound_id: compound_id.to_string(),
            docking_score: Some(docking_score),
            delta_g: Some(delta_g),
            sa_score: Some(sa_score),
        }
    }
}

/// Source of baseline compounds per target gene.
pub trait BaselineProvider: Send + Sync {
    /// Baseline rows for `gene` (case-insensitive), or None when the target
    /// has no reference compounds.
    fn baseline_for(&self, gene: &str) -> Option<Vec<BaselineCompound>>;
}

/// Fixed stand-in used when a target has no reference compounds.
pub fn synthetic_baseline() -> Vec<BaselineCompound> {
    vec![
        BaselineCompound::new("REF1", -8.5, -45.2, 3.5),
        BaselineCompound::new("REF2", -9.2, -50.1, 4.0),
        BaselineCompound::new("REF3", -7.8, -40.3, 3.8),
    ]
}

/// Baseline for one target, loaded once per evaluation run.
#[derive(Debug, Clone, PartialEq)]
pub struct BaselineSet {
    pub gene: String,
    pub compounds: Vec<BaselineCompound>,
    /// True when the synthetic stand-in was substituted
    pub synthetic: bool,
}

impl BaselineSet {
    /// Baseline for `gene` from the provider, or the built-in reference set.
    pub fn load(gene: &str, provider: Option<&dyn BaselineProvider>) -> Self {
        let gene = gene.to_uppercase();
        match provider.and_then(|p| p.baseline_for(&gene)).filter(|rows| !rows.is_empty()) {
            Some(compounds) => {
                debug!("Loaded {} baseline compounds for {}", compounds.len(), gene);
                Self { gene, compounds, synthetic: false }
            }
            None => {
                info!("No baseline compounds for {}; using synthetic reference set", gene);
                Self { gene, compounds: synthetic_baseline(), synthetic: true }
            }
        }
    }
}

// ── CSV Implementation ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct BaselineRow {
    gene: String,
    compound_id: String,
    docking_score: Option<f64>,
    delta_g: Option<f64>,
    sa_score: Option<f64>,
}

/// Baseline table read from `baseline_compounds.csv`
/// (columns: gene, compound_id, docking_score, delta_g, sa_score).
#[derive(Debug, Clone, Default)]
pub struct CsvBaselineProvider {
    by_gene: HashMap<String, Vec<BaselineCompound>>,
}

impl CsvBaselineProvider {
    /// Reads a baseline CSV from disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let provider = Self::from_reader(content.as_bytes())?;
        info!(
            "Loaded baseline table {:?} ({} genes)",
            path,
            provider.by_gene.len()
        );
        Ok(provider)
    }

    /// Reads `gene,compound_id,docking_score,delta_g,sa_score` rows.
    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(reader);
        let mut by_gene: HashMap<String, Vec<BaselineCompound>> = HashMap::new();
        for result in reader.deserialize::<BaselineRow>() {
            let row = result?;
            by_gene
                .entry(row.gene.trim().to_uppercase())
                .or_default()
                .push(BaselineCompound {
                    compound_id: row.compound_id,
                    docking_score: row.docking_score,
                    delta_g: row.delta_g,
                    sa_score: row.sa_score,
                });
        }
        Ok(Self { by_gene })
    }
}

impl BaselineProvider for CsvBaselineProvider {
    fn baseline_for(&self, gene: &str) -> Option<Vec<BaselineCompound>> {
        self.by_gene.get(&gene.to_uppercase()).cloned()
    }
}

// ── Static Implementation for Testing ──────────────────────────────────────────

/// Provider with hardcoded rows.
#[derive(Debug, Clone, Default)]
pub struct StaticBaselineProvider {
    data: HashMap<String, Vec<BaselineCompound>>,
}

impl StaticBaselineProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a reference compound for a gene.
    pub fn with(mut self, gene: &str, compound: BaselineCompound) -> Self {
        self.data.entry(gene.to_uppercase()).or_default().push(compound);
        self
    }
}

impl BaselineProvider for StaticBaselineProvider {
    fn baseline_for(&self, gene: &str) -> Option<Vec<BaselineCompound>> {
        self.data.get(&gene.to_uppercase()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "gene,compound_id,docking_score,delta_g,sa_score,notes\n\
                       kras,sotorasib,-9.1,-52.0,3.1,approved\n\
                       KRAS,adagrasib,-8.7,,3.4,\n\
                       EGFR,gefitinib,-8.0,-44.0,2.5,\n";

    #[test]
    fn test_csv_provider_groups_by_gene_case_insensitively() {
        let provider = CsvBaselineProvider::from_reader(CSV.as_bytes()).unwrap();
        let kras = provider.baseline_for("Kras").unwrap();
        assert_eq!(kras.len(), 2);
        assert_eq!(kras[1].compound_id, "adagrasib");
        assert_eq!(kras[1].delta_g, None);
        assert!(provider.baseline_for("TP53").is_none());
    }

    #[test]
    fn test_missing_gene_falls_back_to_synthetic() {
        let provider = StaticBaselineProvider::new();
        let set = BaselineSet::load("kras", Some(&provider));
        assert!(set.synthetic);
        assert_eq!(set.gene, "KRAS");
        assert_eq!(set.compounds, synthetic_baseline());

        let set = BaselineSet::load("kras", None);
        assert_eq!(set.compounds.len(), 3);
    }

    #[test]
    fn test_provider_rows_are_used_when_present() {
        let provider = StaticBaselineProvider::new()
            .with("KRAS", BaselineCompound::new("sotorasib", -9.1, -52.0, 3.1));
        let set = BaselineSet::load("KRAS", Some(&provider));
        assert!(!set.synthetic);
        assert_eq!(set.compounds[0].compound_id, "sotorasib");
    }
}
