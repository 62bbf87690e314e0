//! Screening reports: the ranked evaluation table as CSV, plus an optional
//! Markdown summary rendered with minijinja.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use minijinja::{context, Environment};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use ferroscreen_common::{Result, TargetSpec};
use ferroscreen_ranker::{EvaluationRecord, SetMembership};

use crate::file_safe;
use crate::pocket::SearchGrid;
use crate::scoring::ScreenedCompound;

/// Candidates listed in the Markdown summary.
pub const TOP_N: usize = 5;

pub const COMPOSITE_DEFINITION: &str = "Composite = mean of the population Z-scores of docking score, \
binding ΔG and SA score, computed over baseline and candidates together. \
Δ = composite − mean baseline composite.";

pub const HEURISTIC_DISCLAIMER: &str = "ADMET values (ESOL logS, SA score, hERG and CYP flags) are coarse \
screening heuristics, not validated models. Synthetic docking scores and fallback ΔG values are \
placeholders and carry no physical meaning.";

/// One row of the report: an evaluation record joined back to its compound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRow {
    pub compound_id: String,
    pub set: SetMembership,
    pub smiles: Option<String>,
    pub docking_score: Option<f64>,
    pub docking_source: Option<String>,
    pub delta_g: Option<f64>,
    pub energy_source: Option<String>,
    pub sa_score: Option<f64>,
    pub log_s: Option<f64>,
    pub herg_risk: Option<bool>,
    pub herg_ic50: Option<f64>,
    pub cyp_inhibition: Option<bool>,
    pub z_docking_score: Option<f64>,
    pub z_delta_g: Option<f64>,
    pub z_sa_score: Option<f64>,
    pub composite: Option<f64>,
    pub delta_score: Option<f64>,
}

impl EvaluationRow {
    /// Flattens an evaluator row and, for candidates, its screening details.
    pub fn join(record: EvaluationRecord, compound: Option<&ScreenedCompound>) -> Self {
        Self {
            smiles: compound.map(|c| c.smiles.clone()),
            docking_source: compound.map(|c| c.docking.source.to_string()),
            energy_source: compound.and_then(|c| c.energy.as_ref()).map(|e| e.source.to_string()),
            log_s: compound.and_then(|c| c.admet.log_s),
            herg_risk: compound.and_then(|c| c.admet.herg_risk),
            herg_ic50: compound.and_then(|c| c.admet.herg_ic50),
            cyp_inhibition: compound.and_then(|c| c.admet.cyp_inhibition),
            compound_id: record.compound_id,
            set: record.set,
            docking_score: record.docking_score,
            delta_g: record.delta_g,
            sa_score: record.sa_score,
            z_docking_score: record.z_docking_score,
            z_delta_g: record.z_delta_g,
            z_sa_score: record.z_sa_score,
            composite: record.composite,
            delta_score: record.delta_score,
        }
    }
}

/// Result of screening one target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningReport {
    pub run_id: Uuid,
    pub target: TargetSpec,
    pub generated_at: DateTime<Utc>,
    pub grid: SearchGrid,
    /// Ranked by composite, best first
    pub table: Vec<EvaluationRow>,
}

impl ScreeningReport {
    /// `records` must already be ranked; compounds are joined by id.
    pub fn new(
        target: TargetSpec,
        grid: SearchGrid,
        records: Vec<EvaluationRecord>,
        compounds: &[ScreenedCompound],
    ) -> Self {
        let by_id: HashMap<&str, &ScreenedCompound> =
            compounds.iter().map(|c| (c.ligand_id.as_str(), c)).collect();
        let table = records
            .into_iter()
            .map(|record| {
                let compound = match record.set {
                    SetMembership::Candidate => by_id.get(record.compound_id.as_str()).copied(),
                    SetMembership::Baseline => None,
                };
                EvaluationRow::join(record, compound)
            })
            .collect();
        Self {
            run_id: Uuid::new_v4(),
            target,
            generated_at: Utc::now(),
            grid,
            table,
        }
    }

    /// Candidate rows in ranked order, baseline rows skipped.
    pub fn candidates(&self) -> impl Iterator<Item = &EvaluationRow> {
        self.table.iter().filter(|r| r.set == SetMembership::Candidate)
    }

    /// Best `n` candidates with a composite score.
    pub fn top(&self, n: usize) -> Vec<&EvaluationRow> {
        self.candidates().filter(|r| r.composite.is_some()).take(n).collect()
    }
}

/// Writes a report to a directory, returning the file written.
pub trait Reporter {
    fn write(&self, report: &ScreeningReport, out_dir: &Path) -> Result<PathBuf>;
}

/// `screening_report_<variant>_<YYYYmmddHHMMSS>.csv`, one row per compound.
pub struct CsvReporter;

impl Reporter for CsvReporter {
    fn write(&self, report: &ScreeningReport, out_dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(out_dir)?;
        let path = out_dir.join(format!(
            "screening_report_{}_{}.csv",
            file_safe(report.target.variant()),
            report.generated_at.format("%Y%m%d%H%M%S")
        ));
        let mut writer = csv::Writer::from_path(&path)?;
        for row in &report.table {
            writer.serialize(row)?;
        }
        writer.flush()?;
        info!("Wrote {} rows to {:?}", report.table.len(), path);
        Ok(path)
    }
}

const MARKDOWN_TEMPLATE: &str = r#"# Screening report: {{ target }}

Run `{{ run_id }}`, generated {{ generated_at }}.

Search grid ({{ grid_origin }}): center {{ center }}, size {{ size }} Å.

## Top {{ top | length }} candidates

| Rank | Compound | Docking (kcal/mol) | ΔG (kcal/mol) | SA | Composite | Δ vs baseline |
|---:|---|---:|---:|---:|---:|---:|
{% for row in top -%}
| {{ row.rank }} | {{ row.compound_id }} | {{ row.docking }} | {{ row.delta_g }} | {{ row.sa }} | {{ row.composite }} | {{ row.delta }} |
{% endfor %}
## All compounds

| Rank | Compound | Set | Docking | Docking source | ΔG | Energy source | SA | logS | hERG | CYP | Composite | Δ |
|---:|---|---|---:|---|---:|---|---:|---:|---|---|---:|---:|
{% for row in rows -%}
| {{ row.rank }} | {{ row.compound_id }} | {{ row.set }} | {{ row.docking }} | {{ row.docking_source }} | {{ row.delta_g }} | {{ row.energy_source }} | {{ row.sa }} | {{ row.log_s }} | {{ row.herg }} | {{ row.cyp }} | {{ row.composite }} | {{ row.delta }} |
{% endfor %}
---

{{ composite_definition }}

{{ disclaimer }}
"#;

#[derive(Serialize)]
struct MarkdownRow {
    rank: usize,
    compound_id: String,
    set: String,
    docking: String,
    docking_source: String,
    delta_g: String,
    energy_source: String,
    sa: String,
    log_s: String,
    herg: String,
    cyp: String,
    composite: String,
    delta: String,
}

fn num(value: Option<f64>, digits: usize) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.digits$}"))
}

fn flag(value: Option<bool>) -> String {
    match value {
        Some(true) => "yes".to_string(),
        Some(false) => "no".to_string(),
        None => "n/a".to_string(),
    }
}

impl MarkdownRow {
    fn new(rank: usize, row: &EvaluationRow) -> Self {
        Self {
            rank,
            compound_id: row.compound_id.clone(),
            set: row.set.to_string(),
            docking: num(row.docking_score, 2),
            docking_source: row.docking_source.clone().unwrap_or_else(|| "-".to_string()),
            delta_g: num(row.delta_g, 2),
            energy_source: row.energy_source.clone().unwrap_or_else(|| "-".to_string()),
            sa: num(row.sa_score, 2),
            log_s: num(row.log_s, 2),
            herg: flag(row.herg_risk),
            cyp: flag(row.cyp_inhibition),
            composite: num(row.composite, 3),
            delta: num(row.delta_score, 3),
        }
    }
}

/// `report_<gene>_<YYYY-mm-dd>.md`: top candidates, the full table and the
/// scoring footnotes.
pub struct MarkdownReporter {
    env: Environment<'static>,
}

impl MarkdownReporter {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("report.md", MARKDOWN_TEMPLATE)
            .map_err(anyhow::Error::from)?;
        Ok(Self { env })
    }

    /// Renders the summary without writing it.
    pub fn render(&self, report: &ScreeningReport) -> Result<String> {
        let rows: Vec<MarkdownRow> = report
            .table
            .iter()
            .enumerate()
            .map(|(i, row)| MarkdownRow::new(i + 1, row))
            .collect();
        let top: Vec<MarkdownRow> = report
            .top(TOP_N)
            .into_iter()
            .enumerate()
            .map(|(i, row)| MarkdownRow::new(i + 1, row))
            .collect();
        let fmt3 = |v: [f64; 3]| format!("({:.3}, {:.3}, {:.3})", v[0], v[1], v[2]);
        let grid_origin = serde_json::to_value(report.grid.origin)?;
        let template = self.env.get_template("report.md").map_err(anyhow::Error::from)?;
        let rendered = template
            .render(context! {
                target => report.target.to_string(),
                run_id => report.run_id.to_string(),
                generated_at => report.generated_at.to_rfc3339(),
                grid_origin => grid_origin.as_str().unwrap_or_default(),
                center => fmt3(report.grid.center),
                size => fmt3(report.grid.size),
                top => top,
                rows => rows,
                composite_definition => COMPOSITE_DEFINITION,
                disclaimer => HEURISTIC_DISCLAIMER,
            })
            .map_err(anyhow::Error::from)?;
        Ok(rendered)
    }
}

impl Reporter for MarkdownReporter {
    fn write(&self, report: &ScreeningReport, out_dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(out_dir)?;
        let path = out_dir.join(format!(
            "report_{}_{}.md",
            file_safe(&report.target.gene),
            report.generated_at.format("%Y-%m-%d")
        ));
        std::fs::write(&path, self.render(report)?)?;
        info!("Wrote summary {:?}", path);
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admet::AdmetProfile;
    use crate::docking::{DockingResult, DockingSource};
    use crate::energy::{BindingEnergyResult, EnergySource, FallbackReason};
    use ferroscreen_ranker::CompoundEvaluator;

    fn compound(id: &str, affinity: f64, delta_g: f64, sa: f64) -> ScreenedCompound {
        ScreenedCompound {
            ligand_id: id.to_string(),
            smiles: "CCO".to_string(),
            docking: DockingResult {
                ligand_id: id.to_string(),
                affinity,
                pose: None,
                source: DockingSource::Synthetic,
            },
            admet: AdmetProfile {
                sa_score: Some(sa),
                herg_risk: Some(false),
                ..AdmetProfile::empty()
            },
            energy: Some(BindingEnergyResult {
                ligand_id: id.to_string(),
                delta_g,
                source: EnergySource::Fallback(FallbackReason::EngineUnavailable),
            }),
        }
    }

    fn report() -> ScreeningReport {
        let compounds = vec![compound("A", -10.0, -55.0, 2.0), compound("B", -6.0, -30.0, 5.0)];
        let records = CompoundEvaluator::new("KRAS", None)
            .compare(compounds.iter().map(ScreenedCompound::to_record).collect());
        let grid = SearchGrid::explicit([5.0, 5.0, 5.0], [18.0, 18.0, 18.0]).unwrap();
        ScreeningReport::new(TargetSpec::new("KRAS", Some("KRAS_G12C")), grid, records, &compounds)
    }

    #[test]
    fn test_report_joins_compounds() {
        let report = report();
        assert_eq!(report.table.len(), 5);
        assert_eq!(report.candidates().count(), 2);
        let a = report.table.iter().find(|r| r.compound_id == "A").unwrap();
        assert_eq!(a.docking_source.as_deref(), Some("synthetic"));
        assert_eq!(a.energy_source.as_deref(), Some("fallback (engine_unavailable)"));
        assert_eq!(a.herg_risk, Some(false));
        let baseline = report.table.iter().find(|r| r.compound_id == "REF1").unwrap();
        assert!(baseline.smiles.is_none());
    }

    #[test]
    fn test_csv_report() {
        let dir = tempfile::tempdir().unwrap();
        let report = report();
        let path = CsvReporter.write(&report, dir.path()).unwrap();
        let name = path.file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.starts_with("screening_report_KRAS_G12C_"));
        assert!(name.ends_with(".csv"));

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<EvaluationRow> = reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].compound_id, report.table[0].compound_id);
    }

    #[test]
    fn test_markdown_summary() {
        let dir = tempfile::tempdir().unwrap();
        let report = report();
        let reporter = MarkdownReporter::new().unwrap();
        let text = reporter.render(&report).unwrap();
        assert!(text.contains("# Screening report: KRAS (KRAS_G12C)"));
        assert!(text.contains("## Top 2 candidates"));
        // composite ranks higher raw values first
        assert!(text.contains("| 1 | B |"));
        assert!(text.contains(COMPOSITE_DEFINITION));
        assert!(text.contains(HEURISTIC_DISCLAIMER));

        let path = reporter.write(&report, dir.path()).unwrap();
        assert!(path.file_name().unwrap().to_str().unwrap().starts_with("report_KRAS_"));
    }
}
