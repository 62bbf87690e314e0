//! Baseline-relative composite scoring.
//!
//! For each metric (docking score, ΔG, SA score) a population Z-score is taken
//! over baseline ∪ candidates jointly, so both sets share one normalisation.
//! composite = mean of the present z-scores; delta = composite − mean baseline
//! composite.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::baseline::{BaselineProvider, BaselineSet};
use crate::normalise::{mean, zscore_population};

/// Which side of the comparison a row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetMembership {
    Baseline,
    Candidate,
}

impl std::fmt::Display for SetMembership {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Baseline => write!(f, "baseline"),
            Self::Candidate => write!(f, "candidate"),
        }
    }
}

/// A row of the evaluation table. Derived fields are `None` until
/// [`CompoundEvaluator::compare`] fills them in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub compound_id: String,
    pub set: SetMembership,
    pub docking_score: Option<f64>,
    pub delta_g: Option<f64>,
    pub sa_score: Option<f64>,
    pub z_docking_score: Option<f64>,
    pub z_delta_g: Option<f64>,
    pub z_sa_score: Option<f64>,
    pub composite: Option<f64>,
    pub delta_score: Option<f64>,
}

impl EvaluationRecord {
    /// A screened compound's metrics, before normalisation.
    pub fn candidate(
        compound_id: &str,
        docking_score: Option<f64>,
        delta_g: Option<f64>,
        sa_score: Option<f64>,
    ) -> Self {
        Self {
            compound_id: compound_id.to_string(),
            set: SetMembership::Candidate,
            docking_score,
            delta_g,
            sa_score,
            z_docking_score: None,
            z_delta_g: None,
            z_sa_score: None,
            composite: None,
            delta_score: None,
        }
    }

    fn baseline(compound_id: &str, docking_score: Option<f64>, delta_g: Option<f64>, sa_score: Option<f64>) -> Self {
        Self {
            set: SetMembership::Baseline,
            ..Self::candidate(compound_id, docking_score, delta_g, sa_score)
        }
    }
}

/// Evaluator bound to one target's baseline.
pub struct CompoundEvaluator {
    baseline: BaselineSet,
}

impl CompoundEvaluator {
    /// Load the baseline for `gene` once; falls back to the synthetic set.
    pub fn new(gene: &str, provider: Option<&dyn BaselineProvider>) -> Self {
        Self {
            baseline: BaselineSet::load(gene, provider),
        }
    }

    /// Evaluator anchored to `baseline`.
    pub fn with_baseline(baseline: BaselineSet) -> Self {
        Self { baseline }
    }

    pub fn baseline(&self) -> &BaselineSet {
        &self.baseline
    }

    /// Score `candidates` against the baseline. Returns baseline and
    /// candidate rows together, ranked by composite descending (rows without
    /// a composite last, ties in input order).
    pub fn compare(&self, candidates: Vec<EvaluationRecord>) -> Vec<EvaluationRecord> {
        let mut rows: Vec<EvaluationRecord> = self
            .baseline
            .compounds
            .iter()
            .map(|b| EvaluationRecord::baseline(&b.compound_id, b.docking_score, b.delta_g, b.sa_score))
            .collect();
        rows.extend(candidates.into_iter().map(|mut c| {
            c.set = SetMembership::Candidate;
            c
        }));

        let col = |f: fn(&EvaluationRecord) -> Option<f64>| -> Vec<Option<f64>> { rows.iter().map(f).collect() };
        let z_dock = zscore_population(&col(|r| r.docking_score));
        let z_dg = zscore_population(&col(|r| r.delta_g));
        let z_sa = zscore_population(&col(|r| r.sa_score));

        for (i, row) in rows.iter_mut().enumerate() {
            row.z_docking_score = z_dock[i];
            row.z_delta_g = z_dg[i];
            row.z_sa_score = z_sa[i];
            row.composite = mean(&[z_dock[i], z_dg[i], z_sa[i]]);
        }

        let baseline_composites: Vec<Option<f64>> = rows
            .iter()
            .filter(|r| r.set == SetMembership::Baseline)
            .map(|r| r.composite)
            .collect();
        let baseline_mean = mean(&baseline_composites);
        debug!("Baseline mean composite for {}: {:?}", self.baseline.gene, baseline_mean);

        for row in rows.iter_mut() {
            row.delta_score = row.composite.zip(baseline_mean).map(|(c, b)| c - b);
        }

        let ranked = rank(rows);
        info!(
            "Evaluated {} candidates against {} baseline compounds for {}",
            ranked.iter().filter(|r| r.set == SetMembership::Candidate).count(),
            self.baseline.compounds.len(),
            self.baseline.gene
        );
        ranked
    }
}

/// Rank rows by composite descending; rows without a composite go last.
pub fn rank(mut rows: Vec<EvaluationRecord>) -> Vec<EvaluationRecord> {
    rows.sort_by(|a, b| match (a.composite, b.composite) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(std::cmp::Ordering::Equal),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::{BaselineCompound, StaticBaselineProvider};
    use pretty_assertions::assert_eq;

    fn by_id<'a>(rows: &'a [EvaluationRecord], id: &str) -> &'a EvaluationRecord {
        rows.iter().find(|r| r.compound_id == id).unwrap()
    }

    #[test]
    fn test_joint_normalisation_and_delta() {
        let evaluator = CompoundEvaluator::new("KRAS", None);
        let rows = evaluator.compare(vec![
            EvaluationRecord::candidate("A", Some(-10.0), Some(-55.0), Some(2.0)),
            EvaluationRecord::candidate("B", Some(-6.0), Some(-30.0), Some(5.0)),
        ]);
        assert_eq!(rows.len(), 5);

        // docking column: [-8.5, -9.2, -7.8, -10.0, -6.0]
        let dock = [-8.5, -9.2, -7.8, -10.0, -6.0];
        let m = dock.iter().sum::<f64>() / 5.0;
        let sd = (dock.iter().map(|v| (v - m).powi(2)).sum::<f64>() / 5.0).sqrt();
        let a = by_id(&rows, "A");
        assert!((a.z_docking_score.unwrap() - (-10.0 - m) / sd).abs() < 1e-12);

        // composite is the mean of the three z-scores
        let expect = (a.z_docking_score.unwrap() + a.z_delta_g.unwrap() + a.z_sa_score.unwrap()) / 3.0;
        assert!((a.composite.unwrap() - expect).abs() < 1e-12);

        // z-scores over the union sum to zero, so delta = composite − baseline mean
        let base_mean = rows
            .iter()
            .filter(|r| r.set == SetMembership::Baseline)
            .map(|r| r.composite.unwrap())
            .sum::<f64>()
            / 3.0;
        for r in &rows {
            assert!((r.delta_score.unwrap() - (r.composite.unwrap() - base_mean)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_ranked_descending_and_tagged() {
        let evaluator = CompoundEvaluator::new("KRAS", None);
        let rows = evaluator.compare(vec![
            EvaluationRecord::candidate("A", Some(-10.0), Some(-55.0), Some(2.0)),
            EvaluationRecord::candidate("B", Some(-6.0), Some(-30.0), Some(5.0)),
        ]);
        let composites: Vec<f64> = rows.iter().map(|r| r.composite.unwrap()).collect();
        assert!(composites.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(rows[0].compound_id, "B");
        assert_eq!(rows.iter().filter(|r| r.set == SetMembership::Baseline).count(), 3);
    }

    #[test]
    fn test_zero_variance_metric_does_not_divide_by_zero() {
        let provider = StaticBaselineProvider::new()
            .with("EGFR", BaselineCompound::new("R1", -8.0, -40.0, 3.0))
            .with("EGFR", BaselineCompound::new("R2", -8.0, -50.0, 3.0));
        let evaluator = CompoundEvaluator::new("egfr", Some(&provider));
        let rows = evaluator.compare(vec![EvaluationRecord::candidate(
            "C",
            Some(-8.0),
            Some(-45.0),
            Some(3.0),
        )]);
        for r in &rows {
            assert_eq!(r.z_docking_score, Some(0.0));
            assert_eq!(r.z_sa_score, Some(0.0));
            assert!(r.composite.unwrap().is_finite());
        }
        assert_eq!(by_id(&rows, "C").composite, Some(0.0));
    }

    #[test]
    fn test_missing_metric_is_skipped_in_composite() {
        let evaluator = CompoundEvaluator::new("KRAS", None);
        let rows = evaluator.compare(vec![
            EvaluationRecord::candidate("A", Some(-10.0), Some(-55.0), None),
            EvaluationRecord::candidate("N", None, None, None),
        ]);
        let a = by_id(&rows, "A");
        assert_eq!(a.z_sa_score, None);
        let expect = (a.z_docking_score.unwrap() + a.z_delta_g.unwrap()) / 2.0;
        assert!((a.composite.unwrap() - expect).abs() < 1e-12);

        let n = by_id(&rows, "N");
        assert_eq!(n.composite, None);
        assert_eq!(n.delta_score, None);
        assert_eq!(rows.last().unwrap().compound_id, "N");
    }
}
