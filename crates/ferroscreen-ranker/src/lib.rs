//! ferroscreen-ranker: Baseline-anchored statistical ranking of screened compounds.

pub mod normalise;
pub mod baseline;
pub mod evaluator;

pub use baseline::{BaselineCompound, BaselineProvider, BaselineSet, CsvBaselineProvider, StaticBaselineProvider};
pub use evaluator::{CompoundEvaluator, EvaluationRecord, SetMembership};
