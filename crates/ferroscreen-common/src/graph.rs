//! Knowledge-graph query capability.
//!
//! The screen only needs "run a query with parameters, get rows back"; the
//! concrete driver is supplied by the caller.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::Result;

/// One result row: column name → value.
pub type GraphRow = Map<String, Value>;

#[async_trait]
pub trait GraphQuery: Send + Sync {
    /// Execute `query` with named `params` and return all rows.
    async fn run(&self, query: &str, params: &Map<String, Value>) -> Result<Vec<GraphRow>>;
}

/// In-memory graph returning fixed rows, filtered by a `gene_name` prefix
/// parameter when rows carry a `gene` column.
#[derive(Debug, Clone, Default)]
pub struct StaticGraph {
    rows: Vec<GraphRow>,
}

impl StaticGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a compound row targeting `gene`.
    pub fn with_compound(mut self, gene: &str, ligand_id: &str, smiles: &str) -> Self {
        let mut row = Map::new();
        row.insert("gene".to_string(), Value::String(gene.to_string()));
        row.insert("ligand_id".to_string(), Value::String(ligand_id.to_string()));
        row.insert("smiles".to_string(), Value::String(smiles.to_string()));
        self.rows.push(row);
        self
    }
}

#[async_trait]
impl GraphQuery for StaticGraph {
    async fn run(&self, _query: &str, params: &Map<String, Value>) -> Result<Vec<GraphRow>> {
        let prefix = params.get("gene_name").and_then(Value::as_str);
        Ok(self
            .rows
            .iter()
            .filter(|row| match (prefix, row.get("gene").and_then(Value::as_str)) {
                (Some(p), Some(g)) => g.starts_with(p),
                _ => true,
            })
            .cloned()
            .collect())
    }
}
