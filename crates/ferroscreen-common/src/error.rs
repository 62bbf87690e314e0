use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScreenError {
    /// Receptor or pocket input carried no atoms. Fatal for the run.
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// A ligand structure could not be parsed. Only that ligand is skipped.
    #[error("Structure parse error for {id}: {reason}")]
    StructureParse { id: String, reason: String },

    /// A required external binary is absent. Selects a fallback mode; never
    /// returned from batch operations.
    #[error("Engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("{engine} invocation failed: {reason}")]
    EngineInvocation { engine: String, reason: String },

    #[error("{engine} timed out after {secs}s")]
    EngineTimeout { engine: String, secs: u64 },

    /// An upstream artifact (e.g. the receptor structure) is missing for a
    /// target. Fatal for that target only.
    #[error("Missing upstream artifact: {0}")]
    MissingUpstreamArtifact(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ScreenError {
    /// Non-zero exit or unusable output from `engine`.
    pub fn invocation(engine: &str, reason: impl Into<String>) -> Self {
        Self::EngineInvocation {
            engine: engine.to_string(),
            reason: reason.into(),
        }
    }

    /// Structure parse failure for one ligand.
    pub fn parse(id: &str, reason: impl Into<String>) -> Self {
        Self::StructureParse {
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    /// Per-ligand failures that degrade to a sentinel instead of aborting a batch.
    pub fn is_per_ligand(&self) -> bool {
        matches!(
            self,
            Self::StructureParse { .. } | Self::EngineInvocation { .. } | Self::EngineTimeout { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ScreenError>;
