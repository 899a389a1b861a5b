use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpecError {
    #[error("Schema validation failed:\n{0}")]
    SchemaViolation(String),

    #[error("{0}")]
    IdentityMismatch(String),

    #[error("{file}: {field} references unknown id '{id}'")]
    UnknownReference {
        file: String,
        field: String,
        id: String,
    },

    #[error("{0}")]
    DanglingLink(String),

    #[error("Coverage gate: {0}")]
    CoverageGap(String),

    #[error("{0}")]
    RegistryStructure(String),

    #[error("{0}")]
    Configuration(String),

    #[error("invalid plan: {0}")]
    Plan(String),

    #[error("validation still failing after {attempts} attempt(s):\n{last_error}")]
    ValidationExhausted { attempts: u32, last_error: String },

    #[error(transparent)]
    Llm(#[from] llm_client::LlmError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SpecError {
    /// Stable taxonomy label, used in `--json` output.
    pub fn kind(&self) -> &'static str {
        match self {
            SpecError::SchemaViolation(_) => "schema_violation",
            SpecError::IdentityMismatch(_) => "identity_mismatch",
            SpecError::UnknownReference { .. } | SpecError::DanglingLink(_) => {
                "unknown_reference"
            }
            SpecError::CoverageGap(_) => "coverage_gap",
            SpecError::RegistryStructure(_) => "registry_structure",
            SpecError::Configuration(_) => "configuration",
            SpecError::Plan(_) => "plan",
            SpecError::ValidationExhausted { .. } => "validation_exhausted",
            SpecError::Llm(_) => "llm",
            SpecError::Io(_) => "io",
            SpecError::Yaml(_) => "yaml",
            SpecError::Json(_) => "json",
        }
    }
}

pub type Result<T> = std::result::Result<T, SpecError>;
