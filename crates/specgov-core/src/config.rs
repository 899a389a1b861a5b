use crate::error::Result;
use crate::io;
use crate::paths;
use llm_client::{ClientConfig, Provider};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Pipeline LLM settings
// ---------------------------------------------------------------------------

/// The two LLM-backed pipelines. Each reads its own `<PREFIX>_LLM_*`
/// environment variables and has its own request limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pipeline {
    Ingest,
    Taskgen,
}

impl Pipeline {
    pub fn env_prefix(self) -> &'static str {
        match self {
            Pipeline::Ingest => "REQINGEST",
            Pipeline::Taskgen => "TASKGEN",
        }
    }

    pub fn api_key_var(self) -> String {
        format!("{}_LLM_API_KEY", self.env_prefix())
    }

    pub fn timeout(self) -> Duration {
        match self {
            Pipeline::Ingest => Duration::from_secs(120),
            Pipeline::Taskgen => Duration::from_secs(180),
        }
    }

    pub fn max_tokens(self) -> u32 {
        match self {
            Pipeline::Ingest => 8192,
            Pipeline::Taskgen => 16384,
        }
    }
}

/// Raw LLM settings as given on the command line or in the environment.
/// Unset values fall back to the provider defaults.
#[derive(Debug, Clone, Default)]
pub struct LlmSettings {
    pub provider: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
}

impl LlmSettings {
    pub fn client_config(&self, pipeline: Pipeline) -> Result<ClientConfig> {
        let provider: Provider = match self.provider.as_deref() {
            Some(p) if !p.trim().is_empty() => p.parse()?,
            _ => Provider::default(),
        };
        let mut config = ClientConfig::new(provider, pipeline.api_key_var());
        if let Some(url) = self.base_url.as_deref().filter(|u| !u.trim().is_empty()) {
            config.base_url = url.to_string();
        }
        if let Some(model) = self.model.as_deref().filter(|m| !m.trim().is_empty()) {
            config.model = model.to_string();
        }
        config.api_key = self.api_key.clone().filter(|k| !k.is_empty());
        config.timeout = pipeline.timeout();
        config.max_tokens = pipeline.max_tokens();
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// RepoManifest
// ---------------------------------------------------------------------------

/// The parts of `repo.yaml` the pipelines consult.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoManifest {
    pub quality_gates: Vec<String>,
}

impl RepoManifest {
    /// Read `repo.yaml`; a missing file is an empty manifest. Quality gate
    /// entries without a string `id` are ignored.
    pub fn load(root: &Path) -> Result<RepoManifest> {
        let path = paths::repo_manifest_path(root);
        if !path.is_file() {
            return Ok(RepoManifest::default());
        }
        let doc = io::load_yaml_value(&path)?;
        let quality_gates = doc
            .get("qualityGates")
            .and_then(Value::as_array)
            .map(|gates| {
                gates
                    .iter()
                    .filter_map(|g| g.get("id").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(RepoManifest { quality_gates })
    }
}
