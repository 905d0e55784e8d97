// Review Pipeline
//
// *La Revue* (The Review) - Read, prompt, analyze, extract, persist.

use crate::config::AppConfig;
use crate::output::{read_dockerfile, OutputStore};
use crate::prompts::{format_prompt, load_template};
use lerelais::{extract_dockerfile, AnalysisResult, InferenceClient, Result};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Per-review options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewOptions {
    /// Model to use instead of the configured one
    pub model: Option<String>,
    /// Persist the analysis and corrected Dockerfile
    pub save: bool,
}

impl Default for ReviewOptions {
    fn default() -> Self {
        Self {
            model: None,
            save: true,
        }
    }
}

/// Paths written by a review
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SavedArtifacts {
    /// Analysis file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<PathBuf>,
    /// Corrected Dockerfile
    #[serde(rename = "corrected_dockerfile", skip_serializing_if = "Option::is_none")]
    pub dockerfile: Option<PathBuf>,
}

impl SavedArtifacts {
    /// Whether anything was written
    pub fn is_empty(&self) -> bool {
        self.analysis.is_none() && self.dockerfile.is_none()
    }
}

/// Outcome of one review
#[derive(Debug, Clone, PartialEq)]
pub struct DockerfileReview {
    /// Dockerfile that was reviewed
    pub source_path: PathBuf,
    /// Model that produced the analysis
    pub model: String,
    /// Full analysis text
    pub analysis: AnalysisResult,
    /// Corrected Dockerfile, when the analysis contained one
    pub corrected_dockerfile: Option<String>,
    /// Files written
    pub saved: SavedArtifacts,
}

impl DockerfileReview {
    /// Tool-result payload
    pub fn to_json(&self) -> Value {
        let mut payload = json!({
            "status": "success",
            "original_file": self.source_path,
            "model_used": self.model,
            "analysis": self.analysis.as_str(),
            "corrected_dockerfile": self.corrected_dockerfile,
        });
        if !self.saved.is_empty() {
            payload["saved_files"] = json!(self.saved);
        }
        payload
    }
}

/// Runs reviews against one inference client and output store
#[derive(Debug, Clone)]
pub struct ReviewService {
    client: InferenceClient,
    store: OutputStore,
    template: String,
    save_analysis: bool,
    save_dockerfile: bool,
}

impl ReviewService {
    /// Service with the built-in template that saves both artifacts
    pub fn new(client: InferenceClient, store: OutputStore) -> Self {
        Self {
            client,
            store,
            template: crate::prompts::DEFAULT_TEMPLATE.to_string(),
            save_analysis: true,
            save_dockerfile: true,
        }
    }

    /// Build the client, store and template from configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let client = InferenceClient::new(config.ollama.clone())?;
        let store = OutputStore::new(config.output_root());
        let template = load_template(&config.prompt)?;
        Ok(Self::new(client, store)
            .with_template(template)
            .with_saving(config.output.save_analysis, config.output.save_dockerfile))
    }

    /// Replace the prompt template
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    /// Choose which artifacts a saving review writes
    pub fn with_saving(mut self, analysis: bool, dockerfile: bool) -> Self {
        self.save_analysis = analysis;
        self.save_dockerfile = dockerfile;
        self
    }

    /// Inference client
    pub fn client(&self) -> &InferenceClient {
        &self.client
    }

    /// Output store
    pub fn store(&self) -> &OutputStore {
        &self.store
    }

    /// Review one Dockerfile
    pub async fn review(&self, path: &Path, options: &ReviewOptions) -> Result<DockerfileReview> {
        let content = read_dockerfile(path)?;
        let model = options
            .model
            .clone()
            .unwrap_or_else(|| self.client.config().model.clone());

        info!("Analyzing Dockerfile: {}", path.display());
        let prompt = format_prompt(&content, &self.template);
        let analysis = self.client.analyze_with_model(&prompt, &model).await?;

        let corrected_dockerfile = extract_dockerfile(analysis.as_str());
        if corrected_dockerfile.is_none() {
            warn!("No corrected Dockerfile found in the analysis");
        }

        let mut saved = SavedArtifacts::default();
        if options.save {
            let source_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "Dockerfile".to_string());

            if self.save_analysis {
                saved.analysis = Some(self.store.save_analysis(analysis.as_str(), &source_name)?);
            }
            if self.save_dockerfile {
                if let Some(dockerfile) = &corrected_dockerfile {
                    saved.dockerfile = Some(self.store.save_dockerfile(dockerfile, &source_name)?);
                }
            }
        }

        Ok(DockerfileReview {
            source_path: path.to_path_buf(),
            model,
            analysis,
            corrected_dockerfile,
            saved,
        })
    }
}
