//! Client for the external AI service that analyses ideas and writes code.

use async_trait::async_trait;
use forge_core::outcome::{IdeaAnalysis, SourceFile};
use forge_core::request::{AiConfig, PackageConfig};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("collaborator request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("collaborator answered {status}: {body}")]
    Status { status: u16, body: String },
}

#[async_trait]
pub trait Collaborator: Send + Sync {
    async fn analyze_idea(
        &self,
        idea: &str,
        complexity: Option<&str>,
        priorities: &[String],
    ) -> Result<IdeaAnalysis, CollaboratorError>;

    async fn generate_source_code(
        &self,
        config: &PackageConfig,
        analysis: Option<&IdeaAnalysis>,
        ai: &AiConfig,
    ) -> Result<Vec<SourceFile>, CollaboratorError>;

    async fn generate_tests(
        &self,
        config: &PackageConfig,
        sources: &[SourceFile],
        ai: &AiConfig,
    ) -> Result<Vec<SourceFile>, CollaboratorError>;
}

#[derive(Deserialize)]
struct FilesResponse {
    #[serde(default)]
    files: Vec<SourceFile>,
}

/// JSON-over-HTTP collaborator at `{base_url}/analyze-idea`, `/generate-source`, `/generate-tests`.
pub struct HttpCollaborator {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpCollaborator {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T, CollaboratorError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(%url, "calling collaborator");
        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CollaboratorError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.json::<T>().await?)
    }
}

#[async_trait]
impl Collaborator for HttpCollaborator {
    async fn analyze_idea(
        &self,
        idea: &str,
        complexity: Option<&str>,
        priorities: &[String],
    ) -> Result<IdeaAnalysis, CollaboratorError> {
        self.post(
            "analyze-idea",
            json!({
                "idea": idea,
                "complexity": complexity,
                "priorities": priorities,
            }),
        )
        .await
    }

    async fn generate_source_code(
        &self,
        config: &PackageConfig,
        analysis: Option<&IdeaAnalysis>,
        ai: &AiConfig,
    ) -> Result<Vec<SourceFile>, CollaboratorError> {
        let resp: FilesResponse = self
            .post(
                "generate-source",
                json!({
                    "config": config,
                    "analysis": analysis,
                    "aiConfig": ai,
                }),
            )
            .await?;
        Ok(resp.files)
    }

    async fn generate_tests(
        &self,
        config: &PackageConfig,
        sources: &[SourceFile],
        ai: &AiConfig,
    ) -> Result<Vec<SourceFile>, CollaboratorError> {
        let resp: FilesResponse = self
            .post(
                "generate-tests",
                json!({
                    "config": config,
                    "sourceFiles": sources,
                    "aiConfig": ai,
                }),
            )
            .await?;
        Ok(resp.files)
    }
}
