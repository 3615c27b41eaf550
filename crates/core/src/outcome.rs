//! Family-specific result payloads stored in [`TaskRecord::result`](crate::model::TaskRecord).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What the AI collaborator made of a free-text idea.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdeaAnalysis {
    /// Proposed package name.
    #[serde(default)]
    pub suggested_name: Option<String>,
    /// Proposed description.
    #[serde(default)]
    pub description: Option<String>,
    /// Proposed package type, e.g. `utility`.
    #[serde(default)]
    pub suggested_type: Option<String>,
    /// Features worth enabling.
    #[serde(default)]
    pub recommended_features: Vec<String>,
    /// Runtime dependencies worth adding.
    #[serde(default)]
    pub recommended_dependencies: Vec<String>,
}

/// A file produced by the AI collaborator, relative to the package root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Path relative to the package root.
    pub path: String,
    /// File contents.
    pub content: String,
}

/// Result of a generation task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutcome {
    /// Name of the generated package.
    pub package_name: String,
    /// Directory holding the package.
    pub package_path: String,
    /// Directory the generator wrote into.
    pub output_dir: String,
    /// Every file under the output directory after generation.
    pub files: Vec<String>,
    /// Idea analysis, when one ran.
    #[serde(default)]
    pub analysis: Option<IdeaAnalysis>,
    /// Files written from AI-generated sources and tests.
    #[serde(default)]
    pub ai_files: Vec<String>,
    /// Generator stdout.
    #[serde(default)]
    pub stdout: String,
}

/// Result of an analysis task.
///
/// `report` holds the generator's JSON document. When stdout could not be
/// parsed the raw text is kept in `raw_output` and `parse_error` explains why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutcome {
    /// Package that was analysed.
    pub package_path: String,
    /// Analysis type that was requested.
    pub analysis_type: String,
    /// Parsed report.
    #[serde(default)]
    pub report: Option<Value>,
    /// Unparsed stdout.
    #[serde(default)]
    pub raw_output: Option<String>,
    /// Why stdout could not be parsed.
    #[serde(default)]
    pub parse_error: Option<String>,
}

/// Result of a publish task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishOutcome {
    /// Package that was published.
    pub package_path: String,
    /// Registry name or URL.
    pub registry: String,
    /// Dist-tag published under.
    pub tag: String,
    /// Nothing was uploaded.
    pub dry_run: bool,
    /// From `package.json`.
    #[serde(default)]
    pub package_name: Option<String>,
    /// From `package.json`.
    #[serde(default)]
    pub version: Option<String>,
    /// Public registry page, for real npm publishes.
    #[serde(default)]
    pub package_url: Option<String>,
    /// Registry tool stdout.
    #[serde(default)]
    pub stdout: String,
}
