//! Request configurations accepted by the daemon, and their validation rules.
//!
//! Wire format is camelCase JSON. Enumerated fields reject unknown values at
//! deserialization time; everything else is checked by [`Validate`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::outcome::IdeaAnalysis;

/// Malformed request. Surfaces synchronously; no task is created.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    /// Text length outside the allowed bounds.
    #[error("{field} must be between {min} and {max} characters (got {actual})")]
    Length {
        /// Wire name of the field.
        field: &'static str,
        /// Shortest accepted length.
        min: usize,
        /// Longest accepted length.
        max: usize,
        /// Length received.
        actual: usize,
    },
    /// Number outside the allowed range.
    #[error("{field} is out of range: {detail}")]
    Range {
        /// Wire name of the field.
        field: &'static str,
        /// Value and accepted range.
        detail: String,
    },
    /// Value breaks a format rule.
    #[error("{field} is invalid: {reason}")]
    Invalid {
        /// Wire name of the field.
        field: &'static str,
        /// Rule that was broken.
        reason: String,
    },
    /// Body could not be decoded.
    #[error("malformed request body: {0}")]
    Malformed(String),
}

/// Semantic checks beyond what deserialization enforces.
pub trait Validate {
    /// Returns the first violated rule.
    fn validate(&self) -> Result<(), ValidationError>;
}

macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[allow(missing_docs)]
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            /// Value as passed on the wire and to the generator executable.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_enum!(
    /// Kind of package to generate.
    PackageType {
        Library => "library",
        CliTool => "cli-tool",
        ReactComponent => "react-component",
        ExpressApi => "express-api",
        Utility => "utility",
        Monorepo => "monorepo",
        Plugin => "plugin",
    }
);

wire_enum!(
    /// Quality tier requested from the generator.
    QualityLevel {
        Good => "good",
        Better => "better",
        Best => "best",
        Enterprise => "enterprise",
    }
);

wire_enum!(
    /// Depth/focus of a package analysis.
    AnalysisType {
        Basic => "basic",
        Comprehensive => "comprehensive",
        Security => "security",
        Performance => "performance",
    }
);

wire_enum!(
    /// What an optimization run targets.
    OptimizationType {
        Bundle => "bundle",
        Dependencies => "dependencies",
        Performance => "performance",
        Security => "security",
    }
);

wire_enum!(
    /// How far an optimization may go.
    Aggressiveness {
        Conservative => "conservative",
        Moderate => "moderate",
        Aggressive => "aggressive",
    }
);

fn default_true() -> bool {
    true
}

fn default_version() -> String {
    "1.0.0".into()
}

fn default_license() -> String {
    "MIT".into()
}

/// Full configuration of a package to generate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageConfig {
    /// npm package name, optionally scoped.
    pub package_name: String,
    /// One-line summary.
    pub description: String,
    /// Semantic version.
    #[serde(default = "default_version")]
    pub version: String,
    /// SPDX license id.
    #[serde(default = "default_license")]
    pub license: String,
    /// Kind of package to scaffold.
    pub package_type: PackageType,
    /// Strictness of the generated tooling.
    pub quality_level: QualityLevel,
    /// Where to generate. A fresh directory under the work root when absent.
    #[serde(default)]
    pub output_dir: Option<String>,
    /// Generate a test setup.
    #[serde(default = "default_true")]
    pub enable_testing: bool,
    /// Generate documentation.
    #[serde(default = "default_true")]
    pub enable_documentation: bool,
    /// Generate lint config.
    #[serde(default = "default_true")]
    pub enable_linting: bool,
    /// Generate TypeScript sources.
    #[serde(default = "default_true", rename = "enableTypeScript")]
    pub enable_typescript: bool,
    /// Run `git init` in the package.
    #[serde(default)]
    pub enable_git_init: bool,
    /// Add Codex integration.
    #[serde(default)]
    pub enable_codex_integration: bool,
    /// Add OpenAI agents scaffolding.
    #[serde(default, rename = "enableOpenAIAgents")]
    pub enable_openai_agents: bool,
    /// Add CI/CD workflows.
    #[serde(default, rename = "enableCICD")]
    pub enable_cicd: bool,
    /// Add a Dockerfile.
    #[serde(default)]
    pub enable_docker: bool,
    /// Add security checks.
    #[serde(default = "default_true")]
    pub enable_security: bool,
    /// Add performance monitoring.
    #[serde(default)]
    pub enable_performance_monitoring: bool,
    /// Package author.
    #[serde(default)]
    pub author: Option<String>,
    /// Author email.
    #[serde(default)]
    pub email: Option<String>,
    /// Repository URL.
    #[serde(default)]
    pub repository: Option<String>,
    /// npm keywords.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Runtime dependencies, name to version range.
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    /// Development dependencies, name to version range.
    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, String>,
    /// Free-form extras passed through to the generator and collaborator.
    #[serde(default)]
    pub customizations: Option<Value>,
}

impl PackageConfig {
    /// Fold an idea analysis into this config.
    ///
    /// Explicit request values win. Recommended dependencies missing from
    /// `dependencies` are added at `latest`; recommended features and the
    /// suggested type go under `customizations` as `recommendedFeatures` and
    /// `suggestedType`. A blank description takes the analysed one.
    pub fn apply_analysis(&mut self, analysis: &IdeaAnalysis) {
        if self.description.trim().is_empty() {
            if let Some(description) = &analysis.description {
                self.description = description.clone();
            }
        }

        for dep in &analysis.recommended_dependencies {
            if dep.trim().is_empty() || self.dev_dependencies.contains_key(dep) {
                continue;
            }
            self.dependencies
                .entry(dep.clone())
                .or_insert_with(|| "latest".into());
        }

        if analysis.recommended_features.is_empty() && analysis.suggested_type.is_none() {
            return;
        }
        let customizations = self
            .customizations
            .get_or_insert_with(|| Value::Object(Map::new()));
        let Value::Object(extra) = customizations else {
            return;
        };
        if !analysis.recommended_features.is_empty() {
            extra
                .entry("recommendedFeatures")
                .or_insert_with(|| json!(analysis.recommended_features));
        }
        if let Some(suggested) = &analysis.suggested_type {
            extra
                .entry("suggestedType")
                .or_insert_with(|| Value::String(suggested.clone()));
        }
    }
}

impl Validate for PackageConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        check_length("packageName", &self.package_name, 1, 214)?;
        check_package_name(&self.package_name)?;
        check_length("description", &self.description, 1, 500)?;
        if !is_semver_prefix(&self.version) {
            return Err(ValidationError::Invalid {
                field: "version",
                reason: format!("'{}' does not start with MAJOR.MINOR.PATCH", self.version),
            });
        }
        if let Some(dir) = &self.output_dir {
            check_non_blank("outputDir", dir)?;
        }
        Ok(())
    }
}

/// Settings forwarded to the AI collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiConfig {
    #[serde(default = "default_model")]
    pub model: String,
    /// Sampling temperature, 0.0..=2.0.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Ask for extended reasoning.
    #[serde(default)]
    pub enable_ultrathink: bool,
    /// Let the collaborator refine its own output.
    #[serde(default)]
    pub enable_self_improvement: bool,
    /// Refinement rounds, 1..=10.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_iterations() -> u32 {
    1
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            enable_ultrathink: false,
            enable_self_improvement: false,
            max_iterations: default_max_iterations(),
        }
    }
}

impl AiConfig {
    /// Settings used by the ultrathink generation preset.
    pub fn ultrathink(mut self) -> Self {
        self.enable_ultrathink = true;
        self.enable_self_improvement = true;
        self.max_iterations = 5;
        self
    }
}

impl Validate for AiConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        check_non_blank("aiConfig.model", &self.model)?;
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ValidationError::Range {
                field: "aiConfig.temperature",
                detail: format!("{} not in 0.0..=2.0", self.temperature),
            });
        }
        if !(1..=10).contains(&self.max_iterations) {
            return Err(ValidationError::Range {
                field: "aiConfig.maxIterations",
                detail: format!("{} not in 1..=10", self.max_iterations),
            });
        }
        Ok(())
    }
}

/// Asynchronous package generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    /// Package to generate.
    pub config: PackageConfig,
    /// Enables the AI phases (idea analysis, source and test generation).
    #[serde(default)]
    pub ai_config: Option<AiConfig>,
    /// Free-text idea analysed before generation.
    #[serde(default)]
    pub idea: Option<String>,
    /// Hint for the idea analysis, e.g. `simple`.
    #[serde(default)]
    pub complexity: Option<String>,
    /// What the idea analysis should optimise for.
    #[serde(default)]
    pub priorities: Vec<String>,
    /// Extra generator options.
    #[serde(default)]
    pub options: Option<Value>,
}

impl Validate for GenerationRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        self.config.validate()?;
        if let Some(ai) = &self.ai_config {
            ai.validate()?;
        }
        if let Some(idea) = &self.idea {
            check_length("idea", idea, 10, 1000)?;
        }
        Ok(())
    }
}

fn default_analysis_type() -> AnalysisType {
    AnalysisType::Comprehensive
}

/// Asynchronous analysis of an existing package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    /// Package directory to analyse.
    pub package_path: String,
    /// Kind of analysis.
    #[serde(default = "default_analysis_type")]
    pub analysis_type: AnalysisType,
    /// Ask for recommendations in the report.
    #[serde(default = "default_true")]
    pub include_recommendations: bool,
}

impl Validate for AnalysisRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        check_non_blank("packagePath", &self.package_path)
    }
}

fn default_registry() -> String {
    "npm".into()
}

fn default_tag() -> String {
    "latest".into()
}

/// Asynchronous publish of a package directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    /// Package directory to publish.
    pub package_path: String,
    /// `npm` or a registry URL.
    #[serde(default = "default_registry")]
    pub registry: String,
    /// Publish with public access.
    #[serde(default = "default_true")]
    pub is_public: bool,
    /// Run without uploading.
    #[serde(default)]
    pub dry_run: bool,
    /// Dist-tag to publish under.
    #[serde(default = "default_tag")]
    pub tag: String,
}

impl Validate for PublishRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        check_non_blank("packagePath", &self.package_path)?;
        check_non_blank("registry", &self.registry)?;
        check_non_blank("tag", &self.tag)?;
        if self.tag.chars().any(char::is_whitespace) {
            return Err(ValidationError::Invalid {
                field: "tag",
                reason: "must not contain whitespace".into(),
            });
        }
        Ok(())
    }
}

fn default_aggressiveness() -> Aggressiveness {
    Aggressiveness::Moderate
}

/// Synchronous optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationRequest {
    /// Package directory to optimise.
    pub package_path: String,
    /// What to optimise.
    pub optimization_type: OptimizationType,
    /// How far changes may go.
    #[serde(default = "default_aggressiveness")]
    pub aggressiveness: Aggressiveness,
}

impl Validate for OptimizationRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        check_non_blank("packagePath", &self.package_path)
    }
}

/// Synchronous template rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateRequest {
    /// Template variables, written to a temporary JSON file for the generator.
    pub config: Value,
    /// Directory to render into.
    pub output_dir: String,
}

impl Validate for TemplateRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        if !self.config.is_object() {
            return Err(ValidationError::Invalid {
                field: "config",
                reason: "must be a JSON object".into(),
            });
        }
        check_non_blank("outputDir", &self.output_dir)
    }
}

fn default_creativity() -> f64 {
    0.7
}

fn default_depth() -> u8 {
    3
}

/// Synchronous idea expansion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UltraThinkRequest {
    /// Idea to expand, 10..=1000 characters.
    pub idea: String,
    /// Background for the idea.
    #[serde(default)]
    pub context: Option<String>,
    /// How far solutions may stray from the idea, 0.0..=1.0.
    #[serde(default = "default_creativity")]
    pub creativity: f64,
    /// Reasoning depth, 1..=5.
    #[serde(default = "default_depth")]
    pub depth: u8,
}

impl Validate for UltraThinkRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        check_length("idea", &self.idea, 10, 1000)?;
        if !(0.0..=1.0).contains(&self.creativity) {
            return Err(ValidationError::Range {
                field: "creativity",
                detail: format!("{} not in 0.0..=1.0", self.creativity),
            });
        }
        if !(1..=5).contains(&self.depth) {
            return Err(ValidationError::Range {
                field: "depth",
                detail: format!("{} not in 1..=5", self.depth),
            });
        }
        Ok(())
    }
}

fn check_length(field: &'static str, value: &str, min: usize, max: usize) -> Result<(), ValidationError> {
    let actual = value.chars().count();
    if actual < min || actual > max {
        return Err(ValidationError::Length {
            field,
            min,
            max,
            actual,
        });
    }
    Ok(())
}

fn check_non_blank(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Invalid {
            field,
            reason: "must not be empty".into(),
        });
    }
    Ok(())
}

/// npm-style names: alphanumerics plus `-`, `_`, `.`, and an optional `@scope/` prefix.
fn check_package_name(name: &str) -> Result<(), ValidationError> {
    let invalid = |reason: &str| ValidationError::Invalid {
        field: "packageName",
        reason: reason.to_string(),
    };

    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.');
    let bare = match name.strip_prefix('@') {
        Some(scoped) => {
            let (scope, pkg) = scoped
                .split_once('/')
                .ok_or_else(|| invalid("scoped names must look like @scope/name"))?;
            if scope.is_empty() || !scope.chars().all(allowed) {
                return Err(invalid("scope contains invalid characters"));
            }
            pkg
        }
        None => name,
    };

    if bare.is_empty() || !bare.chars().all(allowed) {
        return Err(invalid("contains invalid characters"));
    }
    if !bare.chars().any(|c| c.is_ascii_alphanumeric()) {
        return Err(invalid("must contain at least one alphanumeric character"));
    }
    Ok(())
}

/// Matches `^\d+\.\d+\.\d+`.
fn is_semver_prefix(version: &str) -> bool {
    let mut parts = version.splitn(3, '.');
    let (Some(major), Some(minor), Some(rest)) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    let all_digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    all_digits(major) && all_digits(minor) && rest.starts_with(|c: char| c.is_ascii_digit())
}
