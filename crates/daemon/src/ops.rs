//! Fire-and-wait operations. These run the generator inline and never create task records.

use std::io::Write;

use forge_core::api::{OptimizationResponse, TemplateListResponse, TemplateResponse, UltraThinkResponse};
use forge_core::new_ulid;
use forge_core::request::{
    AiConfig, GenerationRequest, OptimizationRequest, PackageConfig, PackageType, QualityLevel,
    TemplateRequest, UltraThinkRequest, Validate, ValidationError,
};
use forge_exec::files::collect_files;
use forge_exec::{ForgeCommand, ParsedOutput, SubprocessResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{info, warn};

use crate::jobs::JobContext;

#[derive(Debug, Error)]
pub enum OperationError {
    #[error("{0}")]
    Failed(String),
    #[error(transparent)]
    Rejected(#[from] ValidationError),
    #[error("could not write template config: {0}")]
    ConfigFile(#[from] std::io::Error),
}

async fn run(ctx: &JobContext, command: ForgeCommand<'_>) -> SubprocessResult {
    let argv = command.argv(&ctx.toolchain);
    ctx.runner.run(&argv, command.working_dir()).await
}

/// A failed run is reported in the body, not as an HTTP error.
pub async fn optimize(ctx: &JobContext, request: &OptimizationRequest) -> OptimizationResponse {
    let command = ForgeCommand::Optimize(request);
    let result = run(ctx, command).await;
    let optimization_id = new_ulid().to_string();

    if !result.success {
        warn!(%optimization_id, exit_code = result.exit_code, "optimization failed");
        return OptimizationResponse {
            success: false,
            optimization_id,
            improvements: Vec::new(),
            metrics: Value::Object(Default::default()),
            recommendations: Vec::new(),
            parse_error: None,
            raw_output: None,
            error: Some(result.failure_summary(command.label())),
        };
    }

    let parsed = ParsedOutput::from_stdout(&result.stdout);
    let metrics = match parsed.field("metrics") {
        Value::Null => Value::Object(Default::default()),
        metrics => metrics,
    };
    OptimizationResponse {
        success: true,
        optimization_id,
        improvements: parsed.list("improvements"),
        metrics,
        recommendations: parsed.list("recommendations"),
        parse_error: parsed.parse_error,
        raw_output: parsed.raw_output,
        error: None,
    }
}

pub async fn list_templates(ctx: &JobContext) -> TemplateListResponse {
    let command = ForgeCommand::TemplateList;
    let result = run(ctx, command).await;
    if !result.success {
        return TemplateListResponse {
            success: false,
            templates: None,
            raw_output: None,
            error: Some(result.failure_summary(command.label())),
        };
    }

    let parsed = ParsedOutput::from_stdout(&result.stdout);
    TemplateListResponse {
        success: parsed.value.is_some(),
        templates: parsed.value,
        raw_output: parsed.raw_output,
        error: parsed.parse_error,
    }
}

/// Config goes to a temporary JSON file that is removed when this returns.
pub async fn generate_from_template(
    ctx: &JobContext,
    template_id: &str,
    request: &TemplateRequest,
) -> Result<TemplateResponse, OperationError> {
    validate_template_id(template_id)?;
    let body = serde_json::to_vec(&request.config).map_err(std::io::Error::other)?;
    let config_file = tokio::task::spawn_blocking(move || write_config_file(&body))
        .await
        .map_err(std::io::Error::other)??;

    let command = ForgeCommand::TemplateGenerate {
        template_id,
        config_file: config_file.path(),
        output_dir: &request.output_dir,
    };
    let label = command.label();
    let result = run(ctx, command).await;
    drop(config_file);

    if !result.success {
        return Err(OperationError::Failed(result.failure_summary(label)));
    }

    let output_path = std::path::Path::new(&request.output_dir);
    let files = collect_files(output_path)
        .into_iter()
        .map(|rel| output_path.join(rel).display().to_string())
        .collect();
    info!(template_id, output_dir = %request.output_dir, "template rendered");
    Ok(TemplateResponse {
        success: true,
        template_id: template_id.to_string(),
        output_path: request.output_dir.clone(),
        files,
    })
}

fn write_config_file(body: &[u8]) -> std::io::Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("forge-template-")
        .suffix(".json")
        .tempfile()?;
    file.write_all(body)?;
    file.flush()?;
    Ok(file)
}

/// Template ids go on the generator's command line, so they must not read as flags.
pub fn validate_template_id(template_id: &str) -> Result<(), ValidationError> {
    let reason = if template_id.trim().is_empty() {
        "must not be empty"
    } else if template_id.starts_with('-') {
        "must not start with '-'"
    } else {
        return Ok(());
    };
    Err(ValidationError::Invalid {
        field: "templateId",
        reason: reason.into(),
    })
}

/// Unparsable output is returned raw with a note; a failed run is an error.
pub async fn ultrathink(ctx: &JobContext, request: &UltraThinkRequest) -> Result<UltraThinkResponse, OperationError> {
    let command = ForgeCommand::UltraThink(request);
    let result = run(ctx, command).await;
    if !result.success {
        return Err(OperationError::Failed(result.failure_summary(command.label())));
    }

    let parsed = ParsedOutput::from_stdout(&result.stdout);
    Ok(UltraThinkResponse {
        success: parsed.parse_error.is_none(),
        thinking_id: new_ulid().to_string(),
        solutions: parsed.list("solutions"),
        insights: parsed.list("insights"),
        recommendations: parsed.list("recommendations"),
        parse_error: parsed.parse_error,
        raw_output: parsed.raw_output,
    })
}

/// Overrides applied to a built-in generation preset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetCustomization {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub output_dir: Option<String>,
}

impl Validate for PresetCustomization {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

struct Preset {
    id: &'static str,
    default_name: &'static str,
    description: &'static str,
    package_type: PackageType,
}

const PRESETS: &[Preset] = &[
    Preset {
        id: "typescript-library",
        default_name: "my-library",
        description: "A TypeScript library",
        package_type: PackageType::Library,
    },
    Preset {
        id: "react-component",
        default_name: "my-component",
        description: "A React component library",
        package_type: PackageType::ReactComponent,
    },
];

/// Generation request for a built-in preset, or `None` for an unknown id.
pub fn preset_request(template_id: &str, custom: PresetCustomization) -> Option<GenerationRequest> {
    let preset = PRESETS.iter().find(|p| p.id == template_id)?;
    let config = PackageConfig {
        package_name: custom.name.unwrap_or_else(|| preset.default_name.to_string()),
        description: custom.description.unwrap_or_else(|| preset.description.to_string()),
        version: "1.0.0".into(),
        license: "MIT".into(),
        package_type: preset.package_type,
        quality_level: QualityLevel::Good,
        output_dir: custom.output_dir,
        enable_testing: true,
        enable_documentation: true,
        enable_linting: true,
        enable_typescript: true,
        enable_git_init: false,
        enable_codex_integration: false,
        enable_openai_agents: false,
        enable_cicd: false,
        enable_docker: false,
        enable_security: true,
        enable_performance_monitoring: false,
        author: None,
        email: None,
        repository: None,
        keywords: Vec::new(),
        dependencies: Default::default(),
        dev_dependencies: Default::default(),
        customizations: None,
    };
    Some(GenerationRequest {
        config,
        ai_config: Some(AiConfig::default()),
        idea: None,
        complexity: None,
        priorities: Vec::new(),
        options: None,
    })
}
