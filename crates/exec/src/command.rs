//! Command lines for the external generator and registry tool.
//!
//! Every variant maps to exactly one argv; nothing here touches a shell.

use std::path::{Path, PathBuf};

use forge_core::request::{
    AnalysisRequest, OptimizationRequest, PackageConfig, PublishRequest, UltraThinkRequest,
};

/// Locations of the external executables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    /// Interpreter used to run the generator script.
    pub node: String,
    /// The generator CLI script.
    pub cli_script: PathBuf,
    /// Registry tool used for publishing.
    pub npm: String,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            node: "node".into(),
            cli_script: PathBuf::from("cli.js"),
            npm: "npm".into(),
        }
    }
}

impl Toolchain {
    fn cli(&self, subcommand: &str) -> Vec<String> {
        vec![
            self.node.clone(),
            self.cli_script.display().to_string(),
            subcommand.to_string(),
        ]
    }
}

/// One invocation of an external tool.
#[derive(Debug, Clone, Copy)]
pub enum ForgeCommand<'a> {
    /// Scaffold a package into `output_dir`.
    Generate {
        config: &'a PackageConfig,
        output_dir: &'a Path,
    },
    Analyze(&'a AnalysisRequest),
    /// Run the registry tool inside the package directory.
    Publish(&'a PublishRequest),
    Optimize(&'a OptimizationRequest),
    TemplateList,
    TemplateGenerate {
        template_id: &'a str,
        config_file: &'a Path,
        output_dir: &'a str,
    },
    UltraThink(&'a UltraThinkRequest),
    NodeVersion,
    NpmVersion,
}

impl ForgeCommand<'_> {
    /// Short name used in logs and failure messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Generate { .. } => "generate",
            Self::Analyze(_) => "analyze",
            Self::Publish(_) => "publish",
            Self::Optimize(_) => "optimize",
            Self::TemplateList => "template list",
            Self::TemplateGenerate { .. } => "template generate",
            Self::UltraThink(_) => "ultrathink",
            Self::NodeVersion => "node --version",
            Self::NpmVersion => "npm --version",
        }
    }

    /// Full argument vector, program first.
    pub fn argv(&self, toolchain: &Toolchain) -> Vec<String> {
        match self {
            Self::Generate { config, output_dir } => {
                let mut argv = toolchain.cli("generate");
                argv.extend([
                    config.package_name.clone(),
                    "--type".into(),
                    config.package_type.to_string(),
                    "--quality".into(),
                    config.quality_level.to_string(),
                    "--output".into(),
                    output_dir.display().to_string(),
                    "--no-interactive".into(),
                ]);
                let flags = [
                    (config.enable_typescript, "--typescript"),
                    (config.enable_testing, "--testing"),
                    (config.enable_documentation, "--documentation"),
                    (config.enable_linting, "--linting"),
                    (config.enable_security, "--security"),
                    (config.enable_docker, "--docker"),
                    (config.enable_cicd, "--cicd"),
                    (config.enable_git_init, "--git-init"),
                ];
                argv.extend(
                    flags
                        .into_iter()
                        .filter(|(on, _)| *on)
                        .map(|(_, flag)| flag.to_string()),
                );
                argv
            }
            Self::Analyze(req) => {
                let mut argv = toolchain.cli("analyze");
                argv.extend([
                    req.package_path.clone(),
                    "--type".into(),
                    req.analysis_type.to_string(),
                    "--json".into(),
                ]);
                if req.include_recommendations {
                    argv.push("--recommendations".into());
                }
                argv
            }
            Self::Publish(req) => {
                let mut argv = vec![toolchain.npm.clone(), "publish".into()];
                if req.dry_run {
                    argv.push("--dry-run".into());
                }
                if req.is_public {
                    argv.extend(["--access".into(), "public".into()]);
                }
                if req.tag != "latest" {
                    argv.extend(["--tag".into(), req.tag.clone()]);
                }
                if is_registry_url(&req.registry) {
                    argv.extend(["--registry".into(), req.registry.clone()]);
                }
                argv
            }
            Self::Optimize(req) => {
                let mut argv = toolchain.cli("optimize");
                argv.extend([
                    req.package_path.clone(),
                    "--type".into(),
                    req.optimization_type.to_string(),
                    "--level".into(),
                    req.aggressiveness.to_string(),
                    "--json".into(),
                ]);
                argv
            }
            Self::TemplateList => {
                let mut argv = toolchain.cli("template");
                argv.extend(["--list".into(), "--json".into()]);
                argv
            }
            Self::TemplateGenerate {
                template_id,
                config_file,
                output_dir,
            } => {
                let mut argv = toolchain.cli("template");
                argv.extend([
                    "--generate".into(),
                    template_id.to_string(),
                    "--config".into(),
                    config_file.display().to_string(),
                    "--output".into(),
                    output_dir.to_string(),
                ]);
                argv
            }
            Self::UltraThink(req) => {
                let mut argv = toolchain.cli("ultrathink");
                argv.extend([
                    "--idea".into(),
                    req.idea.clone(),
                    "--creativity".into(),
                    req.creativity.to_string(),
                    "--depth".into(),
                    req.depth.to_string(),
                    "--json".into(),
                ]);
                if let Some(context) = &req.context {
                    argv.extend(["--context".into(), context.clone()]);
                }
                argv
            }
            Self::NodeVersion => vec![toolchain.node.clone(), "--version".into()],
            Self::NpmVersion => vec![toolchain.npm.clone(), "--version".into()],
        }
    }

    /// Directory the command must run in, if any.
    pub fn working_dir(&self) -> Option<&Path> {
        match self {
            Self::Publish(req) => Some(Path::new(&req.package_path)),
            _ => None,
        }
    }
}

/// The default `npm` registry name maps to no flag; explicit URLs are passed through.
fn is_registry_url(registry: &str) -> bool {
    registry.starts_with("https://") || registry.starts_with("http://")
}
