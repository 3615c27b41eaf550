#![forbid(unsafe_code)]

//! Forge daemon: accepts package generation, analysis and publish requests,
//! runs them in the background through the external generator, and serves
//! their status over HTTP.

pub mod auth;
pub mod cache;
pub mod collaborator;
pub mod config;
pub mod gc;
pub mod http;
pub mod jobs;
pub mod ops;
pub mod orchestrator;
pub mod store;

use std::sync::Arc;

use collaborator::{Collaborator, HttpCollaborator};
use config::DaemonConfig;
use forge_exec::SubprocessRunner;
use jobs::JobContext;
use orchestrator::{Orchestrator, OrchestratorSettings};

/// Orchestrator wired from configuration.
pub fn build_orchestrator(config: &DaemonConfig) -> Orchestrator {
    let collaborator = config.collaborator_url.as_ref().map(|url| {
        Arc::new(HttpCollaborator::new(url.clone(), config.collaborator_key.clone())) as Arc<dyn Collaborator>
    });
    let ctx = JobContext {
        runner: SubprocessRunner::new().with_timeout(config.exec_timeout()),
        toolchain: config.toolchain.clone(),
        collaborator,
        collaborator_timeout: config.collaborator_timeout(),
    };
    let settings = OrchestratorSettings {
        max_concurrent_tasks: config.max_concurrent_tasks,
        retention: config.retention(),
        cache_results: config.cache_results,
        result_ttl: config.result_ttl(),
    };
    Orchestrator::new(ctx, settings)
}
