#![forbid(unsafe_code)]

//! Forge daemon binary.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use forge_daemon::{auth::TokenAuthenticator, build_orchestrator, config::DaemonConfig, gc, http};
use forge_exec::Toolchain;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "forge-daemon", version, about = "Package generation task daemon")]
struct Args {
    /// Where the HTTP API will listen, e.g. 127.0.0.1:8000
    #[arg(long, default_value = "127.0.0.1:8000")]
    listen: SocketAddr,

    /// Interpreter used to run the generator CLI.
    #[arg(long, default_value = "node")]
    node_bin: String,

    /// Generator CLI script.
    #[arg(long, default_value = "dist/cli/index.js")]
    cli_script: PathBuf,

    /// Registry tool used for publishing.
    #[arg(long, default_value = "npm")]
    npm_bin: String,

    /// Root for generated packages when a request names no output directory.
    #[arg(long, default_value = ".forge/work")]
    work_root: PathBuf,

    /// Kill an external command after this many seconds.
    #[arg(long, default_value_t = 600)]
    exec_timeout_seconds: u64,

    /// Tasks allowed to run at once; the rest stay pending.
    #[arg(long, default_value_t = 4)]
    max_concurrent_tasks: usize,

    /// Base URL of the AI collaborator. AI phases are skipped when unset.
    #[arg(long, env = "FORGE_COLLABORATOR_URL")]
    collaborator_url: Option<String>,

    /// Bearer key sent to the AI collaborator.
    #[arg(long, env = "FORGE_COLLABORATOR_KEY", hide_env_values = true)]
    collaborator_key: Option<String>,

    #[arg(long, default_value_t = 120)]
    collaborator_timeout_seconds: u64,

    /// Finished tasks older than this are evicted by cleanup.
    #[arg(long, default_value_t = 3600)]
    retention_seconds: u64,

    /// Disable mirroring finished tasks into the result cache.
    #[arg(long, default_value_t = false)]
    no_result_cache: bool,

    #[arg(long, default_value_t = 3600)]
    result_ttl_seconds: u64,

    /// Disable the periodic cleanup loop.
    #[arg(long, default_value_t = false)]
    no_gc: bool,

    #[arg(long, default_value_t = 300)]
    gc_interval_seconds: u64,

    /// Accepted API bearer token; repeat for several. Any non-empty token is accepted when none are given.
    #[arg(long = "api-token", env = "FORGE_API_TOKENS", value_delimiter = ',', hide_env_values = true)]
    api_tokens: Vec<String>,

    /// Log level (env-filter syntax).
    #[arg(long, default_value = "info")]
    log: String,
}

impl Args {
    fn into_config(self) -> DaemonConfig {
        DaemonConfig {
            toolchain: Toolchain {
                node: self.node_bin,
                cli_script: self.cli_script,
                npm: self.npm_bin,
            },
            work_root: self.work_root,
            exec_timeout_seconds: self.exec_timeout_seconds,
            max_concurrent_tasks: self.max_concurrent_tasks,
            collaborator_url: self.collaborator_url,
            collaborator_key: self.collaborator_key,
            collaborator_timeout_seconds: self.collaborator_timeout_seconds,
            retention_seconds: self.retention_seconds,
            cache_results: !self.no_result_cache,
            result_ttl_seconds: self.result_ttl_seconds,
            gc_enabled: !self.no_gc,
            gc_interval_seconds: self.gc_interval_seconds,
            api_tokens: self.api_tokens,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::new(&args.log))
        .with(fmt::layer())
        .init();

    let listen = args.listen;
    let config = args.into_config();

    tokio::fs::create_dir_all(&config.work_root)
        .await
        .with_context(|| format!("create work root {}", config.work_root.display()))?;

    info!(
        cli = %config.toolchain.cli_script.display(),
        work_root = %config.work_root.display(),
        max_concurrent_tasks = config.max_concurrent_tasks,
        retention_seconds = config.retention_seconds,
        collaborator = config.collaborator_url.is_some(),
        "starting forge daemon"
    );

    let orchestrator = Arc::new(build_orchestrator(&config));
    let authenticator = Arc::new(TokenAuthenticator::new(config.api_tokens.clone()));
    let gc_enabled = config.gc_enabled;
    let state = http::AppState::new(Arc::clone(&orchestrator), authenticator, config);

    if gc_enabled {
        gc::spawn_gc(state.clone());
    }

    let app = http::router(state);
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("bind {listen}"))?;
    info!("listening on http://{}", listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    orchestrator.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    info!("shutdown requested");
}
