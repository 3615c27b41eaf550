use std::path::PathBuf;
use std::time::Duration;

use forge_exec::Toolchain;

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub toolchain: Toolchain,
    /// Generation output lands in a fresh directory here unless the request names one.
    pub work_root: PathBuf,

    pub exec_timeout_seconds: u64,
    pub max_concurrent_tasks: usize,

    pub collaborator_url: Option<String>,
    pub collaborator_key: Option<String>,
    pub collaborator_timeout_seconds: u64,

    /// Terminal tasks older than this are evicted by cleanup.
    pub retention_seconds: u64,
    pub cache_results: bool,
    pub result_ttl_seconds: u64,

    pub gc_enabled: bool,
    pub gc_interval_seconds: u64,

    /// Accepted bearer tokens. Empty accepts any non-empty token.
    pub api_tokens: Vec<String>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            toolchain: Toolchain::default(),
            work_root: std::env::temp_dir().join("forge"),
            exec_timeout_seconds: 600,
            max_concurrent_tasks: 4,
            collaborator_url: None,
            collaborator_key: None,
            collaborator_timeout_seconds: 120,
            retention_seconds: 3600,
            cache_results: true,
            result_ttl_seconds: 3600,
            gc_enabled: true,
            gc_interval_seconds: 300,
            api_tokens: Vec::new(),
        }
    }
}

impl DaemonConfig {
    pub fn exec_timeout(&self) -> Duration {
        Duration::from_secs(self.exec_timeout_seconds)
    }

    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_secs(self.collaborator_timeout_seconds)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_seconds)
    }

    pub fn result_ttl(&self) -> Duration {
        Duration::from_secs(self.result_ttl_seconds)
    }
}
