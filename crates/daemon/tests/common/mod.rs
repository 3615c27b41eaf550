#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use forge_core::model::{TaskFamily, TaskId, TaskRecord, TaskStatus};
use forge_daemon::orchestrator::Orchestrator;
use forge_exec::Toolchain;

/// Generator stand-in: `sh <script> <subcommand> ...`.
pub const FAKE_CLI: &str = r#"
cmd="$1"; shift
case "$cmd" in
  generate)
    name="$1"; out=""
    while [ $# -gt 0 ]; do
      if [ "$1" = "--output" ]; then out="$2"; fi
      shift
    done
    mkdir -p "$out/$name/src"
    echo 'export {};' > "$out/$name/src/index.ts"
    echo '{"name": "'"$name"'", "version": "1.0.0"}' > "$out/$name/package.json"
    echo "generated $name"
    ;;
  analyze)
    case "$1" in
      *slow*) sleep 2 ;;
    esac
    case "$1" in
      *plain*) echo "Analysis complete: 3 warnings" ;;
      *broken*) echo "cannot read package" >&2; exit 2 ;;
      *) echo '{"score": 88, "issues": []}' ;;
    esac
    ;;
  optimize)
    echo '{"improvements": ["tree-shaking"], "metrics": {"sizeBefore": 120, "sizeAfter": 80}, "recommendations": []}'
    ;;
  template)
    if [ "$1" = "--list" ]; then
      echo '[{"id": "typescript-library"}, {"id": "react-component"}]'
    else
      out=""
      while [ $# -gt 0 ]; do
        if [ "$1" = "--output" ]; then out="$2"; fi
        shift
      done
      mkdir -p "$out" && echo '# from template' > "$out/README.md"
    fi
    ;;
  ultrathink)
    echo '{"solutions": [{"title": "cli"}], "insights": ["small"], "recommendations": []}'
    ;;
  *)
    echo "unknown command $cmd" >&2; exit 64
    ;;
esac
"#;

pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// Toolchain whose generator is [`FAKE_CLI`] and whose registry tool prints its cwd.
pub fn fake_toolchain(dir: &Path) -> Toolchain {
    let cli_script = write_script(dir, "cli.sh", FAKE_CLI);
    let npm = write_script(dir, "npm.sh", "echo \"npm $*\"\npwd\n");
    Toolchain {
        node: "sh".into(),
        cli_script,
        npm: npm.display().to_string(),
    }
}

pub async fn wait_for<F>(orchestrator: &Orchestrator, family: TaskFamily, id: &TaskId, done: F) -> TaskRecord
where
    F: Fn(&TaskRecord) -> bool,
{
    for _ in 0..500 {
        if let Ok(record) = orchestrator.status(family, id) {
            if done(&record) {
                return record;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("task {id} did not reach the expected state in time");
}

pub async fn wait_terminal(orchestrator: &Orchestrator, family: TaskFamily, id: &TaskId) -> TaskRecord {
    wait_for(orchestrator, family, id, |r| r.is_terminal()).await
}

pub async fn wait_running(orchestrator: &Orchestrator, family: TaskFamily, id: &TaskId) -> TaskRecord {
    wait_for(orchestrator, family, id, |r| r.status == TaskStatus::Running).await
}

/// The cache is written just after the terminal record is stored.
pub async fn wait_cached(orchestrator: &Orchestrator, entries: usize) {
    for _ in 0..500 {
        if orchestrator.cache().len() >= entries {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("result cache never reached {entries} entries");
}
