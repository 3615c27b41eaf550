//! Package directory helpers: listing generated files and writing
//! collaborator-produced ones without escaping the package root.

use std::path::{Component, Path, PathBuf};

use forge_core::outcome::SourceFile;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("path '{0}' is empty")]
    Empty(String),
    #[error("path '{0}' must be relative")]
    Absolute(String),
    #[error("path '{0}' escapes the package directory")]
    Escapes(String),
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Relative paths of every regular file under `root`, sorted. Missing root yields nothing.
pub fn collect_files(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            entry
                .path()
                .strip_prefix(root)
                .ok()
                .map(|rel| rel.to_string_lossy().replace('\\', "/"))
        })
        .collect();
    files.sort();
    files
}

/// Join `relative` onto `root`, refusing absolute paths and `..` segments.
pub fn resolve_within(root: &Path, relative: &str) -> Result<PathBuf, FileError> {
    if relative.trim().is_empty() {
        return Err(FileError::Empty(relative.to_string()));
    }
    let rel = Path::new(relative);
    let mut resolved = root.to_path_buf();
    for component in rel.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir => return Err(FileError::Escapes(relative.to_string())),
            Component::RootDir | Component::Prefix(_) => {
                return Err(FileError::Absolute(relative.to_string()))
            }
        }
    }
    if resolved == root {
        return Err(FileError::Empty(relative.to_string()));
    }
    Ok(resolved)
}

/// Write `files` under `root`, creating parent directories. Returns the written relative paths.
pub async fn write_files(root: &Path, files: &[SourceFile]) -> Result<Vec<String>, FileError> {
    let mut written = Vec::with_capacity(files.len());
    for file in files {
        let target = resolve_within(root, &file.path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| FileError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(&target, &file.content)
            .await
            .map_err(|source| FileError::Io {
                path: target.clone(),
                source,
            })?;
        written.push(file.path.clone());
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_rejects_escapes() {
        let root = Path::new("/work/pkg");
        assert_eq!(
            resolve_within(root, "src/index.ts").unwrap(),
            PathBuf::from("/work/pkg/src/index.ts")
        );
        assert_eq!(
            resolve_within(root, "./README.md").unwrap(),
            PathBuf::from("/work/pkg/README.md")
        );
        assert!(matches!(resolve_within(root, "../etc/passwd"), Err(FileError::Escapes(_))));
        assert!(matches!(resolve_within(root, "src/../../x"), Err(FileError::Escapes(_))));
        assert!(matches!(resolve_within(root, "/etc/passwd"), Err(FileError::Absolute(_))));
        assert!(matches!(resolve_within(root, "."), Err(FileError::Empty(_))));
        assert!(matches!(resolve_within(root, " "), Err(FileError::Empty(_))));
    }

    #[test]
    fn collect_missing_root_is_empty() {
        assert!(collect_files(Path::new("/nonexistent/forge/root")).is_empty());
    }

    #[tokio::test]
    async fn write_then_collect() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![
            SourceFile {
                path: "src/index.ts".into(),
                content: "export {};\n".into(),
            },
            SourceFile {
                path: "README.md".into(),
                content: "# demo\n".into(),
            },
        ];
        let written = write_files(dir.path(), &files).await.unwrap();
        assert_eq!(written, ["src/index.ts", "README.md"]);
        assert_eq!(collect_files(dir.path()), ["README.md", "src/index.ts"]);
        let body = std::fs::read_to_string(dir.path().join("src/index.ts")).unwrap();
        assert_eq!(body, "export {};\n");
    }

    #[tokio::test]
    async fn write_stops_at_first_unsafe_path() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![SourceFile {
            path: "../outside.txt".into(),
            content: "x".into(),
        }];
        assert!(write_files(dir.path(), &files).await.is_err());
        assert!(collect_files(dir.path()).is_empty());
    }
}
