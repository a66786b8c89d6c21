//! # Materializer
//!
//! Replays a snapshot's `{path: bytes}` set onto a filesystem tree, subject
//! to include/exclude glob filters built with `globset`.

use crate::error::MaterializeError;
use crate::types::{CommitMetrics, MatOpts};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::Path;
use std::time::Instant;

fn build_glob_set(patterns: &[String]) -> Result<GlobSet, MaterializeError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| MaterializeError::InvalidGlob(format!("{pattern}: {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| MaterializeError::InvalidGlob(e.to_string()))
}

#[cfg(unix)]
fn relax_dir_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755));
}

#[cfg(not(unix))]
fn relax_dir_permissions(_path: &Path) {}

#[cfg(unix)]
fn relax_file_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644));
}

#[cfg(not(unix))]
fn relax_file_permissions(_path: &Path) {}

/// Writes every `(path, bytes)` pair in `files` under `output_dir`, honoring
/// `opts`'s include/exclude globs. Paths are normalized to `/` before
/// matching and joining. All-or-nothing only at per-file granularity: a
/// failure partway through may leave partial output on disk.
pub fn materialize_files<I>(
    files: I,
    output_dir: &Path,
    opts: &MatOpts,
) -> Result<CommitMetrics, MaterializeError>
where
    I: IntoIterator<Item = (String, Vec<u8>)>,
{
    let start = Instant::now();
    let include = if opts.include.is_empty() {
        None
    } else {
        Some(build_glob_set(&opts.include)?)
    };
    let exclude = if opts.exclude.is_empty() {
        None
    } else {
        Some(build_glob_set(&opts.exclude)?)
    };

    let mut files_written: u64 = 0;
    let mut bytes_written: u64 = 0;

    for (path, bytes) in files {
        let normalized = path.replace('\\', "/");

        if let Some(inc) = &include {
            if !inc.is_match(&normalized) {
                continue;
            }
        }
        if let Some(exc) = &exclude {
            if exc.is_match(&normalized) {
                continue;
            }
        }

        let dest = output_dir.join(&normalized);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|source| MaterializeError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
            relax_dir_permissions(parent);
        }

        std::fs::write(&dest, &bytes).map_err(|source| MaterializeError::Write {
            path: dest.clone(),
            source,
        })?;
        relax_file_permissions(&dest);

        files_written += 1;
        bytes_written += bytes.len() as u64;
    }

    Ok(CommitMetrics {
        commit_latency: start.elapsed(),
        new_objects: files_written,
        new_bytes: bytes_written,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_all_files_with_empty_opts() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![
            ("src/a.go".to_string(), b"a".to_vec()),
            ("docs/readme.md".to_string(), b"# hi".to_vec()),
        ];
        let metrics = materialize_files(files, dir.path(), &MatOpts::new()).unwrap();
        assert_eq!(metrics.new_objects, 2);
        assert!(dir.path().join("src/a.go").exists());
        assert!(dir.path().join("docs/readme.md").exists());
    }

    #[test]
    fn include_filters_to_matching_subtree() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![
            ("src/a.go".to_string(), b"a".to_vec()),
            ("src/b.go".to_string(), b"b".to_vec()),
            ("docs/readme.md".to_string(), b"# hi".to_vec()),
        ];
        let opts = MatOpts::new().with_include(["src/**"]);
        let metrics = materialize_files(files, dir.path(), &opts).unwrap();
        assert_eq!(metrics.new_objects, 2);
        assert!(dir.path().join("src/a.go").exists());
        assert!(dir.path().join("src/b.go").exists());
        assert!(!dir.path().join("docs/readme.md").exists());
    }

    #[test]
    fn exclude_removes_matching_subtree() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![
            ("src/a.go".to_string(), b"a".to_vec()),
            ("docs/readme.md".to_string(), b"# hi".to_vec()),
        ];
        let opts = MatOpts::new().with_exclude(["docs/**"]);
        materialize_files(files, dir.path(), &opts).unwrap();
        assert!(dir.path().join("src/a.go").exists());
        assert!(!dir.path().join("docs/readme.md").exists());
    }

    #[test]
    fn exclude_applied_after_include_always_wins() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![
            ("src/a.go".to_string(), b"a".to_vec()),
            ("src/generated.go".to_string(), b"g".to_vec()),
        ];
        let opts = MatOpts::new()
            .with_include(["src/**"])
            .with_exclude(["**/generated.go"]);
        materialize_files(files, dir.path(), &opts).unwrap();
        assert!(dir.path().join("src/a.go").exists());
        assert!(!dir.path().join("src/generated.go").exists());
    }

    #[test]
    fn invalid_glob_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let opts = MatOpts::new().with_include(["[unterminated"]);
        assert!(materialize_files(Vec::new(), dir.path(), &opts).is_err());
    }
}
