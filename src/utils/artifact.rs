//! Artifact path resolution with glob pattern support.

use std::path::PathBuf;

use crate::error::{Error, Result};

/// Expand an artifact pattern to the full list of matching files.
///
/// - A path without glob chars (`*`, `?`, `[`, `]`) is returned as-is after
///   an existence check
/// - A glob returns every matching file, sorted for deterministic uploads
/// - Zero matches is an error: deploying with nothing to upload is always
///   a configuration or build problem
pub fn resolve_artifact_paths(pattern: &str) -> Result<Vec<PathBuf>> {
    let expanded = shellexpand::tilde(pattern).to_string();

    if !contains_glob_chars(&expanded) {
        let path = PathBuf::from(&expanded);
        if path.is_file() {
            return Ok(vec![path]);
        }
        return Err(Error::deploy_artifact_missing(pattern));
    }

    let mut entries: Vec<PathBuf> = glob::glob(&expanded)
        .map_err(|e| {
            Error::validation_invalid_argument(
                "artifact",
                format!("Invalid glob pattern '{}': {}", pattern, e),
                Some(pattern.to_string()),
            )
        })?
        .filter_map(|entry| entry.ok())
        .filter(|p| p.is_file())
        .collect();

    if entries.is_empty() {
        return Err(Error::deploy_artifact_missing(pattern));
    }

    entries.sort();
    log_status!(
        "deploy",
        "Resolved '{}' -> {} file(s)",
        pattern,
        entries.len()
    );
    Ok(entries)
}

/// Best-effort listing of existing matches, used to clean stale artifacts
/// before a build. Errors are treated as "nothing to clean".
pub fn existing_matches(pattern: &str) -> Vec<PathBuf> {
    let expanded = shellexpand::tilde(pattern).to_string();

    if !contains_glob_chars(&expanded) {
        let path = PathBuf::from(&expanded);
        return if path.is_file() { vec![path] } else { Vec::new() };
    }

    glob::glob(&expanded)
        .map(|paths| {
            paths
                .filter_map(|entry| entry.ok())
                .filter(|p| p.is_file())
                .collect()
        })
        .unwrap_or_default()
}

fn contains_glob_chars(s: &str) -> bool {
    s.contains('*') || s.contains('?') || s.contains('[') || s.contains(']')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::fs::File;
    use tempfile::TempDir;

    #[test]
    fn literal_path_resolves_to_single_file() {
        let dir = TempDir::new().unwrap();
        let file_path = dir.path().join("pkg_1.0_all.deb");
        File::create(&file_path).unwrap();

        let result = resolve_artifact_paths(file_path.to_str().unwrap()).unwrap();
        assert_eq!(result, vec![file_path]);
    }

    #[test]
    fn literal_path_missing_is_artifact_missing() {
        let err = resolve_artifact_paths("/nonexistent/pkg.deb").unwrap_err();
        assert_eq!(err.code, ErrorCode::DeployArtifactMissing);
    }

    #[test]
    fn glob_returns_all_matches_sorted() {
        let dir = TempDir::new().unwrap();
        let second = dir.path().join("pkg_1.1_all.deb");
        let first = dir.path().join("pkg_1.0_all.deb");
        File::create(&second).unwrap();
        File::create(&first).unwrap();

        let pattern = dir.path().join("pkg_*all.deb");
        let result = resolve_artifact_paths(pattern.to_str().unwrap()).unwrap();
        assert_eq!(result, vec![first, second]);
    }

    #[test]
    fn glob_with_no_matches_is_artifact_missing() {
        let dir = TempDir::new().unwrap();
        let pattern = dir.path().join("nothing_*.deb");
        let err = resolve_artifact_paths(pattern.to_str().unwrap()).unwrap_err();
        assert_eq!(err.code, ErrorCode::DeployArtifactMissing);
    }

    #[test]
    fn glob_ignores_directories() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("pkg_dir.deb")).unwrap();

        let pattern = dir.path().join("pkg_*.deb");
        assert!(resolve_artifact_paths(pattern.to_str().unwrap()).is_err());
    }

    #[test]
    fn existing_matches_is_empty_for_no_files() {
        let dir = TempDir::new().unwrap();
        let pattern = dir.path().join("none_*.deb");
        assert!(existing_matches(pattern.to_str().unwrap()).is_empty());
    }

    #[test]
    fn contains_glob_chars_detection() {
        assert!(contains_glob_chars("dist/*.deb"));
        assert!(contains_glob_chars("pkg_?.deb"));
        assert!(!contains_glob_chars("dist/pkg.deb"));
    }
}
