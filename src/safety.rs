//! Root confinement for patch targets.
//!
//! Plan files name their target with a path that may be relative; the CLI
//! resolves it against a root directory and refuses anything that escapes
//! it. The engine itself stays path-agnostic and touches exactly the path
//! it is handed.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Prevents a plan from editing files outside the resolved root.
#[derive(Debug, Clone)]
pub struct PathGuard {
    /// Absolute, canonicalized root
    root: PathBuf,
    /// Canonical paths to forbidden directories
    forbidden_paths: Vec<PathBuf>,
}

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("path is outside root: {path} (root: {root})")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error("path is in forbidden directory: {path} (forbidden: {forbidden})")]
    ForbiddenPath { path: PathBuf, forbidden: PathBuf },

    #[error("failed to canonicalize path: {0}")]
    Canonicalize(#[from] std::io::Error),
}

impl PathGuard {
    /// Create a guard rooted at the given directory.
    ///
    /// The root is canonicalized so symlinked roots behave correctly.
    /// Version-control metadata under the root is off-limits: rewriting
    /// files inside `.git` corrupts the repository.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, SafetyError> {
        let root = root.as_ref().canonicalize()?;

        let mut forbidden_paths = Vec::new();
        if let Ok(git_dir) = root.join(".git").canonicalize() {
            forbidden_paths.push(git_dir);
        }

        Ok(Self {
            root,
            forbidden_paths,
        })
    }

    /// Check that a path is safe to patch.
    ///
    /// Relative paths resolve against the root. Returns the canonicalized
    /// absolute path if it stays inside the root and outside forbidden
    /// directories.
    pub fn validate_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let path = path.as_ref();

        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };

        // resolves symlinks and .. components
        let canonical = absolute.canonicalize()?;

        if !canonical.starts_with(&self.root) {
            return Err(SafetyError::OutsideRoot {
                path: canonical,
                root: self.root.clone(),
            });
        }

        for forbidden in &self.forbidden_paths {
            if canonical.starts_with(forbidden) {
                return Err(SafetyError::ForbiddenPath {
                    path: canonical,
                    forbidden: forbidden.clone(),
                });
            }
        }

        Ok(canonical)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_validate_path_inside_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        let guard = PathGuard::new(root).unwrap();

        let file = root.join("templates/view.kt");
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, b"").unwrap();

        assert!(guard.validate_path(&file).is_ok());
    }

    #[test]
    fn test_validate_path_outside_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("root");
        fs::create_dir_all(&root).unwrap();
        let guard = PathGuard::new(&root).unwrap();

        let outside = temp_dir.path().join("outside.kt");
        fs::write(&outside, b"").unwrap();

        let result = guard.validate_path(&outside);
        assert!(matches!(result, Err(SafetyError::OutsideRoot { .. })));
    }

    #[test]
    fn test_validate_path_rejects_git_metadata() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        let git_file = root.join(".git/config");
        fs::create_dir_all(git_file.parent().unwrap()).unwrap();
        fs::write(&git_file, b"").unwrap();

        let guard = PathGuard::new(root).unwrap();
        let result = guard.validate_path(&git_file);
        assert!(matches!(result, Err(SafetyError::ForbiddenPath { .. })));
    }

    #[test]
    fn test_validate_relative_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        let guard = PathGuard::new(root).unwrap();

        fs::write(root.join("view.kt"), b"").unwrap();
        assert!(guard.validate_path("view.kt").is_ok());
    }

    #[test]
    #[cfg(unix)]
    fn test_validate_symlink_escape() {
        use std::os::unix::fs::symlink;

        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("root");
        fs::create_dir_all(&root).unwrap();

        let outside = temp_dir.path().join("outside.kt");
        fs::write(&outside, b"").unwrap();

        let link = root.join("escape.kt");
        symlink(&outside, &link).unwrap();

        let guard = PathGuard::new(&root).unwrap();
        let result = guard.validate_path(&link);
        assert!(matches!(result, Err(SafetyError::OutsideRoot { .. })));
    }
}
