//! # Pid file.
//!
//! Written once at supervisor startup: the supervisor's own pid as plain
//! text. Removed again when the guard drops at the end of a clean run, so
//! stale files only survive hard crashes.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Guard over the written pid file.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Writes the calling process's pid to `path`.
    pub fn write(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        std::fs::write(path, std::process::id().to_string()).map_err(|source| {
            ConfigError::PidFile { path: path.to_path_buf(), source }
        })?;
        Ok(Self { path: path.to_path_buf() })
    }

    /// Where the pid was written.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_own_pid_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pool.pid");

        {
            let pidfile = PidFile::write(&path).unwrap();
            let text = std::fs::read_to_string(pidfile.path()).unwrap();
            assert_eq!(text, std::process::id().to_string());
        }
        // guard dropped, file gone
        assert!(!path.exists());
    }

    #[test]
    fn test_unwritable_path_is_a_config_error() {
        let err = PidFile::write("/definitely/not/a/dir/pool.pid").unwrap_err();
        assert_eq!(err.as_label(), "config_pid_file");
    }
}
