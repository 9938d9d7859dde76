//! Persisted last-used file paths.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Result;

/// The file paths the user last ran with, persisted between sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedPaths {
    /// RS-274 interpreter binary.
    pub interpreter: Option<PathBuf>,
    /// Tool table file.
    pub tool_table: Option<PathBuf>,
    /// Setup file.
    pub setup: Option<PathBuf>,
    /// Machine-spec file.
    pub machine_spec: Option<PathBuf>,
}

impl PersistedPaths {
    /// Load persisted paths; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Save persisted paths, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let dir = std::env::temp_dir().join(format!("swarf-paths-{}", std::process::id()));
        let file = dir.join("paths.json");
        let paths = PersistedPaths {
            interpreter: Some(PathBuf::from("/usr/bin/rs274")),
            tool_table: Some(PathBuf::from("tools.tbl")),
            setup: None,
            machine_spec: None,
        };
        paths.save(&file).unwrap();
        let loaded = PersistedPaths::load(&file).unwrap();
        assert_eq!(loaded, paths);
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_missing_file_is_default() {
        let loaded = PersistedPaths::load(Path::new("/nonexistent/swarf/paths.json")).unwrap();
        assert_eq!(loaded, PersistedPaths::default());
    }
}
