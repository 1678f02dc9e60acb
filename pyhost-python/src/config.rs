//! Interpreter configuration types

use pyhost::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Options applied when the interpreter is initialized
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Directories prepended to `sys.path`
    pub python_paths: Vec<String>,
    /// Route `sys.stdout`/`sys.stderr` to the host console on startup
    pub redirect_output: bool,
}

impl InterpreterConfig {
    /// Load configuration from a JSON file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("invalid config {}: {}", path.display(), e)))
    }

    /// Append extra `sys.path` entries, keeping the order given.
    pub fn with_python_paths(mut self, paths: impl IntoIterator<Item = String>) -> Self {
        for path in paths {
            if !self.python_paths.contains(&path) {
                self.python_paths.push(path);
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"python_paths": ["/opt/lib"]}}"#).unwrap();

        let config = InterpreterConfig::from_file(file.path()).unwrap();
        assert_eq!(config.python_paths, vec!["/opt/lib".to_string()]);
        assert!(!config.redirect_output);
    }

    #[test]
    fn test_from_file_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = InterpreterConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_from_file_missing() {
        let err = InterpreterConfig::from_file("/nonexistent/pyhost.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/pyhost.json"));
    }

    #[test]
    fn test_with_python_paths_dedups() {
        let config = InterpreterConfig {
            python_paths: vec!["a".to_string()],
            redirect_output: true,
        }
        .with_python_paths(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(config.python_paths, vec!["a".to_string(), "b".to_string()]);
    }
}
