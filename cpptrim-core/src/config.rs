//! Configuration loading from cpptrim.toml.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{fs, path::Path};

/// Main configuration structure for cpptrim.toml.
#[derive(Debug, Deserialize, Default)]
pub struct CpptrimConfig {
    /// Macro names whose inactive conditional blocks must be preserved.
    pub keep_macros: Option<Vec<String>>,
    /// Extra compile-driver tokens (include paths, -std=, defines).
    pub compile_flags: Option<Vec<String>>,
    /// Output configuration.
    pub output: Option<OutputConfig>,
}

/// Output format configuration.
#[derive(Debug, Deserialize, Default)]
pub struct OutputConfig {
    /// Report format: "plain" or "json".
    pub format: Option<String>,
}

/// Loads configuration from cpptrim.toml in the given directory, if it exists.
pub fn load_config(root: &Path) -> Result<Option<CpptrimConfig>> {
    let path = root.join("cpptrim.toml");
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(&path)?;
    let cfg = toml::from_str(&content).context("Invalid cpptrim.toml")?;
    Ok(Some(cfg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_load_config_missing_file() {
        let dir = std::env::temp_dir().join(format!("cpptrim_config_test_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let result = load_config(&dir);
        assert!(result.is_ok());
        assert!(result.unwrap().is_none());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_config_with_macros() {
        let dir = std::env::temp_dir().join(format!("cpptrim_config_macros_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("cpptrim.toml"),
            r#"
keep_macros = ["ONLINE_JUDGE", "LOCAL"]
compile_flags = ["-std=c++17", "-DONLINE_JUDGE"]
"#,
        )
        .unwrap();

        let cfg = load_config(&dir).unwrap().unwrap();
        let macros = cfg.keep_macros.unwrap();
        assert_eq!(macros.len(), 2);
        assert!(macros.contains(&"ONLINE_JUDGE".to_string()));
        assert_eq!(cfg.compile_flags.unwrap().len(), 2);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_config_with_output() {
        let dir = std::env::temp_dir().join(format!("cpptrim_config_output_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("cpptrim.toml"),
            r#"
[output]
format = "json"
"#,
        )
        .unwrap();

        let cfg = load_config(&dir).unwrap().unwrap();
        assert_eq!(cfg.output.unwrap().format, Some("json".to_string()));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let dir = std::env::temp_dir().join(format!("cpptrim_config_invalid_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("cpptrim.toml"), "this is not valid toml {{{").unwrap();

        let result = load_config(&dir);
        assert!(result.is_err());

        fs::remove_dir_all(&dir).ok();
    }
}
