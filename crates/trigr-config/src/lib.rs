//! Optional `trigr.toml` configuration
//!
//! Values here sit between command-line flags and built-in defaults: a flag
//! always wins, and a missing key falls back to the default.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use trigr_manifest::ManifestFormat;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "TRIGR_CONFIG";
pub const CONFIG_FILE_NAME: &str = "trigr.toml";
/// Manifest file name, without extension, written into the source root
pub const DEFAULT_OUTPUT_STEM: &str = "functions";

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Manifest output path, relative to the source root when not absolute
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub format: Option<ManifestFormat>,
    /// Directory names skipped while scanning; replaces the built-in list
    #[serde(default)]
    pub exclude: Option<Vec<String>>,
    /// Append-only log file; `~/` expands to the home directory
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// Config file location for a source root
    pub fn path(source: &Path) -> PathBuf {
        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let trimmed = env_path.trim();
            if !trimmed.is_empty() {
                return PathBuf::from(trimmed);
            }
        }
        source.join(CONFIG_FILE_NAME)
    }

    /// Load the config for `source`; a missing file yields the defaults
    pub fn load(source: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let path = Self::path(source);
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Config::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        let config = toml::from_str(&content)
            .map_err(|e| format!("Invalid config {}: {}", path.display(), e))?;
        Ok(config)
    }

    /// Format from the flag, then the config, then YAML
    pub fn resolve_format(&self, flag: Option<ManifestFormat>) -> ManifestFormat {
        flag.or(self.format).unwrap_or_default()
    }

    /// Output path from the flag, then the config, then `<source>/functions.<ext>`
    pub fn resolve_output(
        &self,
        source: &Path,
        flag: Option<&Path>,
        format: ManifestFormat,
    ) -> PathBuf {
        if let Some(flag) = flag {
            return flag.to_path_buf();
        }
        match &self.output {
            Some(output) if output.is_absolute() => output.clone(),
            Some(output) => source.join(output),
            None => source.join(format!("{}.{}", DEFAULT_OUTPUT_STEM, format.extension())),
        }
    }

    /// Excluded directory names, or `defaults` when not configured
    pub fn resolve_exclude(&self, defaults: &[&str]) -> Vec<String> {
        self.exclude
            .clone()
            .unwrap_or_else(|| defaults.iter().map(|s| (*s).to_string()).collect())
    }

    /// Log file with a leading `~/` expanded
    pub fn log_file(&self) -> Option<PathBuf> {
        let path = self.log_file.as_ref()?;
        match path.strip_prefix("~") {
            Ok(rest) => dirs::home_dir().map(|home| home.join(rest)),
            Err(_) => Some(path.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_file() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        let content = r#"
output = "build/manifest.json"
format = "json"
exclude = ["tests", ".venv"]
log_file = "logs/trigr.log"
"#;
        if fs::write(&path, content).is_err() {
            return;
        }

        let Ok(config) = Config::load_from(&path) else {
            panic!("config should parse");
        };
        assert_eq!(config.format, Some(ManifestFormat::Json));
        assert_eq!(config.resolve_format(None), ManifestFormat::Json);
        assert_eq!(
            config.resolve_output(temp_dir.path(), None, ManifestFormat::Json),
            temp_dir.path().join("build/manifest.json")
        );
        assert_eq!(config.resolve_exclude(&[".git"]), vec!["tests", ".venv"]);
        assert_eq!(config.log_file(), Some(PathBuf::from("logs/trigr.log")));
    }

    #[test]
    fn test_defaults_and_flag_precedence() {
        let config = Config::default();
        let source = Path::new("/srv/app");
        assert_eq!(config.resolve_format(None), ManifestFormat::Yaml);
        assert_eq!(
            config.resolve_output(source, None, ManifestFormat::Yaml),
            source.join("functions.yaml")
        );
        assert_eq!(
            config.resolve_output(source, Some(Path::new("out.json")), ManifestFormat::Json),
            PathBuf::from("out.json")
        );
        assert_eq!(
            config.resolve_exclude(&[".git", "venv"]),
            vec![".git".to_string(), "venv".to_string()]
        );
        assert_eq!(config.log_file(), None);

        let config = Config {
            format: Some(ManifestFormat::Json),
            ..Config::default()
        };
        assert_eq!(config.resolve_format(Some(ManifestFormat::Yaml)), ManifestFormat::Yaml);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        if fs::write(&path, "outptu = \"x.yaml\"\n").is_err() {
            return;
        }
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_home_expansion() {
        let config = Config {
            log_file: Some(PathBuf::from("~/logs/trigr.log")),
            ..Config::default()
        };
        if let Some(home) = dirs::home_dir() {
            assert_eq!(config.log_file(), Some(home.join("logs/trigr.log")));
        }
    }
}
