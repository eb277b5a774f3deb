//! Manifest rendering and atomic file output
//!
//! The manifest is rendered fully in memory before anything touches disk, so
//! a failed run never leaves a partial file behind.

use serde::Deserialize;
use std::ffi::OsString;
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

use crate::errors::ManifestError;
use crate::types::Manifest;

/// Wire format of the emitted manifest
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestFormat {
    #[default]
    Yaml,
    Json,
}

impl ManifestFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ManifestFormat::Yaml => "yaml",
            ManifestFormat::Json => "json",
        }
    }
}

impl FromStr for ManifestFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Ok(ManifestFormat::Yaml),
            "json" => Ok(ManifestFormat::Json),
            other => Err(format!("unknown manifest format '{}' (expected yaml or json)", other)),
        }
    }
}

impl fmt::Display for ManifestFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Render the manifest in the requested format
pub fn render(manifest: &Manifest, format: ManifestFormat) -> Result<String, ManifestError> {
    let mut content = match format {
        ManifestFormat::Yaml => serde_yaml::to_string(manifest)?,
        ManifestFormat::Json => serde_json::to_string_pretty(manifest)?,
    };
    if !content.ends_with('\n') {
        content.push('\n');
    }
    Ok(content)
}

/// Write the manifest with an atomic rename
///
/// The rendered text goes to `<output>.tmp` first and is renamed over the
/// destination once flushed.
pub fn write_to_path(
    manifest: &Manifest,
    output_path: &Path,
    format: ManifestFormat,
) -> Result<(), ManifestError> {
    debug!("Writing manifest to {:?}", output_path);
    let content = render(manifest, format)?;

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let temp_path = temp_path_for(output_path);
    if let Err(e) = write_and_rename(&temp_path, output_path, &content) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e.into());
    }

    info!(
        "Manifest written to {:?} ({} endpoints)",
        output_path,
        manifest.endpoints.len()
    );
    Ok(())
}

fn write_and_rename(temp_path: &Path, output_path: &Path, content: &str) -> io::Result<()> {
    let file = std::fs::File::create(temp_path)?;
    let mut writer = io::BufWriter::with_capacity(64 * 1024, file);
    writer.write_all(content.as_bytes())?;
    writer.flush()?;
    drop(writer);
    std::fs::rename(temp_path, output_path)
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use crate::manifest::ManifestBuilder;
    use crate::manifest_writer::*;
    use crate::types::{
        Endpoint, EventTrigger, OptionValue, Param, ParamKind, SourceLocation, Trigger,
    };
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn sample_manifest() -> Manifest {
        let mut builder = ManifestBuilder::new();
        builder.add_param(Param {
            name: "IS_PRODUCTION".to_string(),
            kind: ParamKind::Boolean,
            default: Some(OptionValue::bool(false)),
            label: None,
            description: None,
            location: SourceLocation::default(),
        });
        let mut endpoint = Endpoint::new(
            "onMessagePublished_my_topic",
            "relay",
            SourceLocation::new("main.py", 4, 1),
            Trigger::Event(EventTrigger {
                event_type: "google.cloud.pubsub.topic.v1.messagePublished".to_string(),
                event_filters: BTreeMap::from([("topic".to_string(), "my-topic".to_string())]),
                event_filter_path_patterns: BTreeMap::new(),
                channel: None,
                retry: Some(OptionValue::bool(false)),
            }),
        );
        endpoint.region = Some(OptionValue::Literal(crate::types::Literal::List(vec![
            crate::types::Literal::Str("us-central1".to_string()),
        ])));
        endpoint.min_instances = Some(OptionValue::ParamRef("IS_PRODUCTION".to_string()));
        assert!(builder.add_endpoint(endpoint).is_ok());
        builder.build()
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("yaml".parse::<ManifestFormat>(), Ok(ManifestFormat::Yaml));
        assert_eq!("JSON".parse::<ManifestFormat>(), Ok(ManifestFormat::Json));
        assert!("toml".parse::<ManifestFormat>().is_err());
    }

    #[test]
    fn test_render_json_shape() -> Result<(), ManifestError> {
        let content = render(&sample_manifest(), ManifestFormat::Json)?;
        let value: serde_json::Value = serde_json::from_str(&content)?;
        assert_eq!(value["specVersion"], "v1alpha1");
        assert_eq!(value["params"][0]["type"], "boolean");
        assert_eq!(value["params"][0]["default"], false);
        assert_eq!(
            value["requiredAPIs"][0]["api"],
            "cloudfunctions.googleapis.com"
        );
        let endpoint = &value["endpoints"]["onMessagePublished_my_topic"];
        assert_eq!(endpoint["entryPoint"], "relay");
        assert_eq!(endpoint["region"][0], "us-central1");
        assert_eq!(endpoint["minInstances"], "{{ params.IS_PRODUCTION }}");
        assert_eq!(endpoint["eventTrigger"]["retry"], false);
        assert_eq!(endpoint["eventTrigger"]["eventFilters"]["topic"], "my-topic");
        assert!(endpoint["eventTrigger"].get("eventFilterPathPatterns").is_none());
        Ok(())
    }

    #[test]
    fn test_render_yaml_is_stable() -> Result<(), ManifestError> {
        let first = render(&sample_manifest(), ManifestFormat::Yaml)?;
        let second = render(&sample_manifest(), ManifestFormat::Yaml)?;
        assert_eq!(first, second);
        assert!(first.starts_with("specVersion: v1alpha1\n"));
        assert!(first.contains("onMessagePublished_my_topic:"));
        assert!(!first.contains("null"));
        Ok(())
    }

    #[test]
    fn test_write_to_path_is_atomic() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let output = temp_dir.path().join("out").join("functions.yaml");

        assert!(write_to_path(&sample_manifest(), &output, ManifestFormat::Yaml).is_ok());
        assert!(output.exists());
        assert!(!temp_dir.path().join("out").join("functions.yaml.tmp").exists());

        let Ok(written) = std::fs::read_to_string(&output) else {
            return;
        };
        let Ok(rendered) = render(&sample_manifest(), ManifestFormat::Yaml) else {
            return;
        };
        assert_eq!(written, rendered);
    }

    #[test]
    fn test_failed_write_removes_temp_file() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        // A non-empty directory at the destination makes the rename fail
        let output = temp_dir.path().join("functions.yaml");
        assert!(std::fs::create_dir_all(output.join("nested")).is_ok());

        let result = write_to_path(&sample_manifest(), &output, ManifestFormat::Yaml);
        assert!(matches!(result, Err(ManifestError::Io(_))));
        assert!(!temp_dir.path().join("functions.yaml.tmp").exists());
        assert!(output.is_dir());
    }
}
