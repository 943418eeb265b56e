//! Configuration loading and parsing

use anyhow::{bail, Context, Result};
use can_mcap_decoder::{Compression, WriterConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InputConfig {
    pub dbc_file: Option<PathBuf>,
    pub capture_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    pub mcap_file: Option<PathBuf>,
    #[serde(flatten)]
    pub writer: WriterConfig,
}

/// Values given on the command line; each one replaces its file setting
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub dbc_file: Option<PathBuf>,
    pub capture_file: Option<PathBuf>,
    pub mcap_file: Option<PathBuf>,
    pub topic_prefix: Option<String>,
    pub compression: Option<Compression>,
    pub chunk_size: Option<u64>,
}

/// Everything a conversion needs, with defaults filled in
#[derive(Debug, Clone)]
pub struct ConvertPlan {
    pub dbc_file: PathBuf,
    pub capture_file: PathBuf,
    pub mcap_file: PathBuf,
    pub writer: WriterConfig,
}

impl AppConfig {
    pub fn apply(&mut self, overrides: Overrides) {
        if overrides.dbc_file.is_some() {
            self.input.dbc_file = overrides.dbc_file;
        }
        if overrides.capture_file.is_some() {
            self.input.capture_file = overrides.capture_file;
        }
        if overrides.mcap_file.is_some() {
            self.output.mcap_file = overrides.mcap_file;
        }
        if let Some(prefix) = overrides.topic_prefix {
            self.output.writer.topic_prefix = prefix;
        }
        if let Some(compression) = overrides.compression {
            self.output.writer.compression = compression;
        }
        if let Some(chunk_size) = overrides.chunk_size {
            self.output.writer.chunk_size = chunk_size;
        }
    }

    /// Check required inputs and fill in the default output path
    pub fn into_plan(self) -> Result<ConvertPlan> {
        let Some(dbc_file) = self.input.dbc_file else {
            bail!("No DBC file given (use --dbc-file or [input] dbc_file)");
        };
        let Some(capture_file) = self.input.capture_file else {
            bail!("No capture file given (use --pcapng-file or [input] capture_file)");
        };
        if self.output.writer.chunk_size == 0 {
            bail!("chunk_size must be greater than zero");
        }

        let mcap_file = self
            .output
            .mcap_file
            .unwrap_or_else(|| default_mcap_path(&capture_file));

        Ok(ConvertPlan {
            dbc_file,
            capture_file,
            mcap_file,
            writer: self.output.writer,
        })
    }
}

/// `mcap/<capture stem>.mcap`
pub fn default_mcap_path(capture_file: &Path) -> PathBuf {
    let stem = capture_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    Path::new("mcap").join(format!("{}.mcap", stem))
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let toml_content = r#"
            [input]
            dbc_file = "powertrain.dbc"
            capture_file = "drive.pcapng"

            [output]
            mcap_file = "out/drive.mcap"
            topic_prefix = "vehicle"
            compression = "lz4"
        "#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.input.dbc_file, Some(PathBuf::from("powertrain.dbc")));
        assert_eq!(config.output.mcap_file, Some(PathBuf::from("out/drive.mcap")));
        assert_eq!(config.output.writer.topic_prefix, "vehicle");
        assert_eq!(config.output.writer.compression, Compression::Lz4);
        assert_eq!(config.output.writer.chunk_size, 1024 * 1024);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert!(config.input.dbc_file.is_none());
        assert_eq!(config.output.writer, WriterConfig::default());
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let mut config: AppConfig = toml::from_str(
            r#"
            [input]
            dbc_file = "file.dbc"
            capture_file = "file.pcapng"
            [output]
            compression = "none"
        "#,
        )
        .unwrap();

        config.apply(Overrides {
            dbc_file: Some(PathBuf::from("cli.dbc")),
            compression: Some(Compression::Zstd),
            ..Overrides::default()
        });

        let plan = config.into_plan().unwrap();
        assert_eq!(plan.dbc_file, PathBuf::from("cli.dbc"));
        assert_eq!(plan.capture_file, PathBuf::from("file.pcapng"));
        assert_eq!(plan.writer.compression, Compression::Zstd);
        assert_eq!(plan.mcap_file, Path::new("mcap").join("file.mcap"));
    }

    #[test]
    fn test_missing_inputs_rejected() {
        let mut config = AppConfig::default();
        assert!(config.clone().into_plan().is_err());

        config.apply(Overrides {
            dbc_file: Some(PathBuf::from("a.dbc")),
            ..Overrides::default()
        });
        assert!(config.into_plan().is_err());
    }

    #[test]
    fn test_default_mcap_path() {
        assert_eq!(
            default_mcap_path(Path::new("/data/run-01.pcapng")),
            Path::new("mcap").join("run-01.mcap")
        );
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[input]\ndbc_file = \"x.dbc\"\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.input.dbc_file, Some(PathBuf::from("x.dbc")));
        assert!(load_config(&dir.path().join("missing.toml")).is_err());
    }
}
