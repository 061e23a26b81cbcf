//! Workload files.
//!
//! A workload is loaded once by the controller, validated, and handed to every
//! worker through the controller's `info` call. Workers never read the file
//! themselves, so the wire form (JSON) and the file form (YAML) describe the
//! same [`Workload`] value.
//!
//! ```yaml
//! system: core
//! datagen:
//!   input_path: samples/syslog.log
//!   output_path: /data/out/syslog-{worker}.log
//!   filesize_gb: 0.5
//!   num_files: 3
//!   files_to_keep: 2
//! forward:
//!   destination: directory
//!   path: /data/shipped
//! ```

use crate::{Error, GeneratorConfig, IoContext, Result};
use chrono::format::{Item, StrftimeItems};
use core::{str::FromStr, time::Duration};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Bytes per gigabyte as used by the `*_gb` workload keys.
pub const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Systems a workload may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum System {
    /// Plain file generation with a pluggable forward destination.
    Core,
}

impl System {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Core => "core",
        }
    }
}

impl FromStr for System {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "core" => Ok(Self::Core),
            _ => Err(Error::UnsupportedSystem {
                name: name.to_string(),
            }),
        }
    }
}

impl core::fmt::Display for System {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable run description shared by the controller and all workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workload {
    /// Name of the target system, see [`System`].
    pub system: String,
    /// Data generation parameters.
    #[serde(default)]
    pub datagen: DatagenParams,
    /// Where the `forward` phase ships generated files.
    #[serde(default)]
    pub forward: ForwardParams,
}

impl Workload {
    /// Reads and parses a YAML workload file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).with_path(path)?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Resolves the target system.
    pub fn target(&self) -> Result<System> {
        self.system.parse()
    }

    /// Checks everything a worker would otherwise only discover mid-run.
    pub fn validate(&self) -> Result<()> {
        self.target()?;
        self.datagen.to_generator_config()?;
        self.forward.validate()
    }
}

/// Generation parameters as written in workload files.
///
/// Sizes and rates use gigabytes, as operators think about them; they are
/// converted to bytes by [`DatagenParams::to_generator_config`]. Every key is
/// optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatagenParams {
    pub input_path: PathBuf,
    /// May contain `{worker}`, replaced by the worker id.
    pub output_path: PathBuf,
    /// Max size of each output file. 0 for unbounded.
    pub filesize_gb: f64,
    /// Max events per output file. 0 for unbounded.
    pub events: u64,
    /// Number of files to generate. 0 loops until the runtime is exhausted.
    pub num_files: u32,
    /// Max data rate. 0 for as fast as possible.
    pub datarate_gbph: f64,
    /// Max runtime of one generation call. 0 for unbounded.
    pub runtime_s: u64,
    pub overwrite: bool,
    pub timestamp_token: Option<String>,
    pub timestamp_format: String,
    pub field_token: Option<String>,
    /// Most recent files kept on disk. 0 keeps everything.
    pub files_to_keep: usize,
    /// First event number of the worker's sequence.
    pub start_event: u64,
}

impl Default for DatagenParams {
    fn default() -> Self {
        let config = GeneratorConfig::default();
        Self {
            input_path: config.input_path,
            output_path: config.output_path,
            filesize_gb: 0.0,
            events: 0,
            num_files: config.num_files,
            datarate_gbph: 0.0,
            runtime_s: 0,
            overwrite: config.overwrite,
            timestamp_token: config.timestamp_token,
            timestamp_format: config.timestamp_format,
            field_token: config.field_token,
            files_to_keep: config.files_to_keep,
            start_event: config.start_event,
        }
    }
}

impl DatagenParams {
    /// Validates the parameters and converts them into a generator
    /// configuration.
    pub fn to_generator_config(&self) -> Result<GeneratorConfig> {
        let max_file_bytes = gigabytes(self.filesize_gb, "filesize_gb")?;
        let max_bytes_per_hour = gigabytes(self.datarate_gbph, "datarate_gbph")?;
        check_timestamp_format(&self.timestamp_format)?;
        if self.num_files == 0 && self.runtime_s == 0 {
            return Err(Error::Config {
                reason: "num_files 0 requires a runtime_s budget".to_string(),
            });
        }

        Ok(GeneratorConfig {
            input_path: self.input_path.clone(),
            output_path: self.output_path.clone(),
            max_file_bytes,
            max_events: self.events,
            num_files: self.num_files,
            max_bytes_per_hour,
            max_runtime: Duration::from_secs(self.runtime_s),
            overwrite: self.overwrite,
            timestamp_token: self.timestamp_token.clone(),
            timestamp_format: self.timestamp_format.clone(),
            field_token: self.field_token.clone(),
            files_to_keep: self.files_to_keep,
            start_event: self.start_event,
            ..GeneratorConfig::default()
        })
    }
}

/// Forward destination selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwardParams {
    /// Destination name: `none`, `directory` or `tcp`.
    pub destination: String,
    /// Target directory for `directory`.
    pub path: Option<PathBuf>,
    /// `host:port` for `tcp`.
    pub address: Option<String>,
    /// Connect and write timeout for `tcp`, in seconds.
    pub timeout_s: Option<u64>,
}

impl Default for ForwardParams {
    fn default() -> Self {
        Self {
            destination: "none".to_string(),
            path: None,
            address: None,
            timeout_s: None,
        }
    }
}

impl ForwardParams {
    pub fn validate(&self) -> Result<()> {
        crate::forward::forwarder(self).map(|_| ())
    }
}

fn gigabytes(value: f64, key: &str) -> Result<u64> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::Config {
            reason: format!("{key} must be a non-negative number, got {value}"),
        });
    }
    Ok((value * BYTES_PER_GB) as u64)
}

/// Rejects formats chrono would fail to render.
pub fn check_timestamp_format(format: &str) -> Result<()> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(Error::TimestampFormat {
            format: format.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORKLOAD: &str = r#"
system: core
datagen:
  input_path: samples/syslog.log
  output_path: out/syslog-{worker}.log
  filesize_gb: 0.5
  events: 1000
  num_files: 3
  datarate_gbph: 2
  files_to_keep: 2
forward:
  destination: directory
  path: shipped
"#;

    #[test]
    fn parses_workload_file_keys() {
        let workload = Workload::from_yaml(WORKLOAD).unwrap();
        assert_eq!(workload.target().unwrap(), System::Core);
        assert_eq!(workload.datagen.events, 1000);
        assert_eq!(workload.datagen.num_files, 3);
        assert_eq!(workload.forward.destination, "directory");
        assert_eq!(workload.forward.path, Some(PathBuf::from("shipped")));
    }

    #[test]
    fn missing_keys_take_defaults() {
        let workload = Workload::from_yaml("system: core\n").unwrap();
        assert_eq!(workload.datagen, DatagenParams::default());
        assert_eq!(workload.datagen.timestamp_token.as_deref(), Some("@TIME@"));
        assert_eq!(workload.datagen.field_token.as_deref(), Some("@FIELD@"));
        assert_eq!(workload.datagen.start_event, 1);
        assert_eq!(workload.forward.destination, "none");
    }

    #[test]
    fn null_token_disables_substitution() {
        let workload =
            Workload::from_yaml("system: core\ndatagen:\n  timestamp_token: null\n").unwrap();
        assert_eq!(workload.datagen.timestamp_token, None);
    }

    #[test]
    fn converts_gigabytes_to_bytes() {
        let workload = Workload::from_yaml(WORKLOAD).unwrap();
        let config = workload.datagen.to_generator_config().unwrap();
        assert_eq!(config.max_file_bytes, 512 * 1024 * 1024);
        assert_eq!(config.max_bytes_per_hour, 2 * 1024 * 1024 * 1024);
        assert_eq!(config.max_events, 1000);
        assert_eq!(config.files_to_keep, 2);
    }

    #[test]
    fn rejects_unsupported_system() {
        let workload = Workload::from_yaml("system: splunk\n").unwrap();
        let err = workload.validate().unwrap_err();
        assert!(matches!(err, Error::UnsupportedSystem { ref name } if name == "splunk"));
        assert!(err.is_config());
    }

    #[test]
    fn rejects_negative_sizes() {
        let params = DatagenParams {
            filesize_gb: -1.0,
            ..DatagenParams::default()
        };
        assert!(matches!(
            params.to_generator_config(),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn rejects_broken_timestamp_format() {
        let params = DatagenParams {
            timestamp_format: "%Y-%".to_string(),
            ..DatagenParams::default()
        };
        assert!(matches!(
            params.to_generator_config(),
            Err(Error::TimestampFormat { .. })
        ));
    }

    #[test]
    fn unparsable_workload_is_an_error() {
        assert!(matches!(Workload::from_yaml(""), Err(Error::Yaml(_))));
        assert!(matches!(
            Workload::from_yaml("datagen: [1, 2]"),
            Err(Error::Yaml(_))
        ));
    }

    #[test]
    fn survives_the_wire() {
        let workload = Workload::from_yaml(WORKLOAD).unwrap();
        let json = workload.to_json().unwrap();
        assert_eq!(Workload::from_json(&json).unwrap(), workload);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = Workload::load("/definitely/not/here.yaml").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.yaml"));
    }
}
