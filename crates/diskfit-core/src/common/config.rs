//! JSON run configuration for the simulation driver.

use crate::domain::DiskfitError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverConfig {
    /// Engine threads for standard-tier models.
    pub ncpus: usize,
    /// Engine threads for high-mass-tier models.
    pub ncpus_highmass: usize,
    pub with_hyperion: bool,
    /// Wall-clock limit of one thermal run; 0 disables the limit.
    pub time_limit_seconds: u64,
    pub nice: Option<i32>,
    pub max_threads: Option<usize>,
    pub engine_executable: PathBuf,
    /// Exit codes that mark an engine crash as worth one retry.
    pub transient_exit_codes: Vec<i32>,
    pub scratch_root: PathBuf,
    pub source: String,
    pub rank: usize,
    pub poll_interval_ms: u64,
    pub nphot_therm: u64,
    pub nphot_scat: u64,
    pub nphot_spec: u64,
    pub mc_scat_maxtauabs: f64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            ncpus: 1,
            ncpus_highmass: 1,
            with_hyperion: false,
            time_limit_seconds: 3600,
            nice: None,
            max_threads: None,
            engine_executable: PathBuf::from("radmc3d"),
            transient_exit_codes: Vec::new(),
            scratch_root: std::env::temp_dir(),
            source: "disk".to_string(),
            rank: 0,
            poll_interval_ms: 100,
            nphot_therm: 1_000_000,
            nphot_scat: 100_000,
            nphot_spec: 10_000,
            mc_scat_maxtauabs: 5.0,
        }
    }
}

impl DriverConfig {
    pub fn time_limit(&self) -> Option<Duration> {
        (self.time_limit_seconds > 0).then(|| Duration::from_secs(self.time_limit_seconds))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.ncpus == 0 || self.ncpus_highmass == 0 {
            return Err("ncpus and ncpus_highmass must be at least 1".to_string());
        }
        if self.max_threads == Some(0) {
            return Err("max_threads must be at least 1 when set".to_string());
        }
        if self.source.is_empty() || self.source.contains(std::path::MAIN_SEPARATOR) {
            return Err(format!(
                "source label '{}' must be a non-empty file-name fragment",
                self.source
            ));
        }
        if !self.mc_scat_maxtauabs.is_finite() || self.mc_scat_maxtauabs <= 0.0 {
            return Err(format!(
                "mc_scat_maxtauabs must be finite and > 0, got {}",
                self.mc_scat_maxtauabs
            ));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid configuration in '{}': {message}", path.display())]
    Invalid { path: PathBuf, message: String },
}

impl From<ConfigError> for DiskfitError {
    fn from(error: ConfigError) -> Self {
        match &error {
            ConfigError::Read { .. } => DiskfitError::io_system("IO.CONFIG_READ", error.to_string()),
            ConfigError::Parse { .. } => {
                DiskfitError::input_validation("INPUT.CONFIG_PARSE", error.to_string())
            }
            ConfigError::Invalid { .. } => {
                DiskfitError::input_validation("INPUT.CONFIG_INVALID", error.to_string())
            }
        }
    }
}

pub fn load_json_document<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, ConfigError> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&source).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_driver_config(path: impl AsRef<Path>) -> Result<DriverConfig, ConfigError> {
    let path = path.as_ref();
    let config: DriverConfig = load_json_document(path)?;
    config.validate().map_err(|message| ConfigError::Invalid {
        path: path.to_path_buf(),
        message,
    })?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, DriverConfig, load_driver_config};
    use crate::domain::{DiskfitError, DiskfitErrorCategory};
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("driver.json");
        fs::write(&path, r#"{"ncpus": 4, "nice": 10, "transient_exit_codes": [139]}"#)
            .expect("config should be written");

        let config = load_driver_config(&path).expect("config should load");
        assert_eq!(config.ncpus, 4);
        assert_eq!(config.ncpus_highmass, 1);
        assert_eq!(config.nice, Some(10));
        assert_eq!(config.transient_exit_codes, vec![139]);
        assert_eq!(config.time_limit(), Some(Duration::from_secs(3600)));
    }

    #[test]
    fn zero_time_limit_disables_the_deadline() {
        let config = DriverConfig {
            time_limit_seconds: 0,
            ..DriverConfig::default()
        };
        assert_eq!(config.time_limit(), None);
    }

    #[test]
    fn unknown_keys_are_parse_errors() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("driver.json");
        fs::write(&path, r#"{"ncpu": 4}"#).expect("config should be written");

        let error = load_driver_config(&path).expect_err("typo should be rejected");
        assert!(matches!(error, ConfigError::Parse { .. }));
        let error = DiskfitError::from(error);
        assert_eq!(error.placeholder(), "INPUT.CONFIG_PARSE");
    }

    #[test]
    fn zero_cpus_are_invalid() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("driver.json");
        fs::write(&path, r#"{"ncpus_highmass": 0}"#).expect("config should be written");

        let error = load_driver_config(&path).expect_err("zero cpus should be rejected");
        assert!(matches!(error, ConfigError::Invalid { .. }));
    }

    #[test]
    fn missing_file_maps_to_io_category() {
        let temp = TempDir::new().expect("tempdir should be created");
        let error = DiskfitError::from(
            load_driver_config(temp.path().join("absent.json")).expect_err("missing file"),
        );
        assert_eq!(error.category(), DiskfitErrorCategory::IoSystemError);
    }
}
