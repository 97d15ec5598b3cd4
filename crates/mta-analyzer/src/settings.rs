//! Analyzer settings
//!
//! Where the analyzer lives and how long to wait for it. Every field has a
//! default, so an empty TOML file is valid.

use crate::error::SettingsError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Analyzer process settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerSettings {
    /// Analyzer executable
    pub cli_path: PathBuf,
    /// Directory the analyzer runs in
    pub working_dir: PathBuf,
    /// Time allowed before the first output line
    pub startup_timeout_ms: u64,
    /// Target used when the configuration names none
    pub default_target: String,
    /// Wait after `complete` before reading results
    pub settle_delay_ms: u64,
    /// How many times to look for the results artifact
    pub results_poll_attempts: u32,
    /// Pause between looks
    pub results_poll_interval_ms: u64,
    /// Results artifact name inside the output directory
    pub results_file: String,
    /// Report entry page inside the output directory
    pub report_file: String,
}

impl AnalyzerSettings {
    /// Create default settings
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read settings from a TOML file
    ///
    /// # Errors
    /// - `SettingsError::Io` if the file cannot be read
    /// - `SettingsError::Parse` if it is not valid settings TOML
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Parse settings from TOML text
    ///
    /// # Errors
    /// - `SettingsError::Parse` if it is not valid settings TOML
    pub fn from_toml(text: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(text)?)
    }

    /// With analyzer executable
    #[inline]
    #[must_use]
    pub fn with_cli_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cli_path = path.into();
        self
    }

    /// With working directory
    #[inline]
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    /// With startup timeout
    #[inline]
    #[must_use]
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout_ms = duration_ms(timeout);
        self
    }

    /// With default target
    #[inline]
    #[must_use]
    pub fn with_default_target(mut self, target: impl Into<String>) -> Self {
        self.default_target = target.into();
        self
    }

    /// With settle delay after completion
    #[inline]
    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay_ms = duration_ms(delay);
        self
    }

    /// With results polling budget
    #[inline]
    #[must_use]
    pub fn with_results_polling(mut self, attempts: u32, interval: Duration) -> Self {
        self.results_poll_attempts = attempts;
        self.results_poll_interval_ms = duration_ms(interval);
        self
    }

    #[inline]
    #[must_use]
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    #[inline]
    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    #[inline]
    #[must_use]
    pub fn results_poll_interval(&self) -> Duration {
        Duration::from_millis(self.results_poll_interval_ms)
    }

    /// Results artifact for an output directory
    #[must_use]
    pub fn results_path(&self, output: impl AsRef<Path>) -> PathBuf {
        output.as_ref().join(&self.results_file)
    }

    /// Report entry page for an output directory
    #[must_use]
    pub fn report_path(&self, output: impl AsRef<Path>) -> PathBuf {
        output.as_ref().join(&self.report_file)
    }
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            cli_path: PathBuf::from("mta-cli"),
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            startup_timeout_ms: 60_000,
            default_target: "eap7".to_string(),
            settle_delay_ms: 500,
            results_poll_attempts: 10,
            results_poll_interval_ms: 1_000,
            results_file: "results.json".to_string(),
            report_file: "index.html".to_string(),
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let settings = AnalyzerSettings::from_toml("").unwrap();
        assert_eq!(settings, AnalyzerSettings::default());
        assert_eq!(settings.startup_timeout(), Duration::from_secs(60));
        assert_eq!(settings.default_target, "eap7");
    }

    #[test]
    fn partial_toml_overrides() {
        let settings = AnalyzerSettings::from_toml(
            r#"
            cli_path = "/opt/mta/bin/mta-cli"
            startup_timeout_ms = 250
            results_poll_attempts = 3
            "#,
        )
        .unwrap();
        assert_eq!(settings.cli_path, PathBuf::from("/opt/mta/bin/mta-cli"));
        assert_eq!(settings.startup_timeout(), Duration::from_millis(250));
        assert_eq!(settings.results_poll_attempts, 3);
        assert_eq!(settings.report_file, "index.html");
    }

    #[test]
    fn bad_toml_is_parse_error() {
        assert!(matches!(
            AnalyzerSettings::from_toml("startup_timeout_ms = \"soon\""),
            Err(SettingsError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            AnalyzerSettings::load(dir.path().join("nope.toml")),
            Err(SettingsError::Io { .. })
        ));
    }

    #[test]
    fn builders_and_paths() {
        let settings = AnalyzerSettings::new()
            .with_cli_path("/bin/analyzer")
            .with_startup_timeout(Duration::from_millis(10))
            .with_settle_delay(Duration::ZERO)
            .with_results_polling(2, Duration::from_millis(5));

        assert_eq!(settings.cli_path, PathBuf::from("/bin/analyzer"));
        assert_eq!(settings.startup_timeout_ms, 10);
        assert_eq!(settings.settle_delay(), Duration::ZERO);
        assert_eq!(settings.results_poll_interval(), Duration::from_millis(5));
        assert_eq!(
            settings.results_path("/out"),
            PathBuf::from("/out/results.json")
        );
        assert_eq!(settings.report_path("/out"), PathBuf::from("/out/index.html"));
    }
}
