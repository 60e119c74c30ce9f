use config::{Config as ConfigBuilder, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use crate::request::ScanRequest;

/// Defaults for a scan, loaded from YAML and overridden from the command line.
///
/// # Configuration Locations
///
/// The configuration can be loaded from multiple locations in order of precedence:
/// 1. Custom config file specified via `--config` flag
/// 2. Local `.finder.yaml` in the current directory
/// 3. Global `finder/config.yaml` under the platform config dir (`dirs::config_dir()`)
///
/// # Configuration Format
///
/// ```yaml
/// # Directory to scan
/// root_path: "."
///
/// # Glob matched against each file's base name
/// name_pattern: "*.csproj"
///
/// # Upper bound on concurrent workers (default: CPU cores)
/// max_parallelism: 8
///
/// # How to handle invalid UTF-8 (failfast, lossy)
/// encoding_mode: failfast
///
/// # Log level (trace, debug, info, warn, error)
/// log_level: "info"
/// ```
///
/// Every field has a default, so an empty or missing file still yields a
/// usable configuration. Only the needle has no default: it always comes
/// from the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinderConfig {
    /// Directory the scan starts from
    pub root_path: PathBuf,

    /// Shell-style glob matched against file names (e.g. "*.txt")
    pub name_pattern: String,

    /// Maximum number of files processed at the same time
    pub max_parallelism: NonZeroUsize,

    /// What to do with files that are not valid UTF-8
    pub encoding_mode: EncodingMode,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

/// How file contents that are not valid UTF-8 are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingMode {
    /// Report the file as an error
    #[default]
    FailFast,
    /// Replace invalid sequences with U+FFFD and search anyway
    Lossy,
}

impl std::str::FromStr for EncodingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "failfast" => Ok(Self::FailFast),
            "lossy" => Ok(Self::Lossy),
            other => Err(format!(
                "unknown encoding mode '{other}' (expected failfast or lossy)"
            )),
        }
    }
}

/// Values given on the command line. `None` keeps the file value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub root_path: Option<PathBuf>,
    pub name_pattern: Option<String>,
    pub max_parallelism: Option<NonZeroUsize>,
    pub encoding_mode: Option<EncodingMode>,
    pub log_level: Option<String>,
}

fn default_max_parallelism() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN)
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            root_path: PathBuf::from("."),
            name_pattern: "*".to_string(),
            max_parallelism: default_max_parallelism(),
            encoding_mode: EncodingMode::default(),
            log_level: "warn".to_string(),
        }
    }
}

impl FinderConfig {
    /// Loads configuration from the default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Loads configuration, layering an explicit file over the default locations.
    ///
    /// An explicit file that does not exist is an error; missing default
    /// files are skipped.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        let defaults = [
            dirs::config_dir().map(|p| p.join("finder/config.yaml")),
            Some(PathBuf::from(".finder.yaml")),
        ];

        for path in defaults.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.display().to_string()));
            }
            builder = builder.add_source(File::from(path));
        }

        builder.build()?.try_deserialize()
    }

    /// Merges command-line values over configuration file values
    pub fn merge_with_cli(mut self, cli: ConfigOverrides) -> Self {
        if let Some(root_path) = cli.root_path {
            self.root_path = root_path;
        }
        if let Some(name_pattern) = cli.name_pattern {
            self.name_pattern = name_pattern;
        }
        if let Some(max_parallelism) = cli.max_parallelism {
            self.max_parallelism = max_parallelism;
        }
        if let Some(encoding_mode) = cli.encoding_mode {
            self.encoding_mode = encoding_mode;
        }
        if let Some(log_level) = cli.log_level {
            self.log_level = log_level;
        }
        self
    }

    /// Builds the request for one scan looking for `needle`.
    pub fn request_for(&self, needle: impl Into<String>) -> ScanRequest {
        ScanRequest::new(
            self.root_path.clone(),
            self.name_pattern.clone(),
            needle,
            self.max_parallelism.get(),
        )
    }
}
