// =============================================================================
// CONFIGURATION - Load settings from shader_layout.toml
// =============================================================================
//
// Output location of generated artifacts, registry cache, binding limits,
// watched extensions and logging. Every section has defaults, so a missing
// file or missing keys are fine.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::bindings::{DEFAULT_MAX_BINDING_POINTS, DEFAULT_MAX_TEXTURE_UNITS};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "shader_layout.toml";

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub output: OutputConfig,
    pub registry: RegistryConfig,
    pub bindings: BindingsConfig,
    pub watch: WatchConfig,
    pub logging: LoggingConfig,
}

/// Generated artifact settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub extension: String,
    /// Path generated code uses to reach this crate's runtime types.
    pub runtime_crate: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("generated"),
            extension: "rs".to_string(),
            runtime_crate: "shader_layout".to_string(),
        }
    }
}

/// Type registry settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Identities are loaded from and saved to this file when set.
    pub cache_file: Option<PathBuf>,
    /// Persistent-id characters appended to disambiguate generated names.
    pub name_suffix_len: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            cache_file: None,
            name_suffix_len: 4,
        }
    }
}

/// Binding limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingsConfig {
    pub max_binding_points: u32,
    pub max_texture_units: u32,
}

impl Default for BindingsConfig {
    fn default() -> Self {
        Self {
            max_binding_points: DEFAULT_MAX_BINDING_POINTS,
            max_texture_units: DEFAULT_MAX_TEXTURE_UNITS,
        }
    }
}

/// Source watcher settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub extensions: Vec<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            extensions: ["glsl", "vert", "frag", "geom", "comp", "tesc", "tese", "shader"]
                .iter()
                .map(|extension| extension.to_string())
                .collect(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `error`, `warn`, `info`, `debug` or `trace`.
    pub level: String,
    pub log_to_file: bool,
    pub log_file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_to_file: false,
            log_file: "shader_layout.log".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Parsed level, `Info` for anything unrecognised.
    pub fn level_filter(&self) -> log::LevelFilter {
        match self.level.to_lowercase().as_str() {
            "off" => log::LevelFilter::Off,
            "error" => log::LevelFilter::Error,
            "warn" => log::LevelFilter::Warn,
            "info" => log::LevelFilter::Info,
            "debug" => log::LevelFilter::Debug,
            "trace" => log::LevelFilter::Trace,
            _ => {
                log::warn!("Unknown log level '{}', defaulting to info", self.level);
                log::LevelFilter::Info
            }
        }
    }
}

impl CompilerConfig {
    /// Load configuration from file, falling back to defaults if not found
    pub fn load() -> Self {
        Self::load_from_path(CONFIG_FILE).unwrap_or_else(|e| {
            log::warn!("Failed to load {}: {}. Using defaults.", CONFIG_FILE, e);
            CompilerConfig::default()
        })
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(CompilerConfig::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: CompilerConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        log::info!("Loaded configuration from {:?}", path);
        log::debug!("Config: {:?}", config);

        Ok(config)
    }
}
