//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "CASITA_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "casita.db";

/// Optional TOML configuration file
///
/// Every field is optional; anything missing falls back to compiled defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub log_level: Option<String>,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub etl: EtlConfig,
}

/// `[api]` section
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiConfig {
    pub bind: Option<String>,
    pub port: Option<u16>,
    /// Deadline for table discovery on each lookup, in milliseconds
    pub lookup_timeout_ms: Option<u64>,
}

/// `[etl]` section
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EtlConfig {
    pub similarity_threshold: Option<f64>,
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Log level, defaulting to "info"
    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }
}

/// Load the TOML config file
///
/// An explicit path is used as given; otherwise the platform config locations
/// are searched. A missing or unreadable file never aborts startup: a warning
/// is logged and defaults are returned.
pub fn load_toml_config(explicit: Option<&Path>) -> TomlConfig {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match find_config_file() {
            Ok(path) => path,
            Err(_) => return TomlConfig::default(),
        },
    };

    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Could not read config file {}: {} (using defaults)", path.display(), e);
            return TomlConfig::default();
        }
    };

    match TomlConfig::from_toml_str(&content) {
        Ok(config) => config,
        Err(e) => {
            warn!("Invalid config file {}: {} (using defaults)", path.display(), e);
            TomlConfig::default()
        }
    }
}

/// Root folder resolution, in priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(root_folder) = &config.root_folder {
        return root_folder.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Database path: explicit override, else `<root>/casita.db`
pub fn database_path(root_folder: &Path, override_path: Option<&Path>) -> PathBuf {
    override_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root_folder.join(DATABASE_FILE))
}

/// Locate the config file for the platform
fn find_config_file() -> Result<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("casita").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Ok(path);
        }
    }

    if cfg!(unix) {
        let system_config = PathBuf::from("/etc/casita/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config("No config file found".to_string()))
}

/// OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\casita
        dirs::data_local_dir()
            .map(|d| d.join("casita"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\casita"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/casita
        dirs::data_dir()
            .map(|d| d.join("casita"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/casita"))
    } else {
        // ~/.local/share/casita
        dirs::data_local_dir()
            .map(|d| d.join("casita"))
            .unwrap_or_else(|| PathBuf::from("./casita_data"))
    }
}
