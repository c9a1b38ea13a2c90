//! # Configuration
//!
//! Settings come from three layers, highest precedence first:
//! 1. Command-line flags
//! 2. An optional TOML file given with `--config`
//! 3. Built-in defaults
//!
//! ```toml
//! database = "labtrack.db"
//! backend = "redb"          # or "memory"
//! catalog = "labs.toml"     # omit to use the built-in catalog
//! host = "127.0.0.1"
//! port = 8080
//! ```

use clap::ValueEnum;
use labtrack_core::{
    LabCatalog, LabtrackError, MemoryProgressStore, ProgressStore, ProgressionEngine,
    RedbProgressStore,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default progress database path.
pub const DEFAULT_DATABASE: &str = "labtrack.db";

/// Default bind host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default bind port.
pub const DEFAULT_PORT: u16 = 8080;

/// Maximum size of a configuration file (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// Maximum size of a catalog file (16 MB).
///
/// This prevents memory exhaustion from malicious or accidental large files.
const MAX_CATALOG_FILE_SIZE: u64 = 16 * 1024 * 1024;

// =============================================================================
// BACKEND
// =============================================================================

/// Progress store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// redb embedded database (durable)
    #[default]
    Redb,
    /// In-process map, lost on exit
    Memory,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Redb => f.write_str("redb"),
            Backend::Memory => f.write_str("memory"),
        }
    }
}

// =============================================================================
// FILE CONFIG
// =============================================================================

/// One configuration layer; every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub database: Option<PathBuf>,
    pub backend: Option<Backend>,
    pub catalog: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl FileConfig {
    /// Parse a TOML configuration document.
    pub fn from_toml_str(source: &str) -> Result<Self, LabtrackError> {
        toml::from_str(source).map_err(|e| LabtrackError::InvalidConfig(e.to_string()))
    }

    /// Read and parse a configuration file.
    pub fn load(path: &Path) -> Result<Self, LabtrackError> {
        Self::from_toml_str(&read_bounded(path, MAX_CONFIG_FILE_SIZE)?)
    }

    /// Fill every key missing here from `lower`.
    #[must_use]
    pub fn or(self, lower: FileConfig) -> FileConfig {
        FileConfig {
            database: self.database.or(lower.database),
            backend: self.backend.or(lower.backend),
            catalog: self.catalog.or(lower.catalog),
            host: self.host.or(lower.host),
            port: self.port.or(lower.port),
        }
    }
}

// =============================================================================
// RESOLVED SETTINGS
// =============================================================================

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database: PathBuf,
    pub backend: Backend,
    /// `None` selects the built-in catalog.
    pub catalog: Option<PathBuf>,
    pub host: String,
    pub port: u16,
}

impl From<FileConfig> for Settings {
    fn from(config: FileConfig) -> Self {
        Self {
            database: config
                .database
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE)),
            backend: config.backend.unwrap_or_default(),
            catalog: config.catalog,
            host: config.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: config.port.unwrap_or(DEFAULT_PORT),
        }
    }
}

impl Settings {
    /// Merge command-line values over an optional config file.
    pub fn resolve(flags: FileConfig, config_path: Option<&Path>) -> Result<Self, LabtrackError> {
        let file = match config_path {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Ok(Self::from(flags.or(file)))
    }

    /// `host:port` bind address.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Load the configured catalog, or the built-in one.
    pub fn load_catalog(&self) -> Result<LabCatalog, LabtrackError> {
        match &self.catalog {
            Some(path) => load_catalog_file(path),
            None => LabCatalog::builtin(),
        }
    }

    /// Open the configured progress store.
    pub fn open_store(&self) -> Result<Arc<dyn ProgressStore>, LabtrackError> {
        match self.backend {
            Backend::Redb => Ok(Arc::new(RedbProgressStore::open(&self.database)?)),
            Backend::Memory => Ok(Arc::new(MemoryProgressStore::new())),
        }
    }

    /// Catalog plus store, ready to serve transitions.
    pub fn build_engine(&self) -> Result<ProgressionEngine, LabtrackError> {
        let catalog = Arc::new(self.load_catalog()?);
        Ok(ProgressionEngine::new(catalog, self.open_store()?))
    }
}

/// Read and validate a catalog file.
pub fn load_catalog_file(path: &Path) -> Result<LabCatalog, LabtrackError> {
    LabCatalog::from_toml_str(&read_bounded(path, MAX_CATALOG_FILE_SIZE)?)
}

/// Read a regular file as UTF-8, refusing anything larger than `max_size`.
fn read_bounded(path: &Path, max_size: u64) -> Result<String, LabtrackError> {
    // Canonicalize resolves "..", symlinks, and validates existence
    let canonical = path.canonicalize().map_err(|e| {
        LabtrackError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;
    if !canonical.is_file() {
        return Err(LabtrackError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    let metadata = std::fs::metadata(&canonical)
        .map_err(|e| LabtrackError::IoError(format!("Cannot read file metadata: {}", e)))?;
    if metadata.len() > max_size {
        return Err(LabtrackError::IoError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }

    std::fs::read_to_string(&canonical)
        .map_err(|e| LabtrackError::IoError(format!("Read '{}': {}", path.display(), e)))
}

// =============================================================================
// TESTS
// =============================================================================
