//! Configuration system
//!
//! File-backed configuration shared by the cache. Any `serde` type with a
//! `Default` can implement [`Config`] to gain TOML/RON loading and saving.
//! [`CacheConfig`] holds the per-accumulator buffer capacities.

pub use serde::{Deserialize, Serialize};

/// Default maximum number of vertices buffered by one accumulator
pub const DEFAULT_MAX_VERTICES: usize = 4096;

/// Default maximum number of indices buffered by one accumulator
pub const DEFAULT_MAX_INDICES: usize = 8192;

/// Smallest capacity that still holds one triangle
pub const MIN_CAPACITY: usize = 3;

/// Largest vertex capacity addressable with 16-bit indices
pub const MAX_VERTEX_CAPACITY: usize = u16::MAX as usize + 1;

/// Upper bound on index capacity per buffer
pub const MAX_INDEX_CAPACITY: usize = 1 << 20;

/// Serialized format of a configuration file, chosen by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.toml`
    Toml,
    /// `.ron`
    Ron,
}

impl ConfigFormat {
    /// Format for `path`, or `UnsupportedFormat`
    pub fn from_path(path: &str) -> Result<Self, ConfigError> {
        if path.ends_with(".toml") {
            Ok(Self::Toml)
        } else if path.ends_with(".ron") {
            Ok(Self::Ron)
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }
}

/// File-backed settings that are checked before use
///
/// Loading rejects a file whose values fail [`validate`](Config::validate),
/// so a loaded value can be handed straight to the component it configures.
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Check the values; the default accepts everything
    fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }

    /// Load and validate configuration from a `.toml` or `.ron` file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let format = ConfigFormat::from_path(path)?;
        let contents = std::fs::read_to_string(path)?;
        let config: Self = match format {
            ConfigFormat::Toml => toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))?,
            ConfigFormat::Ron => ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate, then save configuration to a `.toml` or `.ron` file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let format = ConfigFormat::from_path(path)?;
        self.validate()?;
        let contents = match format {
            ConfigFormat::Toml => toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?,
            ConfigFormat::Ron => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
        };
        std::fs::write(path, contents)?;
        Ok(())
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A value is outside its allowed range
    #[error("Invalid value for `{field}`: {value} (allowed {min}..={max})")]
    OutOfRange {
        /// Name of the offending field
        field: &'static str,
        /// Configured value
        value: usize,
        /// Smallest allowed value
        min: usize,
        /// Largest allowed value
        max: usize,
    },
}

/// # Cache Configuration
///
/// Fixed buffer capacities for every batch accumulator. Capacities are in
/// elements (vertices or 16-bit indices), not bytes; the byte size of each
/// device buffer is derived from the vertex layout stride.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Vertices held by the dynamic vertex buffer of each accumulator
    pub max_vertices: usize,
    /// Indices held by the dynamic index buffer of each accumulator
    pub max_indices: usize,
    /// Vertices held by the static-hosting vertex buffer of each accumulator
    pub max_static_vertices: usize,
    /// Indices held by the static-hosting index buffer of each accumulator
    pub max_static_indices: usize,
}

impl CacheConfig {
    /// Create a configuration with the given dynamic capacities
    ///
    /// Static-hosting buffers get the same capacities.
    pub fn with_capacity(max_vertices: usize, max_indices: usize) -> Self {
        Self {
            max_vertices,
            max_indices,
            max_static_vertices: max_vertices,
            max_static_indices: max_indices,
        }
    }

    /// Set the static-hosting buffer capacities
    pub fn with_static_capacity(mut self, max_vertices: usize, max_indices: usize) -> Self {
        self.max_static_vertices = max_vertices;
        self.max_static_indices = max_indices;
        self
    }
}

fn check_range(field: &'static str, value: usize, max: usize) -> Result<(), ConfigError> {
    if (MIN_CAPACITY..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min: MIN_CAPACITY,
            max,
        })
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_VERTICES, DEFAULT_MAX_INDICES)
    }
}

impl Config for CacheConfig {
    /// Check every capacity against the limits of 16-bit indexed buffers
    fn validate(&self) -> Result<(), ConfigError> {
        check_range("max_vertices", self.max_vertices, MAX_VERTEX_CAPACITY)?;
        check_range("max_static_vertices", self.max_static_vertices, MAX_VERTEX_CAPACITY)?;
        check_range("max_indices", self.max_indices, MAX_INDEX_CAPACITY)?;
        check_range("max_static_indices", self.max_static_indices, MAX_INDEX_CAPACITY)?;
        Ok(())
    }
}
