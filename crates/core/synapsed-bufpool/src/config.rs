//! Pool configuration: geometry, arena sizing, loading from TOML and env.

use crate::error::{BufferPoolError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Default environment variable prefix for [`PoolConfig::apply_env_overrides`]
pub const DEFAULT_ENV_PREFIX: &str = "BUFPOOL";

/// Buffer pool configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Arena growth granularity in bytes; must be a multiple of `block_size`
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Segment alignment in bytes; must be a power of two
    #[serde(default = "default_block_size")]
    pub block_size: usize,

    /// Pages the arena is created with
    #[serde(default = "default_initial_pages")]
    pub initial_pages: usize,

    /// Hard cap on the arena length in bytes (None = unbounded)
    #[serde(default)]
    pub max_arena_bytes: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            block_size: default_block_size(),
            initial_pages: default_initial_pages(),
            max_arena_bytes: None,
        }
    }
}

impl PoolConfig {
    /// Configuration with the given geometry and default arena sizing
    #[must_use]
    pub fn new(page_size: usize, block_size: usize) -> Self {
        Self {
            page_size,
            block_size,
            ..Self::default()
        }
    }

    /// Set the number of pages the arena starts with
    #[must_use]
    pub fn with_initial_pages(mut self, pages: usize) -> Self {
        self.initial_pages = pages;
        self
    }

    /// Cap the arena length
    #[must_use]
    pub fn with_max_arena_bytes(mut self, max: usize) -> Self {
        self.max_arena_bytes = Some(max);
        self
    }

    /// Check the page/block geometry.
    ///
    /// The block size must be a power of two and the page size a non-zero
    /// multiple of it.
    pub fn validate(&self) -> Result<()> {
        if !self.block_size.is_power_of_two() {
            return Err(BufferPoolError::config("blockSize must be a power of 2"));
        }

        if self.page_size < self.block_size || self.page_size % self.block_size != 0 {
            return Err(BufferPoolError::config(
                "pageSize must be divisible by blockSize",
            ));
        }

        if let Some(max) = self.max_arena_bytes {
            let initial = self.page_size.checked_mul(self.initial_pages);
            if initial.map_or(true, |initial| initial > max) {
                return Err(BufferPoolError::config(format!(
                    "initial arena of {} pages exceeds max_arena_bytes {max}",
                    self.initial_pages
                )));
            }
        }

        Ok(())
    }

    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Load a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            BufferPoolError::config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Serialize to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| BufferPoolError::config(format!("Failed to encode TOML: {e}")))
    }

    /// Override fields from `<PREFIX>_PAGE_SIZE`, `<PREFIX>_BLOCK_SIZE`,
    /// `<PREFIX>_INITIAL_PAGES` and `<PREFIX>_MAX_ARENA_BYTES`
    pub fn apply_env_overrides(mut self, prefix: &str) -> Result<Self> {
        if let Some(value) = env_value(prefix, "PAGE_SIZE")? {
            self.page_size = value;
        }
        if let Some(value) = env_value(prefix, "BLOCK_SIZE")? {
            self.block_size = value;
        }
        if let Some(value) = env_value(prefix, "INITIAL_PAGES")? {
            self.initial_pages = value;
        }
        if let Some(value) = env_value(prefix, "MAX_ARENA_BYTES")? {
            self.max_arena_bytes = Some(value);
        }
        Ok(self)
    }
}

fn env_value<T: FromStr>(prefix: &str, key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    let name = format!("{prefix}_{key}");
    match std::env::var(&name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| BufferPoolError::config(format!("Invalid value for {name}: {e}"))),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(BufferPoolError::config(format!("Cannot read {name}: {e}"))),
    }
}

// Default value functions
fn default_page_size() -> usize {
    1024
}

fn default_block_size() -> usize {
    32
}

fn default_initial_pages() -> usize {
    1
}
