// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Global configuration: platform constants and runtime knobs.
//!
//! # Architecture
//!
//! - **Level 1 (Static)**: compile-time constants (pointer width, long double
//!   layout, growth threshold, anonymous type prefix)
//! - **Level 2 (Dynamic)**: [`RuntimeConfig`], handed to
//!   [`TypeRegistry::with_config`](crate::TypeRegistry::with_config) and
//!   [`Arena::with_config`](crate::Arena::with_config), which reject it
//!   unless [`RuntimeConfig::validate`] passes
//!
//! With the `config-file` feature a `RuntimeConfig` can be read from TOML:
//!
//! ```toml
//! abi = "default"
//! anon_prefix = "_anon_"
//! growth_threshold = 2048
//! ```

use crate::abi::Abi;
#[cfg(feature = "config-file")]
use std::path::Path;
use thiserror::Error;

// =======================================================================
// Platform layout
// =======================================================================

/// Size in bytes of a data pointer on this target.
pub const POINTER_SIZE: usize = std::mem::size_of::<*const u8>();

/// Alignment in bytes of a data pointer on this target.
pub const POINTER_ALIGN: usize = std::mem::align_of::<*const u8>();

/// Size in bytes of C `long double`.
#[cfg(target_os = "windows")]
pub const LONG_DOUBLE_SIZE: usize = 8;
#[cfg(not(target_os = "windows"))]
pub const LONG_DOUBLE_SIZE: usize = 16;

/// Alignment in bytes of C `long double`.
#[cfg(target_os = "windows")]
pub const LONG_DOUBLE_ALIGN: usize = 8;
#[cfg(not(target_os = "windows"))]
pub const LONG_DOUBLE_ALIGN: usize = 16;

// =======================================================================
// Defaults
// =======================================================================

/// Slice capacity (in elements) below which growth doubles the capacity.
///
/// Above it, capacity grows by 25% steps.
pub const DEFAULT_GROWTH_THRESHOLD: usize = 1024;

/// Prefix of generated names for anonymous struct types.
pub const ANON_TYPE_PREFIX: &str = "_ffi_anon_type_";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "config-file")]
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Runtime configuration for registries and arenas.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config-file", derive(serde::Deserialize))]
#[cfg_attr(feature = "config-file", serde(default))]
pub struct RuntimeConfig {
    /// ABI used when the registry asks the engine for layouts.
    pub abi: Abi,
    /// Prefix of generated anonymous struct names.
    pub anon_prefix: String,
    /// Slice growth threshold, in elements.
    pub growth_threshold: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            abi: Abi::Default,
            anon_prefix: ANON_TYPE_PREFIX.to_string(),
            growth_threshold: DEFAULT_GROWTH_THRESHOLD,
        }
    }
}

impl RuntimeConfig {
    /// Check the configuration for values the runtime can not work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.anon_prefix.is_empty() {
            return Err(ConfigError::Invalid("anon_prefix must not be empty".into()));
        }
        if self.growth_threshold == 0 {
            return Err(ConfigError::Invalid(
                "growth_threshold must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Parse a configuration from a TOML document.
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file.
    #[cfg(feature = "config-file")]
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}
