// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types shared by every layer of the crate.

use crate::abi::AbiError;
use crate::config::ConfigError;
use crate::library::LibraryError;
use crate::types::Kind;
use std::fmt;
use thiserror::Error;

/// Which part of a struct re-declaration disagrees with the registered type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redeclaration {
    /// Different number of fields.
    FieldCount { registered: usize, requested: usize },
    /// Field `index` has a different name.
    FieldName(usize),
    /// Field `index` has a different type.
    FieldType(usize),
}

impl fmt::Display for Redeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FieldCount {
                registered,
                requested,
            } => write!(
                f,
                "field count mismatch ({} registered, {} requested)",
                registered, requested
            ),
            Self::FieldName(i) => write!(f, "field #{} name mismatch", i),
            Self::FieldType(i) => write!(f, "field #{} type mismatch", i),
        }
    }
}

/// Errors reported by descriptor, value and marshaling operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("call of {method} on {kind} value")]
    KindMismatch { method: &'static str, kind: Kind },

    #[error("{what} index {index} out of range (length {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("value of type [{source_type}] can not be assigned to type [{target}]")]
    TypeIncompatible { target: String, source_type: String },

    #[error("inconsistent re-declaration of [{name}] ({mismatch})")]
    InconsistentRedeclaration {
        name: String,
        mismatch: Redeclaration,
    },

    #[error("type name [{0}] uses derived-type syntax")]
    ReservedName(String),

    #[error("ABI error: {0}")]
    Abi(#[from] AbiError),

    #[error("library error: {0}")]
    Library(#[from] LibraryError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("unimplemented: {0}")]
    Unimplemented(&'static str),

    #[error("dereference of nil pointer of type [{0}]")]
    NilPointer(String),

    #[error("address {0:#x} does not belong to any region of this arena")]
    UnmappedAddress(usize),

    #[error("access of {len} bytes at offset {offset} exceeds region of {region_len} bytes")]
    OutOfBounds {
        offset: usize,
        len: usize,
        region_len: usize,
    },

    #[error("invalid length: {0}")]
    InvalidLength(String),
}

impl Error {
    pub(crate) fn incompatible(target: &str, source: &str) -> Self {
        Self::TypeIncompatible {
            target: target.to_string(),
            source_type: source.to_string(),
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
