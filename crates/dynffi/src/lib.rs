// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # dynffi - dynamic C types and values
//!
//! Describe C data shapes at run time, lay them out the way the platform ABI
//! does, and exchange binary-compatible values with foreign code without
//! generated bindings.
//!
//! ## Quick Start
//!
//! ```rust
//! use dynffi::{Arena, Decoder, Marshal, NaturalAbi, TypeRegistry};
//! use std::sync::Arc;
//!
//! #[derive(Marshal, Debug, PartialEq)]
//! struct Sample {
//!     id: u32,
//!     readings: [f64; 3],
//!     history: Vec<i16>,
//! }
//!
//! let registry = Arc::new(TypeRegistry::new(Arc::new(NaturalAbi::new())));
//! let arena = Arena::new(registry);
//!
//! let sample = Sample { id: 7, readings: [1.0, 2.0, 3.0], history: vec![-1, 0, 1] };
//! let value = arena.value_of(&sample).unwrap();
//! assert_eq!(value.field(0).unwrap().as_u64().unwrap(), 7);
//!
//! let back: Sample = Decoder::new(&value).decode().unwrap();
//! assert_eq!(back, sample);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |  Describe / Marshal (+ #[derive(Marshal)])   Encoder / Decoder       |
//! +---------------------------------------------------------------------+
//! |  Value: typed views over Arena regions       slice growth            |
//! +---------------------------------------------------------------------+
//! |  TypeRegistry: builtins, structs, T*, T[N], T[]                      |
//! +---------------------------------------------------------------------+
//! |  CallEngine: layout + invocation (NaturalAbi, LibffiAbi)  Library/Fn |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`TypeRegistry`] | Interning table of laid-out [`TypeDescriptor`]s |
//! | [`Arena`] | Owner of the raw memory behind values |
//! | [`Value`] | Typed, bounds-checked view over arena memory |
//! | [`Encoder`] / [`Decoder`] | Copy Rust values in and out of a [`Value`] |
//! | [`Function`] | Foreign symbol with a prepared call signature |
//!
//! ## Logging
//!
//! The crate logs through the [`log`] facade with `[registry]`, `[slice]`,
//! `[marshal]` and `[library]` tags. No logger is installed.

// Allow the derive macro to work inside this crate's tests
extern crate self as dynffi;

/// Call engine interface and the natural-layout engine.
pub mod abi;
/// Platform constants and runtime configuration.
pub mod config;
pub mod error;
/// Shared library loading and foreign functions.
pub mod library;
/// Rust value marshaling.
pub mod marshal;
/// Type descriptors and the registry.
pub mod types;
/// Raw-memory values.
pub mod value;

pub use abi::{Abi, AbiError, CallEngine, CallSignature, NaturalAbi, SolvedLayout};
#[cfg(feature = "libffi")]
pub use abi::LibffiAbi;
pub use config::{ConfigError, RuntimeConfig};
pub use error::{Error, Redeclaration, Result};
pub use library::{library_file_name, Function, Library, LibraryError};
pub use marshal::{Decoder, Describe, Encoder, Marshal};
pub use types::{
    is_compatible, Field, Kind, NativeType, Shape, SliceHeader, StructBuilder, StructField,
    TypeDescriptor, TypeRegistry,
};
pub use value::{grown_capacity, Arena, Value};

// Derive macro (for #[derive(dynffi::Marshal)]), sharing the trait's name
pub use dynffi_codegen::Marshal;

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
