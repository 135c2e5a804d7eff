// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Runtime descriptions of C types.
//!
//! # Features
//!
//! - **TypeDescriptor**: immutable, laid-out description of one C type
//! - **TypeRegistry**: interning table with builtin scalars and derived types
//! - **StructBuilder**: fluent struct declaration
//! - **is_compatible**: structural compatibility check used by the marshaler
//!
//! # Example
//!
//! ```rust
//! use dynffi::{NaturalAbi, StructBuilder, TypeRegistry};
//! use std::sync::Arc;
//!
//! let registry = TypeRegistry::new(Arc::new(NaturalAbi::new()));
//! let point = StructBuilder::new(&registry, "Point")
//!     .field("x", registry.int32())
//!     .field("y", registry.int32())
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(point.size(), 8);
//! assert_eq!(point.field(1).unwrap().offset, 4);
//! ```

mod builder;
mod compat;
mod descriptor;
mod kind;
mod layout;
mod registry;

pub use builder::StructBuilder;
pub use compat::is_compatible;
pub use descriptor::{Field, NativeType, Shape, SliceHeader, StructField, TypeDescriptor};
pub use kind::Kind;
pub use registry::TypeRegistry;
