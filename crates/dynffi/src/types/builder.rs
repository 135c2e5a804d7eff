// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fluent builder for struct declarations.

use crate::error::{Error, Result};
use crate::types::{Field, TypeDescriptor, TypeRegistry};
use std::sync::Arc;

/// Collects fields, then declares the struct in a registry.
#[derive(Debug)]
pub struct StructBuilder<'r> {
    registry: &'r TypeRegistry,
    name: String,
    fields: Vec<Field>,
    /// First failure while deriving a field type, reported by `build`.
    error: Option<Error>,
}

impl<'r> StructBuilder<'r> {
    /// Start a struct named `name`. An empty name declares an anonymous struct.
    pub fn new(registry: &'r TypeRegistry, name: impl Into<String>) -> Self {
        Self {
            registry,
            name: name.into(),
            fields: Vec::new(),
            error: None,
        }
    }

    fn derived_field(mut self, name: impl Into<String>, ty: Result<Arc<TypeDescriptor>>) -> Self {
        match ty {
            Ok(ty) => self.field(name, ty),
            Err(e) => {
                self.error.get_or_insert(e);
                self
            }
        }
    }

    /// Add a field with a type descriptor.
    pub fn field(mut self, name: impl Into<String>, ty: Arc<TypeDescriptor>) -> Self {
        self.fields.push(Field::new(name, ty));
        self
    }

    /// Add a field of a builtin type, by C name.
    ///
    /// Unknown names are kept as `void`, which the layout rejects.
    pub fn builtin_field(self, name: impl Into<String>, c_name: &str) -> Self {
        let ty = self
            .registry
            .builtin(c_name)
            .unwrap_or_else(|| self.registry.void());
        self.field(name, ty)
    }

    /// Add an inline array field `elem[len]`.
    pub fn array_field(
        self,
        name: impl Into<String>,
        elem: &Arc<TypeDescriptor>,
        len: usize,
    ) -> Self {
        let ty = self.registry.array_of(len, elem);
        self.derived_field(name, ty)
    }

    /// Add a pointer field `elem*`.
    pub fn pointer_field(self, name: impl Into<String>, elem: &Arc<TypeDescriptor>) -> Self {
        let ty = self.registry.pointer_to(elem);
        self.derived_field(name, ty)
    }

    /// Declare the struct.
    pub fn build(self) -> Result<Arc<TypeDescriptor>> {
        if let Some(e) = self.error {
            return Err(e);
        }
        self.registry.declare_struct(&self.name, &self.fields)
    }
}
