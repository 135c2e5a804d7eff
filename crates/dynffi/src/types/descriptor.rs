// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type descriptors for runtime C type information.

use crate::config::{POINTER_ALIGN, POINTER_SIZE};
use crate::types::Kind;
use std::any::TypeId;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Link from a descriptor to the host type it mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeType {
    pub id: TypeId,
    pub name: &'static str,
}

impl NativeType {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }
}

/// Field of a struct declaration, before layout.
#[derive(Debug, Clone)]
pub struct Field {
    /// Field name.
    pub name: String,
    /// Field type.
    pub ty: Arc<TypeDescriptor>,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: Arc<TypeDescriptor>) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Field of a laid-out struct.
#[derive(Debug, Clone, PartialEq)]
pub struct StructField {
    /// Field name.
    pub name: String,
    /// Field type.
    pub ty: Arc<TypeDescriptor>,
    /// Offset within the struct, in bytes.
    pub offset: usize,
}

/// Byte offsets of the three words of a slice header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceHeader {
    pub len_offset: usize,
    pub cap_offset: usize,
    pub data_offset: usize,
}

/// Structural part of a descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Integer, floating point or void.
    Scalar,
    /// Pointer to `elem`.
    Pointer(Arc<TypeDescriptor>),
    /// Fixed-length inline array.
    Array { elem: Arc<TypeDescriptor>, len: usize },
    /// Variable-length sequence behind a `(len, cap, data)` header.
    Slice {
        elem: Arc<TypeDescriptor>,
        header: SliceHeader,
    },
    /// Struct with laid-out fields.
    Struct(Vec<StructField>),
}

/// A complete, laid-out type descriptor.
///
/// Descriptors are shared as `Arc<TypeDescriptor>` and never change once
/// registered. The only exception is the native type link, which can be set
/// once.
pub struct TypeDescriptor {
    name: String,
    kind: Kind,
    size: usize,
    align: usize,
    shape: Shape,
    native: OnceLock<NativeType>,
}

impl TypeDescriptor {
    pub(crate) fn scalar(name: impl Into<String>, kind: Kind, size: usize, align: usize) -> Self {
        Self::from_parts(name, kind, size, align, Shape::Scalar)
    }

    pub(crate) fn pointer(name: impl Into<String>, elem: Arc<TypeDescriptor>) -> Self {
        Self::from_parts(
            name,
            Kind::Pointer,
            POINTER_SIZE,
            POINTER_ALIGN,
            Shape::Pointer(elem),
        )
    }

    pub(crate) fn from_parts(
        name: impl Into<String>,
        kind: Kind,
        size: usize,
        align: usize,
        shape: Shape,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            size,
            align,
            shape,
            native: OnceLock::new(),
        }
    }

    /// Registry name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Number of bytes needed to store a value of this type.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Alignment in bytes.
    pub fn align(&self) -> usize {
        self.align
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Element type of a pointer, array or slice.
    pub fn elem(&self) -> Option<&Arc<TypeDescriptor>> {
        match &self.shape {
            Shape::Pointer(elem) | Shape::Array { elem, .. } | Shape::Slice { elem, .. } => {
                Some(elem)
            }
            _ => None,
        }
    }

    /// Declared length of an array type.
    pub fn array_len(&self) -> Option<usize> {
        match &self.shape {
            Shape::Array { len, .. } => Some(*len),
            _ => None,
        }
    }

    /// Fields of a struct type.
    pub fn fields(&self) -> Option<&[StructField]> {
        match &self.shape {
            Shape::Struct(fields) => Some(fields),
            _ => None,
        }
    }

    /// Field count (0 for non-struct types).
    pub fn num_field(&self) -> usize {
        self.fields().map_or(0, <[StructField]>::len)
    }

    /// Field `i` of a struct type.
    pub fn field(&self, i: usize) -> Option<&StructField> {
        self.fields()?.get(i)
    }

    /// Field lookup by name.
    pub fn field_by_name(&self, name: &str) -> Option<(usize, &StructField)> {
        self.fields()?
            .iter()
            .enumerate()
            .find(|(_, f)| f.name == name)
    }

    pub(crate) fn slice_header(&self) -> Option<SliceHeader> {
        match &self.shape {
            Shape::Slice { header, .. } => Some(*header),
            _ => None,
        }
    }

    /// Host type this descriptor is linked to, if any.
    pub fn native_type(&self) -> Option<NativeType> {
        self.native.get().copied()
    }

    /// Link the descriptor to a host type. Returns the link in place, which
    /// differs from `native` when another type got there first.
    pub(crate) fn link_native(&self, native: NativeType) -> NativeType {
        *self.native.get_or_init(|| native)
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.kind == other.kind
            && self.size == other.size
            && self.align == other.align
            && self.shape == other.shape
    }
}

impl fmt::Debug for TypeDescriptor {
    // Children are printed by name only; nested descriptors can be deep.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("TypeDescriptor");
        s.field("name", &self.name)
            .field("kind", &self.kind)
            .field("size", &self.size)
            .field("align", &self.align);
        match &self.shape {
            Shape::Scalar => {}
            Shape::Pointer(elem) | Shape::Slice { elem, .. } => {
                s.field("elem", &elem.name);
            }
            Shape::Array { elem, len } => {
                s.field("elem", &elem.name).field("len", len);
            }
            Shape::Struct(fields) => {
                let names: Vec<(&str, &str, usize)> = fields
                    .iter()
                    .map(|fd| (fd.name.as_str(), fd.ty.name(), fd.offset))
                    .collect();
                s.field("fields", &names);
            }
        }
        s.finish()
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
