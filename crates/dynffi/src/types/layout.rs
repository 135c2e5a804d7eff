// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Composite layout, delegated to the call engine.
//!
//! A struct is laid out by building a candidate descriptor with zero
//! offsets, preparing a trial signature that returns it, and copying the
//! engine's solved layout back into a new descriptor.

use crate::abi::{Abi, AbiError, CallEngine};
use crate::error::Result;
use crate::types::{Field, Kind, Shape, SliceHeader, StructField, TypeDescriptor};
use std::sync::Arc;

/// Lay out a struct named `name` from `fields`.
pub(crate) fn struct_descriptor(
    engine: &dyn CallEngine,
    abi: Abi,
    name: &str,
    fields: &[Field],
) -> Result<TypeDescriptor> {
    let candidate: Vec<StructField> = fields
        .iter()
        .map(|f| StructField {
            name: f.name.clone(),
            ty: f.ty.clone(),
            offset: 0,
        })
        .collect();
    let trial = Arc::new(TypeDescriptor::from_parts(
        name,
        Kind::Struct,
        0,
        0,
        Shape::Struct(candidate.clone()),
    ));

    let sig = engine.prepare(abi, &trial, &[])?;
    let solved = sig.ret_layout;
    if solved.offsets.len() != candidate.len() {
        return Err(AbiError::BadTypedef(format!(
            "engine returned {} offsets for {} fields of [{}]",
            solved.offsets.len(),
            candidate.len(),
            name
        ))
        .into());
    }

    let laid_out = candidate
        .into_iter()
        .zip(solved.offsets.iter())
        .map(|(field, &offset)| StructField { offset, ..field })
        .collect();

    Ok(TypeDescriptor::from_parts(
        name,
        Kind::Struct,
        solved.size,
        solved.align,
        Shape::Struct(laid_out),
    ))
}

/// Lay out `[elem; len]`.
pub(crate) fn array_descriptor(elem: Arc<TypeDescriptor>, len: usize) -> TypeDescriptor {
    let name = format!("{}[{}]", elem.name(), len);
    let size = elem.size() * len;
    let align = elem.align();
    TypeDescriptor::from_parts(name, Kind::Array, size, align, Shape::Array { elem, len })
}

/// Lay out a slice header `(len: isize, cap: isize, data: *elem)`.
pub(crate) fn slice_descriptor(
    engine: &dyn CallEngine,
    abi: Abi,
    word: Arc<TypeDescriptor>,
    data: Arc<TypeDescriptor>,
    elem: Arc<TypeDescriptor>,
) -> Result<TypeDescriptor> {
    let name = format!("{}[]", elem.name());
    let header = struct_descriptor(
        engine,
        abi,
        &name,
        &[
            Field::new("len", word.clone()),
            Field::new("cap", word),
            Field::new("data", data),
        ],
    )?;

    let offsets: Vec<usize> = header
        .fields()
        .unwrap_or_default()
        .iter()
        .map(|f| f.offset)
        .collect();
    let header_offsets = match offsets.as_slice() {
        [len_offset, cap_offset, data_offset] => SliceHeader {
            len_offset: *len_offset,
            cap_offset: *cap_offset,
            data_offset: *data_offset,
        },
        _ => {
            return Err(AbiError::BadTypedef(format!(
                "engine returned {} offsets for slice header [{}]",
                offsets.len(),
                name
            ))
            .into())
        }
    };

    Ok(TypeDescriptor::from_parts(
        name,
        Kind::Slice,
        header.size(),
        header.align(),
        Shape::Slice {
            elem,
            header: header_offsets,
        },
    ))
}
