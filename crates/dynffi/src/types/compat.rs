// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use crate::types::{Kind, Shape, TypeDescriptor};

/// Structural compatibility between two descriptors.
///
/// Kinds must be equal. Structs additionally need the same field count and
/// pairwise compatible field types (names are not compared), arrays the same
/// length and compatible elements, pointers and slices compatible elements.
/// The relation is symmetric. `String` is never compatible.
pub fn is_compatible(a: &TypeDescriptor, b: &TypeDescriptor) -> bool {
    if std::ptr::eq(a, b) {
        return a.kind() != Kind::String;
    }
    if a.kind() != b.kind() {
        return false;
    }
    match (a.shape(), b.shape()) {
        (Shape::Scalar, Shape::Scalar) => a.kind() != Kind::String,
        (Shape::Pointer(x), Shape::Pointer(y)) => is_compatible(x, y),
        (Shape::Slice { elem: x, .. }, Shape::Slice { elem: y, .. }) => is_compatible(x, y),
        (Shape::Array { elem: x, len: n }, Shape::Array { elem: y, len: m }) => {
            n == m && is_compatible(x, y)
        }
        (Shape::Struct(xs), Shape::Struct(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .zip(ys)
                    .all(|(x, y)| is_compatible(&x.ty, &y.ty))
        }
        _ => false,
    }
}
