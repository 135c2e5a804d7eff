// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bridge between Rust values and raw [`Value`] memory.
//!
//! [`Describe`] maps a Rust type to a descriptor; [`Marshal`] copies data in
//! and out of a value of that descriptor. Both are implemented here for
//! fixed-width scalars, arrays, `Vec`, raw pointers and `()`, and can be
//! derived for structs with `#[derive(Marshal)]`.
//!
//! Integer types map to fixed-width C types (`i32` is `int32`, not `int`).

mod decoder;
mod encoder;

pub use decoder::Decoder;
pub use encoder::Encoder;

use crate::error::{Error, Result};
use crate::types::{Kind, TypeDescriptor, TypeRegistry};
use crate::value::Value;
use std::sync::Arc;

/// Rust types with a runtime C type.
pub trait Describe {
    /// Descriptor for `Self`, interned in `registry`.
    fn describe(registry: &TypeRegistry) -> Result<Arc<TypeDescriptor>>;
}

/// Rust types that can be copied to and from raw values.
///
/// Implementations assume `value` has a descriptor compatible with
/// `Self::describe`; [`Encoder`] and [`Decoder`] check that first.
pub trait Marshal: Describe + Sized {
    fn encode_into(&self, value: &Value) -> Result<()>;

    fn decode_from(value: &Value) -> Result<Self>;
}

// ---------------------------------------------------------------------------
// Scalars
// ---------------------------------------------------------------------------

macro_rules! impl_marshal_int {
    ($($t:ty => $ctor:ident, $set:ident, $get:ident, $wide:ty;)*) => {$(
        impl Describe for $t {
            fn describe(registry: &TypeRegistry) -> Result<Arc<TypeDescriptor>> {
                Ok(registry.$ctor())
            }
        }

        impl Marshal for $t {
            fn encode_into(&self, value: &Value) -> Result<()> {
                value.$set(*self as $wide)
            }

            fn decode_from(value: &Value) -> Result<Self> {
                Ok(value.$get()? as $t)
            }
        }
    )*};
}

impl_marshal_int! {
    i8 => int8, set_i64, as_i64, i64;
    i16 => int16, set_i64, as_i64, i64;
    i32 => int32, set_i64, as_i64, i64;
    i64 => int64, set_i64, as_i64, i64;
    u8 => uint8, set_u64, as_u64, u64;
    u16 => uint16, set_u64, as_u64, u64;
    u32 => uint32, set_u64, as_u64, u64;
    u64 => uint64, set_u64, as_u64, u64;
}

impl Describe for f32 {
    fn describe(registry: &TypeRegistry) -> Result<Arc<TypeDescriptor>> {
        Ok(registry.float())
    }
}

impl Marshal for f32 {
    fn encode_into(&self, value: &Value) -> Result<()> {
        value.set_f64(f64::from(*self))
    }

    fn decode_from(value: &Value) -> Result<Self> {
        Ok(value.as_f64()? as f32)
    }
}

impl Describe for f64 {
    fn describe(registry: &TypeRegistry) -> Result<Arc<TypeDescriptor>> {
        Ok(registry.double())
    }
}

impl Marshal for f64 {
    fn encode_into(&self, value: &Value) -> Result<()> {
        value.set_f64(*self)
    }

    fn decode_from(value: &Value) -> Result<Self> {
        value.as_f64()
    }
}

impl Describe for () {
    fn describe(registry: &TypeRegistry) -> Result<Arc<TypeDescriptor>> {
        Ok(registry.void())
    }
}

impl Marshal for () {
    fn encode_into(&self, _value: &Value) -> Result<()> {
        Ok(())
    }

    fn decode_from(_value: &Value) -> Result<Self> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Arrays and sequences
// ---------------------------------------------------------------------------

impl<T: Describe, const N: usize> Describe for [T; N] {
    fn describe(registry: &TypeRegistry) -> Result<Arc<TypeDescriptor>> {
        let elem = T::describe(registry)?;
        registry.array_of(N, &elem)
    }
}

impl<T: Marshal, const N: usize> Marshal for [T; N] {
    fn encode_into(&self, value: &Value) -> Result<()> {
        let len = value.len()?;
        if len != N {
            return Err(Error::InvalidLength(format!(
                "array of {} elements encoded into {} slots",
                N, len
            )));
        }
        for (i, item) in self.iter().enumerate() {
            item.encode_into(&value.index(i)?)?;
        }
        Ok(())
    }

    fn decode_from(value: &Value) -> Result<Self> {
        let items = decode_elements::<T>(value)?;
        let len = items.len();
        items.try_into().map_err(|_| {
            Error::InvalidLength(format!("{} elements decoded into [_; {}]", len, N))
        })
    }
}

impl<T: Describe> Describe for Vec<T> {
    fn describe(registry: &TypeRegistry) -> Result<Arc<TypeDescriptor>> {
        let elem = T::describe(registry)?;
        registry.slice_of(&elem)
    }
}

impl<T: Marshal> Marshal for Vec<T> {
    fn encode_into(&self, value: &Value) -> Result<()> {
        if value.kind() != Kind::Slice {
            return Err(Error::KindMismatch {
                method: "Vec::encode_into",
                kind: value.kind(),
            });
        }
        let grown = value.ensure_capacity(self.len())?;
        value.copy_from(&grown)?;
        value.set_len(self.len())?;
        for (i, item) in self.iter().enumerate() {
            item.encode_into(&value.index(i)?)?;
        }
        Ok(())
    }

    fn decode_from(value: &Value) -> Result<Self> {
        decode_elements(value)
    }
}

fn decode_elements<T: Marshal>(value: &Value) -> Result<Vec<T>> {
    let len = value.len()?;
    let mut items = Vec::with_capacity(len);
    for i in 0..len {
        items.push(T::decode_from(&value.index(i)?)?);
    }
    Ok(items)
}

// ---------------------------------------------------------------------------
// Pointers and strings
// ---------------------------------------------------------------------------

macro_rules! impl_marshal_ptr {
    ($($ptr:ty),*) => {$(
        impl<T: Describe> Describe for $ptr {
            fn describe(registry: &TypeRegistry) -> Result<Arc<TypeDescriptor>> {
                let elem = T::describe(registry)?;
                registry.pointer_to(&elem)
            }
        }

        impl<T: Describe> Marshal for $ptr {
            fn encode_into(&self, value: &Value) -> Result<()> {
                value.set_pointer(*self as usize)
            }

            fn decode_from(_value: &Value) -> Result<Self> {
                Err(Error::Unimplemented("pointer decoding"))
            }
        }
    )*};
}

impl_marshal_ptr!(*const T, *mut T);

impl Describe for String {
    fn describe(_registry: &TypeRegistry) -> Result<Arc<TypeDescriptor>> {
        Err(Error::Unimplemented("string types"))
    }
}

impl Marshal for String {
    fn encode_into(&self, _value: &Value) -> Result<()> {
        Err(Error::Unimplemented("string types"))
    }

    fn decode_from(_value: &Value) -> Result<Self> {
        Err(Error::Unimplemented("string types"))
    }
}

impl Describe for &str {
    fn describe(_registry: &TypeRegistry) -> Result<Arc<TypeDescriptor>> {
        Err(Error::Unimplemented("string types"))
    }
}

impl Marshal for &str {
    fn encode_into(&self, _value: &Value) -> Result<()> {
        Err(Error::Unimplemented("string types"))
    }

    fn decode_from(_value: &Value) -> Result<Self> {
        Err(Error::Unimplemented("string types"))
    }
}
