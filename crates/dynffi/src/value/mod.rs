// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Typed views over raw memory.
//!
//! A [`Value`] is a descriptor plus a location inside an [`Arena`] region.
//! Views obtained through [`Value::field`], [`Value::index`] or
//! [`Value::elem`] share the underlying bytes, so a write through any of them
//! is visible through all others.
//!
//! # Example
//!
//! ```rust
//! use dynffi::{Arena, NaturalAbi, StructBuilder, TypeRegistry};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(TypeRegistry::new(Arc::new(NaturalAbi::new())));
//! let pair = StructBuilder::new(&registry, "Pair")
//!     .field("a", registry.int16())
//!     .field("b", registry.double())
//!     .build()
//!     .unwrap();
//!
//! let arena = Arena::new(registry.clone());
//! let value = arena.alloc(&pair).unwrap();
//! value.field(0).unwrap().set_i64(-2).unwrap();
//! value.field_by_name("b").unwrap().unwrap().set_f64(0.5).unwrap();
//!
//! assert_eq!(value.field(0).unwrap().as_i64().unwrap(), -2);
//! assert_eq!(value.to_bytes().unwrap().len(), 16);
//! ```

mod memory;
mod slice;

pub use memory::Arena;
pub use slice::grown_capacity;

use crate::error::{Error, Result};
use crate::marshal::{Decoder, Encoder, Marshal};
use crate::types::{is_compatible, Kind, NativeType, TypeDescriptor};
use memory::Region;
use std::fmt;
use std::mem::size_of;
use std::rc::Rc;
use std::sync::Arc;

const WORD: usize = size_of::<usize>();

/// A typed handle over bytes owned by an [`Arena`].
#[derive(Clone)]
pub struct Value {
    desc: Arc<TypeDescriptor>,
    arena: Arena,
    region: Rc<Region>,
    offset: usize,
}

impl Value {
    pub(crate) fn new(
        desc: Arc<TypeDescriptor>,
        arena: Arena,
        region: Rc<Region>,
        offset: usize,
    ) -> Self {
        Self {
            desc,
            arena,
            region,
            offset,
        }
    }

    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.desc
    }

    pub fn kind(&self) -> Kind {
        self.desc.kind()
    }

    pub fn native_type(&self) -> Option<NativeType> {
        self.desc.native_type()
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Size of the value in bytes.
    pub fn size(&self) -> usize {
        self.desc.size()
    }

    /// Address of the first byte.
    pub fn address(&self) -> usize {
        self.region.addr() + self.offset
    }

    /// Pointer to the value's bytes, for handing to foreign code.
    pub fn as_ptr(&self) -> *const u8 {
        self.region.ptr_at(self.offset)
    }

    pub fn as_mut_ptr(&self) -> *mut u8 {
        self.region.ptr_at(self.offset)
    }

    /// Copy of the value's bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.size()];
        self.region.read(self.offset, &mut buf)?;
        Ok(buf)
    }

    // -----------------------------------------------------------------------
    // Raw access
    // -----------------------------------------------------------------------

    fn mismatch(&self, method: &'static str) -> Error {
        Error::KindMismatch {
            method,
            kind: self.kind(),
        }
    }

    fn read_at<const N: usize>(&self, at: usize) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.region.read(self.offset + at, &mut buf)?;
        Ok(buf)
    }

    pub(crate) fn write_at(&self, at: usize, bytes: &[u8]) -> Result<()> {
        self.region.write(self.offset + at, bytes)
    }

    pub(crate) fn read_word(&self, at: usize) -> Result<usize> {
        Ok(usize::from_ne_bytes(self.read_at::<WORD>(at)?))
    }

    /// Store an address word at `at`. The region it points into stays alive
    /// as long as this value's region does.
    pub(crate) fn write_address(&self, at: usize, addr: usize) -> Result<()> {
        self.write_at(at, &addr.to_ne_bytes())?;
        let target = match addr {
            0 => None,
            addr => self.arena.resolve(addr, 0).ok().map(|(region, _)| region),
        };
        self.region.retain(self.offset + at, target);
        Ok(())
    }

    fn read_signed(&self) -> Result<i64> {
        Ok(match self.size() {
            1 => i8::from_ne_bytes(self.read_at(0)?) as i64,
            2 => i16::from_ne_bytes(self.read_at(0)?) as i64,
            4 => i32::from_ne_bytes(self.read_at(0)?) as i64,
            8 => i64::from_ne_bytes(self.read_at(0)?),
            n => return Err(Error::InvalidLength(format!("{}-byte integer", n))),
        })
    }

    fn read_unsigned(&self) -> Result<u64> {
        Ok(match self.size() {
            1 => u8::from_ne_bytes(self.read_at(0)?) as u64,
            2 => u16::from_ne_bytes(self.read_at(0)?) as u64,
            4 => u32::from_ne_bytes(self.read_at(0)?) as u64,
            8 => u64::from_ne_bytes(self.read_at(0)?),
            n => return Err(Error::InvalidLength(format!("{}-byte integer", n))),
        })
    }

    /// Store the low `size()` bytes of `bits`.
    fn write_truncated(&self, bits: u64) -> Result<()> {
        match self.size() {
            1 => self.write_at(0, &(bits as u8).to_ne_bytes()),
            2 => self.write_at(0, &(bits as u16).to_ne_bytes()),
            4 => self.write_at(0, &(bits as u32).to_ne_bytes()),
            8 => self.write_at(0, &bits.to_ne_bytes()),
            n => Err(Error::InvalidLength(format!("{}-byte integer", n))),
        }
    }

    /// View `desc` at `at` bytes into this value.
    fn view(&self, desc: Arc<TypeDescriptor>, at: usize) -> Value {
        Value::new(desc, self.arena.clone(), self.region.clone(), self.offset + at)
    }

    /// View `desc` at an absolute address of this value's arena.
    fn view_address(&self, desc: Arc<TypeDescriptor>, addr: usize) -> Result<Value> {
        let (region, offset) = self.arena.resolve(addr, desc.size())?;
        Ok(Value::new(desc, self.arena.clone(), region, offset))
    }

    fn elem_desc(&self, method: &'static str) -> Result<Arc<TypeDescriptor>> {
        self.desc.elem().cloned().ok_or_else(|| self.mismatch(method))
    }

    // -----------------------------------------------------------------------
    // Scalars
    // -----------------------------------------------------------------------

    /// Read a signed integer (`Int8`..`Int64`, `Int`, `Long`).
    pub fn as_i64(&self) -> Result<i64> {
        if !self.kind().is_signed() {
            return Err(self.mismatch("Value::as_i64"));
        }
        self.read_signed()
    }

    /// Read an unsigned integer or a pointer address.
    pub fn as_u64(&self) -> Result<u64> {
        if !self.kind().is_unsigned() && self.kind() != Kind::Pointer {
            return Err(self.mismatch("Value::as_u64"));
        }
        self.read_unsigned()
    }

    /// Read a `Float` or `Double`.
    pub fn as_f64(&self) -> Result<f64> {
        match self.kind() {
            Kind::Float => Ok(f32::from_ne_bytes(self.read_at(0)?) as f64),
            Kind::Double => Ok(f64::from_ne_bytes(self.read_at(0)?)),
            Kind::LongDouble => Err(Error::Unimplemented("long double arithmetic")),
            _ => Err(self.mismatch("Value::as_f64")),
        }
    }

    /// Store a signed integer, truncated to the value's width.
    pub fn set_i64(&self, v: i64) -> Result<()> {
        if !self.kind().is_signed() {
            return Err(self.mismatch("Value::set_i64"));
        }
        self.write_truncated(v as u64)
    }

    /// Store an unsigned integer (or pointer address), truncated to the
    /// value's width.
    pub fn set_u64(&self, v: u64) -> Result<()> {
        match self.kind() {
            Kind::Pointer => self.write_address(0, v as usize),
            kind if kind.is_unsigned() => self.write_truncated(v),
            _ => Err(self.mismatch("Value::set_u64")),
        }
    }

    pub fn set_f64(&self, v: f64) -> Result<()> {
        match self.kind() {
            Kind::Float => self.write_at(0, &(v as f32).to_ne_bytes()),
            Kind::Double => self.write_at(0, &v.to_ne_bytes()),
            Kind::LongDouble => Err(Error::Unimplemented("long double arithmetic")),
            _ => Err(self.mismatch("Value::set_f64")),
        }
    }

    // -----------------------------------------------------------------------
    // Structs
    // -----------------------------------------------------------------------

    pub fn num_field(&self) -> Result<usize> {
        match self.desc.fields() {
            Some(fields) => Ok(fields.len()),
            None => Err(self.mismatch("Value::num_field")),
        }
    }

    /// Field `i` of a struct, sharing this value's memory.
    pub fn field(&self, i: usize) -> Result<Value> {
        let fields = self
            .desc
            .fields()
            .ok_or_else(|| self.mismatch("Value::field"))?;
        let field = fields.get(i).ok_or(Error::IndexOutOfRange {
            what: "field",
            index: i,
            len: fields.len(),
        })?;
        Ok(self.view(field.ty.clone(), field.offset))
    }

    /// Field named `name`, or `None` when the struct has no such field.
    pub fn field_by_name(&self, name: &str) -> Result<Option<Value>> {
        if self.kind() != Kind::Struct {
            return Err(self.mismatch("Value::field_by_name"));
        }
        Ok(self
            .desc
            .field_by_name(name)
            .map(|(_, field)| self.view(field.ty.clone(), field.offset)))
    }

    /// Nested field by index path. A pointer met between two hops is
    /// dereferenced.
    pub fn field_by_index(&self, path: &[usize]) -> Result<Value> {
        let mut current = self.clone();
        for &i in path {
            if current.kind() == Kind::Pointer {
                current = current.elem()?;
            }
            current = current.field(i)?;
        }
        Ok(current)
    }

    // -----------------------------------------------------------------------
    // Arrays and slices
    // -----------------------------------------------------------------------

    /// Element count of an array or slice.
    pub fn len(&self) -> Result<usize> {
        match self.kind() {
            Kind::Array => Ok(self.desc.array_len().unwrap_or(0)),
            Kind::Slice => Ok(self.slice_parts()?.0),
            _ => Err(self.mismatch("Value::len")),
        }
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Capacity of a slice. Arrays report their length.
    pub fn cap(&self) -> Result<usize> {
        match self.kind() {
            Kind::Array => Ok(self.desc.array_len().unwrap_or(0)),
            Kind::Slice => Ok(self.slice_parts()?.1),
            _ => Err(self.mismatch("Value::cap")),
        }
    }

    /// Set a slice's length. `n` must not exceed the capacity.
    pub fn set_len(&self, n: usize) -> Result<()> {
        if self.kind() != Kind::Slice {
            return Err(self.mismatch("Value::set_len"));
        }
        let (_, cap, data) = self.slice_parts()?;
        if n > cap {
            return Err(Error::InvalidLength(format!(
                "length {} exceeds capacity {}",
                n, cap
            )));
        }
        self.write_slice_header(n, cap, data)
    }

    /// Element `i` of an array or slice, sharing memory.
    pub fn index(&self, i: usize) -> Result<Value> {
        let elem = self.elem_desc("Value::index")?;
        match self.kind() {
            Kind::Array => {
                let len = self.desc.array_len().unwrap_or(0);
                if i >= len {
                    return Err(Error::IndexOutOfRange {
                        what: "array",
                        index: i,
                        len,
                    });
                }
                let at = i * elem.size();
                Ok(self.view(elem, at))
            }
            Kind::Slice => {
                let (len, _, data) = self.slice_parts()?;
                if i >= len {
                    return Err(Error::IndexOutOfRange {
                        what: "slice",
                        index: i,
                        len,
                    });
                }
                let addr = i
                    .checked_mul(elem.size())
                    .and_then(|at| data.checked_add(at))
                    .ok_or(Error::UnmappedAddress(data))?;
                self.view_address(elem, addr)
            }
            _ => Err(self.mismatch("Value::index")),
        }
    }

    /// Slice `[begin, end)` of an array or slice, sharing storage.
    ///
    /// Requires `begin <= end <= cap()`. The result is a new slice header
    /// allocated in the same arena.
    pub fn slice(&self, begin: usize, end: usize) -> Result<Value> {
        let (base, cap) = match self.kind() {
            Kind::Array => (self.address(), self.desc.array_len().unwrap_or(0)),
            Kind::Slice => {
                let (_, cap, data) = self.slice_parts()?;
                (data, cap)
            }
            _ => return Err(self.mismatch("Value::slice")),
        };
        if end > cap {
            return Err(Error::IndexOutOfRange {
                what: "slice bound",
                index: end,
                len: cap,
            });
        }
        if begin > end {
            return Err(Error::IndexOutOfRange {
                what: "slice start",
                index: begin,
                len: end,
            });
        }

        let elem = self.elem_desc("Value::slice")?;
        let desc = self.arena.registry().slice_of(&elem)?;
        let new_cap = cap - begin;
        let data = if new_cap == 0 {
            0
        } else {
            begin
                .checked_mul(elem.size())
                .and_then(|at| base.checked_add(at))
                .ok_or(Error::UnmappedAddress(base))?
        };
        let header = self.arena.alloc(&desc)?;
        header.write_slice_header(end - begin, new_cap, data)?;
        Ok(header)
    }

    /// `(len, cap, data)` of a slice header.
    pub(crate) fn slice_parts(&self) -> Result<(usize, usize, usize)> {
        let header = self
            .desc
            .slice_header()
            .ok_or_else(|| self.mismatch("Value::slice_header"))?;
        let len = isize::from_ne_bytes(self.read_at::<WORD>(header.len_offset)?);
        let cap = isize::from_ne_bytes(self.read_at::<WORD>(header.cap_offset)?);
        if len < 0 || cap < 0 || len > cap {
            return Err(Error::InvalidLength(format!(
                "corrupt slice header (len {}, cap {})",
                len, cap
            )));
        }
        let data = self.read_word(header.data_offset)?;
        Ok((len as usize, cap as usize, data))
    }

    pub(crate) fn write_slice_header(&self, len: usize, cap: usize, data: usize) -> Result<()> {
        let header = self
            .desc
            .slice_header()
            .ok_or_else(|| self.mismatch("Value::slice_header"))?;
        let to_word = |n: usize| {
            isize::try_from(n).map_err(|_| Error::InvalidLength(format!("{} elements", n)))
        };
        self.write_at(header.len_offset, &to_word(len)?.to_ne_bytes())?;
        self.write_at(header.cap_offset, &to_word(cap)?.to_ne_bytes())?;
        self.write_address(header.data_offset, data)
    }

    // -----------------------------------------------------------------------
    // Pointers
    // -----------------------------------------------------------------------

    /// Pointee of a pointer value.
    pub fn elem(&self) -> Result<Value> {
        if self.kind() != Kind::Pointer {
            return Err(self.mismatch("Value::elem"));
        }
        let elem = self.elem_desc("Value::elem")?;
        match self.read_word(0)? {
            0 => Err(Error::NilPointer(self.desc.name().to_string())),
            addr => self.view_address(elem, addr),
        }
    }

    /// Whether a pointer (or a slice's data pointer) is null.
    pub fn is_nil(&self) -> Result<bool> {
        match self.kind() {
            Kind::Pointer => Ok(self.read_word(0)? == 0),
            Kind::Slice => Ok(self.slice_parts()?.2 == 0),
            _ => Err(self.mismatch("Value::is_nil")),
        }
    }

    /// Store a raw address in a pointer value.
    pub fn set_pointer(&self, addr: usize) -> Result<()> {
        if self.kind() != Kind::Pointer {
            return Err(self.mismatch("Value::set_pointer"));
        }
        self.write_address(0, addr)
    }

    /// Make this pointer point at `target`.
    pub fn point_to(&self, target: &Value) -> Result<()> {
        if self.kind() != Kind::Pointer {
            return Err(self.mismatch("Value::point_to"));
        }
        let elem = self.elem_desc("Value::point_to")?;
        if elem.kind() != Kind::Void && !is_compatible(&elem, &target.desc) {
            return Err(Error::incompatible(elem.name(), target.desc.name()));
        }
        self.write_address(0, target.address())
    }

    /// Pointee for pointers, the value itself otherwise.
    pub fn indirect(&self) -> Result<Value> {
        if self.kind() == Kind::Pointer {
            self.elem()
        } else {
            Ok(self.clone())
        }
    }

    /// New pointer value holding this value's address.
    pub fn address_of(&self) -> Result<Value> {
        let desc = self.arena.registry().pointer_to(&self.desc)?;
        let ptr = self.arena.alloc(&desc)?;
        ptr.write_address(0, self.address())?;
        Ok(ptr)
    }

    // -----------------------------------------------------------------------
    // Whole-value operations
    // -----------------------------------------------------------------------

    /// Encode `x` into this value.
    pub fn set_value<T: Marshal>(&self, x: &T) -> Result<()> {
        Encoder::new(self).encode(x)
    }

    /// Decode this value into a host value.
    pub fn get<T: Marshal>(&self) -> Result<T> {
        Decoder::new(self).decode()
    }

    /// Copy the bytes of `src` into this value. Both must have the same size.
    /// Address words copied along keep their targets alive.
    pub fn copy_from(&self, src: &Value) -> Result<()> {
        if src.size() != self.size() {
            return Err(Error::incompatible(self.desc.name(), src.desc.name()));
        }
        let bytes = src.to_bytes()?;
        self.write_at(0, &bytes)?;
        self.region
            .copy_refs(self.offset, &src.region, src.offset, self.size());
        Ok(())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value")
            .field("type", &self.desc.name())
            .field("kind", &self.kind())
            .field("addr", &format_args!("{:#x}", self.address()))
            .field("size", &self.size())
            .finish()
    }
}

#[cfg(test)]
mod tests;
