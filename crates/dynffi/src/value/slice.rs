// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Slice construction and amortized growth.

use super::memory::Region;
use super::{Arena, Value};
use crate::error::{Error, Result};
use crate::types::{Kind, TypeDescriptor};
use std::rc::Rc;
use std::sync::Arc;

/// Capacity to allocate when a slice of capacity `cap` must hold `new_len`
/// elements.
///
/// An empty slice gets exactly `new_len`. Otherwise the capacity doubles
/// while below `threshold`, then grows by a quarter, until it covers
/// `new_len`.
pub fn grown_capacity(cap: usize, new_len: usize, threshold: usize) -> usize {
    if cap == 0 {
        return new_len;
    }
    let mut m = cap;
    while m < new_len {
        if m < threshold {
            m *= 2;
        } else {
            m += (m / 4).max(1);
        }
    }
    m
}

impl Arena {
    /// Allocate a slice of type `desc` with `len` zeroed elements and room for
    /// `cap`. A zero capacity leaves the data pointer null.
    pub fn make_slice(&self, desc: &Arc<TypeDescriptor>, len: usize, cap: usize) -> Result<Value> {
        if desc.kind() != Kind::Slice {
            return Err(Error::KindMismatch {
                method: "Arena::make_slice",
                kind: desc.kind(),
            });
        }
        if len > cap {
            return Err(Error::InvalidLength(format!(
                "length {} exceeds capacity {}",
                len, cap
            )));
        }
        let data = self.alloc_data(desc, cap)?;
        let header = self.alloc(desc)?;
        header.write_slice_header(len, cap, data.as_ref().map_or(0, |r| r.addr()))?;
        Ok(header)
    }

    /// Backing storage for `cap` elements of a slice. The region must stay
    /// referenced until a header points at it.
    fn alloc_data(&self, desc: &TypeDescriptor, cap: usize) -> Result<Option<Rc<Region>>> {
        if cap == 0 {
            return Ok(None);
        }
        let elem = desc.elem().ok_or(Error::KindMismatch {
            method: "Arena::make_slice",
            kind: desc.kind(),
        })?;
        let bytes = elem
            .size()
            .checked_mul(cap)
            .ok_or_else(|| Error::InvalidLength(format!("{} x {} bytes", cap, elem.size())))?;
        self.alloc_region(bytes, elem.align()).map(Some)
    }
}

impl Value {
    /// Slice with room for `new_len` elements and length `new_len`.
    ///
    /// Within capacity this reslices `[0, new_len)` over the same storage.
    /// Beyond it, new storage is allocated (see [`grown_capacity`]) and the
    /// first `len()` elements are copied over. The returned header is a new
    /// value; callers holding the slice inside a struct copy it back with
    /// [`Value::copy_from`].
    pub fn ensure_capacity(&self, new_len: usize) -> Result<Value> {
        if self.kind() != Kind::Slice {
            return Err(Error::KindMismatch {
                method: "Value::ensure_capacity",
                kind: self.kind(),
            });
        }
        let (len, cap, data) = self.slice_parts()?;
        if new_len <= cap {
            return self.slice(0, new_len);
        }

        let arena = self.arena();
        let new_cap = grown_capacity(cap, new_len, arena.growth_threshold());
        let new_data = arena.alloc_data(self.descriptor(), new_cap)?;
        let new_addr = new_data.as_ref().map_or(0, |r| r.addr());

        let elem_size = self.descriptor().elem().map_or(0, |e| e.size());
        let used = len
            .checked_mul(elem_size)
            .ok_or_else(|| Error::InvalidLength(format!("{} x {} bytes", len, elem_size)))?;
        if let (Some(new), true) = (&new_data, used > 0) {
            let (old, old_offset) = arena.resolve(data, used)?;
            let mut buf = vec![0u8; used];
            old.read(old_offset, &mut buf)?;
            new.write(0, &buf)?;
            new.copy_refs(0, &old, old_offset, used);
        }

        log::debug!(
            "[slice] grew {} from cap {} to {} (len {} -> {})",
            self.descriptor().name(),
            cap,
            new_cap,
            len,
            new_len
        );

        let header = arena.alloc(self.descriptor())?;
        header.write_slice_header(new_len, new_cap, new_addr)?;
        Ok(header)
    }
}
