// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Arena of raw memory regions backing [`Value`]s.
//!
//! Regions hold real, aligned memory so that pointer words and slice headers
//! stored in them are valid for foreign code. Every access from this crate
//! goes through [`Region::read`] / [`Region::write`], which check bounds.
//! Addresses read back out of memory are mapped to their region through the
//! arena's address index.
//!
//! The index holds weak references. A region lives while a [`Value`] views
//! it or while an address word stored in another live region points into
//! it, and is freed when the last of those goes away. Regions kept alive
//! only by a cycle of address words are released with the arena.

use super::Value;
use crate::config::RuntimeConfig;
use crate::error::{Error, Result};
use crate::marshal::{Encoder, Marshal};
use crate::types::{Kind, TypeDescriptor, TypeRegistry};
use std::alloc::{self, Layout};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::ptr::NonNull;
use std::rc::{Rc, Weak};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Region
// ---------------------------------------------------------------------------

/// One contiguous block of memory.
pub(crate) struct Region {
    ptr: NonNull<u8>,
    len: usize,
    /// Allocation layout, `None` for borrowed memory.
    layout: Option<Layout>,
    /// Regions targeted by the address word stored at each offset.
    refs: RefCell<BTreeMap<usize, Rc<Region>>>,
}

impl Region {
    /// Allocate `len` zeroed bytes aligned to `align`.
    fn alloc(len: usize, align: usize) -> Result<Self> {
        // Zero-sized regions still get a unique address.
        let layout = Layout::from_size_align(len.max(1), align.max(1))
            .map_err(|e| Error::InvalidLength(format!("{} bytes @ {}: {}", len, align, e)))?;
        // SAFETY: layout has a non-zero size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let Some(ptr) = NonNull::new(raw) else {
            alloc::handle_alloc_error(layout)
        };
        Ok(Self {
            ptr,
            len,
            layout: Some(layout),
            refs: RefCell::default(),
        })
    }

    /// # Safety
    ///
    /// `ptr` must be valid for reads and writes of `len` bytes for as long as
    /// the region lives.
    unsafe fn borrowed(ptr: NonNull<u8>, len: usize) -> Self {
        Self {
            ptr,
            len,
            layout: None,
            refs: RefCell::default(),
        }
    }

    pub(crate) fn addr(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    fn check(&self, offset: usize, len: usize) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.len => Ok(()),
            _ => Err(Error::OutOfBounds {
                offset,
                len,
                region_len: self.len,
            }),
        }
    }

    pub(crate) fn read(&self, offset: usize, buf: &mut [u8]) -> Result<()> {
        self.check(offset, buf.len())?;
        // SAFETY: bounds checked above; buf is a distinct Rust buffer.
        unsafe {
            std::ptr::copy_nonoverlapping(self.ptr.as_ptr().add(offset), buf.as_mut_ptr(), buf.len());
        }
        Ok(())
    }

    pub(crate) fn write(&self, offset: usize, bytes: &[u8]) -> Result<()> {
        self.check(offset, bytes.len())?;
        // SAFETY: bounds checked above.
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.ptr.as_ptr().add(offset), bytes.len());
        }
        Ok(())
    }

    /// Raw pointer to `offset`. Callers bounds-check before dereferencing.
    pub(crate) fn ptr_at(&self, offset: usize) -> *mut u8 {
        self.ptr.as_ptr().wrapping_add(offset)
    }

    /// Record which region the address word at `offset` points into.
    /// `None` (null or foreign address) drops the previous target.
    pub(crate) fn retain(&self, offset: usize, target: Option<Rc<Region>>) {
        let mut refs = self.refs.borrow_mut();
        match target {
            Some(target) if !std::ptr::eq(Rc::as_ptr(&target), self) => {
                refs.insert(offset, target);
            }
            _ => {
                refs.remove(&offset);
            }
        }
    }

    /// Mirror the targets recorded for `src[src_offset..src_offset + len]`
    /// at `dst_offset`, after the bytes themselves were copied.
    pub(crate) fn copy_refs(&self, dst_offset: usize, src: &Region, src_offset: usize, len: usize) {
        let moved: Vec<(usize, Rc<Region>)> = src
            .refs
            .borrow()
            .range(src_offset..src_offset.saturating_add(len))
            .map(|(at, target)| (at - src_offset + dst_offset, target.clone()))
            .collect();
        let mut refs = self.refs.borrow_mut();
        let stale: Vec<usize> = refs
            .range(dst_offset..dst_offset.saturating_add(len))
            .map(|(at, _)| *at)
            .collect();
        for at in stale {
            refs.remove(&at);
        }
        for (at, target) in moved {
            if !std::ptr::eq(Rc::as_ptr(&target), self) {
                refs.insert(at, target);
            }
        }
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        if let Some(layout) = self.layout {
            // SAFETY: allocated in `Region::alloc` with this layout.
            unsafe { alloc::dealloc(self.ptr.as_ptr(), layout) };
        }
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region")
            .field("addr", &format_args!("{:#x}", self.addr()))
            .field("len", &self.len)
            .field("owned", &self.layout.is_some())
            .field("refs", &self.refs.borrow().len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Arena
// ---------------------------------------------------------------------------

/// Index size below which dead entries are left in place.
const PRUNE_MIN: usize = 64;

struct ArenaInner {
    registry: Arc<TypeRegistry>,
    growth_threshold: usize,
    regions: RefCell<BTreeMap<usize, Weak<Region>>>,
    /// Index length that triggers the next sweep of dead entries.
    prune_at: Cell<usize>,
}

impl Drop for ArenaInner {
    fn drop(&mut self) {
        // Whatever is still alive is held by address-word cycles.
        let live: Vec<Rc<Region>> = self
            .regions
            .get_mut()
            .values()
            .filter_map(Weak::upgrade)
            .collect();
        for region in &live {
            let refs = std::mem::take(&mut *region.refs.borrow_mut());
            drop(refs);
        }
    }
}

/// Owner of the memory behind a family of values.
///
/// Cloning an arena is cheap and yields a handle to the same memory. Each
/// region is released once no value views it and no live region stores an
/// address into it.
#[derive(Clone)]
pub struct Arena {
    inner: Rc<ArenaInner>,
}

impl Arena {
    #[must_use]
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self::build(registry, &RuntimeConfig::default())
    }

    /// Create an arena from a configuration, after validating it.
    pub fn with_config(registry: Arc<TypeRegistry>, config: &RuntimeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(registry, config))
    }

    fn build(registry: Arc<TypeRegistry>, config: &RuntimeConfig) -> Self {
        Self {
            inner: Rc::new(ArenaInner {
                registry,
                growth_threshold: config.growth_threshold,
                regions: RefCell::new(BTreeMap::new()),
                prune_at: Cell::new(PRUNE_MIN),
            }),
        }
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.inner.registry
    }

    /// Slice capacity below which growth doubles.
    pub fn growth_threshold(&self) -> usize {
        self.inner.growth_threshold
    }

    /// Number of live regions.
    pub fn region_count(&self) -> usize {
        self.inner
            .regions
            .borrow()
            .values()
            .filter(|r| r.strong_count() > 0)
            .count()
    }

    /// Allocate a zeroed value of type `desc`.
    pub fn alloc(&self, desc: &Arc<TypeDescriptor>) -> Result<Value> {
        if desc.kind() == Kind::String {
            return Err(Error::Unimplemented("string values"));
        }
        let region = self.alloc_region(desc.size(), desc.align())?;
        Ok(Value::new(desc.clone(), self.clone(), region, 0))
    }

    /// Allocate a value of `x`'s type and encode `x` into it.
    pub fn value_of<T: Marshal>(&self, x: &T) -> Result<Value> {
        let desc = T::describe(self.registry())?;
        let value = self.alloc(&desc)?;
        Encoder::new(&value).encode(x)?;
        Ok(value)
    }

    /// View foreign memory at `ptr` as a value of type `desc`.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads and writes of `desc.size()` bytes, and
    /// stay valid for as long as this arena or any value derived from it is
    /// alive.
    pub unsafe fn value_at(&self, desc: &Arc<TypeDescriptor>, ptr: *mut u8) -> Result<Value> {
        let Some(ptr) = NonNull::new(ptr) else {
            return Err(Error::NilPointer(desc.name().to_string()));
        };
        let addr = ptr.as_ptr() as usize;
        if let Ok((region, offset)) = self.resolve(addr, desc.size()) {
            return Ok(Value::new(desc.clone(), self.clone(), region, offset));
        }
        // SAFETY: forwarded to the caller.
        let region = Rc::new(unsafe { Region::borrowed(ptr, desc.size()) });
        self.index(&region);
        Ok(Value::new(desc.clone(), self.clone(), region, 0))
    }

    pub(crate) fn alloc_region(&self, len: usize, align: usize) -> Result<Rc<Region>> {
        let region = Rc::new(Region::alloc(len, align)?);
        self.index(&region);
        Ok(region)
    }

    fn index(&self, region: &Rc<Region>) {
        let mut regions = self.inner.regions.borrow_mut();
        regions.insert(region.addr(), Rc::downgrade(region));
        if regions.len() >= self.inner.prune_at.get() {
            regions.retain(|_, r| r.strong_count() > 0);
            self.inner
                .prune_at
                .set((regions.len() * 2).max(PRUNE_MIN));
        }
    }

    /// Map `addr` to its live region and offset, checking that `len` bytes
    /// fit.
    pub(crate) fn resolve(&self, addr: usize, len: usize) -> Result<(Rc<Region>, usize)> {
        let regions = self.inner.regions.borrow();
        let (start, region) = regions
            .range(..=addr)
            .rev()
            .find_map(|(start, r)| r.upgrade().map(|r| (*start, r)))
            .ok_or(Error::UnmappedAddress(addr))?;
        let offset = addr - start;
        if offset > 0 && offset >= region.len() {
            return Err(Error::UnmappedAddress(addr));
        }
        region.check(offset, len)?;
        Ok((region, offset))
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("regions", &self.region_count())
            .field("growth_threshold", &self.inner.growth_threshold)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::NaturalAbi;

    fn arena() -> Arena {
        Arena::new(Arc::new(TypeRegistry::new(Arc::new(NaturalAbi::new()))))
    }

    #[test]
    fn test_region_bounds() {
        let region = Region::alloc(4, 4).expect("alloc");
        assert_eq!(region.addr() % 4, 0);
        region.write(0, &[1, 2, 3, 4]).expect("write");
        let mut buf = [0u8; 2];
        region.read(2, &mut buf).expect("read");
        assert_eq!(buf, [3, 4]);
        assert!(matches!(
            region.write(3, &[0, 0]),
            Err(Error::OutOfBounds {
                offset: 3,
                len: 2,
                region_len: 4
            })
        ));
        assert!(region.read(usize::MAX, &mut buf).is_err());
    }

    #[test]
    fn test_alloc_is_zeroed() {
        let arena = arena();
        let arr = arena.registry().array_of(8, &arena.registry().uint64()).expect("array");
        let value = arena.alloc(&arr).expect("alloc");
        assert!(value.to_bytes().expect("bytes").iter().all(|&b| b == 0));
        assert_eq!(arena.region_count(), 1);
    }

    #[test]
    fn test_resolve_inside_and_outside() {
        let arena = arena();
        let region = arena.alloc_region(16, 8).expect("alloc");
        let (found, offset) = arena.resolve(region.addr() + 8, 8).expect("resolve");
        assert!(Rc::ptr_eq(&found, &region));
        assert_eq!(offset, 8);

        assert!(matches!(
            arena.resolve(region.addr() + 12, 8),
            Err(Error::OutOfBounds { .. })
        ));
        assert!(matches!(
            arena.resolve(region.addr() + 16, 1),
            Err(Error::UnmappedAddress(_))
        ));
        assert!(matches!(arena.resolve(8, 1), Err(Error::UnmappedAddress(8))));
    }

    #[test]
    fn test_value_at_borrowed_memory() {
        let arena = arena();
        let mut raw: i32 = 7;
        let int = arena.registry().int32();
        let value = unsafe { arena.value_at(&int, (&mut raw as *mut i32).cast()) }.expect("view");
        assert_eq!(value.as_i64().expect("read"), 7);
        value.set_i64(-3).expect("write");
        drop(value);
        drop(arena);
        assert_eq!(raw, -3);
    }

    #[test]
    fn test_value_at_null() {
        let arena = arena();
        let int = arena.registry().int32();
        let err = unsafe { arena.value_at(&int, std::ptr::null_mut()) }.unwrap_err();
        assert!(matches!(err, Error::NilPointer(_)));
    }

    #[test]
    fn test_dropped_values_release_regions() {
        let arena = arena();
        let int = arena.registry().int64();
        for i in 0..1000 {
            let value = arena.alloc(&int).expect("alloc");
            value.set_i64(i).expect("set");
        }
        assert_eq!(arena.region_count(), 0);

        let kept = arena.alloc(&int).expect("alloc");
        assert_eq!(arena.region_count(), 1);
        drop(kept);
        assert_eq!(arena.region_count(), 0);
    }

    #[test]
    fn test_resolve_skips_freed_regions() {
        let arena = arena();
        let region = arena.alloc_region(16, 8).expect("alloc");
        let addr = region.addr();
        drop(region);
        assert!(matches!(
            arena.resolve(addr, 1),
            Err(Error::UnmappedAddress(_))
        ));
    }

    #[test]
    fn test_address_cycles_released_with_arena() {
        let arena = arena();
        let a = arena.alloc_region(8, 8).expect("alloc");
        let b = arena.alloc_region(8, 8).expect("alloc");
        a.retain(0, Some(b.clone()));
        b.retain(0, Some(a.clone()));
        let weak = Rc::downgrade(&a);
        drop((a, b));
        assert!(weak.upgrade().is_some());
        assert_eq!(arena.region_count(), 2);

        drop(arena);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_with_config_validates() {
        let registry = Arc::new(TypeRegistry::new(Arc::new(NaturalAbi::new())));
        let config = RuntimeConfig {
            growth_threshold: 0,
            ..RuntimeConfig::default()
        };
        assert!(matches!(
            Arena::with_config(registry, &config),
            Err(Error::Config(_))
        ));
    }
}
