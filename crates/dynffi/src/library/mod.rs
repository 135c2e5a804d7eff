// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared library loading and prepared foreign functions.
//!
//! [`Library`] wraps a `libloading` handle. [`Function`] pairs a symbol
//! address with a signature prepared once by the registry's call engine.

use crate::abi::{Abi, CallEngine, CallSignature};
use crate::error::{Error, Result};
use crate::types::{is_compatible, Kind, TypeDescriptor, TypeRegistry};
use crate::value::{Arena, Value};
use std::ffi::c_void;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors from the dynamic loader.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LibraryError {
    #[error("cannot open {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("symbol {name} not found: {reason}")]
    SymbolNotFound { name: String, reason: String },

    #[error("cannot close {path}: {reason}")]
    Close { path: String, reason: String },
}

#[cfg(target_os = "windows")]
const LIB_PREFIX: &str = "";
#[cfg(not(target_os = "windows"))]
const LIB_PREFIX: &str = "lib";

#[cfg(target_os = "windows")]
const LIB_SUFFIX: &str = ".dll";
#[cfg(target_os = "macos")]
const LIB_SUFFIX: &str = ".dylib";
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const LIB_SUFFIX: &str = ".so";

/// Platform file name for library `name` (`m` becomes `libm.so` on Linux).
/// Prefix and suffix are only added when missing.
pub fn library_file_name(name: &str) -> String {
    let mut file = String::with_capacity(name.len() + LIB_PREFIX.len() + LIB_SUFFIX.len());
    if !name.starts_with(LIB_PREFIX) {
        file.push_str(LIB_PREFIX);
    }
    file.push_str(name);
    if !name.ends_with(LIB_SUFFIX) {
        file.push_str(LIB_SUFFIX);
    }
    file
}

// ---------------------------------------------------------------------------
// Library
// ---------------------------------------------------------------------------

/// An opened shared library. Closed on drop.
pub struct Library {
    /// `None` once closed.
    inner: Option<libloading::Library>,
    path: String,
}

impl Library {
    /// Open the library at `path` (resolved by the system loader).
    pub fn open(path: &str) -> Result<Self> {
        // SAFETY: loading runs the library's initializers; callers choose
        // which libraries to trust.
        let inner = unsafe { libloading::Library::new(path) }.map_err(|e| LibraryError::Open {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::opened(inner, path))
    }

    /// Handle on the running program and the libraries it links.
    #[cfg(unix)]
    pub fn this() -> Result<Self> {
        let inner = libloading::os::unix::Library::this();
        Ok(Self::opened(inner.into(), "<self>"))
    }

    /// Handle on the running program and the libraries it links.
    #[cfg(windows)]
    pub fn this() -> Result<Self> {
        let inner = libloading::os::windows::Library::this().map_err(|e| LibraryError::Open {
            path: "<self>".to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::opened(inner.into(), "<self>"))
    }

    fn opened(inner: libloading::Library, path: &str) -> Self {
        log::debug!("[library] opened {}", path);
        Self {
            inner: Some(inner),
            path: path.to_string(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Address of symbol `name`.
    pub fn symbol(&self, name: &str) -> Result<*const c_void> {
        let not_found = |reason: String| LibraryError::SymbolNotFound {
            name: name.to_string(),
            reason,
        };
        let inner = self
            .inner
            .as_ref()
            .ok_or_else(|| not_found("library is closed".to_string()))?;
        // SAFETY: the symbol is only read as an address.
        let symbol = unsafe { inner.get::<*const c_void>(name.as_bytes()) }
            .map_err(|e| not_found(e.to_string()))?;
        let addr = *symbol;
        if addr.is_null() {
            return Err(not_found("symbol resolves to null".to_string()).into());
        }
        log::trace!("[library] resolved {} in {} at {:p}", name, self.path, addr);
        Ok(addr)
    }

    /// Resolve `name` and prepare it as `ret name(args...)` with the
    /// registry's engine and ABI.
    ///
    /// # Safety
    ///
    /// The symbol must be a function with exactly this C signature, and the
    /// library must stay open while the function is called.
    pub unsafe fn function(
        &self,
        registry: &TypeRegistry,
        name: &str,
        ret: Arc<TypeDescriptor>,
        args: Vec<Arc<TypeDescriptor>>,
    ) -> Result<Function> {
        let addr = self.symbol(name)?;
        // SAFETY: forwarded to the caller.
        unsafe { Function::new(registry.engine().clone(), registry.abi(), addr, ret, args) }
    }

    /// Close the library, reporting loader errors.
    pub fn close(mut self) -> Result<()> {
        if let Some(inner) = self.inner.take() {
            inner.close().map_err(|e| LibraryError::Close {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        }
        log::debug!("[library] closed {}", self.path);
        Ok(())
    }
}

impl Drop for Library {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            if let Err(e) = inner.close() {
                log::warn!("[library] failed to close {}: {}", self.path, e);
            }
        }
    }
}

impl fmt::Debug for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Library")
            .field("path", &self.path)
            .field("open", &self.inner.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Function
// ---------------------------------------------------------------------------

/// A foreign function with a prepared signature.
pub struct Function {
    engine: Arc<dyn CallEngine>,
    addr: *const c_void,
    sig: CallSignature,
}

impl Function {
    /// Prepare `ret addr(args...)` under `abi`.
    ///
    /// # Safety
    ///
    /// `addr` must be a function with this C signature, valid for as long as
    /// the returned `Function` is called.
    pub unsafe fn new(
        engine: Arc<dyn CallEngine>,
        abi: Abi,
        addr: *const c_void,
        ret: Arc<TypeDescriptor>,
        args: Vec<Arc<TypeDescriptor>>,
    ) -> Result<Self> {
        let sig = engine.prepare(abi, &ret, &args)?;
        Ok(Self { engine, addr, sig })
    }

    pub fn signature(&self) -> &CallSignature {
        &self.sig
    }

    /// Call the function with `args`, returning the result as a new value in
    /// `arena`.
    ///
    /// Array arguments decay to pointers; an array return type is read back
    /// as a pointer to its element.
    pub fn call(&self, arena: &Arena, args: &[Value]) -> Result<Value> {
        if args.len() != self.sig.arity() {
            return Err(Error::InvalidLength(format!(
                "expected {} arguments, got {}",
                self.sig.arity(),
                args.len()
            )));
        }
        for (param, arg) in self.sig.args.iter().zip(args) {
            if !is_compatible(param, arg.descriptor()) {
                return Err(Error::incompatible(param.name(), arg.descriptor().name()));
            }
        }

        let mut decayed = Vec::new();
        let mut ptrs = Vec::with_capacity(args.len());
        for arg in args {
            if arg.kind() == Kind::Array {
                let ptr = arg.address_of()?;
                ptrs.push(ptr.as_ptr());
                decayed.push(ptr);
            } else {
                ptrs.push(arg.as_ptr());
            }
        }

        let ret = &self.sig.ret;
        let out = match (ret.kind(), ret.elem()) {
            (Kind::Array, Some(elem)) => arena.alloc(&arena.registry().pointer_to(elem)?)?,
            _ => arena.alloc(ret)?,
        };

        log::trace!(
            "[library] call {:p} ({} args) -> {}",
            self.addr,
            args.len(),
            ret.name()
        );
        // SAFETY: `new` requires addr to match the signature; argument types
        // were checked above and the output buffer has the return size.
        unsafe {
            self.engine
                .invoke(&self.sig, self.addr, &ptrs, out.as_mut_ptr())?;
        }
        drop(decayed);
        Ok(out)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("addr", &self.addr)
            .field("ret", &self.sig.ret.name())
            .field("arity", &self.sig.arity())
            .finish()
    }
}
