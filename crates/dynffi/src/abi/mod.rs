// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Foreign call engine interface.
//!
//! The engine is the only authority on ABI layout: the registry asks it for
//! struct offsets by preparing a trial signature, and [`Function`](crate::Function)
//! hands it raw argument pointers to invoke a symbol.
//!
//! [`NaturalAbi`] solves natural C layouts and has no call trampoline. With
//! the `libffi` feature, [`LibffiAbi`] lays out and calls through libffi.

#[cfg(feature = "libffi")]
mod ffi_engine;
mod natural;

#[cfg(feature = "libffi")]
pub use ffi_engine::LibffiAbi;
pub use natural::NaturalAbi;

use crate::types::TypeDescriptor;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Calling convention requested for a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "config-file", derive(serde::Deserialize))]
#[cfg_attr(feature = "config-file", serde(rename_all = "lowercase"))]
pub enum Abi {
    /// Platform default convention.
    #[default]
    Default,
    /// System V AMD64.
    SysV,
    /// Microsoft x64.
    Win64,
}

impl Abi {
    /// Convention `Default` stands for on the host.
    pub fn native() -> Self {
        if cfg!(windows) {
            Self::Win64
        } else {
            Self::SysV
        }
    }

    /// Resolve `Default` to the host convention.
    pub fn resolve(self) -> Self {
        match self {
            Self::Default => Self::native(),
            other => other,
        }
    }
}

impl fmt::Display for Abi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Default => "default",
            Self::SysV => "sysv",
            Self::Win64 => "win64",
        };
        f.write_str(name)
    }
}

/// Errors reported by a call engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbiError {
    #[error("bad type definition: {0}")]
    BadTypedef(String),

    #[error("unsupported ABI: {0}")]
    BadAbi(Abi),

    #[error("engine has no call trampoline")]
    NoTrampoline,

    #[error("call through a null function pointer")]
    NullFunction,
}

/// Layout solved by the engine for a signature's return type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolvedLayout {
    pub size: usize,
    pub align: usize,
    /// Field offsets, empty unless the type is a struct.
    pub offsets: Vec<usize>,
}

/// A prepared call signature.
#[derive(Debug, Clone)]
pub struct CallSignature {
    pub abi: Abi,
    pub ret: Arc<TypeDescriptor>,
    pub args: Vec<Arc<TypeDescriptor>>,
    pub ret_layout: SolvedLayout,
}

impl CallSignature {
    pub fn arity(&self) -> usize {
        self.args.len()
    }
}

/// Foreign call engine.
pub trait CallEngine: Send + Sync {
    /// Prepare a signature for `ret (args...)` under `abi`.
    ///
    /// Struct types in the signature (including `ret`) are laid out by the
    /// engine; their solved layout is reported in
    /// [`CallSignature::ret_layout`].
    fn prepare(
        &self,
        abi: Abi,
        ret: &Arc<TypeDescriptor>,
        args: &[Arc<TypeDescriptor>],
    ) -> Result<CallSignature, AbiError>;

    /// Call the function at `addr`.
    ///
    /// # Safety
    ///
    /// `addr` must be a function matching `sig`. Each pointer in `args` must
    /// point to a live value of the matching argument type, and `out` must be
    /// valid for writes of the return type's size.
    unsafe fn invoke(
        &self,
        sig: &CallSignature,
        addr: *const std::ffi::c_void,
        args: &[*const u8],
        out: *mut u8,
    ) -> Result<(), AbiError>;
}
