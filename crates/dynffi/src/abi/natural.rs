// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::{Abi, AbiError, CallEngine, CallSignature, SolvedLayout};
use crate::config::{POINTER_ALIGN, POINTER_SIZE};
use crate::types::{Kind, TypeDescriptor};
use std::sync::Arc;

/// Layout-only engine using natural C alignment.
///
/// Accepts [`Abi::Default`] and the host's native convention. `invoke`
/// always fails with [`AbiError::NoTrampoline`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NaturalAbi;

impl NaturalAbi {
    pub fn new() -> Self {
        Self
    }

    fn check_abi(abi: Abi) -> Result<(), AbiError> {
        if abi == Abi::Default || abi == Abi::native() {
            Ok(())
        } else {
            Err(AbiError::BadAbi(abi))
        }
    }

    /// Layout of `desc` as it appears in a signature.
    fn solve(desc: &TypeDescriptor) -> Result<SolvedLayout, AbiError> {
        match desc.kind() {
            Kind::String => Err(AbiError::BadTypedef(format!(
                "[{}] has no ABI representation",
                desc.name()
            ))),
            // Arrays are passed by address.
            Kind::Array => Ok(SolvedLayout {
                size: POINTER_SIZE,
                align: POINTER_ALIGN,
                offsets: Vec::new(),
            }),
            Kind::Struct => Self::solve_struct(desc),
            _ => Ok(SolvedLayout {
                size: desc.size(),
                align: desc.align(),
                offsets: Vec::new(),
            }),
        }
    }

    fn solve_struct(desc: &TypeDescriptor) -> Result<SolvedLayout, AbiError> {
        let fields = desc.fields().unwrap_or_default();
        if fields.is_empty() {
            return Err(AbiError::BadTypedef(format!(
                "struct [{}] has no fields",
                desc.name()
            )));
        }

        let mut offsets = Vec::with_capacity(fields.len());
        let mut size = 0usize;
        let mut align = 1usize;
        for field in fields {
            if matches!(field.ty.kind(), Kind::Void | Kind::String) {
                return Err(AbiError::BadTypedef(format!(
                    "field [{}] of [{}] has kind {}",
                    field.name,
                    desc.name(),
                    field.ty.kind()
                )));
            }
            let field_align = field.ty.align().max(1);
            let offset = align_up(size, field_align);
            offsets.push(offset);
            size = offset + field.ty.size();
            align = align.max(field_align);
        }

        Ok(SolvedLayout {
            size: align_up(size, align),
            align,
            offsets,
        })
    }
}

fn align_up(value: usize, align: usize) -> usize {
    value.div_ceil(align) * align
}

impl CallEngine for NaturalAbi {
    fn prepare(
        &self,
        abi: Abi,
        ret: &Arc<TypeDescriptor>,
        args: &[Arc<TypeDescriptor>],
    ) -> Result<CallSignature, AbiError> {
        Self::check_abi(abi)?;

        let ret_layout = Self::solve(ret)?;
        for (i, arg) in args.iter().enumerate() {
            if arg.kind() == Kind::Void {
                return Err(AbiError::BadTypedef(format!("argument #{} is void", i)));
            }
            Self::solve(arg)?;
        }

        log::trace!(
            "[abi] prepared {} ({} args) size={} align={}",
            ret.name(),
            args.len(),
            ret_layout.size,
            ret_layout.align
        );

        Ok(CallSignature {
            abi,
            ret: ret.clone(),
            args: args.to_vec(),
            ret_layout,
        })
    }

    unsafe fn invoke(
        &self,
        _sig: &CallSignature,
        _addr: *const std::ffi::c_void,
        _args: &[*const u8],
        _out: *mut u8,
    ) -> Result<(), AbiError> {
        Err(AbiError::NoTrampoline)
    }
}
