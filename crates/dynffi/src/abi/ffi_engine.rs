// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Call engine backed by libffi.
//!
//! Struct layouts come from `ffi_get_struct_offsets`, calls go through
//! `ffi_call`. Inline arrays inside structs are described to libffi as their
//! elements repeated, arrays in signatures as pointers.

use super::{Abi, AbiError, CallEngine, CallSignature, SolvedLayout};
use crate::types::{Kind, Shape, TypeDescriptor};
use ::libffi::middle::{Cif, CodePtr, Type};
use ::libffi::raw;
use std::ffi::c_void;
use std::mem::size_of;
use std::sync::Arc;

/// Engine that lays out and calls through libffi.
///
/// Accepts [`Abi::Default`] and the host's native convention, both mapped to
/// libffi's default ABI.
#[derive(Debug, Clone, Copy, Default)]
pub struct LibffiAbi;

impl LibffiAbi {
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
}

/// libffi type of `desc` as a call argument or return value.
fn signature_type(desc: &TypeDescriptor) -> Result<Type, AbiError> {
    match desc.kind() {
        Kind::Array => Ok(Type::pointer()),
        _ => member_type(desc),
    }
}

/// libffi type of `desc` stored inline.
fn member_type(desc: &TypeDescriptor) -> Result<Type, AbiError> {
    Ok(match desc.kind() {
        Kind::Void => Type::void(),
        Kind::Int8 => Type::i8(),
        Kind::Uint8 => Type::u8(),
        Kind::Int16 => Type::i16(),
        Kind::Uint16 => Type::u16(),
        Kind::Int32 => Type::i32(),
        Kind::Uint32 => Type::u32(),
        Kind::Int64 => Type::i64(),
        Kind::Uint64 => Type::u64(),
        Kind::Int => Type::c_int(),
        Kind::Uint => Type::c_uint(),
        Kind::Long => Type::c_long(),
        Kind::Ulong => Type::c_ulong(),
        Kind::Float => Type::f32(),
        Kind::Double => Type::f64(),
        Kind::LongDouble => Type::longdouble(),
        Kind::Pointer => Type::pointer(),
        Kind::Slice => Type::structure([Type::isize(), Type::isize(), Type::pointer()]),
        Kind::Array | Kind::Struct => Type::structure(struct_members(desc)?.0),
        Kind::String => {
            return Err(AbiError::BadTypedef(format!(
                "[{}] has no ABI representation",
                desc.name()
            )))
        }
    })
}

/// Flattened libffi members of a struct (or inline array), with the index of
/// each field's first member.
fn struct_members(desc: &TypeDescriptor) -> Result<(Vec<Type>, Vec<usize>), AbiError> {
    let mut members = Vec::new();
    let mut starts = Vec::new();
    match desc.shape() {
        Shape::Array { elem, len } => {
            let elem = member_type(elem)?;
            members.extend(std::iter::repeat(elem).take(*len));
        }
        Shape::Struct(fields) => {
            if fields.is_empty() {
                return Err(AbiError::BadTypedef(format!(
                    "struct [{}] has no fields",
                    desc.name()
                )));
            }
            for field in fields {
                if matches!(field.ty.kind(), Kind::Void | Kind::String) {
                    return Err(AbiError::BadTypedef(format!(
                        "field [{}] of [{}] has kind {}",
                        field.name,
                        desc.name(),
                        field.ty.kind()
                    )));
                }
                starts.push(members.len());
                match field.ty.shape() {
                    Shape::Array { elem, len } => {
                        let elem = member_type(elem)?;
                        members.extend(std::iter::repeat(elem).take(*len));
                    }
                    _ => members.push(member_type(&field.ty)?),
                }
            }
        }
        _ => {}
    }
    if members.is_empty() {
        return Err(AbiError::BadTypedef(format!(
            "[{}] has no members",
            desc.name()
        )));
    }
    Ok((members, starts))
}

/// Solve a struct layout with `ffi_get_struct_offsets`.
fn solve_struct(desc: &TypeDescriptor) -> Result<SolvedLayout, AbiError> {
    let (members, starts) = struct_members(desc)?;
    let ty = Type::structure(members.iter().cloned());
    let mut member_offsets = vec![0usize; members.len()];
    // SAFETY: `ty` is a valid struct type with `members.len()` elements.
    let status = unsafe {
        raw::ffi_get_struct_offsets(
            raw::ffi_abi_FFI_DEFAULT_ABI,
            ty.as_raw_ptr(),
            member_offsets.as_mut_ptr(),
        )
    };
    if status != raw::ffi_status_FFI_OK {
        return Err(AbiError::BadTypedef(format!(
            "libffi rejected layout of [{}] (status {})",
            desc.name(),
            status
        )));
    }
    // SAFETY: the call above initialized size and alignment.
    let (size, align) = unsafe {
        let raw_ty = &*ty.as_raw_ptr();
        (raw_ty.size, usize::from(raw_ty.alignment))
    };
    let mut offsets = Vec::with_capacity(starts.len());
    for start in starts {
        // A zero-length array field sits where its successor would start.
        let offset = member_offsets.get(start).copied().unwrap_or(size);
        offsets.push(offset);
    }
    Ok(SolvedLayout {
        size,
        align,
        offsets,
    })
}

fn solve(desc: &TypeDescriptor) -> Result<SolvedLayout, AbiError> {
    match desc.kind() {
        Kind::Struct => solve_struct(desc),
        Kind::String => Err(AbiError::BadTypedef(format!(
            "[{}] has no ABI representation",
            desc.name()
        ))),
        Kind::Array => Ok(SolvedLayout {
            size: size_of::<*const c_void>(),
            align: std::mem::align_of::<*const c_void>(),
            offsets: Vec::new(),
        }),
        _ => Ok(SolvedLayout {
            size: desc.size(),
            align: desc.align(),
            offsets: Vec::new(),
        }),
    }
}

fn build_cif(sig: &CallSignature) -> Result<Cif, AbiError> {
    let args = sig
        .args
        .iter()
        .map(|a| signature_type(a))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Cif::new(args, signature_type(&sig.ret)?))
}

impl CallEngine for LibffiAbi {
    fn prepare(
        &self,
        abi: Abi,
        ret: &Arc<TypeDescriptor>,
        args: &[Arc<TypeDescriptor>],
    ) -> Result<CallSignature, AbiError> {
        Self::check_abi(abi)?;

        let ret_layout = solve(ret)?;
        for (i, arg) in args.iter().enumerate() {
            if arg.kind() == Kind::Void {
                return Err(AbiError::BadTypedef(format!("argument #{} is void", i)));
            }
            signature_type(arg)?;
        }

        log::trace!(
            "[abi] libffi prepared {} ({} args) size={} align={}",
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
        sig: &CallSignature,
        addr: *const c_void,
        args: &[*const u8],
        out: *mut u8,
    ) -> Result<(), AbiError> {
        if addr.is_null() {
            return Err(AbiError::NullFunction);
        }
        let cif = build_cif(sig)?;
        let mut raw_args: Vec<*mut c_void> = args.iter().map(|&p| p.cast_mut().cast()).collect();

        // libffi widens integral returns to a full `ffi_arg`.
        let ret_size = sig.ret_layout.size;
        let words = ret_size.max(size_of::<raw::ffi_arg>()).div_ceil(size_of::<u64>());
        let mut scratch = vec![0u64; words];

        // SAFETY: the caller guarantees `addr` matches `sig` and that every
        // argument pointer refers to a value of the matching type.
        unsafe {
            raw::ffi_call(
                cif.as_raw_ptr(),
                Some(*CodePtr(addr.cast_mut()).as_safe_fun()),
                scratch.as_mut_ptr().cast(),
                raw_args.as_mut_ptr(),
            );
        }

        if sig.ret.kind() == Kind::Void {
            return Ok(());
        }
        let bytes: Vec<u8> = scratch.iter().flat_map(|w| w.to_ne_bytes()).collect();
        let kind = sig.ret.kind();
        let narrow = (kind.is_signed() || kind.is_unsigned()) && ret_size < size_of::<raw::ffi_arg>();
        let from = if narrow && cfg!(target_endian = "big") {
            size_of::<raw::ffi_arg>() - ret_size
        } else {
            0
        };
        // SAFETY: `out` is valid for `ret_size` bytes per the trait contract.
        unsafe { std::ptr::copy_nonoverlapping(bytes[from..].as_ptr(), out, ret_size) };
        Ok(())
    }
}
