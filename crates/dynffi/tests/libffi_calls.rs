// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com
//
// Calls into the C library through the libffi engine: scalar arguments,
// floating point returns, struct returns and array decay.

#![cfg(unix)]
#![allow(clippy::float_cmp)]

use dynffi::{Arena, Error, Library, LibffiAbi, StructBuilder, TypeRegistry};
use std::hint::black_box;
use std::sync::Arc;

fn setup() -> (Arc<TypeRegistry>, Arena, Library) {
    let registry = Arc::new(TypeRegistry::new(Arc::new(LibffiAbi::new())));
    let arena = Arena::new(registry.clone());
    let lib = Library::this().expect("open self");
    (registry, arena, lib)
}

#[test]
fn abs_through_libc() {
    let (registry, arena, lib) = setup();
    let abs = unsafe { lib.function(&registry, "abs", registry.c_int(), vec![registry.c_int()]) }
        .expect("prepare abs");

    let x = arena.alloc(&registry.c_int()).expect("alloc");
    x.set_i64(-17).expect("set");
    let out = abs.call(&arena, &[x]).expect("call abs");
    assert_eq!(out.as_i64().expect("result"), 17);
}

#[test]
fn cos_returns_double() {
    let (registry, arena, lib) = setup();
    // Keeps libm linked into the test binary.
    let expected = black_box(0.5f64).cos();

    let cos = unsafe { lib.function(&registry, "cos", registry.double(), vec![registry.double()]) }
        .expect("prepare cos");
    let x = arena.value_of(&0.5f64).expect("x");
    let out = cos.call(&arena, &[x]).expect("call cos");
    assert_eq!(out.get::<f64>().expect("result"), expected);
}

#[test]
fn div_returns_struct() {
    let (registry, arena, lib) = setup();
    let div_t = StructBuilder::new(&registry, "div_t")
        .field("quot", registry.c_int())
        .field("rem", registry.c_int())
        .build()
        .expect("div_t");
    assert_eq!(div_t.size(), 2 * std::mem::size_of::<std::ffi::c_int>());

    let div = unsafe {
        lib.function(
            &registry,
            "div",
            div_t.clone(),
            vec![registry.c_int(), registry.c_int()],
        )
    }
    .expect("prepare div");

    let num = arena.alloc(&registry.c_int()).expect("alloc");
    let den = arena.alloc(&registry.c_int()).expect("alloc");
    num.set_i64(17).expect("set");
    den.set_i64(5).expect("set");
    let out = div.call(&arena, &[num, den]).expect("call div");
    assert_eq!(out.field(0).expect("quot").as_i64().expect("quot"), 3);
    assert_eq!(out.field(1).expect("rem").as_i64().expect("rem"), 2);
}

#[test]
fn array_argument_decays_to_pointer() {
    let (registry, arena, lib) = setup();
    let buf = registry
        .array_of(8, &registry.c_char())
        .expect("char[8]");
    let strlen = unsafe { lib.function(&registry, "strlen", registry.c_ulong(), vec![buf.clone()]) }
        .expect("prepare strlen");

    let text = arena.alloc(&buf).expect("alloc");
    for (i, b) in b"dynffi".iter().enumerate() {
        text.index(i).expect("index").set_i64(i64::from(*b)).expect("set");
    }
    let out = strlen.call(&arena, &[text]).expect("call strlen");
    assert_eq!(out.as_u64().expect("len"), 6);
}

#[test]
fn missing_symbol_is_reported() {
    let (registry, _, lib) = setup();
    let err = unsafe { lib.function(&registry, "dynffi_missing_fn", registry.void(), vec![]) }
        .unwrap_err();
    assert!(matches!(err, Error::Library(_)));
}
