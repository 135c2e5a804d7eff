// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com
//
// End-to-end scenarios over the public API: struct interning, layout,
// arrays, slice growth through the encoder, and compatibility.

#![allow(clippy::float_cmp)]
#![allow(clippy::cast_possible_truncation)]

use dynffi::{
    is_compatible, Arena, Decoder, Encoder, Error, Field, Kind, NaturalAbi, Redeclaration,
    StructBuilder, TypeRegistry,
};
use std::sync::Arc;

fn setup() -> (Arc<TypeRegistry>, Arena) {
    let registry = Arc::new(TypeRegistry::new(Arc::new(NaturalAbi::new())));
    let arena = Arena::new(registry.clone());
    (registry, arena)
}

#[test]
fn struct_declared_twice_is_interned() {
    let (registry, _) = setup();
    let first = registry
        .declare_struct("S", &[Field::new("a", registry.int32())])
        .expect("first declaration");
    let second = registry
        .declare_struct("S", &[Field::new("a", registry.int32())])
        .expect("second declaration");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.size(), 4);
}

#[test]
fn struct_redeclared_with_other_field_name_fails() {
    let (registry, _) = setup();
    registry
        .declare_struct("S", &[Field::new("a", registry.int32())])
        .expect("declaration");
    let err = registry
        .declare_struct("S", &[Field::new("b", registry.int32())])
        .unwrap_err();
    match err {
        Error::InconsistentRedeclaration { name, mismatch } => {
            assert_eq!(name, "S");
            assert_eq!(mismatch, Redeclaration::FieldName(0));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn natural_layout_of_mixed_struct() {
    let (registry, _) = setup();
    let s = StructBuilder::new(&registry, "Mixed")
        .builtin_field("a", "uint8")
        .builtin_field("b", "int16")
        .builtin_field("c", "int32")
        .builtin_field("d", "uint8")
        .build()
        .expect("declare");
    let offsets: Vec<usize> = (0..4)
        .map(|i| s.field(i).expect("field").offset)
        .collect();
    assert_eq!(offsets, [0, 2, 4, 8]);
    assert_eq!(s.size(), 12);
}

#[test]
fn array_of_ten_int32() {
    let (registry, arena) = setup();
    let arr = registry.array_of(10, &registry.int32()).expect("array");
    assert_eq!(arr.size(), 40);
    let value = arena.alloc(&arr).expect("alloc");
    assert_eq!(value.len().expect("len"), 10);
    assert_eq!(value.kind(), Kind::Array);
}

#[test]
fn empty_slice_grows_when_encoded() {
    let (registry, arena) = setup();
    let desc = registry.slice_of(&registry.int32()).expect("slice type");
    let value = arena.make_slice(&desc, 0, 0).expect("make slice");

    let source: Vec<i32> = (1..=10).map(|i| i * 3).collect();
    Encoder::new(&value).encode(&source).expect("encode");

    assert_eq!(value.len().expect("len"), 10);
    for (i, expected) in source.iter().enumerate() {
        let elem = value.index(i).expect("index");
        assert_eq!(elem.as_i64().expect("read"), i64::from(*expected));
    }
    let decoded: Vec<i32> = Decoder::new(&value).decode().expect("decode");
    assert_eq!(decoded, source);
}

#[test]
fn slice_inside_struct_is_rewritten_in_place() {
    let (registry, arena) = setup();
    let ints = registry.slice_of(&registry.uint16()).expect("slice type");
    let holder = StructBuilder::new(&registry, "Holder")
        .field("count", registry.uint32())
        .field("items", ints)
        .build()
        .expect("declare");
    let value = arena.alloc(&holder).expect("alloc");

    let items = value.field(1).expect("items");
    items.set_value(&vec![5u16, 6, 7]).expect("encode");

    let reread = value.field_by_name("items").expect("lookup").expect("field");
    assert_eq!(reread.len().expect("len"), 3);
    assert_eq!(reread.get::<Vec<u16>>().expect("decode"), vec![5, 6, 7]);
}

#[test]
fn growth_past_threshold_uses_quarter_steps() {
    let (registry, arena) = setup();
    let desc = registry.slice_of(&registry.uint8()).expect("slice type");
    let value = arena.make_slice(&desc, 1024, 1024).expect("make slice");
    value.index(1023).expect("index").set_u64(9).expect("write");

    let grown = value.ensure_capacity(1025).expect("grow");
    assert_eq!(grown.cap().expect("cap"), 1280);
    assert_eq!(grown.len().expect("len"), 1025);
    assert_eq!(grown.index(1023).expect("index").as_u64().expect("read"), 9);
}

#[test]
fn compatibility_is_symmetric_across_shapes() {
    let (registry, _) = setup();
    let point = StructBuilder::new(&registry, "Point")
        .field("x", registry.double())
        .field("y", registry.double())
        .build()
        .expect("Point");
    let pair = StructBuilder::new(&registry, "")
        .field("first", registry.double())
        .field("second", registry.double())
        .build()
        .expect("anonymous pair");
    let types = [
        registry.uint8(),
        registry.c_uchar(),
        registry.float(),
        registry.pointer_to(&point).expect("pointer"),
        registry.pointer_to(&pair).expect("pointer"),
        registry.array_of(2, &registry.double()).expect("array"),
        registry.slice_of(&point).expect("slice"),
        registry.slice_of(&pair).expect("slice"),
        point.clone(),
        pair.clone(),
    ];
    for a in &types {
        for b in &types {
            assert_eq!(is_compatible(a, b), is_compatible(b, a));
        }
    }
    assert!(is_compatible(&point, &pair));
    assert!(is_compatible(&registry.uint8(), &registry.c_uchar()));
    assert!(!is_compatible(&point, &registry.array_of(2, &registry.double()).expect("array")));
}

#[test]
fn address_of_aliases_original() {
    let (registry, arena) = setup();
    let value = arena.alloc(&registry.double()).expect("alloc");
    let ptr = value.address_of().expect("address_of");
    ptr.elem().expect("elem").set_f64(2.5).expect("write");
    assert_eq!(value.as_f64().expect("read"), 2.5);
}

#[test]
fn foreign_pointer_is_unmapped() {
    let (registry, arena) = setup();
    let outside = Box::new(5i64);
    let ptr = arena
        .alloc(&registry.pointer_to(&registry.int64()).expect("pointer"))
        .expect("alloc");
    ptr.set_pointer(&*outside as *const i64 as usize)
        .expect("set pointer");
    assert!(matches!(ptr.elem(), Err(Error::UnmappedAddress(_))));
}
