// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Value access, aliasing and growth tests.

use super::*;
use crate::abi::NaturalAbi;
use crate::config::RuntimeConfig;
use crate::types::{StructBuilder, TypeRegistry};

fn arena() -> Arena {
    Arena::new(Arc::new(TypeRegistry::new(Arc::new(NaturalAbi::new()))))
}

#[test]
fn test_scalar_widths() {
    let arena = arena();
    let reg = arena.registry().clone();

    let v = arena.alloc(&reg.int8()).expect("alloc");
    v.set_i64(-129).expect("set");
    assert_eq!(v.as_i64().expect("get"), 127);

    let v = arena.alloc(&reg.uint16()).expect("alloc");
    v.set_u64(0x1_2345).expect("set");
    assert_eq!(v.as_u64().expect("get"), 0x2345);

    let v = arena.alloc(&reg.c_long()).expect("alloc");
    v.set_i64(-42).expect("set");
    assert_eq!(v.as_i64().expect("get"), -42);

    let v = arena.alloc(&reg.float()).expect("alloc");
    v.set_f64(1.5).expect("set");
    assert_eq!(v.as_f64().expect("get"), 1.5);
}

#[test]
fn test_kind_mismatch() {
    let arena = arena();
    let v = arena.alloc(&arena.registry().double()).expect("alloc");
    let err = v.as_i64().unwrap_err();
    assert_eq!(err.to_string(), "call of Value::as_i64 on Double value");
    assert!(matches!(v.field(0), Err(Error::KindMismatch { .. })));
    assert!(matches!(v.len(), Err(Error::KindMismatch { .. })));
    assert!(matches!(v.elem(), Err(Error::KindMismatch { .. })));
    assert!(matches!(v.set_u64(1), Err(Error::KindMismatch { .. })));
}

#[test]
fn test_long_double_unimplemented() {
    let arena = arena();
    let v = arena.alloc(&arena.registry().long_double()).expect("alloc");
    assert!(matches!(v.as_f64(), Err(Error::Unimplemented(_))));
    assert!(matches!(v.set_f64(1.0), Err(Error::Unimplemented(_))));
}

#[test]
fn test_field_aliasing() {
    let arena = arena();
    let reg = arena.registry().clone();
    let inner = StructBuilder::new(&reg, "Inner")
        .field("x", reg.int32())
        .field("y", reg.int32())
        .build()
        .expect("Inner");
    let outer = StructBuilder::new(&reg, "Outer")
        .field("tag", reg.uint8())
        .field("inner", inner)
        .build()
        .expect("Outer");

    let v = arena.alloc(&outer).expect("alloc");
    assert_eq!(v.num_field().expect("num"), 2);
    v.field_by_index(&[1, 1])
        .expect("path")
        .set_i64(99)
        .expect("set");

    let y = v
        .field_by_name("inner")
        .expect("lookup")
        .expect("present")
        .field(1)
        .expect("y");
    assert_eq!(y.as_i64().expect("get"), 99);
    assert_eq!(y.address(), v.address() + 8);
    assert!(v.field_by_name("missing").expect("lookup").is_none());
    assert!(matches!(
        v.field(2),
        Err(Error::IndexOutOfRange {
            what: "field",
            index: 2,
            len: 2
        })
    ));
}

#[test]
fn test_array_index_is_strict() {
    let arena = arena();
    let arr = arena.registry().array_of(10, &arena.registry().int32()).expect("array");
    let v = arena.alloc(&arr).expect("alloc");
    assert_eq!(v.size(), 40);
    assert_eq!(v.len().expect("len"), 10);
    assert_eq!(v.cap().expect("cap"), 10);

    v.index(9).expect("last").set_i64(5).expect("set");
    assert_eq!(v.index(9).expect("last").as_i64().expect("get"), 5);
    assert!(matches!(
        v.index(10),
        Err(Error::IndexOutOfRange {
            what: "array",
            index: 10,
            len: 10
        })
    ));
}

#[test]
fn test_make_slice_and_index() {
    let arena = arena();
    let desc = arena.registry().slice_of(&arena.registry().int16()).expect("slice");
    let s = arena.make_slice(&desc, 3, 8).expect("make");
    assert_eq!(s.len().expect("len"), 3);
    assert_eq!(s.cap().expect("cap"), 8);
    assert!(!s.is_nil().expect("nil"));

    for i in 0..3 {
        s.index(i).expect("index").set_i64(i as i64 * 10).expect("set");
    }
    assert_eq!(s.index(2).expect("index").as_i64().expect("get"), 20);
    assert!(s.index(3).is_err());

    s.set_len(8).expect("grow len");
    assert_eq!(s.index(7).expect("index").as_i64().expect("get"), 0);
    assert!(matches!(s.set_len(9), Err(Error::InvalidLength(_))));

    let empty = arena.make_slice(&desc, 0, 0).expect("empty");
    assert!(empty.is_nil().expect("nil"));
    assert!(arena.make_slice(&desc, 2, 1).is_err());
    assert!(arena.make_slice(&arena.registry().int16(), 0, 0).is_err());
}

#[test]
fn test_subslice_shares_storage() {
    let arena = arena();
    let arr = arena.registry().array_of(6, &arena.registry().uint32()).expect("array");
    let v = arena.alloc(&arr).expect("alloc");

    let sub = v.slice(2, 4).expect("slice");
    assert_eq!(sub.kind(), Kind::Slice);
    assert_eq!(sub.len().expect("len"), 2);
    assert_eq!(sub.cap().expect("cap"), 4);

    sub.index(0).expect("index").set_u64(7).expect("set");
    assert_eq!(v.index(2).expect("index").as_u64().expect("get"), 7);

    let subsub = sub.slice(1, 4).expect("reslice");
    assert_eq!(subsub.len().expect("len"), 3);
    assert_eq!(
        subsub.index(0).expect("index").address(),
        v.index(3).expect("index").address()
    );

    assert!(v.slice(4, 2).is_err());
    assert!(v.slice(0, 7).is_err());
    let tail = v.slice(6, 6).expect("empty tail");
    assert!(tail.is_nil().expect("nil"));
}

#[test]
fn test_pointer_round_trip() {
    let arena = arena();
    let reg = arena.registry().clone();
    let target = arena.alloc(&reg.int64()).expect("alloc");
    target.set_i64(1234).expect("set");

    let ptr = target.address_of().expect("address_of");
    assert_eq!(ptr.kind(), Kind::Pointer);
    assert_eq!(ptr.descriptor().name(), "int64*");
    assert_eq!(ptr.as_u64().expect("addr") as usize, target.address());

    let alias = ptr.elem().expect("elem");
    alias.set_i64(-1).expect("set");
    assert_eq!(target.as_i64().expect("get"), -1);
    assert_eq!(ptr.indirect().expect("indirect").as_i64().expect("get"), -1);
    assert_eq!(target.indirect().expect("indirect").address(), target.address());
}

#[test]
fn test_nil_and_unmapped_pointers() {
    let arena = arena();
    let reg = arena.registry().clone();
    let ptr = arena.alloc(&reg.pointer_to(&reg.int32()).expect("pointer")).expect("alloc");
    assert!(ptr.is_nil().expect("nil"));
    assert!(matches!(ptr.elem(), Err(Error::NilPointer(_))));

    ptr.set_pointer(0x10).expect("set");
    assert!(matches!(ptr.elem(), Err(Error::UnmappedAddress(0x10))));
}

#[test]
fn test_point_to_checks_compatibility() {
    let arena = arena();
    let reg = arena.registry().clone();
    let ptr = arena.alloc(&reg.pointer_to(&reg.int32()).expect("pointer")).expect("alloc");
    let wrong = arena.alloc(&reg.double()).expect("alloc");
    assert!(matches!(
        ptr.point_to(&wrong),
        Err(Error::TypeIncompatible { .. })
    ));

    let right = arena.alloc(&reg.int32()).expect("alloc");
    ptr.point_to(&right).expect("point");
    assert_eq!(ptr.elem().expect("elem").address(), right.address());

    let opaque = arena.alloc(&reg.pointer()).expect("alloc");
    opaque.point_to(&wrong).expect("opaque accepts any target");
}

#[test]
fn test_pointer_through_struct_path() {
    let arena = arena();
    let reg = arena.registry().clone();
    let leaf = StructBuilder::new(&reg, "Leaf")
        .field("a", reg.int32())
        .build()
        .expect("Leaf");
    let node = StructBuilder::new(&reg, "Node")
        .pointer_field("leaf", &leaf)
        .build()
        .expect("Node");

    let leaf_value = arena.alloc(&leaf).expect("alloc");
    leaf_value.field(0).expect("a").set_i64(3).expect("set");
    let node_value = arena.alloc(&node).expect("alloc");
    node_value
        .field(0)
        .expect("leaf")
        .point_to(&leaf_value)
        .expect("point");

    let a = node_value.field_by_index(&[0, 0]).expect("path");
    assert_eq!(a.as_i64().expect("get"), 3);
}

#[test]
fn test_copy_from() {
    let arena = arena();
    let reg = arena.registry().clone();
    let a = arena.alloc(&reg.uint32()).expect("alloc");
    let b = arena.alloc(&reg.uint32()).expect("alloc");
    a.set_u64(77).expect("set");
    b.copy_from(&a).expect("copy");
    assert_eq!(b.as_u64().expect("get"), 77);

    let c = arena.alloc(&reg.uint8()).expect("alloc");
    assert!(matches!(
        c.copy_from(&a),
        Err(Error::TypeIncompatible { .. })
    ));
}

#[test]
fn test_growth_preserves_elements() {
    let arena = arena();
    let desc = arena.registry().slice_of(&arena.registry().int32()).expect("slice");
    let s = arena.make_slice(&desc, 0, 0).expect("make");

    let s = s.ensure_capacity(3).expect("grow");
    assert_eq!(s.cap().expect("cap"), 3);
    for i in 0..3 {
        s.index(i).expect("index").set_i64(i as i64 + 1).expect("set");
    }

    let grown = s.ensure_capacity(10).expect("grow");
    assert_eq!(grown.len().expect("len"), 10);
    assert_eq!(grown.cap().expect("cap"), 12);
    for i in 0..3 {
        assert_eq!(
            grown.index(i).expect("index").as_i64().expect("get"),
            i as i64 + 1
        );
    }
    assert_eq!(grown.index(9).expect("index").as_i64().expect("get"), 0);

    let shrunk = grown.ensure_capacity(4).expect("reslice");
    assert_eq!(shrunk.len().expect("len"), 4);
    assert_eq!(
        shrunk.index(0).expect("index").address(),
        grown.index(0).expect("index").address()
    );
}

#[test]
fn test_growth_threshold_from_config() {
    let registry = Arc::new(TypeRegistry::new(Arc::new(NaturalAbi::new())));
    let config = RuntimeConfig {
        growth_threshold: 4,
        ..RuntimeConfig::default()
    };
    let arena = Arena::with_config(registry.clone(), &config).expect("config");
    let desc = registry.slice_of(&registry.uint8()).expect("slice");
    let s = arena.make_slice(&desc, 4, 4).expect("make");
    let grown = s.ensure_capacity(5).expect("grow");
    assert_eq!(grown.cap().expect("cap"), 5);
}

#[test]
fn test_values_keep_arena_alive() {
    let registry = Arc::new(TypeRegistry::new(Arc::new(NaturalAbi::new())));
    let value = {
        let arena = Arena::new(registry.clone());
        let v = arena.alloc(&registry.int32()).expect("alloc");
        v.set_i64(11).expect("set");
        v
    };
    assert_eq!(value.as_i64().expect("get"), 11);
    assert_eq!(value.arena().region_count(), 1);
}

#[test]
fn test_growth_in_struct_slot_frees_old_buffers() {
    let arena = arena();
    let reg = arena.registry().clone();
    let series = StructBuilder::new(&reg, "Series")
        .field("samples", reg.slice_of(&reg.int64()).expect("slice"))
        .build()
        .expect("Series");
    let value = arena.alloc(&series).expect("alloc");
    let slot = value.field(0).expect("samples");

    for n in 1..=100usize {
        let grown = slot.ensure_capacity(n).expect("grow");
        grown.index(n - 1).expect("index").set_i64(n as i64).expect("set");
        slot.copy_from(&grown).expect("write back");
    }

    // The struct and its current backing buffer.
    assert_eq!(arena.region_count(), 2);
    assert_eq!(slot.len().expect("len"), 100);
    for n in 1..=100usize {
        assert_eq!(
            slot.index(n - 1).expect("index").as_i64().expect("get"),
            n as i64
        );
    }
}

#[test]
fn test_pointer_keeps_target_alive() {
    let arena = arena();
    let reg = arena.registry().clone();
    let ptr = arena.alloc(&reg.pointer_to(&reg.int64()).expect("pointer")).expect("alloc");
    {
        let target = arena.alloc(&reg.int64()).expect("alloc");
        target.set_i64(5).expect("set");
        ptr.point_to(&target).expect("point");
    }
    assert_eq!(arena.region_count(), 2);
    assert_eq!(ptr.elem().expect("elem").as_i64().expect("get"), 5);

    let addr_of = {
        let v = arena.value_of(&9i32).expect("value");
        v.address_of().expect("address_of")
    };
    assert_eq!(addr_of.elem().expect("elem").as_i64().expect("get"), 9);

    ptr.set_pointer(0).expect("clear");
    drop(addr_of);
    assert_eq!(arena.region_count(), 1);
}

#[test]
fn test_slice_data_survives_header_drop() {
    let arena = arena();
    let reg = arena.registry().clone();
    let desc = reg.slice_of(&reg.uint16()).expect("slice");
    let head = {
        let s = arena.make_slice(&desc, 4, 4).expect("make");
        s.index(3).expect("index").set_u64(12).expect("set");
        s.slice(2, 4).expect("subslice")
    };
    assert_eq!(head.index(1).expect("index").as_u64().expect("get"), 12);
    assert_eq!(arena.region_count(), 2);
}

#[test]
fn test_corrupt_slice_address_is_unmapped() {
    let arena = arena();
    let reg = arena.registry().clone();
    let desc = reg.slice_of(&reg.int64()).expect("slice");
    let mut header: [usize; 3] = [2, 2, usize::MAX - 3];
    let value = unsafe { arena.value_at(&desc, header.as_mut_ptr().cast()) }.expect("view");

    assert!(matches!(value.index(1), Err(Error::UnmappedAddress(_))));
    assert!(matches!(value.slice(1, 2), Err(Error::UnmappedAddress(_))));
}

