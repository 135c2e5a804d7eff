// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type registry: the interning table from names to descriptors.

use crate::abi::{Abi, CallEngine, NaturalAbi};
use crate::config::{RuntimeConfig, LONG_DOUBLE_ALIGN, LONG_DOUBLE_SIZE, POINTER_SIZE};
use crate::error::{Error, Redeclaration, Result};
use crate::types::layout;
use crate::types::{Field, Kind, NativeType, TypeDescriptor};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ffi::{c_int, c_long};
use std::fmt;
use std::mem::size_of;
use std::sync::{Arc, OnceLock};

// ---------------------------------------------------------------------------
// Builtins
// ---------------------------------------------------------------------------

macro_rules! builtins {
    ($($field:ident => $name:literal, $kind:ident, $size:expr;)*) => {
        /// Builtin scalar descriptors, created once per registry.
        struct Builtins {
            $($field: Arc<TypeDescriptor>,)*
            pointer: Arc<TypeDescriptor>,
        }

        impl Builtins {
            fn new() -> Self {
                let void = Arc::new(TypeDescriptor::scalar("void", Kind::Void, 1, 1));
                let pointer = Arc::new(TypeDescriptor::pointer("*", void.clone()));
                Self {
                    $($field: builtin_scalar($name, Kind::$kind, $size, &void),)*
                    pointer,
                }
            }

            fn entries(&self) -> Vec<&Arc<TypeDescriptor>> {
                vec![$(&self.$field,)* &self.pointer]
            }
        }

        impl TypeRegistry {
            $(
                #[doc = concat!("Builtin `", $name, "`.")]
                pub fn $field(&self) -> Arc<TypeDescriptor> {
                    self.builtins.$field.clone()
                }
            )*

            /// Builtin opaque pointer `*`.
            pub fn pointer(&self) -> Arc<TypeDescriptor> {
                self.builtins.pointer.clone()
            }
        }
    };
}

builtins! {
    void => "void", Void, 1;
    c_uchar => "unsigned char", Uint8, 1;
    c_char => "char", Int8, 1;
    c_ushort => "unsigned short", Uint16, 2;
    c_short => "short", Int16, 2;
    c_uint => "unsigned int", Uint, size_of::<c_int>();
    c_int => "int", Int, size_of::<c_int>();
    c_ulong => "unsigned long", Ulong, size_of::<c_long>();
    c_long => "long", Long, size_of::<c_long>();
    uint8 => "uint8", Uint8, 1;
    int8 => "int8", Int8, 1;
    uint16 => "uint16", Uint16, 2;
    int16 => "int16", Int16, 2;
    uint32 => "uint32", Uint32, 4;
    int32 => "int32", Int32, 4;
    uint64 => "uint64", Uint64, 8;
    int64 => "int64", Int64, 8;
    float => "float", Float, 4;
    double => "double", Double, 8;
    long_double => "long double", LongDouble, LONG_DOUBLE_SIZE;
}

fn builtin_scalar(
    name: &str,
    kind: Kind,
    size: usize,
    void: &Arc<TypeDescriptor>,
) -> Arc<TypeDescriptor> {
    match kind {
        Kind::Void => void.clone(),
        Kind::LongDouble => Arc::new(TypeDescriptor::scalar(
            name,
            kind,
            size,
            LONG_DOUBLE_ALIGN,
        )),
        _ => Arc::new(TypeDescriptor::scalar(name, kind, size, size)),
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

struct Inner {
    types: HashMap<String, Arc<TypeDescriptor>>,
    next_anon_id: u64,
}

/// Interning table of type descriptors.
///
/// Every descriptor handed out by the registry is laid out and immutable.
/// Derived types (`T*`, `T[N]`, `T[]`) and structs are interned by name, so
/// asking twice for the same type returns the same `Arc`.
///
/// The registry is `Send + Sync`; one mutex guards the table and the
/// anonymous name counter.
pub struct TypeRegistry {
    engine: Arc<dyn CallEngine>,
    abi: Abi,
    anon_prefix: String,
    builtins: Builtins,
    inner: Mutex<Inner>,
}

impl TypeRegistry {
    /// Create a registry with default settings, pre-populated with builtins.
    #[must_use]
    pub fn new(engine: Arc<dyn CallEngine>) -> Self {
        Self::build(engine, &RuntimeConfig::default())
    }

    /// Create a registry from a configuration, after validating it.
    pub fn with_config(engine: Arc<dyn CallEngine>, config: &RuntimeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(engine, config))
    }

    fn build(engine: Arc<dyn CallEngine>, config: &RuntimeConfig) -> Self {
        let builtins = Builtins::new();
        let registry = Self {
            engine,
            abi: config.abi,
            anon_prefix: config.anon_prefix.clone(),
            inner: Mutex::new(Inner {
                types: builtin_table(&builtins),
                next_anon_id: 0,
            }),
            builtins,
        };
        log::debug!(
            "[registry] initialized with {} builtins (abi={})",
            registry.len(),
            registry.abi
        );
        registry
    }

    /// Process-wide registry using [`NaturalAbi`] and the default
    /// configuration, created on first use.
    pub fn global() -> Arc<TypeRegistry> {
        static GLOBAL: OnceLock<Arc<TypeRegistry>> = OnceLock::new();
        GLOBAL
            .get_or_init(|| Arc::new(TypeRegistry::new(Arc::new(NaturalAbi::new()))))
            .clone()
    }

    pub fn engine(&self) -> &Arc<dyn CallEngine> {
        &self.engine
    }

    pub fn abi(&self) -> Abi {
        self.abi
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<TypeDescriptor>> {
        self.inner.lock().types.get(name).cloned()
    }

    /// Builtin scalar by C name (`"unsigned long"`, `"int32"`, `"*"`...).
    pub fn builtin(&self, name: &str) -> Option<Arc<TypeDescriptor>> {
        self.builtins
            .entries()
            .into_iter()
            .find(|d| d.name() == name)
            .cloned()
    }

    /// Intern a laid-out descriptor. The first descriptor registered under a
    /// name wins; later calls return it unchanged.
    pub fn register(&self, desc: Arc<TypeDescriptor>) -> Arc<TypeDescriptor> {
        let mut inner = self.inner.lock();
        inner
            .types
            .entry(desc.name().to_string())
            .or_insert(desc)
            .clone()
    }

    /// Declare a struct type.
    ///
    /// An empty `name` declares an anonymous struct with a generated name.
    /// Declaring an existing name returns the registered descriptor when the
    /// field names and types match, and fails otherwise.
    pub fn declare_struct(&self, name: &str, fields: &[Field]) -> Result<Arc<TypeDescriptor>> {
        let mut inner = self.inner.lock();

        let name = if name.is_empty() {
            loop {
                let candidate = format!("{}{}", self.anon_prefix, inner.next_anon_id);
                inner.next_anon_id += 1;
                if !inner.types.contains_key(&candidate) {
                    break candidate;
                }
            }
        } else if name.contains(['*', '[', ']']) {
            return Err(Error::ReservedName(name.to_string()));
        } else {
            name.to_string()
        };

        if let Some(existing) = inner.types.get(&name) {
            if existing.kind() != Kind::Struct {
                return Err(Error::KindMismatch {
                    method: "TypeRegistry::declare_struct",
                    kind: existing.kind(),
                });
            }
            check_redeclaration(existing, fields).map_err(|mismatch| {
                Error::InconsistentRedeclaration {
                    name: name.clone(),
                    mismatch,
                }
            })?;
            return Ok(existing.clone());
        }

        let desc = Arc::new(layout::struct_descriptor(
            self.engine.as_ref(),
            self.abi,
            &name,
            fields,
        )?);
        log::debug!(
            "[registry] declared struct {} ({} fields, size={} align={})",
            name,
            fields.len(),
            desc.size(),
            desc.align()
        );
        inner.types.insert(name, desc.clone());
        Ok(desc)
    }

    /// Interned `elem[len]`.
    pub fn array_of(&self, len: usize, elem: &Arc<TypeDescriptor>) -> Result<Arc<TypeDescriptor>> {
        let mut inner = self.inner.lock();
        let name = format!("{}[{}]", elem.name(), len);
        if let Some(existing) = inner.types.get(&name) {
            return derived_match(existing, Kind::Array, elem, "TypeRegistry::array_of")
                .filter(|_| existing.array_len() == Some(len))
                .ok_or(Error::KindMismatch {
                    method: "TypeRegistry::array_of",
                    kind: existing.kind(),
                });
        }
        let desc = Arc::new(layout::array_descriptor(elem.clone(), len));
        inner.types.insert(name, desc.clone());
        Ok(desc)
    }

    /// Interned `elem*`.
    pub fn pointer_to(&self, elem: &Arc<TypeDescriptor>) -> Result<Arc<TypeDescriptor>> {
        let mut inner = self.inner.lock();
        intern_pointer(&mut inner, elem)
    }

    /// Interned `elem[]`.
    pub fn slice_of(&self, elem: &Arc<TypeDescriptor>) -> Result<Arc<TypeDescriptor>> {
        let mut inner = self.inner.lock();
        let name = format!("{}[]", elem.name());
        if let Some(existing) = inner.types.get(&name) {
            return derived_match(existing, Kind::Slice, elem, "TypeRegistry::slice_of").ok_or(
                Error::KindMismatch {
                    method: "TypeRegistry::slice_of",
                    kind: existing.kind(),
                },
            );
        }

        let data = intern_pointer(&mut inner, elem)?;
        let word = if POINTER_SIZE == 8 {
            self.builtins.int64.clone()
        } else {
            self.builtins.int32.clone()
        };
        let desc = Arc::new(layout::slice_descriptor(
            self.engine.as_ref(),
            self.abi,
            word,
            data,
            elem.clone(),
        )?);
        log::debug!("[registry] interned slice {} (size={})", name, desc.size());
        inner.types.insert(name, desc.clone());
        Ok(desc)
    }

    /// Link `desc` to a host type. Linking again to the same host type is a
    /// no-op.
    pub fn associate(&self, desc: &TypeDescriptor, native: NativeType) -> Result<()> {
        let linked = desc.link_native(native);
        if linked.id != native.id {
            return Err(Error::incompatible(desc.name(), native.name));
        }
        Ok(())
    }

    /// Drop every non-builtin descriptor and restart anonymous naming.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.types = builtin_table(&self.builtins);
        inner.next_anon_id = 0;
        log::debug!("[registry] reset to {} builtins", inner.types.len());
    }

    pub fn len(&self) -> usize {
        self.inner.lock().types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.lock().types.keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("abi", &self.abi)
            .field("anon_prefix", &self.anon_prefix)
            .field("types", &self.len())
            .finish()
    }
}

fn builtin_table(builtins: &Builtins) -> HashMap<String, Arc<TypeDescriptor>> {
    builtins
        .entries()
        .into_iter()
        .map(|d| (d.name().to_string(), d.clone()))
        .collect()
}

fn intern_pointer(inner: &mut Inner, elem: &Arc<TypeDescriptor>) -> Result<Arc<TypeDescriptor>> {
    let name = format!("{}*", elem.name());
    if let Some(existing) = inner.types.get(&name) {
        return derived_match(existing, Kind::Pointer, elem, "TypeRegistry::pointer_to").ok_or(
            Error::KindMismatch {
                method: "TypeRegistry::pointer_to",
                kind: existing.kind(),
            },
        );
    }
    let desc = Arc::new(TypeDescriptor::pointer(name.as_str(), elem.clone()));
    inner.types.insert(name, desc.clone());
    Ok(desc)
}

/// `existing` when it is a `kind` over `elem`. A descriptor registered
/// directly under a derived name can fail this.
fn derived_match(
    existing: &Arc<TypeDescriptor>,
    kind: Kind,
    elem: &Arc<TypeDescriptor>,
    method: &'static str,
) -> Option<Arc<TypeDescriptor>> {
    let same_elem = existing
        .elem()
        .is_some_and(|e| Arc::ptr_eq(e, elem) || **e == **elem);
    if existing.kind() == kind && same_elem {
        Some(existing.clone())
    } else {
        log::debug!(
            "[registry] {}: [{}] is registered as {}",
            method,
            existing.name(),
            existing.kind()
        );
        None
    }
}

fn check_redeclaration(
    existing: &TypeDescriptor,
    fields: &[Field],
) -> std::result::Result<(), Redeclaration> {
    let registered = existing.fields().unwrap_or_default();
    if registered.len() != fields.len() {
        return Err(Redeclaration::FieldCount {
            registered: registered.len(),
            requested: fields.len(),
        });
    }
    for (i, (old, new)) in registered.iter().zip(fields).enumerate() {
        if old.name != new.name {
            return Err(Redeclaration::FieldName(i));
        }
        if !Arc::ptr_eq(&old.ty, &new.ty) && *old.ty != *new.ty {
            return Err(Redeclaration::FieldType(i));
        }
    }
    Ok(())
}
