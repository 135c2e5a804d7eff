// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

extern crate proc_macro;

use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Data, DeriveInput, Fields, LitStr};

/// `#[derive(Marshal)]` macro: generates `dynffi::Describe` + `dynffi::Marshal`
///
/// The struct is declared in the registry under its Rust name (or the name
/// given with `#[ffi(name = "...")]`), with one C field per Rust field, in
/// declaration order. Every field type must itself implement `Marshal`.
///
/// Supports named-field and tuple structs without generic parameters. Tuple
/// fields are named `_0`, `_1`, ...
///
/// Example:
/// ```ignore
/// use dynffi::Marshal;
///
/// #[derive(Marshal)]
/// #[ffi(name = "struct point")]
/// struct Point {
///     x: i32,
///     y: i32,
///     tags: Vec<u8>,
/// }
/// ```
#[proc_macro_derive(Marshal, attributes(ffi))]
pub fn derive_marshal(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// One Rust field mapped to a C field.
struct FieldInfo {
    /// Name in the C declaration.
    c_name: String,
    /// Accessor (`self.<member>`).
    member: syn::Member,
    ty: syn::Type,
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Generic structs are not supported",
        ));
    }

    let c_name = type_name_attr(input)?.unwrap_or_else(|| name.to_string());

    let fields = match &input.data {
        Data::Struct(data) => collect_fields(&data.fields)?,
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Only structs are supported",
            ))
        }
    };
    if fields.is_empty() {
        return Err(syn::Error::new_spanned(
            input,
            "Structs without fields have no C layout",
        ));
    }

    let field_decls = fields.iter().map(|f| {
        let c_field = &f.c_name;
        let ty = &f.ty;
        quote! {
            ::dynffi::Field::new(
                #c_field,
                <#ty as ::dynffi::Describe>::describe(registry)?,
            )
        }
    });

    let encodes = fields.iter().enumerate().map(|(i, f)| {
        let member = &f.member;
        quote! {
            ::dynffi::Marshal::encode_into(&self.#member, &value.field(#i)?)?;
        }
    });

    let decodes = fields.iter().enumerate().map(|(i, f)| {
        let member = &f.member;
        let ty = &f.ty;
        quote! {
            #member: <#ty as ::dynffi::Marshal>::decode_from(&value.field(#i)?)?
        }
    });

    Ok(quote! {
        impl ::dynffi::Describe for #name {
            fn describe(
                registry: &::dynffi::TypeRegistry,
            ) -> ::dynffi::Result<::std::sync::Arc<::dynffi::TypeDescriptor>> {
                let fields = ::std::vec![#(#field_decls),*];
                let desc = registry.declare_struct(#c_name, &fields)?;
                if desc.native_type().is_none() {
                    registry.associate(&desc, ::dynffi::NativeType::of::<Self>())?;
                }
                Ok(desc)
            }
        }

        impl ::dynffi::Marshal for #name {
            fn encode_into(&self, value: &::dynffi::Value) -> ::dynffi::Result<()> {
                #(#encodes)*
                Ok(())
            }

            fn decode_from(value: &::dynffi::Value) -> ::dynffi::Result<Self> {
                Ok(Self {
                    #(#decodes),*
                })
            }
        }
    })
}

fn collect_fields(fields: &Fields) -> syn::Result<Vec<FieldInfo>> {
    match fields {
        Fields::Named(named) => named
            .named
            .iter()
            .map(|field| {
                let Some(ident) = field.ident.as_ref() else {
                    return Err(syn::Error::new_spanned(field, "Field must have a name"));
                };
                Ok(FieldInfo {
                    c_name: ident.to_string().trim_start_matches("r#").to_string(),
                    member: syn::Member::Named(ident.clone()),
                    ty: field.ty.clone(),
                })
            })
            .collect(),
        Fields::Unnamed(unnamed) => Ok(unnamed
            .unnamed
            .iter()
            .enumerate()
            .map(|(i, field)| FieldInfo {
                c_name: format_ident!("_{}", i).to_string(),
                member: syn::Member::Unnamed(syn::Index::from(i)),
                ty: field.ty.clone(),
            })
            .collect()),
        Fields::Unit => Ok(Vec::new()),
    }
}

/// Value of `#[ffi(name = "...")]`, if present.
fn type_name_attr(input: &DeriveInput) -> syn::Result<Option<String>> {
    let mut name = None;
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("ffi")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let lit: LitStr = meta.value()?.parse()?;
                if lit.value().is_empty() {
                    return Err(meta.error("ffi name must not be empty"));
                }
                name = Some(lit.value());
                Ok(())
            } else {
                Err(meta.error("unsupported ffi attribute, expected `name`"))
            }
        })?;
    }
    Ok(name)
}
