//! # opjson Derive Macros
//!
//! This crate provides `#[derive(JsonObject)]` for `opjson`. The derive
//! implements `opjson::Describe`: it reports every field's offset, type and
//! JSON options to the descriptor builder, binds the capability hooks the
//! container asks for, and gives non-generic types a static cache slot.
//!
//! Compatible with `syn 2.0`.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, LitStr};

/// Derives `opjson::Describe`.
///
/// Field attributes (`#[json(...)]`):
/// * `rename = "key"`: object key, defaults to the field name.
/// * `omitempty`: skip the field when it is false, 0, empty or null.
/// * `omitzero`: skip the field when it is its type's zero value.
/// * `string`: encode a scalar inside a JSON string.
/// * `flatten`: promote the nested struct's fields into this object.
/// * `skip`: leave the field out entirely.
///
/// Container attributes: `is_zero`, `marshal`, `unmarshal` bind the type's
/// `IsZero`, `MarshalJson` and `UnmarshalJson` implementations. `opaque`
/// describes a type whose JSON form comes only from its hooks; it works on
/// any type, not just structs.
#[proc_macro_derive(JsonObject, attributes(json))]
pub fn derive_json_object(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

// --- Internal Data Structures ---

#[derive(Default)]
struct ContainerAttrs {
    is_zero: bool,
    marshal: bool,
    unmarshal: bool,
    opaque: bool,
}

#[derive(Default)]
struct FieldAttrs {
    rename: Option<String>,
    omit_empty: bool,
    omit_zero: bool,
    as_string: bool,
    flatten: bool,
    skip: bool,
}

fn expand(input: DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let container = parse_container_attributes(&input.attrs)?;

    let describe_body = if container.opaque {
        if !(container.marshal || container.unmarshal) {
            return Err(syn::Error::new(
                name.span(),
                "#[json(opaque)] needs a `marshal` or `unmarshal` hook",
            ));
        }
        quote! { ::opjson::rt::Kind::Opaque }
    } else {
        generate_fields(&input)?
    };

    let hooks = generate_hooks(&container);

    // Generic types share one function body across instantiations, so a
    // `static` slot there would be shared too. They use the keyed cache.
    let type_slot = if input.generics.params.is_empty() {
        quote! {
            fn type_slot() -> ::core::option::Option<&'static ::opjson::rt::TypeSlot> {
                static SLOT: ::opjson::rt::TypeSlot = ::opjson::rt::TypeSlot::new();
                ::core::option::Option::Some(&SLOT)
            }
        }
    } else {
        quote! {}
    };

    let mut generics = input.generics.clone();
    for param in generics.type_params_mut() {
        param.bounds.push(syn::parse_quote!(::opjson::Describe));
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    Ok(quote! {
        #[automatically_derived]
        #[allow(unsafe_code)]
        unsafe impl #impl_generics ::opjson::Describe for #name #ty_generics #where_clause {
            fn describe(cx: &mut ::opjson::rt::DescribeCx) -> ::opjson::rt::Kind {
                let _ = &cx;
                #describe_body
            }

            #hooks

            #type_slot
        }
    })
}

// --- Attribute Parsing ---

fn parse_container_attributes(attrs: &[Attribute]) -> syn::Result<ContainerAttrs> {
    let mut out = ContainerAttrs::default();
    for attr in attrs {
        if attr.path().is_ident("json") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("is_zero") {
                    out.is_zero = true;
                    return Ok(());
                }
                if meta.path.is_ident("marshal") {
                    out.marshal = true;
                    return Ok(());
                }
                if meta.path.is_ident("unmarshal") {
                    out.unmarshal = true;
                    return Ok(());
                }
                if meta.path.is_ident("opaque") {
                    out.opaque = true;
                    return Ok(());
                }
                Err(meta.error("Unknown json container attribute. Supported: is_zero, marshal, unmarshal, opaque"))
            })?;
        }
    }
    Ok(out)
}

fn parse_field_attributes(attrs: &[Attribute]) -> syn::Result<FieldAttrs> {
    let mut out = FieldAttrs::default();
    for attr in attrs {
        if attr.path().is_ident("json") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") {
                    let s: LitStr = meta.value()?.parse()?;
                    out.rename = Some(s.value());
                    return Ok(());
                }
                if meta.path.is_ident("omitempty") {
                    out.omit_empty = true;
                    return Ok(());
                }
                if meta.path.is_ident("omitzero") {
                    out.omit_zero = true;
                    return Ok(());
                }
                if meta.path.is_ident("string") {
                    out.as_string = true;
                    return Ok(());
                }
                if meta.path.is_ident("flatten") {
                    out.flatten = true;
                    return Ok(());
                }
                if meta.path.is_ident("skip") {
                    out.skip = true;
                    return Ok(());
                }
                Err(meta.error(
                    "Unknown json field attribute. Supported: rename, omitempty, omitzero, string, flatten, skip",
                ))
            })?;
        }
    }
    Ok(out)
}

// --- Generators ---

fn generate_fields(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let named = match &input.data {
        Data::Struct(ds) => match &ds.fields {
            Fields::Named(named) => named,
            _ => {
                return Err(syn::Error::new(
                    name.span(),
                    "JsonObject only supports structs with named fields; use #[json(opaque)] with hooks otherwise",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new(
                name.span(),
                "JsonObject only supports structs; use #[json(opaque)] with hooks otherwise",
            ))
        }
    };

    let mut calls = Vec::new();
    for field in &named.named {
        let attrs = parse_field_attributes(&field.attrs)?;
        if attrs.skip {
            continue;
        }
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let ty = &field.ty;
        let field_name = ident.to_string().trim_start_matches("r#").to_string();
        let key = attrs.rename.unwrap_or_else(|| field_name.clone());
        let omit_empty = attrs.omit_empty;
        let omit_zero = attrs.omit_zero;
        let as_string = attrs.as_string;
        let flatten = attrs.flatten;
        calls.push(quote! {
            .field::<#ty>(
                #field_name,
                #key,
                ::core::mem::offset_of!(Self, #ident),
                ::opjson::rt::options(#omit_empty, #omit_zero, #as_string, #flatten),
            )
        });
    }

    Ok(quote! {
        cx.struct_fields()
            #(#calls)*
            .finish()
    })
}

fn generate_hooks(container: &ContainerAttrs) -> proc_macro2::TokenStream {
    if !(container.is_zero || container.marshal || container.unmarshal) {
        return quote! {};
    }
    let is_zero = container
        .is_zero
        .then(|| quote! { .with_is_zero::<Self>() });
    let marshal = container
        .marshal
        .then(|| quote! { .with_marshal::<Self>() });
    let unmarshal = container
        .unmarshal
        .then(|| quote! { .with_unmarshal::<Self>() });
    quote! {
        fn hooks() -> ::opjson::rt::Hooks {
            ::opjson::rt::Hooks::NONE #is_zero #marshal #unmarshal
        }
    }
}
