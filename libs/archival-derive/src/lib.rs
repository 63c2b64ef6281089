//! `#[derive(Archival)]`: generates `SaveValue`/`LoadValue`,
//! `SaveRootValue`/`LoadRootValue`, and `CountableFields` for a struct with
//! named fields, binding each field under its Rust name (or a
//! `#[archival(rename = "...")]` override).
//!
//! This is the derive-macro code-generation seam the original resolves via
//! ADL-found free `Serialize`/`Load` overloads and manual `archive <<
//! KeyValue(name, field, Required(), Range(...), ...)` chains in a
//! hand-written method body; here the same per-field bindings are generated
//! once, at compile time, from the struct's own field list.
//!
//! `#[archival(required)]` and `#[archival(range = "min..=max")]` attach the
//! [`archival_core::dispatch::Required`](../archival_core/dispatch/struct.Required.html)
//! and [`Range`](../archival_core/dispatch/struct.Range.html) validators to
//! a field on load, reporting through the same validation-error
//! accumulation [`bind_load`](../archival_core/dispatch/fn.bind_load.html)
//! uses for hand-written bindings. For checks beyond presence and numeric
//! range — an email shape, a refiner chain, a cross-field check — write the
//! field's `SaveRootValue`/`LoadRootValue` impl by hand with `bind_save`/
//! `bind_load` instead of deriving it.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, LitInt, LitStr};

/// Per-field `#[archival(...)]` attribute contents.
#[derive(Default)]
struct FieldAttrs {
    rename: Option<String>,
    default_on_missing: bool,
    required: bool,
    range: Option<(LitInt, LitInt)>,
}

/// Splits a `"min..=max"` or `"min..max"` range literal, the same shape
/// `std::ops::Range`/`RangeInclusive` accept as a Rust expression.
fn parse_range_literal(value: &LitStr) -> syn::Result<(LitInt, LitInt)> {
    let text = value.value();
    let (min, max) = text
        .split_once("..=")
        .or_else(|| text.split_once(".."))
        .ok_or_else(|| syn::Error::new_spanned(value, "expected `min..=max` or `min..max`"))?;
    let min = syn::parse_str::<LitInt>(min.trim()).map_err(|_| syn::Error::new_spanned(value, "invalid range lower bound"))?;
    let max = syn::parse_str::<LitInt>(max.trim()).map_err(|_| syn::Error::new_spanned(value, "invalid range upper bound"))?;
    Ok((min, max))
}

fn parse_field_attrs(field: &syn::Field) -> syn::Result<FieldAttrs> {
    let mut attrs = FieldAttrs::default();
    for attr in &field.attrs {
        if !attr.path().is_ident("archival") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let value: LitStr = meta.value()?.parse()?;
                attrs.rename = Some(value.value());
            } else if meta.path.is_ident("default") {
                attrs.default_on_missing = true;
            } else if meta.path.is_ident("required") {
                attrs.required = true;
            } else if meta.path.is_ident("range") {
                let value: LitStr = meta.value()?.parse()?;
                attrs.range = Some(parse_range_literal(&value)?);
            }
            Ok(())
        })?;
    }
    Ok(attrs)
}

/// Derives the archive bindings for a struct with named fields.
///
/// ```ignore
/// #[derive(Archival)]
/// struct Point {
///     x: i64,
///     #[archival(rename = "Y")]
///     y: i64,
///     #[archival(required)]
///     label: Option<String>,
///     #[archival(range = "0..=120")]
///     age: i64,
/// }
/// ```
#[proc_macro_derive(Archival, attributes(archival))]
pub fn derive_archival(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match derive_impl(&input) {
        Ok(tokens) => tokens,
        Err(err) => err.to_compile_error().into(),
    }
}

fn derive_impl(input: &DeriveInput) -> Result<TokenStream, syn::Error> {
    let name = &input.ident;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(name, "Archival only supports structs with named fields"))
            }
        },
        _ => return Err(syn::Error::new_spanned(name, "Archival only supports structs")),
    };

    let mut save_field_stmts = Vec::new();
    let mut load_field_decls = Vec::new();
    let mut load_field_inits = Vec::new();

    for field in fields {
        let field_ident = field.ident.as_ref().ok_or_else(|| syn::Error::new_spanned(field, "expected named field"))?;
        let attrs = parse_field_attrs(field)?;
        let wire_key = attrs.rename.unwrap_or_else(|| field_ident.to_string());

        save_field_stmts.push(quote! {
            {
                let __key = #wire_key.to_owned();
                let mut __guard = ::archival_core::NameGuard::new(ctx, __key.clone());
                ::archival_core::SaveValue::save(&self.#field_ident, __guard.ctx(), scope, &__key)?;
            }
        });

        let missing_handling = if attrs.default_on_missing {
            quote! { .unwrap_or_default() }
        } else {
            quote! {
                .ok_or_else(|| ::archival_core::ArchiveError::mismatched_types(
                    __guard.ctx().current_path(),
                    concat!("missing required field `", stringify!(#field_ident), "`"),
                ))?
            }
        };

        let required_check = if attrs.required {
            quote! {
                // `__loaded` is `Option<FieldType>` (outer: was the key present at
                // all) and `#[archival(required)]` only applies to `Option<T>`
                // fields, so `__loaded` is really `Option<Option<T>>` here; flatten
                // one layer so `Required` sees the field's own presence, not the
                // always-`Some` outer layer `LoadValue for Option<T>` produces.
                let __present = matches!(&__loaded, Some(Some(_)));
                if let Some(__message) = ::archival_core::dispatch::Validator::validate(
                    &::archival_core::dispatch::Required,
                    &if __present { Some(()) } else { None },
                ) {
                    __guard.ctx().add_validation_error(format!("`{}`: {__message}", #wire_key))?;
                }
            }
        } else {
            quote! {}
        };

        let range_check = match &attrs.range {
            Some((min, max)) => quote! {
                if let Some(__message) = ::archival_core::dispatch::Validator::validate(
                    &::archival_core::dispatch::Range { min: #min, max: #max },
                    &__value,
                ) {
                    __guard.ctx().add_validation_error(format!("`{}`: {__message}", #wire_key))?;
                }
            },
            None => quote! {},
        };

        load_field_decls.push(quote! {
            let #field_ident = {
                let __key = #wire_key.to_owned();
                let mut __guard = ::archival_core::NameGuard::new(ctx, __key.clone());
                let __loaded = ::archival_core::LoadValue::load(__guard.ctx(), scope, &__key)?;
                #required_check
                let __value = __loaded #missing_handling;
                #range_check
                __value
            };
        });
        load_field_inits.push(quote! { #field_ident });
    }

    let expanded = quote! {
        impl ::archival_core::poly::CountableFields for #name {
            fn save_fields<O: ::archival_core::SaveObjectScope>(
                &self,
                ctx: &mut ::archival_core::SerializationContext,
                scope: &mut O,
            ) -> Result<(), ::archival_core::ArchiveError> {
                #(#save_field_stmts)*
                Ok(())
            }
        }

        impl #name {
            fn load_fields<O: ::archival_core::LoadObjectScope>(
                ctx: &mut ::archival_core::SerializationContext,
                scope: &mut O,
            ) -> Result<Self, ::archival_core::ArchiveError> {
                #(#load_field_decls)*
                Ok(Self { #(#load_field_inits),* })
            }
        }

        impl ::archival_core::SaveValue for #name {
            fn save<O: ::archival_core::SaveObjectScope>(
                &self,
                ctx: &mut ::archival_core::SerializationContext,
                scope: &mut O,
                key: &::archival_core::KeyType,
            ) -> Result<(), ::archival_core::ArchiveError> {
                let field_count = ::archival_core::poly::count_fields(ctx, self)?;
                let mut nested = scope.open_nested_object(ctx, key, field_count)?;
                ::archival_core::poly::CountableFields::save_fields(self, ctx, &mut nested)?;
                nested.close(ctx)
            }
        }

        impl ::archival_core::LoadValue for #name {
            fn load<O: ::archival_core::LoadObjectScope>(
                ctx: &mut ::archival_core::SerializationContext,
                scope: &mut O,
                key: &::archival_core::KeyType,
            ) -> Result<Option<Self>, ::archival_core::ArchiveError> {
                match scope.open_nested_object(ctx, key)? {
                    Some(mut nested) => Ok(Some(Self::load_fields(ctx, &mut nested)?)),
                    None => Ok(None),
                }
            }
        }

        impl ::archival_core::SaveRootValue for #name {
            fn save_root<R: ::archival_core::SaveRoot>(
                &self,
                ctx: &mut ::archival_core::SerializationContext,
                root: &mut R,
            ) -> Result<(), ::archival_core::ArchiveError> {
                let field_count = ::archival_core::poly::count_fields(ctx, self)?;
                let mut object = root.open_object(ctx, field_count)?;
                ::archival_core::poly::CountableFields::save_fields(self, ctx, &mut object)?;
                object.close(ctx)
            }
        }

        impl ::archival_core::LoadRootValue for #name {
            fn load_root<R: ::archival_core::LoadRoot>(
                ctx: &mut ::archival_core::SerializationContext,
                root: &mut R,
            ) -> Result<Self, ::archival_core::ArchiveError> {
                let mut object = root.open_object(ctx)?;
                Self::load_fields(ctx, &mut object)
            }
        }
    };

    Ok(expanded.into())
}
