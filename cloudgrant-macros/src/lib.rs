//! Procedural macros for cloudgrant
//!
//! This crate provides the `#[derive(MergeProps)]` macro, which turns a struct of
//! optional configuration fields into a typed, field-by-field merge.

use darling::{FromDeriveInput, FromField, ast::Data};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{DeriveInput, Ident, parse_macro_input};

/// Per-field `#[merge(...)]` arguments
#[derive(Debug, FromField)]
#[darling(attributes(merge))]
struct MergeField {
    ident: Option<Ident>,
    /// Merge strategy: "scalar", "replace", "union", "permissions" or "concat"
    #[darling(default)]
    strategy: Option<String>,
}

#[derive(Debug, FromDeriveInput)]
#[darling(attributes(merge), supports(struct_named))]
struct MergeInput {
    ident: Ident,
    generics: syn::Generics,
    data: Data<(), MergeField>,
}

/// Derive macro for partial configuration structs.
///
/// Every field must be an `Option<_>`. Fields without an attribute use the
/// `scalar` strategy (override wins if set).
///
/// # Example
///
/// ```ignore
/// #[derive(Default, MergeProps)]
/// pub struct FunctionProps {
///     pub timeout: Option<u32>,
///     #[merge(strategy = "union")]
///     pub environment: Option<BTreeMap<String, String>>,
///     #[merge(strategy = "permissions")]
///     pub permissions: Option<Permissions>,
///     #[merge(strategy = "replace")]
///     pub bundle: Option<Bundle>,
///     #[merge(strategy = "concat")]
///     pub layers: Option<Vec<LayerRef>>,
/// }
/// ```
#[proc_macro_derive(MergeProps, attributes(merge))]
pub fn derive_merge_props(item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);

    let args = match MergeInput::from_derive_input(&input) {
        Ok(v) => v,
        Err(e) => return TokenStream::from(e.write_errors()),
    };

    TokenStream::from(impl_merge_props(&args))
}

fn impl_merge_props(args: &MergeInput) -> TokenStream2 {
    let struct_name = &args.ident;
    let (impl_generics, ty_generics, where_clause) = args.generics.split_for_impl();

    let fields = match args.data.as_ref().take_struct() {
        Some(fields) => fields.fields,
        None => {
            return syn::Error::new_spanned(struct_name, "MergeProps only supports structs")
                .to_compile_error();
        }
    };

    let mut merged = Vec::with_capacity(fields.len());
    for field in fields {
        let Some(name) = &field.ident else {
            return syn::Error::new_spanned(struct_name, "MergeProps requires named fields")
                .to_compile_error();
        };

        let strategy = field.strategy.as_deref().unwrap_or("scalar");
        let merge_fn = match strategy {
            "scalar" => quote! { crate::props::merge::scalar },
            "replace" => quote! { crate::props::merge::replace },
            "union" => quote! { crate::props::merge::union },
            "permissions" => quote! { crate::props::merge::permissions },
            "concat" => quote! { crate::props::merge::concat },
            other => {
                return syn::Error::new_spanned(
                    name,
                    format!(
                        "Unknown merge strategy: {}. Use: scalar, replace, union, permissions, or concat",
                        other
                    ),
                )
                .to_compile_error();
            }
        };

        merged.push(quote! {
            #name: #merge_fn(&self.#name, &other.#name)
        });
    }

    quote! {
        impl #impl_generics crate::props::MergeProps for #struct_name #ty_generics #where_clause {
            fn merge(&self, other: &Self) -> Self {
                Self {
                    #(#merged,)*
                }
            }
        }
    }
}
