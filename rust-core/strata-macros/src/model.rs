//! `#[derive(Model)]` expansion

use proc_macro2::TokenStream;
use quote::quote;
use syn::meta::ParseNestedMeta;
use syn::punctuated::Punctuated;
use syn::{bracketed, DeriveInput, LitStr, Path, Result, Token};

#[derive(Default)]
struct ModelAttrs {
    table: Option<LitStr>,
    primary_key: Option<LitStr>,
    fillable: Vec<LitStr>,
    guarded: Vec<LitStr>,
    relations: Option<Path>,
}

pub fn expand(input: &DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let attrs = parse_attrs(input)?;

    let Some(table) = attrs.table else {
        return Err(syn::Error::new_spanned(
            name,
            "missing #[model(table = \"...\")] attribute",
        ));
    };
    if table.value().trim().is_empty() {
        return Err(syn::Error::new_spanned(table, "table name cannot be empty"));
    }

    let primary_key = attrs.primary_key.map(|pk| {
        quote! { const PRIMARY_KEY: &'static str = #pk; }
    });
    let fillable = (!attrs.fillable.is_empty()).then(|| {
        let cols = &attrs.fillable;
        quote! { const FILLABLE: &'static [&'static str] = &[#(#cols),*]; }
    });
    let guarded = (!attrs.guarded.is_empty()).then(|| {
        let cols = &attrs.guarded;
        quote! { const GUARDED: &'static [&'static str] = &[#(#cols),*]; }
    });
    let relation = attrs.relations.map(|path| {
        quote! {
            fn relation(name: &str) -> ::core::option::Option<::strata_core::orm::Relation> {
                #path(name)
            }
        }
    });

    Ok(quote! {
        impl #impl_generics ::strata_core::orm::Model for #name #ty_generics #where_clause {
            const TABLE: &'static str = #table;
            #primary_key
            #fillable
            #guarded
            #relation
        }
    })
}

fn parse_attrs(input: &DeriveInput) -> Result<ModelAttrs> {
    let mut attrs = ModelAttrs::default();

    for attr in &input.attrs {
        if !attr.path().is_ident("model") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                attrs.table = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("primary_key") {
                attrs.primary_key = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("fillable") {
                attrs.fillable = parse_columns(&meta)?;
            } else if meta.path.is_ident("guarded") {
                attrs.guarded = parse_columns(&meta)?;
            } else if meta.path.is_ident("relations") {
                attrs.relations = Some(meta.value()?.parse()?);
            } else {
                return Err(meta.error(
                    "unknown model attribute, expected table, primary_key, fillable, guarded or relations",
                ));
            }
            Ok(())
        })?;
    }

    Ok(attrs)
}

/// `key = ["a", "b"]`
fn parse_columns(meta: &ParseNestedMeta<'_>) -> Result<Vec<LitStr>> {
    let input = meta.value()?;
    let content;
    bracketed!(content in input);
    let cols = Punctuated::<LitStr, Token![,]>::parse_terminated(&content)?;
    Ok(cols.into_iter().collect())
}
