//! # Strata Macros
//!
//! Procedural macros for the Strata framework.
//!
//! - `#[derive(Model)]` turns a unit struct into a table-backed model

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod model;

/// Derive `strata_core::orm::Model` for a struct.
///
/// # Example
///
/// ```ignore
/// use strata_core::{Model, Relation};
///
/// #[derive(Model)]
/// #[model(table = "posts", fillable = ["title", "body"], relations = post_relations)]
/// struct Post;
///
/// fn post_relations(name: &str) -> Option<Relation> {
///     match name {
///         "author" => Some(Relation::belongs_to::<User>("user_id")),
///         _ => None,
///     }
/// }
/// ```
///
/// # Attributes
///
/// - `table = "name"` - backing table (required)
/// - `primary_key = "column"` - identity column, defaults to `id`
/// - `fillable = [..]` - mass-assignable columns
/// - `guarded = [..]` - columns rejected by mass assignment
/// - `relations = path` - `fn(&str) -> Option<Relation>` resolving relation names
#[proc_macro_derive(Model, attributes(model))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    model::expand(&input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
