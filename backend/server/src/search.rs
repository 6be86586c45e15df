//! # Catalog Search
//!
//! Live search over item names as the user types.
//!
//! ## Rules
//! - Queries shorter than 2 characters return nothing, the frontend hides the dropdown anyway
//! - An item is found when its lowercase name contains the query, or when its letters-only name
//!   does (so "маслораст" still finds "масло растительное")
//! - Results keep catalog order and are capped at the configured limit
use bank::{Catalog, foods::Item, foods::Recipe, utils::letters_only};

pub const MIN_QUERY_CHARS: usize = 2;

pub fn search_items<'a>(catalog: &'a Catalog, query: &str, limit: usize) -> Vec<&'a Item> {
    let query = query.trim().to_lowercase();

    if query.chars().count() < MIN_QUERY_CHARS {
        return Vec::new();
    }

    catalog
        .items()
        .filter(|item| {
            let name = item.name.to_lowercase();
            name.contains(&query) || letters_only(&name).contains(&query)
        })
        .take(limit)
        .collect()
}

pub fn popular_recipes(catalog: &Catalog, limit: usize) -> &[Recipe] {
    let recipes = catalog.recipes();

    &recipes[..recipes.len().min(limit)]
}
