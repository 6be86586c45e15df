//! # Seed Data
//!
//! Human-editable JSON source of the bank.
//!
//! ## Format
//! - `categories`: ordered list of `{name, glyph?, items: [{id, name, glyph}]}`
//! - `recipes`: ordered list of `{id, title, description?, ingredients, steps, timeMinutes, difficulty, portions?}`
//!
//! Recipe ingredients are plain names. They are resolved to item ids by their sanitized form, and
//! names missing from the catalog are kept for display and reported back. A recipe must still
//! resolve at least `min(2, distinct ingredients)` items, otherwise it would match on fewer items
//! than it really needs.
use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use crate::{
    BankError,
    foods::{Bank, Category, Difficulty, Item, Recipe},
    utils::{category_glyph, sanitize},
};

const DEFAULT_PORTIONS: u32 = 2;

#[derive(Deserialize)]
pub struct Seed {
    pub categories: Vec<SeedCategory>,

    #[serde(default)]
    pub recipes: Vec<SeedRecipe>,
}

#[derive(Deserialize)]
pub struct SeedCategory {
    pub name: String,

    #[serde(default)]
    pub glyph: Option<String>,

    pub items: Vec<SeedItem>,
}

#[derive(Deserialize)]
pub struct SeedItem {
    pub id: u32,
    pub name: String,

    #[serde(alias = "icon")]
    pub glyph: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedRecipe {
    pub id: u32,

    #[serde(alias = "name")]
    pub title: String,

    #[serde(default)]
    pub description: String,

    pub ingredients: Vec<String>,
    pub steps: Vec<String>,
    pub time_minutes: u32,
    pub difficulty: String,

    #[serde(default = "default_portions")]
    pub portions: u32,
}

fn default_portions() -> u32 {
    DEFAULT_PORTIONS
}

/// Ingredient names that did not resolve to a catalog item.
#[derive(Debug, Default, PartialEq)]
pub struct Report {
    pub unresolved: Vec<(u32, String)>,
}

pub fn parse_seed(json: &str) -> Result<Seed, BankError> {
    Ok(serde_json::from_str(json)?)
}

pub fn build_bank(seed: Seed) -> Result<(Bank, Report), BankError> {
    let mut seen_items = HashSet::new();
    let mut name_to_id: HashMap<String, u32> = HashMap::new();
    let mut categories = Vec::with_capacity(seed.categories.len());

    for category in seed.categories {
        let glyph = category
            .glyph
            .unwrap_or_else(|| category_glyph(&category.name).to_string());

        let mut items = Vec::with_capacity(category.items.len());
        for item in category.items {
            if !seen_items.insert(item.id) {
                return Err(BankError::DuplicateItem(item.id));
            }

            let name = sanitize(&item.name);
            if name.is_empty() {
                return Err(BankError::EmptyName(item.id));
            }

            name_to_id.entry(name.clone()).or_insert(item.id);
            items.push(Item {
                id: item.id,
                name,
                glyph: item.glyph,
                category: category.name.clone(),
            });
        }

        categories.push(Category {
            name: category.name,
            glyph,
            items,
        });
    }

    let mut report = Report::default();
    let mut seen_recipes = HashSet::new();
    let mut recipes = Vec::with_capacity(seed.recipes.len());

    for seed_recipe in seed.recipes {
        if !seen_recipes.insert(seed_recipe.id) {
            return Err(BankError::DuplicateRecipe(seed_recipe.id));
        }

        if seed_recipe.ingredients.is_empty() || seed_recipe.steps.is_empty() {
            return Err(BankError::IncompleteRecipe(seed_recipe.id));
        }

        let difficulty = Difficulty::parse(&seed_recipe.difficulty).ok_or_else(|| {
            BankError::UnknownDifficulty {
                recipe: seed_recipe.id,
                value: seed_recipe.difficulty.clone(),
            }
        })?;

        let mut item_ids = Vec::new();
        let mut ingredients = Vec::with_capacity(seed_recipe.ingredients.len());

        for ingredient in seed_recipe.ingredients {
            let name = sanitize(&ingredient);

            match name_to_id.get(&name) {
                Some(&id) if !item_ids.contains(&id) => item_ids.push(id),
                Some(_) => {}
                None => report.unresolved.push((seed_recipe.id, name.clone())),
            }

            ingredients.push(name);
        }

        let distinct: HashSet<&String> = ingredients.iter().collect();
        if item_ids.len() < distinct.len().min(2) {
            return Err(BankError::UnresolvedRecipe {
                recipe: seed_recipe.id,
                resolved: item_ids.len(),
            });
        }

        let mut recipe = Recipe {
            id: seed_recipe.id,
            title: seed_recipe.title,
            description: seed_recipe.description,
            item_ids,
            ingredients,
            steps: seed_recipe.steps,
            time_minutes: seed_recipe.time_minutes,
            difficulty: 0,
            portions: seed_recipe.portions,
        };
        recipe.set_difficulty(difficulty);

        recipes.push(recipe);
    }

    Ok((
        Bank {
            categories,
            recipes,
        },
        report,
    ))
}
