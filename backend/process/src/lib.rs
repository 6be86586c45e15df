//! # Bank Compilation
//!
//! Turns the human-editable seed JSON into the binary bank the server loads.
//!
//! ## Steps
//! 1. Parse the seed and sanitize every item name (lowercase, letters/digits/dashes, single spaces).
//!
//! 2. Reject duplicate ids, empty names, recipes without ingredients or steps and unknown difficulties.
//!
//! 3. Resolve recipe ingredient names to item ids. Names missing from the catalog stay on the recipe
//!    for display but do not count towards matching, so they are listed for the editor to fix.
//!
//! 4. Write the protobuf bank unless running in check mode.
use std::path::Path;

use anyhow::Context;
use bank::{get_seed_bank, write_bank};

#[derive(Debug, PartialEq)]
pub struct Stats {
    pub categories: usize,
    pub items: usize,
    pub recipes: usize,
    pub unresolved: usize,
}

pub fn compile_bank(seed_path: &Path, out_path: &Path, check: bool) -> anyhow::Result<Stats> {
    let (bank, report) = get_seed_bank(seed_path)
        .with_context(|| format!("Failed to compile {}", seed_path.display()))?;

    let stats = Stats {
        categories: bank.categories.len(),
        items: bank.categories.iter().map(|c| c.items.len()).sum(),
        recipes: bank.recipes.len(),
        unresolved: report.unresolved.len(),
    };

    println!("Loaded Categories: {}", stats.categories);
    println!("Loaded Items: {}", stats.items);
    println!("Loaded Recipes: {}\n", stats.recipes);

    if report.unresolved.is_empty() {
        println!("All ingredients resolved.");
    } else {
        println!("Unresolved Ingredients: {}", stats.unresolved);
        for (recipe, name) in &report.unresolved {
            println!("  recipe {recipe}: {name}");
        }
    }

    if check {
        println!("\nCheck only, nothing written.");
        return Ok(stats);
    }

    write_bank(&bank, out_path)
        .with_context(|| format!("Failed to write {}", out_path.display()))?;
    println!("\nWrote {}", out_path.display());

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use bank::get_bank;

    use super::*;

    const SEED: &str = r#"{
        "categories": [{"name": "Молочные", "items": [
            {"id": 1, "name": "сыр", "glyph": "🧀"},
            {"id": 2, "name": "сметана", "glyph": "🥣"}
        ]}],
        "recipes": [{
            "id": 1, "title": "Соус", "ingredients": ["сыр", "сметана", "укроп"],
            "steps": ["Смешайте"], "timeMinutes": 5, "difficulty": "easy"
        }]
    }"#;

    #[test]
    fn test_compile_bank() {
        let dir = tempfile::tempdir().unwrap();
        let seed = dir.path().join("seed.json");
        let out = dir.path().join("bank.bin");
        fs::write(&seed, SEED).unwrap();

        let stats = compile_bank(&seed, &out, false).unwrap();
        assert_eq!(
            stats,
            Stats {
                categories: 1,
                items: 2,
                recipes: 1,
                unresolved: 1,
            }
        );

        let bank = get_bank(&out).unwrap();
        assert_eq!(bank.recipes[0].item_ids, vec![1, 2]);
    }

    #[test]
    fn test_check_mode_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let seed = dir.path().join("seed.json");
        let out = dir.path().join("bank.bin");
        fs::write(&seed, SEED).unwrap();

        compile_bank(&seed, &out, true).unwrap();
        assert!(!out.exists());
    }

    #[test]
    fn test_check_rejects_recipe_losing_items() {
        let dir = tempfile::tempdir().unwrap();
        let seed = dir.path().join("seed.json");
        fs::write(&seed, SEED.replace("\"сметана\", \"укроп\"", "\"укроп\", \"лук\"")).unwrap();

        let result = compile_bank(&seed, &dir.path().join("bank.bin"), true);

        assert!(result.is_err());
    }

    #[test]
    fn test_missing_seed() {
        let dir = tempfile::tempdir().unwrap();
        let result = compile_bank(&dir.path().join("nope.json"), &dir.path().join("b"), true);

        assert!(result.is_err());
    }
}
