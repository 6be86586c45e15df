//! # Recipe Matching
//!
//! A recipe matches when at least `min(2, n)` of its `n` ingredients were selected. Single
//! ingredient recipes therefore need only that ingredient, while everything else needs two, which
//! keeps one common item like eggs from pulling in half the dataset.
//!
//! Matches are ordered by overlap, most first. The sort is stable so equal overlaps keep catalog
//! order, then the list is cut to the page size. The total before the cut is reported too.
use std::collections::HashSet;

use bank::foods::Recipe;

/// Unique set of selected item ids. Selecting an id twice removes it again.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Selection {
    ids: HashSet<u32>,
}

impl Selection {
    pub fn from_ids(ids: impl IntoIterator<Item = u32>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    /// Returns whether the id is selected afterwards.
    pub fn toggle(&mut self, id: u32) -> bool {
        if self.ids.remove(&id) {
            return false;
        }

        self.ids.insert(id);
        true
    }

    pub fn contains(&self, id: u32) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct MatchPage<'a> {
    pub recipes: Vec<&'a Recipe>,
    pub total: usize,
}

fn is_match(overlap: usize, required: usize) -> bool {
    required > 0 && overlap >= required.min(2)
}

/// Case-insensitive containment either way, so "картофел" finds "картофель" and "масло" finds
/// "масло растительное". Both sides must already be lowercase.
pub fn names_match(a: &str, b: &str) -> bool {
    a.contains(b) || b.contains(a)
}

pub fn find_recipes<'a>(selection: &Selection, recipes: &'a [Recipe], page_size: usize) -> MatchPage<'a> {
    if selection.is_empty() {
        return MatchPage::default();
    }

    let scored = recipes
        .iter()
        .filter_map(|recipe| {
            let overlap = recipe
                .item_ids
                .iter()
                .filter(|id| selection.contains(**id))
                .count();

            is_match(overlap, recipe.item_ids.len()).then_some((overlap, recipe))
        })
        .collect();

    paginate(scored, page_size)
}

pub fn find_recipes_by_name<'a>(
    terms: &[String],
    recipes: &'a [Recipe],
    page_size: usize,
) -> MatchPage<'a> {
    let terms: Vec<String> = terms
        .iter()
        .map(|term| term.trim().to_lowercase())
        .filter(|term| !term.is_empty())
        .collect();

    if terms.is_empty() {
        return MatchPage::default();
    }

    let scored = recipes
        .iter()
        .filter_map(|recipe| {
            let overlap = recipe
                .ingredients
                .iter()
                .filter(|ingredient| {
                    let ingredient = ingredient.to_lowercase();
                    terms.iter().any(|term| names_match(&ingredient, term))
                })
                .count();

            is_match(overlap, recipe.ingredients.len()).then_some((overlap, recipe))
        })
        .collect();

    paginate(scored, page_size)
}

fn paginate(mut scored: Vec<(usize, &Recipe)>, page_size: usize) -> MatchPage<'_> {
    scored.sort_by(|a, b| b.0.cmp(&a.0));

    let total = scored.len();
    scored.truncate(page_size);

    MatchPage {
        recipes: scored.into_iter().map(|(_, recipe)| recipe).collect(),
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipe(id: u32, item_ids: &[u32], ingredients: &[&str]) -> Recipe {
        Recipe {
            id,
            title: format!("recipe {id}"),
            item_ids: item_ids.to_vec(),
            ingredients: ingredients.iter().map(|s| s.to_string()).collect(),
            steps: vec!["step".to_string()],
            ..Default::default()
        }
    }

    fn ids(page: &MatchPage) -> Vec<u32> {
        page.recipes.iter().map(|recipe| recipe.id).collect()
    }

    #[test]
    fn test_eggs_and_cheese() {
        // 1: яйца, 2: сыр, 3: сметана
        let recipes = vec![recipe(1, &[1, 2], &["яйца", "сыр"])];

        let page = find_recipes(&Selection::from_ids([1]), &recipes, 12);
        assert!(page.recipes.is_empty());

        let page = find_recipes(&Selection::from_ids([1, 2]), &recipes, 12);
        assert_eq!(ids(&page), vec![1]);

        let page = find_recipes(&Selection::from_ids([1, 2, 3]), &recipes, 12);
        assert_eq!(ids(&page), vec![1]);
        assert_eq!(page.total, 1);
    }

    #[test]
    fn test_single_ingredient_recipe() {
        let recipes = vec![recipe(7, &[45], &["рис"])];

        assert_eq!(ids(&find_recipes(&Selection::from_ids([45]), &recipes, 12)), vec![7]);
        assert!(find_recipes(&Selection::from_ids([46]), &recipes, 12).recipes.is_empty());
    }

    #[test]
    fn test_empty_selection() {
        let recipes = vec![recipe(1, &[1], &["яйца"]), recipe(2, &[1, 2], &["яйца", "сыр"])];

        let page = find_recipes(&Selection::default(), &recipes, 12);
        assert!(page.recipes.is_empty());
        assert_eq!(page.total, 0);
    }

    #[test]
    fn test_recipe_without_ingredients_never_matches() {
        let recipes = vec![recipe(1, &[], &[])];

        assert!(find_recipes(&Selection::from_ids([1, 2]), &recipes, 12).recipes.is_empty());
        assert!(find_recipes_by_name(&["яйца".to_string()], &recipes, 12).recipes.is_empty());
    }

    #[test]
    fn test_ordering_is_stable() {
        let recipes = vec![
            recipe(1, &[1, 2, 9], &[]),
            recipe(2, &[1, 2, 3], &[]),
            recipe(3, &[2, 3, 8], &[]),
            recipe(4, &[1, 3, 7], &[]),
        ];

        let page = find_recipes(&Selection::from_ids([1, 2, 3]), &recipes, 12);
        assert_eq!(ids(&page), vec![2, 1, 3, 4]);
    }

    #[test]
    fn test_truncation_keeps_total() {
        let recipes: Vec<Recipe> = (1..=6).map(|id| recipe(id, &[1, 2], &[])).collect();

        let page = find_recipes(&Selection::from_ids([1, 2]), &recipes, 4);
        assert_eq!(ids(&page), vec![1, 2, 3, 4]);
        assert_eq!(page.total, 6);
    }

    #[test]
    fn test_name_matching_partial_terms() {
        let recipes = vec![
            recipe(1, &[], &["картофель", "курица", "лук"]),
            recipe(3, &[], &["помидоры", "огурцы", "масло растительное"]),
        ];

        let terms = vec!["Картофел".to_string(), "курица".to_string()];
        assert_eq!(ids(&find_recipes_by_name(&terms, &recipes, 12)), vec![1]);

        let terms = vec!["масло".to_string(), "ОГУРЦЫ".to_string()];
        assert_eq!(ids(&find_recipes_by_name(&terms, &recipes, 12)), vec![3]);

        let terms = vec!["масло".to_string()];
        assert!(find_recipes_by_name(&terms, &recipes, 12).recipes.is_empty());
    }

    #[test]
    fn test_name_matching_ignores_blank_terms() {
        let recipes = vec![recipe(1, &[], &["яйца", "сыр"])];

        let page = find_recipes_by_name(&["  ".to_string(), String::new()], &recipes, 12);
        assert!(page.recipes.is_empty());
    }

    #[test]
    fn test_selection_toggle() {
        let mut selection = Selection::from_ids([1, 1, 2]);
        assert_eq!(selection.len(), 2);

        assert!(!selection.toggle(1));
        assert!(!selection.contains(1));
        assert!(selection.toggle(1));
        assert!(selection.contains(1));
    }
}
