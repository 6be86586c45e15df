use std::sync::LazyLock;

use regex::Regex;

pub const DEFAULT_CATEGORY_GLYPH: &str = "🍳";

static UNDERSCORES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_+").expect("valid regex"));
static SYMBOLS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}\- ]").expect("valid regex"));
static SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Lookup key for item names: lowercase, symbols dropped, single spaces.
pub fn sanitize(input: &str) -> String {
    let spaced = UNDERSCORES.replace_all(input, " ");
    let spaced = SPACES.replace_all(&spaced, " ");
    let cleaned = SYMBOLS.replace_all(&spaced, "");

    SPACES.replace_all(cleaned.trim(), " ").to_lowercase()
}

/// Lowercased name with everything but letters stripped, so "масло растительное" and
/// "маслорастительное" compare equal.
pub fn letters_only(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_alphabetic())
        .flat_map(char::to_lowercase)
        .collect()
}

pub fn category_glyph(category: &str) -> &'static str {
    match category {
        "Овощи" => "🥦",
        "Фрукты" | "Фрукты и ягоды" => "🍎",
        "Мясо" | "Мясо и птица" => "🥩",
        "Рыба" | "Рыба и морепродукты" => "🐟",
        "Молочные" => "🧀",
        "Крупы" | "Крупы и макароны" => "🍚",
        "Специи" | "Соусы и специи" => "🧂",
        "Напитки" => "🥤",
        "Бакалея" | "Соусы" => "🥫",
        "Яйца" => "🥚",
        "Хлеб" | "Хлеб и выпечка" => "🍞",
        _ => DEFAULT_CATEGORY_GLYPH,
    }
}
