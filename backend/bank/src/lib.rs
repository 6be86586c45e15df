use std::{collections::HashMap, fs, path::Path};

use prost::Message;
use thiserror::Error;

pub mod foods;
pub mod remote;
pub mod seed;
pub mod utils;

use foods::{Bank, Item, Recipe};
use remote::get_remote_bank;
use seed::{build_bank, parse_seed};

#[derive(Error, Debug)]
pub enum BankError {
    #[error("Failed to read bank: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to decode bank: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("Failed to parse seed: {0}")]
    Seed(#[from] serde_json::Error),

    #[error("Failed to fetch remote bank: {0}")]
    Remote(#[from] reqwest::Error),

    #[error("Duplicate item id {0}")]
    DuplicateItem(u32),

    #[error("Duplicate recipe id {0}")]
    DuplicateRecipe(u32),

    #[error("Item {0} has an empty name")]
    EmptyName(u32),

    #[error("Recipe {0} needs at least one ingredient and one step")]
    IncompleteRecipe(u32),

    #[error("Recipe {recipe} resolves only {resolved} catalog items")]
    UnresolvedRecipe { recipe: u32, resolved: usize },

    #[error("Recipe {recipe} has unknown difficulty {value:?}")]
    UnknownDifficulty { recipe: u32, value: String },
}

pub fn get_bank(path: impl AsRef<Path>) -> Result<Bank, BankError> {
    let data = fs::read(path)?;

    Ok(Bank::decode(&*data)?)
}

pub fn write_bank(bank: &Bank, path: impl AsRef<Path>) -> Result<(), BankError> {
    fs::write(path, bank.encode_to_vec())?;

    Ok(())
}

pub fn get_seed_bank(path: impl AsRef<Path>) -> Result<(Bank, seed::Report), BankError> {
    let json = fs::read_to_string(path)?;

    build_bank(parse_seed(&json)?)
}

/// Loads a bank from a URL, a seed `.json` file or a compiled `.bin` file.
pub async fn load_bank(source: &str) -> Result<Bank, BankError> {
    if source.starts_with("http://") || source.starts_with("https://") {
        return get_remote_bank(source).await;
    }

    if source.ends_with(".json") {
        return get_seed_bank(source).map(|(bank, _)| bank);
    }

    get_bank(source)
}

/// Read-only view over a bank with O(1) item lookups.
pub struct Catalog {
    pub bank: Bank,
    item_positions: HashMap<u32, (usize, usize)>,
    name_to_id: HashMap<String, u32>,
}

impl Catalog {
    pub fn new(bank: Bank) -> Self {
        let mut item_positions = HashMap::new();
        let mut name_to_id = HashMap::new();

        for (category_index, category) in bank.categories.iter().enumerate() {
            for (item_index, item) in category.items.iter().enumerate() {
                item_positions.insert(item.id, (category_index, item_index));
                name_to_id.entry(utils::sanitize(&item.name)).or_insert(item.id);
            }
        }

        Self {
            bank,
            item_positions,
            name_to_id,
        }
    }

    /// Items in catalog order.
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.bank
            .categories
            .iter()
            .flat_map(|category| category.items.iter())
    }

    pub fn item(&self, id: u32) -> Option<&Item> {
        let &(category, item) = self.item_positions.get(&id)?;

        self.bank.categories[category].items.get(item)
    }

    pub fn item_by_name(&self, name: &str) -> Option<&Item> {
        let id = self.name_to_id.get(&utils::sanitize(name))?;

        self.item(*id)
    }

    pub fn recipes(&self) -> &[Recipe] {
        &self.bank.recipes
    }

    pub fn item_count(&self) -> usize {
        self.item_positions.len()
    }
}
