//! Wire types of the catalog bank.
//!
//! The bank is stored as a single protobuf message (`bank.bin`). Categories keep their seed
//! order, and items inside a category keep theirs, so the frontend can rely on a stable layout.

use prost::{Enumeration, Message};
use serde::Serialize;

#[derive(Clone, PartialEq, Message)]
pub struct Bank {
    #[prost(message, repeated, tag = "1")]
    pub categories: Vec<Category>,

    #[prost(message, repeated, tag = "2")]
    pub recipes: Vec<Recipe>,
}

#[derive(Clone, PartialEq, Message, Serialize)]
pub struct Category {
    #[prost(string, tag = "1")]
    pub name: String,

    #[prost(string, tag = "2")]
    pub glyph: String,

    #[prost(message, repeated, tag = "3")]
    pub items: Vec<Item>,
}

#[derive(Clone, PartialEq, Message, Serialize)]
pub struct Item {
    #[prost(uint32, tag = "1")]
    pub id: u32,

    #[prost(string, tag = "2")]
    pub name: String,

    #[prost(string, tag = "3")]
    pub glyph: String,

    #[prost(string, tag = "4")]
    pub category: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct Recipe {
    #[prost(uint32, tag = "1")]
    pub id: u32,

    #[prost(string, tag = "2")]
    pub title: String,

    #[prost(string, tag = "3")]
    pub description: String,

    /// Ids of the catalog items this recipe needs. Never contains duplicates.
    #[prost(uint32, repeated, tag = "4")]
    pub item_ids: Vec<u32>,

    /// Display names of every ingredient, including ones missing from the catalog.
    #[prost(string, repeated, tag = "5")]
    pub ingredients: Vec<String>,

    #[prost(string, repeated, tag = "6")]
    pub steps: Vec<String>,

    #[prost(uint32, tag = "7")]
    pub time_minutes: u32,

    #[prost(enumeration = "Difficulty", tag = "8")]
    pub difficulty: i32,

    #[prost(uint32, tag = "9")]
    pub portions: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum Difficulty {
    Easy = 0,
    Medium = 1,
    Hard = 2,
}

impl Difficulty {
    pub fn label(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// Accepts the english labels and the russian words used by the seed data and by the
    /// generation provider.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "easy" | "очень легко" | "легко" | "легкая" | "лёгкая" | "простая" => {
                Some(Difficulty::Easy)
            }
            "medium" | "средне" | "средняя" => Some(Difficulty::Medium),
            "hard" | "сложно" | "сложная" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}
