use axum::{
    Json,
    extract::{
        Query,
        rejection::{JsonRejection, QueryRejection},
    },
};
use bank::{
    Catalog,
    foods::{Difficulty, Recipe},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{
    entitlement::{Entitlement, Policy},
    error::AppError::{self, MalformedPayload, Validation},
    gateway::{Constraints, GenerationRequest, leading_number},
};

pub const ANONYMOUS: &str = "anonymous";
pub const MIN_GENERATION_ITEMS: usize = 2;
pub const MAX_USER_ID_CHARS: usize = 128;
pub const MAX_PREFERENCE_CHARS: usize = 300;
pub const MAX_PORTIONS: u32 = 20;

pub fn parse_json<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload.map(|Json(value)| value).map_err(|e| {
        debug!("Rejected body: {e}");
        MalformedPayload
    })
}

pub fn parse_query<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    query.map(|Query(value)| value).map_err(|e| {
        debug!("Rejected query: {e}");
        MalformedPayload
    })
}

pub fn anonymous() -> String {
    ANONYMOUS.to_string()
}

pub fn validate_user_id(user_id: &str) -> Result<&str, AppError> {
    let user_id = user_id.trim();

    if user_id.is_empty() || user_id.chars().count() > MAX_USER_ID_CHARS {
        return Err(Validation("Некорректный идентификатор пользователя".to_string()));
    }

    Ok(user_id)
}

/// A product given either by catalog id, by name, or as a catalog item object.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ProductRef {
    Id(u32),
    Name(String),
    Object {
        #[serde(default)]
        id: Option<u32>,
        #[serde(default)]
        name: Option<String>,
    },
}

/// Resolves products to display names, dropping blanks and duplicates.
pub fn resolve_names(catalog: &Catalog, products: &[ProductRef]) -> Result<Vec<String>, AppError> {
    let mut names: Vec<String> = Vec::with_capacity(products.len());

    for product in products {
        let name = match product {
            ProductRef::Name(name) | ProductRef::Object { name: Some(name), .. } => {
                name.trim().to_string()
            }
            ProductRef::Id(id) | ProductRef::Object { id: Some(id), name: None } => catalog
                .item(*id)
                .map(|item| item.name.clone())
                .ok_or_else(|| Validation(format!("Неизвестный продукт: {id}")))?,
            ProductRef::Object { id: None, name: None } => return Err(MalformedPayload),
        };

        if !name.is_empty() && !names.contains(&name) {
            names.push(name);
        }
    }

    Ok(names)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(default = "anonymous")]
    pub user_id: String,

    #[serde(default)]
    pub products: Vec<ProductRef>,

    #[serde(default)]
    pub preference: Option<String>,

    #[serde(default)]
    pub time: Option<Value>,

    #[serde(default)]
    pub difficulty: Option<String>,

    #[serde(default, alias = "portions")]
    pub servings: Option<u32>,
}

impl GenerateRequest {
    pub fn into_generation(self, catalog: &Catalog) -> Result<GenerationRequest, AppError> {
        let items = resolve_names(catalog, &self.products)?;
        if items.len() < MIN_GENERATION_ITEMS {
            return Err(Validation("Выберите минимум 2 продукта".to_string()));
        }

        let preference = self
            .preference
            .map(|preference| preference.trim().to_string())
            .filter(|preference| !preference.is_empty());
        if preference
            .as_ref()
            .is_some_and(|preference| preference.chars().count() > MAX_PREFERENCE_CHARS)
        {
            return Err(Validation("Слишком длинные пожелания".to_string()));
        }

        let mut constraints = Constraints::default();

        if let Some(time) = &self.time {
            constraints.time_minutes = leading_number(time)
                .filter(|minutes| *minutes > 0)
                .ok_or_else(|| Validation("Некорректное время приготовления".to_string()))?;
        }

        if let Some(difficulty) = &self.difficulty {
            constraints.difficulty = Difficulty::parse(difficulty)
                .ok_or_else(|| Validation("Неизвестная сложность".to_string()))?;
        }

        if let Some(servings) = self.servings {
            if servings == 0 || servings > MAX_PORTIONS {
                return Err(Validation("Некорректное количество порций".to_string()));
            }
            constraints.portions = servings;
        }

        Ok(GenerationRequest {
            items,
            preference,
            constraints,
        })
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecipeView {
    pub id: u32,
    pub title: String,
    pub description: String,
    pub item_ids: Vec<u32>,
    pub ingredients: Vec<String>,
    pub steps: Vec<String>,
    pub time_minutes: u32,
    pub difficulty: &'static str,
    pub portions: u32,

    #[serde(rename = "isAIGenerated")]
    pub is_ai_generated: bool,
}

impl From<&Recipe> for RecipeView {
    fn from(recipe: &Recipe) -> Self {
        Self {
            id: recipe.id,
            title: recipe.title.clone(),
            description: recipe.description.clone(),
            item_ids: recipe.item_ids.clone(),
            ingredients: recipe.ingredients.clone(),
            steps: recipe.steps.clone(),
            time_minutes: recipe.time_minutes,
            difficulty: recipe.difficulty().label(),
            portions: recipe.portions,
            is_ai_generated: false,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementView {
    pub user_id: String,
    pub free_remaining: u32,
    pub paid_remaining: u32,
    pub remaining: u32,
    pub total: u32,
    pub premium: bool,
    pub premium_until: Option<DateTime<Utc>>,
    pub window_reset_at: DateTime<Utc>,
}

impl EntitlementView {
    pub fn new(entitlement: &Entitlement, now: DateTime<Utc>, policy: &Policy) -> Self {
        let premium = entitlement.is_premium(now);

        Self {
            user_id: entitlement.user_id.clone(),
            free_remaining: entitlement.free_remaining,
            paid_remaining: entitlement.paid_remaining,
            remaining: entitlement.remaining(now),
            total: policy.free_limit,
            premium,
            premium_until: entitlement.premium_until.filter(|_| premium),
            window_reset_at: entitlement.window_reset_at,
        }
    }
}
