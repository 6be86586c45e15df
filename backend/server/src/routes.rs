use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
};
use bank::foods::{Category, Item};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    entitlement::try_consume,
    error::AppError,
    gateway::GeneratedRecipe,
    matcher::{Selection, find_recipes, find_recipes_by_name},
    payment::{Invoice, PaymentRecord, Plan, settle},
    search::{popular_recipes, search_items},
    state::AppState,
    utils::{
        EntitlementView, GenerateRequest, RecipeView, anonymous, parse_json, parse_query,
        validate_user_id,
    },
};

#[derive(Serialize, Debug)]
pub struct Health {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
}

pub async fn health_handler() -> Json<Health> {
    Json(Health {
        status: "ok",
        timestamp: Utc::now(),
    })
}

#[derive(Serialize, Debug)]
pub struct Products {
    pub products: Vec<Item>,
    pub categories: Vec<Category>,
}

pub async fn products_handler(State(state): State<Arc<AppState>>) -> Json<Products> {
    Json(Products {
        products: state.catalog.items().cloned().collect(),
        categories: state.catalog.bank.categories.clone(),
    })
}

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<Vec<Item>>, AppError> {
    let query = parse_query(query)?;

    let items = search_items(&state.catalog, &query.q, state.config.search_limit)
        .into_iter()
        .cloned()
        .collect();

    Ok(Json(items))
}

pub async fn popular_handler(State(state): State<Arc<AppState>>) -> Json<Vec<RecipeView>> {
    Json(
        popular_recipes(&state.catalog, state.config.popular_limit)
            .iter()
            .map(RecipeView::from)
            .collect(),
    )
}

#[derive(Deserialize, Debug)]
pub struct FindRequest {
    #[serde(default)]
    pub products: Option<Vec<u32>>,

    #[serde(default)]
    pub ingredients: Option<Vec<String>>,
}

#[derive(Serialize, Debug)]
pub struct FindResponse {
    pub recipes: Vec<RecipeView>,

    /// All matches, the page may hold fewer.
    pub count: usize,
}

pub async fn find_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FindRequest>, JsonRejection>,
) -> Result<Json<FindResponse>, AppError> {
    let request = parse_json(payload)?;
    let recipes = state.catalog.recipes();
    let page_size = state.config.page_size;

    let page = match (request.products, request.ingredients) {
        (Some(ids), _) if !ids.is_empty() => {
            find_recipes(&Selection::from_ids(ids), recipes, page_size)
        }
        (_, Some(names)) if names.iter().any(|name| !name.trim().is_empty()) => {
            find_recipes_by_name(&names, recipes, page_size)
        }
        _ => return Err(AppError::Validation("Необходим массив продуктов".to_string())),
    };

    debug!("Found {} recipes, returning {}", page.total, page.recipes.len());

    Ok(Json(FindResponse {
        count: page.total,
        recipes: page.recipes.into_iter().map(RecipeView::from).collect(),
    }))
}

#[derive(Serialize, Debug)]
pub struct GenerateResponse {
    pub recipe: GeneratedRecipe,
    pub entitlement: EntitlementView,
}

/// Spends one credit up front, then generates. A fallback recipe still costs the credit.
pub async fn generate_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, AppError> {
    let request = parse_json(payload)?;
    let user_id = validate_user_id(&request.user_id)?.to_string();
    let generation = request.into_generation(&state.catalog)?;

    let now = Utc::now();
    let entitlement = state.entitlement(&user_id, now).await?;
    let consumption = try_consume(entitlement, now, &state.policy);
    state.store.save_entitlement(&consumption.updated).await?;

    if !consumption.allowed {
        info!("User {user_id} is out of AI recipes");
        return Err(AppError::UpgradeRequired);
    }

    let recipe = state.gateway.generate(&generation).await;

    Ok(Json(GenerateResponse {
        recipe,
        entitlement: EntitlementView::new(&consumption.updated, now, &state.policy),
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    #[serde(default = "anonymous")]
    pub user_id: String,
}

pub async fn limits_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<EntitlementView>, AppError> {
    let query = parse_query(query)?;
    let user_id = validate_user_id(&query.user_id)?;

    let now = Utc::now();
    let entitlement = state.entitlement(user_id, now).await?;
    state.store.save_entitlement(&entitlement).await?;

    Ok(Json(EntitlementView::new(&entitlement, now, &state.policy)))
}

#[derive(Serialize, Debug)]
pub struct ConsumeResponse {
    pub allowed: bool,
    pub entitlement: EntitlementView,
}

pub async fn consume_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<UserQuery>, JsonRejection>,
) -> Result<Json<ConsumeResponse>, AppError> {
    let request = parse_json(payload)?;
    let user_id = validate_user_id(&request.user_id)?;

    let now = Utc::now();
    let entitlement = state.entitlement(user_id, now).await?;
    let consumption = try_consume(entitlement, now, &state.policy);
    state.store.save_entitlement(&consumption.updated).await?;

    Ok(Json(ConsumeResponse {
        allowed: consumption.allowed,
        entitlement: EntitlementView::new(&consumption.updated, now, &state.policy),
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    #[serde(default = "anonymous")]
    pub user_id: String,

    pub plan: Plan,

    #[serde(default)]
    pub amount: Option<u32>,

    #[serde(default)]
    pub currency: Option<String>,
}

pub async fn payment_create_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PaymentRequest>, JsonRejection>,
) -> Result<Json<Invoice>, AppError> {
    let request = parse_json(payload)?;
    let user_id = validate_user_id(&request.user_id)?.to_string();

    let terms = &state.terms;
    let amount = terms.price(request.plan);

    if request.amount.is_some_and(|requested| requested != amount) {
        return Err(AppError::Validation("Неверная сумма платежа".to_string()));
    }

    if request
        .currency
        .as_deref()
        .is_some_and(|currency| !currency.eq_ignore_ascii_case(&terms.currency))
    {
        return Err(AppError::Validation("Неподдерживаемая валюта".to_string()));
    }

    let invoice = state
        .payments
        .create_invoice(amount, &terms.currency, &terms.description(request.plan))
        .await
        .inspect_err(|e| warn!("Invoice for {user_id} failed: {e}"))?;

    state
        .store
        .save_payment(&PaymentRecord {
            id: invoice.id.clone(),
            user_id,
            plan: request.plan,
            amount,
            currency: invoice.currency.clone(),
            status: invoice.status.clone(),
            applied: false,
            created_at: Utc::now(),
        })
        .await?;

    info!("Created invoice {} for {amount} {}", invoice.id, invoice.currency);

    Ok(Json(invoice))
}

#[derive(Serialize, Debug)]
pub struct PaymentStatus {
    pub id: String,
    pub status: String,
    pub applied: bool,
    pub entitlement: EntitlementView,
}

pub async fn payment_status_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PaymentStatus>, AppError> {
    let payment = state
        .store
        .load_payment(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("Платеж не найден".to_string()))?;

    let now = Utc::now();
    let entitlement = state.entitlement(&payment.user_id, now).await?;

    let (payment, entitlement) = if payment.applied {
        (payment, entitlement)
    } else {
        let status = state.payments.check_status(&payment.id).await?;
        let (payment, updated) = settle(payment, status, entitlement.clone(), now, &state.terms);

        state.store.save_payment(&payment).await?;

        match updated {
            Some(updated) => {
                state.store.save_entitlement(&updated).await?;
                (payment, updated)
            }
            None => (payment, entitlement),
        }
    };

    Ok(Json(PaymentStatus {
        entitlement: EntitlementView::new(&entitlement, now, &state.policy),
        id: payment.id,
        status: payment.status,
        applied: payment.applied,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bank::{
        Catalog,
        foods::{Bank, Difficulty, Recipe},
    };
    use serde_json::json;

    use super::*;
    use crate::{config::Config, database::FileStore, entitlement::PREMIUM_SENTINEL};

    fn item(id: u32, name: &str) -> Item {
        Item {
            id,
            name: name.to_string(),
            glyph: String::new(),
            category: "Базовые".to_string(),
        }
    }

    fn recipe(id: u32, title: &str, item_ids: Vec<u32>, ingredients: &[&str]) -> Recipe {
        let mut recipe = Recipe {
            id,
            title: title.to_string(),
            description: String::new(),
            item_ids,
            ingredients: ingredients.iter().map(|i| i.to_string()).collect(),
            steps: vec!["Приготовить".to_string()],
            time_minutes: 10,
            difficulty: 0,
            portions: 2,
        };
        recipe.set_difficulty(Difficulty::Easy);
        recipe
    }

    fn catalog() -> Catalog {
        Catalog::new(Bank {
            categories: vec![Category {
                name: "Базовые".to_string(),
                glyph: String::new(),
                items: vec![item(1, "яйца"), item(2, "молоко"), item(3, "сыр"), item(4, "рис")],
            }],
            recipes: vec![
                recipe(1, "Омлет", vec![1, 2], &["яйца", "молоко"]),
                recipe(2, "Сырный омлет", vec![1, 2, 3], &["яйца", "молоко", "сыр"]),
                recipe(3, "Рис", vec![4], &["рис"]),
            ],
        })
    }

    async fn state_with(dir: &tempfile::TempDir, config: Config) -> Arc<AppState> {
        let store = FileStore::open(dir.path()).await.unwrap();

        AppState::from_parts(config, catalog(), Arc::new(store)).unwrap()
    }

    async fn state(dir: &tempfile::TempDir) -> Arc<AppState> {
        state_with(dir, Config::default()).await
    }

    fn body<T>(value: serde_json::Value) -> Result<Json<T>, JsonRejection>
    where
        T: serde::de::DeserializeOwned,
    {
        Ok(Json(serde_json::from_value(value).unwrap()))
    }

    #[tokio::test]
    async fn test_find_by_ids() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir).await;

        let Json(found) = find_handler(State(state), body(json!({"products": [1, 3]})))
            .await
            .unwrap();

        let titles: Vec<&str> = found.recipes.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Сырный омлет"]);
        assert_eq!(found.count, 1);
    }

    #[tokio::test]
    async fn test_find_count_covers_truncated_matches() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            page_size: 1,
            ..Config::default()
        };
        let state = state_with(&dir, config).await;

        let Json(found) = find_handler(State(state), body(json!({"products": [1, 2]})))
            .await
            .unwrap();

        let titles: Vec<&str> = found.recipes.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Омлет"]);
        assert_eq!(found.count, 2);
    }

    #[tokio::test]
    async fn test_find_by_ingredient_names() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir).await;

        let Json(found) =
            find_handler(State(state), body(json!({"ingredients": ["Яйца", "молоко"]})))
                .await
                .unwrap();

        let titles: Vec<&str> = found.recipes.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Омлет", "Сырный омлет"]);
    }

    #[tokio::test]
    async fn test_find_requires_products() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir).await;

        let result = find_handler(State(state.clone()), body(json!({"products": []}))).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let result = find_handler(State(state), body(json!({}))).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_generate_until_limit() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir).await;
        let request = || body(json!({"userId": "device-1", "products": [1, "сыр"]}));

        for left in (0..3).rev() {
            let Json(generated) = generate_handler(State(state.clone()), request())
                .await
                .unwrap();

            assert!(generated.recipe.fallback);
            assert_eq!(generated.recipe.ingredients.len(), 2);
            assert_eq!(generated.entitlement.remaining, left);
        }

        let result = generate_handler(State(state), request()).await;
        assert!(matches!(result, Err(AppError::UpgradeRequired)));
    }

    #[tokio::test]
    async fn test_generate_validation_spends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir).await;

        let result = generate_handler(
            State(state.clone()),
            body(json!({"userId": "device-1", "products": [1]})),
        )
        .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let Json(limits) = limits_handler(
            State(state),
            Ok(Query(UserQuery {
                user_id: "device-1".to_string(),
            })),
        )
        .await
        .unwrap();
        assert_eq!(limits.remaining, 3);
    }

    #[tokio::test]
    async fn test_consume_reports_denial() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir).await;

        for _ in 0..3 {
            let Json(consumed) =
                consume_handler(State(state.clone()), body(json!({"userId": "device-1"})))
                    .await
                    .unwrap();
            assert!(consumed.allowed);
        }

        let Json(consumed) = consume_handler(State(state), body(json!({"userId": "device-1"})))
            .await
            .unwrap();
        assert!(!consumed.allowed);
        assert_eq!(consumed.entitlement.free_remaining, 0);
    }

    #[tokio::test]
    async fn test_demo_pack_payment_applies_once() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir).await;

        let Json(invoice) = payment_create_handler(
            State(state.clone()),
            body(json!({"userId": "device-1", "plan": "pack", "amount": 99})),
        )
        .await
        .unwrap();
        assert!(invoice.demo);
        assert!(invoice.id.starts_with("demo_"));

        for _ in 0..2 {
            let Json(status) =
                payment_status_handler(State(state.clone()), Path(invoice.id.clone()))
                    .await
                    .unwrap();

            assert_eq!(status.status, "paid");
            assert!(status.applied);
            assert_eq!(status.entitlement.paid_remaining, 10);
            assert_eq!(status.entitlement.remaining, 13);
        }
    }

    #[tokio::test]
    async fn test_demo_monthly_payment_grants_premium() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir).await;

        let Json(invoice) = payment_create_handler(
            State(state.clone()),
            body(json!({"userId": "device-1", "plan": "monthly"})),
        )
        .await
        .unwrap();

        let Json(status) = payment_status_handler(State(state), Path(invoice.id))
            .await
            .unwrap();

        assert!(status.entitlement.premium);
        assert_eq!(status.entitlement.remaining, PREMIUM_SENTINEL);
    }

    #[tokio::test]
    async fn test_payment_rejects_wrong_amount() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir).await;

        let result = payment_create_handler(
            State(state.clone()),
            body(json!({"userId": "device-1", "plan": "monthly", "amount": 1})),
        )
        .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let result = payment_create_handler(
            State(state),
            body(json!({"userId": "device-1", "plan": "pack", "currency": "USD"})),
        )
        .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_unknown_payment() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir).await;

        let result = payment_status_handler(State(state), Path("demo_0".to_string())).await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_search_and_popular() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir).await;

        let Json(items) = search_handler(
            State(state.clone()),
            Ok(Query(SearchQuery {
                q: "мол".to_string(),
            })),
        )
        .await
        .unwrap();
        assert_eq!(items, vec![item(2, "молоко")]);

        let Json(popular) = popular_handler(State(state)).await;
        assert_eq!(popular.len(), 3);
    }
}
