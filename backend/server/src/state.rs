use std::sync::Arc;

use anyhow::Context;
use bank::{Catalog, load_bank};
use chrono::{DateTime, Utc};
use tracing::info;

use super::{
    config::Config,
    database::{DocumentStore, StoreError, init_store},
    entitlement::{Entitlement, Policy, refresh},
    gateway::Gateway,
    payment::{PaymentService, PlanTerms},
};

pub struct AppState {
    pub catalog: Catalog,
    pub config: Config,
    pub policy: Policy,
    pub terms: PlanTerms,
    pub store: Arc<dyn DocumentStore>,
    pub gateway: Gateway,
    pub payments: PaymentService,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Arc<Self>> {
        let config = Config::load();

        let bank = load_bank(&config.bank_path)
            .await
            .with_context(|| format!("Failed to load bank from {}", config.bank_path))?;
        let catalog = Catalog::new(bank);
        info!(
            "Loaded {} items and {} recipes",
            catalog.item_count(),
            catalog.recipes().len()
        );

        let store = init_store(&config)
            .await
            .context("Failed to open document store")?;

        Self::from_parts(config, catalog, store)
    }

    pub fn from_parts(
        config: Config,
        catalog: Catalog,
        store: Arc<dyn DocumentStore>,
    ) -> anyhow::Result<Arc<Self>> {
        Ok(Arc::new(Self {
            policy: Policy::from_config(&config),
            terms: PlanTerms::from_config(&config),
            gateway: Gateway::new(&config)?,
            payments: PaymentService::new(&config)?,
            catalog,
            config,
            store,
        }))
    }

    /// Stored entitlement with any pending window reset applied, or a fresh one for new users.
    pub async fn entitlement(&self, user_id: &str, now: DateTime<Utc>) -> Result<Entitlement, StoreError> {
        Ok(match self.store.load_entitlement(user_id).await? {
            Some(entitlement) => refresh(entitlement, now, &self.policy),
            None => Entitlement::new(user_id, now, &self.policy),
        })
    }
}
