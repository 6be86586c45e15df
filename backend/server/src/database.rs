//! # Document Store
//!
//! Flat JSON documents keyed by an opaque id. Two collections:
//! - `entitlements`: user/device id to [`Entitlement`]
//! - `payments`: invoice id to [`PaymentRecord`]
//!
//! ## Redis
//!
//! Used when `REDIS_URL` is set.
//!
//! - One Redis hash per collection: 1 big key, then id to JSON pairs
//! - `HGET`/`HSET` are single commands, so concurrent writers to the same id end up last write wins
//! - No TTL, records are tiny (~150 bytes) and there is one per device
//!
//! ## Files
//!
//! Fallback for local runs: `users.json` and `payments.json` under `DATA_DIR`, each one JSON
//! object keyed by id. Every read-modify-write cycle holds an async mutex, which is enough for a
//! single server process. No schema versioning, unknown fields are ignored on read.
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use redis::{
    AsyncCommands, Client,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tokio::{fs, sync::Mutex};
use tracing::info;

use crate::{config::Config, entitlement::Entitlement, payment::PaymentRecord};

pub const ENTITLEMENTS: &str = "entitlements";
pub const PAYMENTS: &str = "payments";

/// A record stored under its own id in one collection.
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// Redis hash name.
    const COLLECTION: &'static str;

    /// File name under `DATA_DIR`.
    const FILE: &'static str;

    fn id(&self) -> &str;
}

impl Document for Entitlement {
    const COLLECTION: &'static str = ENTITLEMENTS;
    const FILE: &'static str = "users.json";

    fn id(&self) -> &str {
        &self.user_id
    }
}

impl Document for PaymentRecord {
    const COLLECTION: &'static str = PAYMENTS;
    const FILE: &'static str = "payments.json";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Hash field value of a document.
pub fn encode_field<D: Document>(document: &D) -> Result<String, StoreError> {
    Ok(serde_json::to_string(document)?)
}

/// Document from an `HGET` reply, `None` when the field is missing.
pub fn decode_field<D: Document>(raw: Option<String>) -> Result<Option<D>, StoreError> {
    Ok(raw.map(|json| serde_json::from_str(&json)).transpose()?)
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn load_entitlement(&self, user_id: &str) -> Result<Option<Entitlement>, StoreError>;

    async fn save_entitlement(&self, entitlement: &Entitlement) -> Result<(), StoreError>;

    async fn load_payment(&self, id: &str) -> Result<Option<PaymentRecord>, StoreError>;

    async fn save_payment(&self, payment: &PaymentRecord) -> Result<(), StoreError>;
}

pub async fn init_store(config: &Config) -> Result<Arc<dyn DocumentStore>, StoreError> {
    match &config.redis_url {
        Some(redis_url) => {
            info!("Using Redis document store");
            Ok(Arc::new(RedisStore::new(init_redis(redis_url).await?)))
        }
        None => {
            info!("Using file document store in {}", config.data_dir);
            Ok(Arc::new(FileStore::open(&config.data_dir).await?))
        }
    }
}

pub async fn init_redis(redis_url: &str) -> Result<ConnectionManager, StoreError> {
    let config = ConnectionManagerConfig::new().set_number_of_retries(1);

    let client = Client::open(redis_url)?;
    let connection_manager = client.get_connection_manager_with_config(config).await?;

    Ok(connection_manager)
}

pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }

    async fn get<D: Document>(&self, id: &str) -> Result<Option<D>, StoreError> {
        let mut connection = self.connection.clone();
        let raw: Option<String> = connection.hget(D::COLLECTION, id).await?;

        decode_field(raw)
    }

    async fn put<D: Document>(&self, document: &D) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let json = encode_field(document)?;

        let _: () = connection.hset(D::COLLECTION, document.id(), json).await?;

        Ok(())
    }
}

#[async_trait]
impl DocumentStore for RedisStore {
    async fn load_entitlement(&self, user_id: &str) -> Result<Option<Entitlement>, StoreError> {
        self.get(user_id).await
    }

    async fn save_entitlement(&self, entitlement: &Entitlement) -> Result<(), StoreError> {
        self.put(entitlement).await
    }

    async fn load_payment(&self, id: &str) -> Result<Option<PaymentRecord>, StoreError> {
        self.get(id).await
    }

    async fn save_payment(&self, payment: &PaymentRecord) -> Result<(), StoreError> {
        self.put(payment).await
    }
}

pub struct FileStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    /// Creates the directory and empty collections when missing.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;

        for file in [Entitlement::FILE, PaymentRecord::FILE] {
            let path = dir.join(file);

            if !fs::try_exists(&path).await? {
                info!("Creating {}", path.display());
                fs::write(&path, "{}").await?;
            }
        }

        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    async fn read_collection<D: Document>(&self) -> Result<HashMap<String, D>, StoreError> {
        let json = fs::read_to_string(self.dir.join(D::FILE)).await?;

        if json.trim().is_empty() {
            return Ok(HashMap::new());
        }

        Ok(serde_json::from_str(&json)?)
    }

    async fn get<D: Document>(&self, id: &str) -> Result<Option<D>, StoreError> {
        let _guard = self.lock.lock().await;
        let mut collection = self.read_collection::<D>().await?;

        Ok(collection.remove(id))
    }

    async fn put<D: Document>(&self, document: &D) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut collection = self.read_collection::<D>().await?;
        collection.insert(document.id().to_string(), document.clone());

        let json = serde_json::to_string_pretty(&collection)?;
        fs::write(self.dir.join(D::FILE), json).await?;

        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn load_entitlement(&self, user_id: &str) -> Result<Option<Entitlement>, StoreError> {
        self.get(user_id).await
    }

    async fn save_entitlement(&self, entitlement: &Entitlement) -> Result<(), StoreError> {
        self.put(entitlement).await
    }

    async fn load_payment(&self, id: &str) -> Result<Option<PaymentRecord>, StoreError> {
        self.get(id).await
    }

    async fn save_payment(&self, payment: &PaymentRecord) -> Result<(), StoreError> {
        self.put(payment).await
    }
}
