use std::{env, fmt::Display, fs::read_to_string, str::FromStr};

use chrono::Duration;
use tracing::{info, warn};

pub const MAX_PERIOD_DAYS: i64 = 3650;

pub struct Config {
    pub port: u16,
    pub bank_path: String,
    pub data_dir: String,
    pub redis_url: Option<String>,

    pub free_limit: u32,
    pub reset_period_days: i64,
    pub page_size: usize,
    pub search_limit: usize,
    pub popular_limit: usize,

    pub gemini_key: Option<String>,
    pub gemini_model: String,
    pub gemini_timeout_secs: u64,

    pub crypto_shop_id: Option<String>,
    pub crypto_key: Option<String>,
    pub crypto_timeout_secs: u64,
    pub pack_credits: u32,
    pub premium_days: i64,
    pub pack_price: u32,
    pub monthly_price: u32,
    pub currency: String,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: try_load("RUST_PORT", 1111),
            bank_path: try_load("BANK_PATH", "data/seed.json".to_string()),
            data_dir: try_load("DATA_DIR", "data".to_string()),
            redis_url: var("REDIS_URL").ok(),

            free_limit: try_load("FREE_LIMIT", 3),
            reset_period_days: load_days("RESET_PERIOD_DAYS", 7),
            page_size: try_load("PAGE_SIZE", 12),
            search_limit: try_load("SEARCH_LIMIT", 10),
            popular_limit: try_load("POPULAR_LIMIT", 6),

            gemini_key: read_optional_secret("GEMINI_API_KEY"),
            gemini_model: try_load("GEMINI_MODEL", "gemini-1.5-flash".to_string()),
            gemini_timeout_secs: try_load("GEMINI_TIMEOUT_SECS", 30),

            crypto_shop_id: read_optional_secret("CRYPTO_SHOP_ID"),
            crypto_key: read_optional_secret("CRYPTO_API_KEY"),
            crypto_timeout_secs: try_load("CRYPTO_TIMEOUT_SECS", 30),
            pack_credits: try_load("PACK_CREDITS", 10),
            premium_days: load_days("PREMIUM_DAYS", 30),
            pack_price: try_load("PACK_PRICE", 99),
            monthly_price: try_load("MONTHLY_PRICE", 299),
            currency: try_load("CURRENCY", "RUB".to_string()),
        }
    }
}

impl Default for Config {
    /// Built-in defaults with no secrets, which puts both providers in demo mode.
    fn default() -> Self {
        Self {
            port: 1111,
            bank_path: "data/seed.json".to_string(),
            data_dir: "data".to_string(),
            redis_url: None,
            free_limit: 3,
            reset_period_days: 7,
            page_size: 12,
            search_limit: 10,
            popular_limit: 6,
            gemini_key: None,
            gemini_model: "gemini-1.5-flash".to_string(),
            gemini_timeout_secs: 30,
            crypto_shop_id: None,
            crypto_key: None,
            crypto_timeout_secs: 30,
            pack_credits: 10,
            premium_days: 30,
            pack_price: 99,
            monthly_price: 299,
            currency: "RUB".to_string(),
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        info!("Environment variable {key} not found");
    })
}

/// Falls back to `default` when the variable is missing or does not parse.
fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    let Ok(raw) = var(key) else {
        info!("{key} not set, using default: {default}");
        return default;
    };

    raw.trim().parse().unwrap_or_else(|e| {
        warn!("Invalid {key} value {raw:?}: {e}, using default: {default}");
        default
    })
}

/// Day counts end up as chrono durations, so they are kept in `1..=MAX_PERIOD_DAYS`.
fn load_days(key: &str, default: i64) -> i64 {
    let days = try_load(key, default);
    let clamped = days.clamp(1, MAX_PERIOD_DAYS);

    if clamped != days {
        warn!("{key} value {days} out of range, using {clamped}");
    }

    clamped
}

/// Period of whole days, clamped like [`load_days`] so it never leaves chrono's range.
pub fn period(days: i64) -> Duration {
    Duration::days(days.clamp(1, MAX_PERIOD_DAYS))
}

/// Secrets come from `/run/secrets/<name>` first, then the environment. Missing secrets are not
/// fatal: the related provider runs in demo mode.
fn read_optional_secret(secret_name: &str) -> Option<String> {
    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            info!("Failed to read {secret_name} from file: {e}");
        })
        .or_else(|_| var(secret_name))
        .ok()
        .filter(|secret| !secret.is_empty())
}
