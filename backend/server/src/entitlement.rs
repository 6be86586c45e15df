//! # Entitlements
//!
//! Per-user quota of AI-generated recipes.
//!
//! ## Rules
//! - Every user gets `free_limit` free generations per window, the window rolls forward by whole
//!   reset periods once it has passed
//! - Free credits are spent before paid credits, paid credits never expire
//! - Premium bypasses both counters until it expires
//! - Counters are unsigned and every decrement is guarded, so they never go negative
//!
//! All functions here are pure: they take the current record and return the next one. Loading and
//! saving is the caller's job, and last write wins.
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{Config, period};

/// Remaining count reported for premium users.
pub const PREMIUM_SENTINEL: u32 = 999;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entitlement {
    pub user_id: String,
    pub free_remaining: u32,
    pub paid_remaining: u32,

    #[serde(default)]
    pub premium_until: Option<DateTime<Utc>>,

    pub window_reset_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug)]
pub struct Policy {
    pub free_limit: u32,
    pub reset_period: Duration,
}

impl Policy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            free_limit: config.free_limit,
            reset_period: period(config.reset_period_days),
        }
    }
}

#[derive(Debug)]
pub struct Consumption {
    pub allowed: bool,
    pub updated: Entitlement,
}

impl Entitlement {
    pub fn new(user_id: &str, now: DateTime<Utc>, policy: &Policy) -> Self {
        Self {
            user_id: user_id.to_string(),
            free_remaining: policy.free_limit,
            paid_remaining: 0,
            premium_until: None,
            window_reset_at: now + policy.reset_period,
        }
    }

    pub fn is_premium(&self, now: DateTime<Utc>) -> bool {
        self.premium_until.is_some_and(|until| until > now)
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> u32 {
        if self.is_premium(now) {
            return PREMIUM_SENTINEL;
        }

        self.free_remaining.saturating_add(self.paid_remaining)
    }
}

/// Applies a pending window reset without spending anything.
pub fn refresh(mut entitlement: Entitlement, now: DateTime<Utc>, policy: &Policy) -> Entitlement {
    if now < entitlement.window_reset_at {
        return entitlement;
    }

    let period = policy.reset_period.num_seconds().max(1);
    let behind = (now - entitlement.window_reset_at).num_seconds();
    let periods = behind / period + 1;

    entitlement.free_remaining = policy.free_limit;
    entitlement.window_reset_at += Duration::seconds(periods * period);

    entitlement
}

pub fn try_consume(entitlement: Entitlement, now: DateTime<Utc>, policy: &Policy) -> Consumption {
    let mut updated = refresh(entitlement, now, policy);

    let allowed = if updated.is_premium(now) {
        true
    } else if updated.free_remaining > 0 {
        updated.free_remaining -= 1;
        true
    } else if updated.paid_remaining > 0 {
        updated.paid_remaining -= 1;
        true
    } else {
        false
    };

    Consumption { allowed, updated }
}

pub fn grant_paid_credits(mut entitlement: Entitlement, amount: u32) -> Entitlement {
    entitlement.paid_remaining = entitlement.paid_remaining.saturating_add(amount);

    entitlement
}

/// Extends premium by `duration`, starting from the current expiry if it is still active.
pub fn grant_premium(
    mut entitlement: Entitlement,
    now: DateTime<Utc>,
    duration: Duration,
) -> Entitlement {
    let start = entitlement
        .premium_until
        .filter(|until| *until > now)
        .unwrap_or(now);

    entitlement.premium_until = Some(start + duration);

    entitlement
}
