//! Expiry descriptor resolution and expiry checks.
//!
//! Raw expiry values arrive from the access grant source as strings:
//! either an epoch second (`"0"` = unlimited), or `"subscription_<id>"`
//! for subscription-linked access. Resolution is fail-closed: anything
//! empty or unparseable resolves to an already-expired fixed date, never
//! to an error that could be mistaken for "allowed".

use async_trait::async_trait;
use serde::Serialize;

use crate::error::CoreError;
use crate::grant::ExpiryDescriptor;

/// Prefix marking a subscription-linked raw expiry value.
const SUBSCRIPTION_PREFIX: &str = "subscription_";

/// Sentinel epoch for absent or malformed expiry input. Any positive
/// epoch in the past works; this value is kept from the original system.
pub const EXPIRED_SENTINEL: i64 = 404;

// ---------------------------------------------------------------------------
// Subscription status provider
// ---------------------------------------------------------------------------

/// Status of an externally managed subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionStatus {
    Active,
    Inactive,
    NotFound,
}

/// External lookup for subscription-linked grants.
#[async_trait]
pub trait SubscriptionStatusProvider: Send + Sync {
    async fn lookup(&self, subscription_id: &str) -> Result<SubscriptionStatus, CoreError>;
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Parse a raw expiry value into a concrete [`ExpiryDescriptor`].
///
/// - `"subscription_<id>"` → [`ExpiryDescriptor::SubscriptionLinked`]
/// - numeric → [`ExpiryDescriptor::Fixed`] at that epoch
/// - empty / unparseable → `Fixed(EXPIRED_SENTINEL)` (fail-closed)
pub fn resolve(raw: &str) -> ExpiryDescriptor {
    if let Some(id) = raw.strip_prefix(SUBSCRIPTION_PREFIX) {
        if !id.is_empty() {
            return ExpiryDescriptor::SubscriptionLinked {
                subscription_id: id.to_string(),
            };
        }
    }

    match raw.trim().parse::<i64>() {
        Ok(epoch) if epoch >= 0 => ExpiryDescriptor::Fixed { epoch },
        _ => ExpiryDescriptor::Fixed {
            epoch: EXPIRED_SENTINEL,
        },
    }
}

/// Check whether a descriptor is expired at `now` (epoch seconds).
///
/// `Fixed(0)` never expires. A subscription-linked grant is expired when
/// the lookup reports anything other than an active subscription,
/// including a missing subscription (fail-closed).
pub async fn is_expired(
    descriptor: &ExpiryDescriptor,
    now: i64,
    subscriptions: &dyn SubscriptionStatusProvider,
) -> Result<bool, CoreError> {
    match descriptor {
        ExpiryDescriptor::Fixed { epoch } => Ok(*epoch != 0 && *epoch < now),
        ExpiryDescriptor::SubscriptionLinked { subscription_id } => {
            let status = subscriptions.lookup(subscription_id).await?;
            Ok(status != SubscriptionStatus::Active)
        }
    }
}

// ---------------------------------------------------------------------------
// ExpirySummary
// ---------------------------------------------------------------------------

/// API-facing snapshot of a grant's expiry state.
#[derive(Debug, Clone, Serialize)]
pub struct ExpirySummary {
    pub is_subscription: bool,
    pub subscription_id: Option<String>,
    pub is_expired: bool,
    /// Fixed expiry epoch; `None` for subscription-linked grants.
    pub timestamp: Option<i64>,
}

impl ExpirySummary {
    pub async fn build(
        descriptor: &ExpiryDescriptor,
        now: i64,
        subscriptions: &dyn SubscriptionStatusProvider,
    ) -> Result<Self, CoreError> {
        let expired = is_expired(descriptor, now, subscriptions).await?;
        Ok(match descriptor {
            ExpiryDescriptor::Fixed { epoch } => Self {
                is_subscription: false,
                subscription_id: None,
                is_expired: expired,
                timestamp: Some(*epoch),
            },
            ExpiryDescriptor::SubscriptionLinked { subscription_id } => Self {
                is_subscription: true,
                subscription_id: Some(subscription_id.clone()),
                is_expired: expired,
                timestamp: None,
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
