//! Subscription types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ParseError, Tier, UserId};

/// Subscription billing status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Subscription is active
    Active,
    /// In trial period
    Trialing,
    /// Payment is past due
    PastDue,
    /// Subscription was canceled
    Canceled,
    /// Checkout started but first payment not completed
    Incomplete,
    /// No subscription on file
    #[default]
    Inactive,
}

impl SubscriptionStatus {
    /// Identifier used in storage and API payloads
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Trialing => "trialing",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
            Self::Incomplete => "incomplete",
            Self::Inactive => "inactive",
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "trialing" => Ok(Self::Trialing),
            "past_due" | "pastdue" => Ok(Self::PastDue),
            "canceled" | "cancelled" => Ok(Self::Canceled),
            "incomplete" | "incomplete_expired" => Ok(Self::Incomplete),
            "inactive" | "" => Ok(Self::Inactive),
            _ => Err(ParseError::InvalidStatus(s.to_string())),
        }
    }
}

/// Whether a subscriber may use paid features.
///
/// Tier and status are stored separately: a canceled or past-due subscription
/// keeps its paid tier for history, but loses paid access immediately. Every
/// caller derives access through this function.
pub const fn can_access_paid_features(tier: Tier, status: SubscriptionStatus) -> bool {
    tier.is_paid() && matches!(status, SubscriptionStatus::Active | SubscriptionStatus::Trialing)
}

/// The tier a subscriber is metered as.
///
/// Paid tiers without paid access are metered as [`Tier::Free`].
pub const fn effective_tier(tier: Tier, status: SubscriptionStatus) -> Tier {
    if can_access_paid_features(tier, status) {
        tier
    } else {
        Tier::Free
    }
}

/// Resolved subscription state for a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSnapshot {
    /// User the snapshot belongs to
    pub user_id: UserId,
    /// Stored tier
    pub tier: Tier,
    /// Billing status
    pub status: SubscriptionStatus,
    /// Tier the user is metered as
    pub effective_tier: Tier,
    /// Generation allowance for the current period (lifetime for free)
    pub monthly_generation_limit: u32,
    /// Generations consumed in the current period
    pub monthly_generations_used: u32,
    /// Generations left before the limit is reached
    pub generations_remaining: u32,
    /// When the monthly allowance resets (paid metering only)
    pub generation_reset_date: Option<DateTime<Utc>>,
    /// Whether paid features are available
    pub can_access_paid_features: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATUSES: [SubscriptionStatus; 6] = [
        SubscriptionStatus::Active,
        SubscriptionStatus::Trialing,
        SubscriptionStatus::PastDue,
        SubscriptionStatus::Canceled,
        SubscriptionStatus::Incomplete,
        SubscriptionStatus::Inactive,
    ];

    #[test]
    fn test_paid_access_requires_paid_tier_and_good_standing() {
        for tier in Tier::ALL {
            for status in ALL_STATUSES {
                let expected = tier != Tier::Free
                    && matches!(status, SubscriptionStatus::Active | SubscriptionStatus::Trialing);
                assert_eq!(
                    can_access_paid_features(tier, status),
                    expected,
                    "tier={tier} status={status}"
                );
            }
        }
    }

    #[test]
    fn test_past_due_paid_user_loses_access() {
        assert!(!can_access_paid_features(Tier::Paid, SubscriptionStatus::PastDue));
        assert_eq!(effective_tier(Tier::Paid, SubscriptionStatus::PastDue), Tier::Free);
        assert_eq!(effective_tier(Tier::Premium, SubscriptionStatus::Trialing), Tier::Premium);
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("past_due".parse::<SubscriptionStatus>().unwrap(), SubscriptionStatus::PastDue);
        assert_eq!("cancelled".parse::<SubscriptionStatus>().unwrap(), SubscriptionStatus::Canceled);
        assert_eq!("".parse::<SubscriptionStatus>().unwrap(), SubscriptionStatus::Inactive);
        assert!("paused".parse::<SubscriptionStatus>().is_err());
    }
}
