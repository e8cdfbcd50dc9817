//! Quota metering types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Tier;

/// The tier a principal is metered as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaTier {
    /// No valid identity, or an identity without a user record
    Anonymous,
    /// Free tier, lifetime allowance
    Free,
    /// Paid tier, monthly allowance
    Paid,
    /// Premium tier, monthly allowance
    Premium,
}

impl QuotaTier {
    /// Lowercase identifier used in responses, headers and metric labels
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Free => "free",
            Self::Paid => "paid",
            Self::Premium => "premium",
        }
    }

    /// Whether the allowance resets on a monthly schedule
    pub const fn resets_monthly(&self) -> bool {
        matches!(self, Self::Paid | Self::Premium)
    }
}

impl From<Tier> for QuotaTier {
    fn from(tier: Tier) -> Self {
        match tier {
            Tier::Free => Self::Free,
            Tier::Paid => Self::Paid,
            Tier::Premium => Self::Premium,
        }
    }
}

impl std::fmt::Display for QuotaTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored usage for one counting key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    /// Generations consumed in the current period
    pub used: u32,
    /// Allowance ceiling applied at the last increment
    pub limit: u32,
    /// When the period resets; `None` for lifetime allowances
    pub reset_at: Option<DateTime<Utc>>,
}

impl UsageRecord {
    /// Generations left before the ceiling
    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.used)
    }

    /// Whether the ceiling has been reached
    pub fn is_exhausted(&self) -> bool {
        self.used >= self.limit
    }
}

/// Outcome of a quota check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaDecision {
    /// Whether the generation may proceed
    pub allowed: bool,
    /// Generations consumed, including this one when allowed
    pub used: u32,
    /// Allowance ceiling
    pub limit: u32,
    /// Generations left
    pub remaining: u32,
    /// Tier the principal was metered as
    pub tier: QuotaTier,
    /// Human-readable explanation when denied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl QuotaDecision {
    /// Build an allowing decision from post-increment numbers
    pub fn allow(used: u32, limit: u32, tier: QuotaTier) -> Self {
        Self {
            allowed: true,
            used,
            limit,
            remaining: limit.saturating_sub(used),
            tier,
            message: None,
        }
    }

    /// Build a denying decision with the tier-specific explanation
    pub fn deny(used: u32, limit: u32, tier: QuotaTier, reset_at: Option<DateTime<Utc>>) -> Self {
        Self {
            allowed: false,
            used,
            limit,
            remaining: limit.saturating_sub(used),
            tier,
            message: Some(denial_message(tier, limit, reset_at)),
        }
    }
}

/// Explanation shown when a principal runs out of generations
pub fn denial_message(tier: QuotaTier, limit: u32, reset_at: Option<DateTime<Utc>>) -> String {
    match tier {
        QuotaTier::Anonymous => format!(
            "You've used all {limit} free generations. Sign up to unlock more."
        ),
        QuotaTier::Free => format!(
            "You've used all {limit} generations on the free plan. Upgrade to unlock more."
        ),
        QuotaTier::Paid | QuotaTier::Premium => match reset_at {
            Some(at) => format!(
                "You've used all {limit} generations this month. Your limit resets on {}.",
                at.format("%B %-d, %Y")
            ),
            None => format!(
                "You've used all {limit} generations this month. Your limit resets at the start of your next billing period."
            ),
        },
    }
}
