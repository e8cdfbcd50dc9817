//! Subscription tier types

use serde::{Deserialize, Serialize};

use crate::ParseError;

/// Subscription tier levels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Free tier - lifetime generation allowance, never resets
    #[default]
    Free,
    /// Paid tier - monthly generation allowance
    Paid,
    /// Premium tier - larger monthly generation allowance
    Premium,
}

impl Tier {
    /// All tiers, lowest first
    pub const ALL: [Tier; 3] = [Tier::Free, Tier::Paid, Tier::Premium];

    /// Whether this is a paying tier
    pub const fn is_paid(&self) -> bool {
        matches!(self, Self::Paid | Self::Premium)
    }

    /// Whether the generation allowance for this tier resets every month.
    ///
    /// Free allowances are lifetime allowances.
    pub const fn resets_monthly(&self) -> bool {
        self.is_paid()
    }

    /// Lowercase identifier used in storage and API payloads
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Paid => "paid",
            Self::Premium => "premium",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Tier {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "paid" | "pro" => Ok(Self::Paid),
            "premium" => Ok(Self::Premium),
            _ => Err(ParseError::InvalidTier(s.to_string())),
        }
    }
}
