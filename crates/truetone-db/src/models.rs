//! Database row models
//!
//! These types map directly to database rows using SQLx's FromRow derive.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use truetone_types::{
    Article, ContentType, GeneratedContent, GenerationArtifact, SubscriptionStatus, Tier,
    UsageRecord, UserId,
};
use uuid::Uuid;

use crate::error::{DbError, DbResult};

/// User row from the database
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: String,
    pub email: Option<String>,
    pub tier: String,
    pub subscription_status: String,
    pub monthly_generation_limit: Option<i32>,
    pub generation_reset_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Usage counter row from the database
#[derive(Debug, Clone, FromRow)]
pub struct UsageRow {
    pub counting_key: String,
    pub used: i32,
    pub usage_limit: i32,
    pub reset_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Article row from the database
#[derive(Debug, Clone, FromRow)]
pub struct ArticleRow {
    pub id: Uuid,
    pub title: String,
    pub summary: Option<String>,
    pub content: String,
    pub source_url: Option<String>,
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Generation artifact row from the database
#[derive(Debug, Clone, FromRow)]
pub struct ArtifactRow {
    pub id: Uuid,
    pub user_id: String,
    pub article_id: Uuid,
    pub content_type: String,
    pub content: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Conversions from row types to truetone-types domain types
impl UserRow {
    /// A new free-tier row with no subscription on file
    pub fn new(id: impl Into<String>, email: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            email,
            tier: Tier::Free.as_str().to_string(),
            subscription_status: SubscriptionStatus::Inactive.as_str().to_string(),
            monthly_generation_limit: None,
            generation_reset_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set tier and status
    #[must_use]
    pub fn with_subscription(mut self, tier: Tier, status: SubscriptionStatus) -> Self {
        self.tier = tier.as_str().to_string();
        self.subscription_status = status.as_str().to_string();
        self
    }

    /// Convert to domain UserId
    pub fn user_id(&self) -> UserId {
        UserId(self.id.clone())
    }

    /// Stored tier
    pub fn tier(&self) -> DbResult<Tier> {
        self.tier
            .parse()
            .map_err(|e: truetone_types::ParseError| DbError::Corrupt(e.to_string()))
    }

    /// Stored billing status
    pub fn subscription_status(&self) -> DbResult<SubscriptionStatus> {
        self.subscription_status
            .parse()
            .map_err(|e: truetone_types::ParseError| DbError::Corrupt(e.to_string()))
    }

    /// Per-user limit override, if set
    pub fn limit_override(&self) -> Option<u32> {
        self.monthly_generation_limit
            .and_then(|limit| u32::try_from(limit).ok())
    }
}

impl UsageRow {
    /// Convert to domain UsageRecord
    pub fn record(&self) -> UsageRecord {
        UsageRecord {
            used: u32::try_from(self.used).unwrap_or(0),
            limit: u32::try_from(self.usage_limit).unwrap_or(0),
            reset_at: self.reset_at,
        }
    }
}

impl From<ArticleRow> for Article {
    fn from(row: ArticleRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            summary: row.summary,
            content: row.content,
            source_url: row.source_url,
            published_at: row.published_at,
        }
    }
}

impl ArtifactRow {
    /// Convert to domain GenerationArtifact
    pub fn artifact(&self) -> DbResult<GenerationArtifact> {
        let content_type: ContentType = self
            .content_type
            .parse()
            .map_err(|e: truetone_types::ParseError| DbError::Corrupt(e.to_string()))?;
        let content: GeneratedContent = serde_json::from_value(self.content.clone())
            .map_err(|e| DbError::Corrupt(format!("artifact {}: {e}", self.id)))?;

        Ok(GenerationArtifact {
            user_id: UserId(self.user_id.clone()),
            article_id: self.article_id,
            content_type,
            content,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_row(tier: &str, status: &str) -> UserRow {
        UserRow {
            id: "kp_1".into(),
            email: None,
            tier: tier.into(),
            subscription_status: status.into(),
            monthly_generation_limit: Some(-4),
            generation_reset_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_user_row_parses_tier_and_status() {
        let row = user_row("premium", "past_due");
        assert_eq!(row.tier().unwrap(), Tier::Premium);
        assert_eq!(row.subscription_status().unwrap(), SubscriptionStatus::PastDue);
        assert!(matches!(user_row("gold", "active").tier(), Err(DbError::Corrupt(_))));
    }

    #[test]
    fn test_negative_override_is_ignored() {
        assert_eq!(user_row("paid", "active").limit_override(), None);
    }

    #[test]
    fn test_artifact_row_decodes_content() {
        let row = ArtifactRow {
            id: Uuid::new_v4(),
            user_id: "kp_1".into(),
            article_id: Uuid::new_v4(),
            content_type: "key-insights".into(),
            content: serde_json::json!(["one", "two"]),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let artifact = row.artifact().unwrap();
        assert_eq!(artifact.content_type, ContentType::KeyInsights);
        assert_eq!(
            artifact.content,
            GeneratedContent::KeyInsights(vec!["one".into(), "two".into()])
        );
    }
}
