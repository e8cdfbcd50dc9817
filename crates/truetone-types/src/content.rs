//! Generated content types

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ParseError, UserId};

/// Kinds of derivative content that can be generated from an article
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentType {
    /// Bulleted takeaways
    #[serde(alias = "key_insights")]
    KeyInsights,
    /// Short-form video script
    #[serde(alias = "video_script")]
    VideoScript,
    /// Email to a subscriber's audience
    #[serde(alias = "email_template")]
    EmailTemplate,
    /// One post per social platform
    #[serde(alias = "social_posts")]
    SocialPosts,
}

impl ContentType {
    /// Every content type
    pub const ALL: [ContentType; 4] = [
        ContentType::KeyInsights,
        ContentType::VideoScript,
        ContentType::EmailTemplate,
        ContentType::SocialPosts,
    ];

    /// Kebab-case identifier used in API payloads and storage
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::KeyInsights => "key-insights",
            Self::VideoScript => "video-script",
            Self::EmailTemplate => "email-template",
            Self::SocialPosts => "social-posts",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContentType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "key-insights" => Ok(Self::KeyInsights),
            "video-script" => Ok(Self::VideoScript),
            "email-template" => Ok(Self::EmailTemplate),
            "social-posts" => Ok(Self::SocialPosts),
            _ => Err(ParseError::InvalidContentType(s.to_string())),
        }
    }
}

/// Shaped generation output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GeneratedContent {
    /// One entry per insight
    KeyInsights(Vec<String>),
    /// Platform name to post text
    SocialPosts(BTreeMap<String, String>),
    /// Script or email body
    Text(String),
}

impl GeneratedContent {
    /// Serialize into the stored JSON representation
    pub fn to_value(&self) -> serde_json::Value {
        match self {
            Self::KeyInsights(items) => serde_json::Value::from(items.clone()),
            Self::SocialPosts(posts) => serde_json::Value::Object(
                posts
                    .iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                    .collect(),
            ),
            Self::Text(text) => serde_json::Value::String(text.clone()),
        }
    }
}

/// Stored artifact, unique per (user, article, content type)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationArtifact {
    /// Owning user
    pub user_id: UserId,
    /// Source article
    pub article_id: Uuid,
    /// Kind of content
    pub content_type: ContentType,
    /// Shaped content
    pub content: GeneratedContent,
    /// First generation
    pub created_at: DateTime<Utc>,
    /// Most recent regeneration
    pub updated_at: DateTime<Utc>,
}

/// Published article that content is generated from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    /// Article ID
    pub id: Uuid,
    /// Headline
    pub title: String,
    /// Short summary
    pub summary: Option<String>,
    /// Full body
    pub content: String,
    /// Original URL
    pub source_url: Option<String>,
    /// Publication time
    pub published_at: Option<DateTime<Utc>>,
}
