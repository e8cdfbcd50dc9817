//! LLM generation provider abstraction and artifact shaping

use std::collections::BTreeMap;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde_json::Value;
use tracing::{debug, instrument};
use truetone_db::{ArtifactRepository, UpsertArtifact};
use truetone_types::{Article, ContentType, GeneratedContent, GenerationArtifact, UserId};
use uuid::Uuid;

use crate::metrics::{Operation, OperationTimer};
use crate::GateError;

/// Stream of generated text chunks
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, GateError>> + Send>>;

/// Streams generated text for an article.
///
/// Implementations must surface connection and status failures from
/// `stream` itself, before any chunk is yielded, so callers can still
/// answer with an error status.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &'static str;

    /// Start a generation
    async fn stream(&self, request: &GenerationRequest) -> Result<TextStream, GateError>;
}

/// What to generate and from which article
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub article: Article,
    pub content_type: ContentType,
}

impl GenerationRequest {
    pub fn new(article: Article, content_type: ContentType) -> Self {
        Self {
            article,
            content_type,
        }
    }

    pub fn system_prompt(&self) -> String {
        let format = match self.content_type {
            ContentType::KeyInsights => {
                "Return the five most important takeaways, one per line, without numbering."
            }
            ContentType::VideoScript => {
                "Write a 60 second video script with a hook, three beats and a call to action."
            }
            ContentType::EmailTemplate => {
                "Write a short email to a professional audience with a subject line first."
            }
            ContentType::SocialPosts => {
                "Return a JSON object with keys linkedin, twitter and instagram, each holding one post."
            }
        };
        format!(
            "You turn industry articles into content for professionals. \
             Write in a clear, direct voice. {format}"
        )
    }

    pub fn user_prompt(&self) -> String {
        let mut prompt = format!("Title: {}\n", self.article.title);
        if let Some(summary) = self.article.summary.as_deref().filter(|s| !s.trim().is_empty()) {
            prompt.push_str(&format!("Summary: {summary}\n"));
        }
        prompt.push('\n');
        prompt.push_str(&self.article.content);
        prompt
    }
}

/// Shape raw model output into the stored representation for `content_type`
pub fn shape_content(content_type: ContentType, text: &str) -> GeneratedContent {
    match content_type {
        ContentType::KeyInsights => GeneratedContent::KeyInsights(
            text.lines()
                .map(strip_list_marker)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        ContentType::SocialPosts => match parse_posts(text) {
            Some(posts) => GeneratedContent::SocialPosts(posts),
            None => {
                let mut posts = BTreeMap::new();
                posts.insert("general".to_string(), text.trim().to_string());
                GeneratedContent::SocialPosts(posts)
            }
        },
        ContentType::VideoScript | ContentType::EmailTemplate => {
            GeneratedContent::Text(text.trim().to_string())
        }
    }
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    if let Some(rest) = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .or_else(|| line.strip_prefix("• "))
    {
        return rest.trim();
    }

    // "1." / "12)"
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return rest.trim();
        }
    }
    line
}

fn parse_posts(text: &str) -> Option<BTreeMap<String, String>> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);

    let Value::Object(map) = serde_json::from_str::<Value>(body.trim()).ok()? else {
        return None;
    };
    if map.is_empty() {
        return None;
    }

    map.into_iter()
        .map(|(platform, post)| match post {
            Value::String(post) => Some((platform, post)),
            _ => None,
        })
        .collect()
}

/// Shape and upsert a completed generation
#[instrument(skip(artifacts, text), fields(user_id = %user_id, article_id = %article_id, content_type = %content_type))]
pub async fn persist_artifact(
    artifacts: &dyn ArtifactRepository,
    user_id: &UserId,
    article_id: Uuid,
    content_type: ContentType,
    text: &str,
) -> Result<GenerationArtifact, GateError> {
    let timer = OperationTimer::start(Operation::PersistArtifact);
    let content = shape_content(content_type, text);

    let result: Result<GenerationArtifact, GateError> = async {
        let row = artifacts
            .upsert(UpsertArtifact {
                user_id: user_id.to_string(),
                article_id,
                content_type: content_type.as_str().to_string(),
                content: content.to_value(),
            })
            .await?;
        Ok(row.artifact()?)
    }
    .await;

    timer.observe(&result);
    if result.is_ok() {
        debug!("Artifact persisted");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use truetone_db::MemoryArtifactRepository;

    fn article() -> Article {
        Article {
            id: Uuid::new_v4(),
            title: "Rates hold steady".to_string(),
            summary: Some("The central bank paused.".to_string()),
            content: "Full body".to_string(),
            source_url: None,
            published_at: None,
        }
    }

    #[test]
    fn test_key_insights_strip_markers() {
        let shaped = shape_content(
            ContentType::KeyInsights,
            "1. First point\n\n- Second point\n* Third\n12) Fourth\nPlain line\n   ",
        );
        assert_eq!(
            shaped,
            GeneratedContent::KeyInsights(vec![
                "First point".into(),
                "Second point".into(),
                "Third".into(),
                "Fourth".into(),
                "Plain line".into(),
            ])
        );
    }

    #[test]
    fn test_social_posts_json_object() {
        let shaped = shape_content(
            ContentType::SocialPosts,
            "```json\n{\"linkedin\": \"Post A\", \"twitter\": \"Post B\"}\n```",
        );
        match shaped {
            GeneratedContent::SocialPosts(posts) => {
                assert_eq!(posts.len(), 2);
                assert_eq!(posts["linkedin"], "Post A");
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn test_social_posts_fallback_to_general() {
        let shaped = shape_content(ContentType::SocialPosts, "  just one post  ");
        let mut expected = BTreeMap::new();
        expected.insert("general".to_string(), "just one post".to_string());
        assert_eq!(shaped, GeneratedContent::SocialPosts(expected));

        // Non-string values are not a post map
        let shaped = shape_content(ContentType::SocialPosts, "{\"linkedin\": 3}");
        assert!(matches!(shaped, GeneratedContent::SocialPosts(p) if p.contains_key("general")));
    }

    #[test]
    fn test_script_is_trimmed_text() {
        assert_eq!(
            shape_content(ContentType::VideoScript, "\nHook...\n"),
            GeneratedContent::Text("Hook...".into())
        );
    }

    #[test]
    fn test_user_prompt_includes_article() {
        let request = GenerationRequest::new(article(), ContentType::EmailTemplate);
        let prompt = request.user_prompt();
        assert!(prompt.starts_with("Title: Rates hold steady\n"));
        assert!(prompt.contains("Summary: The central bank paused."));
        assert!(prompt.ends_with("Full body"));
        assert!(request.system_prompt().contains("subject line"));
    }

    #[tokio::test]
    async fn test_persist_artifact_upserts() {
        let repo = MemoryArtifactRepository::new();
        let user = UserId::from("kp_1");
        let article_id = Uuid::new_v4();

        persist_artifact(&repo, &user, article_id, ContentType::KeyInsights, "- a\n- b")
            .await
            .unwrap();
        let second = persist_artifact(&repo, &user, article_id, ContentType::KeyInsights, "- c")
            .await
            .unwrap();

        assert_eq!(second.content, GeneratedContent::KeyInsights(vec!["c".into()]));
        let stored = repo.list_for_article("kp_1", article_id).await.unwrap();
        assert_eq!(stored.len(), 1);
    }
}
