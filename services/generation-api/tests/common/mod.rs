//! Test harness for the Generation API router

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::extract::ConnectInfo;
use axum::http::{header, Request, Response};
use axum::Router;
use generation_api::{build_router, AppState, Config, Services, Storage};
use tower::ServiceExt;
use truetone_core::{
    GateError, GenerationProvider, GenerationRequest, MemoryPropertyStore, PropertyStore,
    TextStream, TokenVerifier,
};
use truetone_db::{
    MemoryArticleRepository, MemoryArtifactRepository, MemoryUsageStore, MemoryUserRepository,
};
use truetone_types::{AuthenticatedUser, Product, UserId};
use uuid::Uuid;

/// Accepts `valid:<sub>` or `valid:<sub>:<email>`
pub struct StubVerifier;

#[async_trait]
impl TokenVerifier for StubVerifier {
    async fn verify(&self, token: &str) -> Result<AuthenticatedUser, GateError> {
        let mut parts = token.strip_prefix("valid:").ok_or(GateError::InvalidToken)?.splitn(2, ':');
        let sub = parts.next().filter(|s| !s.is_empty()).ok_or(GateError::InvalidToken)?;
        let mut user = AuthenticatedUser::new(sub);
        if let Some(email) = parts.next() {
            user = user.with_email(email);
        }
        Ok(user)
    }
}

/// Streams fixed chunks, or fails before the first one
pub enum StubProvider {
    Chunks(Vec<&'static str>),
    Failing,
}

#[async_trait]
impl GenerationProvider for StubProvider {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn stream(&self, _request: &GenerationRequest) -> Result<TextStream, GateError> {
        match self {
            Self::Chunks(chunks) => {
                let items: Vec<Result<String, GateError>> =
                    chunks.iter().map(|c| Ok((*c).to_string())).collect();
                Ok(Box::pin(futures::stream::iter(items)))
            }
            Self::Failing => Err(GateError::GenerationStreamFailure(
                "provider returned 500 Internal Server Error".into(),
            )),
        }
    }
}

pub struct TestApp {
    pub router: Router,
    pub users: MemoryUserRepository,
    pub usage: MemoryUsageStore,
    pub articles: MemoryArticleRepository,
    pub artifacts: MemoryArtifactRepository,
    pub properties: MemoryPropertyStore,
    pub article_id: Uuid,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_provider(StubProvider::Chunks(vec!["- First insight\n", "- Second insight"]))
    }

    pub fn with_provider(provider: StubProvider) -> Self {
        let users = MemoryUserRepository::new();
        let usage = MemoryUsageStore::new();
        let articles = MemoryArticleRepository::new();
        let artifacts = MemoryArtifactRepository::new();
        let properties = MemoryPropertyStore::new();

        let article = MemoryArticleRepository::published("Rates hold steady", "The central bank held rates.");
        let article_id = article.id;
        articles.insert(article);

        let storage = Storage::from_memory(
            users.clone(),
            usage.clone(),
            articles.clone(),
            artifacts.clone(),
        );
        let services = Services {
            verifier: Arc::new(StubVerifier),
            properties: Arc::new(properties.clone()),
            provider: Arc::new(provider),
        };
        let state = AppState::new(test_config(), storage, services);

        Self {
            router: build_router(state, None),
            users,
            usage,
            articles,
            artifacts,
            properties,
            article_id,
        }
    }

    pub async fn entitle(&self, user_id: &str, product: Product) {
        self.properties
            .set_user_property(&UserId::new(user_id), product.property_key(), serde_json::Value::Bool(true))
            .await
            .unwrap();
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

pub fn test_config() -> Config {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("STORAGE_BACKEND", "memory"),
        ("KINDE_DOMAIN", "https://acme.kinde.com"),
        ("OPENAI_API_KEY", "sk-test"),
        ("METRICS_ENABLED", "false"),
    ]);
    Config::from_lookup(|key| vars.get(key).map(|v| (*v).to_string())).unwrap()
}

/// Request arriving from `ip` over a direct connection
pub fn request(method: &str, uri: &str, ip: [u8; 4]) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .extension(ConnectInfo(SocketAddr::from((ip, 40_000))))
}

pub fn generation_request(ip: [u8; 4], article_id: Uuid, token: Option<&str>) -> Request<Body> {
    let mut builder = request("POST", "/api/generation-stream", ip)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = serde_json::json!({ "articleId": article_id, "contentType": "key-insights" });
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
