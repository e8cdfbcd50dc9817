//! Gated generation streaming

use std::sync::Arc;

use async_stream::stream;
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderValue};
use axum::response::Response;
use axum::Json;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tracing::{error, field, info, instrument, warn, Span};
use truetone_core::metrics::{self, GenerationOutcome, Operation, OperationTimer};
use truetone_core::{persist_artifact, GateError, GenerationRequest, TextStream};
use truetone_db::ArtifactRepository;
use truetone_types::{Article, ContentType, Product, UserId};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::extractors::RequestPrincipal;
use crate::handlers::shared::{quota_headers, require_product_access};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationStreamRequest {
    pub article_id: Uuid,
    pub content_type: ContentType,
}

/// POST /api/generation-stream
///
/// Resolves the principal, guards the newsletter product, loads the
/// article, then debits one generation before calling the LLM. The debit
/// is not refunded if generation fails or the client disconnects.
#[instrument(
    skip_all,
    fields(counting_key = field::Empty, article_id = field::Empty, content_type = field::Empty)
)]
pub async fn generation_stream(
    State(state): State<AppState>,
    RequestPrincipal(principal): RequestPrincipal,
    payload: Result<Json<GenerationStreamRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let span = Span::current();
    span.record("counting_key", field::display(principal.counting_key()));
    span.record("article_id", field::display(request.article_id));
    span.record("content_type", field::display(request.content_type));

    if let Some(user) = principal.user() {
        if let Err(e) = require_product_access(&state, user, Product::Newsletter).await {
            if matches!(e, ApiError::CrossProductRedirect(_)) {
                metrics::record_generation(GenerationOutcome::Redirected);
            }
            return Err(e);
        }
    }

    let article: Article = state
        .articles
        .find_published(request.article_id)
        .await?
        .ok_or(ApiError::ArticleNotFound)?
        .into();

    let decision = match state.gate.require(&principal).await {
        Ok(decision) => decision,
        Err(e) => {
            if matches!(e, GateError::QuotaExceeded(_)) {
                metrics::record_generation(GenerationOutcome::QuotaExceeded);
            }
            return Err(e.into());
        }
    };

    let generation = GenerationRequest::new(article, request.content_type);
    let timer = OperationTimer::start(Operation::Generation);
    let chunks = match state.provider.stream(&generation).await {
        Ok(chunks) => chunks,
        Err(e) => {
            timer.error();
            metrics::record_generation(GenerationOutcome::ProviderFailed);
            warn!(provider = state.provider.name(), error = %e, "Generation provider failed before streaming");
            return Err(e.into());
        }
    };

    info!(used = decision.used, limit = decision.limit, "Streaming generation");

    let body = generation_body(
        chunks,
        Arc::clone(&state.artifacts),
        principal.user().map(|u| u.id.clone()),
        request.article_id,
        request.content_type,
        timer,
    );

    let mut response = Response::new(Body::from_stream(body));
    let headers = response.headers_mut();
    headers.extend(quota_headers(&decision));
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    Ok(response)
}

/// Forward chunks to the client, then persist the full text for
/// authenticated owners once the provider finishes.
fn generation_body(
    mut chunks: TextStream,
    artifacts: Arc<dyn ArtifactRepository>,
    owner: Option<UserId>,
    article_id: Uuid,
    content_type: ContentType,
    timer: OperationTimer,
) -> impl Stream<Item = Result<String, GateError>> + Send + 'static {
    stream! {
        let mut text = String::new();
        let mut failure = None;

        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(chunk) => {
                    text.push_str(&chunk);
                    yield Ok(chunk);
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        if let Some(e) = failure {
            timer.error();
            metrics::record_generation(GenerationOutcome::StreamFailed);
            warn!(error = %e, "Generation stream failed mid-response");
            yield Err(e);
        } else {
            if let Some(user_id) = owner {
                if let Err(e) = persist_artifact(artifacts.as_ref(), &user_id, article_id, content_type, &text).await {
                    error!(user_id = %user_id, error = %e, "Failed to persist generation artifact");
                }
            }

            timer.success();
            metrics::record_generation(GenerationOutcome::Completed);
        }
    }
}
