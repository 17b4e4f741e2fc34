use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::json;

use super::catalog::{CatalogError, ProgramCatalog};
use super::import::ImportError;
use super::rate_limit::{client_identifier, RateLimitDecision};
use super::service::{
    EligibilityRequest, RecommendationError, RecommendationRequest, RecommendationService,
};

const RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// Router builder exposing the recommendation and eligibility endpoints.
pub fn recommendation_router<C>(service: Arc<RecommendationService<C>>) -> Router
where
    C: ProgramCatalog + 'static,
{
    Router::new()
        .route("/api/v1/recommendations", post(recommend_handler::<C>))
        .route(
            "/api/v1/calculate/eligibility",
            post(eligibility_handler::<C>),
        )
        .route(
            "/api/v1/admin/programs/cutoffs",
            post(import_cutoffs_handler::<C>),
        )
        .with_state(service)
}

pub(crate) async fn recommend_handler<C>(
    State(service): State<Arc<RecommendationService<C>>>,
    headers: HeaderMap,
    payload: Result<Json<RecommendationRequest>, JsonRejection>,
) -> Response
where
    C: ProgramCatalog + 'static,
{
    let now = Instant::now();
    let decision = match service.admit(&client_identifier(&headers), now) {
        Ok(decision) => decision,
        Err(err) => return err.into_response(),
    };
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return invalid_body(rejection),
    };

    match service.recommend(&request, now) {
        Ok(response) => with_rate_headers((StatusCode::OK, Json(response)).into_response(), decision),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn eligibility_handler<C>(
    State(service): State<Arc<RecommendationService<C>>>,
    headers: HeaderMap,
    payload: Result<Json<EligibilityRequest>, JsonRejection>,
) -> Response
where
    C: ProgramCatalog + 'static,
{
    let decision = match service.admit(&client_identifier(&headers), Instant::now()) {
        Ok(decision) => decision,
        Err(err) => return err.into_response(),
    };
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return invalid_body(rejection),
    };

    match service.eligibility(&request) {
        Ok(response) => with_rate_headers((StatusCode::OK, Json(response)).into_response(), decision),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn import_cutoffs_handler<C>(
    State(service): State<Arc<RecommendationService<C>>>,
    body: String,
) -> Response
where
    C: ProgramCatalog + 'static,
{
    match service.import_cutoffs(body.as_bytes()) {
        Ok(summary) => (StatusCode::OK, Json(json!({ "data": summary }))).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Bodies that fail to decode (wrong types, negative or oversized scores)
/// get the same 400 shape as profiles the engine rejects.
fn invalid_body(rejection: JsonRejection) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": rejection.body_text(), "kind": "invalid_input" })),
    )
        .into_response()
}

fn with_rate_headers(mut response: Response, decision: RateLimitDecision) -> Response {
    let headers = response.headers_mut();
    headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(decision.remaining));
    response
}

impl IntoResponse for RecommendationError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        match self {
            RecommendationError::Engine(err) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": message, "kind": err.kind() })),
            )
                .into_response(),
            RecommendationError::Import(err) => {
                let kind = match err {
                    ImportError::Csv(_) => "malformed_csv",
                    ImportError::InvalidRow { .. } => "invalid_row",
                    ImportError::Empty => "empty_import",
                };
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": message, "kind": kind })),
                )
                    .into_response()
            }
            RecommendationError::ProgramNotFound(_)
            | RecommendationError::Catalog(CatalogError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
            }
            RecommendationError::Catalog(CatalogError::Unavailable(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": message })),
            )
                .into_response(),
            RecommendationError::RateLimited { retry_after } => {
                let seconds = retry_after.as_secs().max(1);
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    [(header::RETRY_AFTER, HeaderValue::from(seconds))],
                    Json(json!({ "error": message })),
                )
                    .into_response()
            }
        }
    }
}
