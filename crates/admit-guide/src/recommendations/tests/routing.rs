use super::common::*;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use axum::Json;
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

use crate::recommendations::router::{eligibility_handler, recommend_handler};
use crate::recommendations::{recommendation_router, RecommendationService};

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", "203.0.113.10")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

fn candidate_body(utme_score: u16) -> serde_json::Value {
    json!({
        "utme_score": utme_score,
        "o_level_grades": {
            "English Language": "B2",
            "Mathematics": "A1",
            "Physics": "B3",
            "Chemistry": "B3",
            "Biology": "C4"
        },
        "state_of_origin": "Ogun"
    })
}

#[tokio::test]
async fn recommendations_route_returns_data_and_meta() {
    let (service, _) = build_service();
    let router = recommendation_router(service);

    let mut body = candidate_body(280);
    body["limit"] = json!(3);
    let response = router
        .oneshot(post_json("/api/v1/recommendations", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-ratelimit-limit"], "30");
    assert_eq!(response.headers()["x-ratelimit-remaining"], "29");
    let payload = json_body(response).await;
    assert_eq!(payload["meta"]["total_programs"], 5);
    assert_eq!(payload["meta"]["recommended"], 3);
    assert_eq!(payload["data"].as_array().unwrap().len(), 3);
    assert!(payload["data"][0]["eligibility"]["probability"].is_number());
}

#[tokio::test]
async fn recommendations_route_rejects_short_olevel_results() {
    let (service, _) = build_service();
    let router = recommendation_router(service);

    let body = json!({
        "utme_score": 180,
        "o_level_grades": { "English": "C6", "Mathematics": "F9" }
    });
    let response = router
        .oneshot(post_json("/api/v1/recommendations", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = json_body(response).await;
    assert_eq!(payload["kind"], "insufficient_subjects");
}

#[tokio::test]
async fn out_of_range_utme_is_invalid_input() {
    let (service, _) = build_service();

    let mut request = recommendation_request(280);
    request.profile.utme_score = 401;
    let response = recommend_handler::<MemoryCatalog>(
        State(service),
        axum::http::HeaderMap::new(),
        Ok(Json(request)),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = json_body(response).await;
    assert_eq!(payload["kind"], "invalid_input");
}

#[tokio::test]
async fn undecodable_utme_scores_are_invalid_input() {
    for utme_score in [json!(-5), json!(70000), json!("three hundred")] {
        let (service, _) = build_service();
        let router = recommendation_router(service);

        let mut body = candidate_body(280);
        body["utme_score"] = utme_score.clone();
        let response = router
            .oneshot(post_json("/api/v1/recommendations", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "utme {utme_score}");
        let payload = json_body(response).await;
        assert_eq!(payload["kind"], "invalid_input");
        assert!(payload["error"].is_string());
    }
}

#[tokio::test]
async fn eligibility_route_rejects_negative_utme() {
    let (service, _) = build_service();
    let router = recommendation_router(service);

    let mut body = candidate_body(280);
    body["utme_score"] = json!(-5);
    body["program_id"] = json!("law-unilag");
    let response = router
        .oneshot(post_json("/api/v1/calculate/eligibility", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = json_body(response).await;
    assert_eq!(payload["kind"], "invalid_input");
}

#[tokio::test]
async fn eligibility_route_returns_report() {
    let (service, _) = build_service();
    let router = recommendation_router(service);

    let mut body = candidate_body(300);
    body["program_id"] = json!("law-unilag");
    let response = router
        .oneshot(post_json("/api/v1/calculate/eligibility", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let payload = json_body(response).await;
    assert_eq!(payload["data"]["program_id"], "law-unilag");
    assert_eq!(payload["data"]["data_quality"]["years_of_data"], 3);
    assert!(payload["data"]["rationale"]
        .as_str()
        .unwrap()
        .contains("Law at University of Lagos"));
}

#[tokio::test]
async fn eligibility_for_unknown_program_is_404() {
    let (service, _) = build_service();

    let response = eligibility_handler::<MemoryCatalog>(
        State(service),
        axum::http::HeaderMap::new(),
        Ok(Json(eligibility_request("missing"))),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn exhausted_budget_returns_429_with_retry_after() {
    let service = build_service_with(Arc::new(MemoryCatalog::with(programs())), rate_limit(1));
    let router = recommendation_router(service);

    let first = router
        .clone()
        .oneshot(post_json("/api/v1/recommendations", candidate_body(250)))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = router
        .oneshot(post_json("/api/v1/recommendations", candidate_body(250)))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = second.headers()[header::RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=60).contains(&retry_after));
}

#[tokio::test]
async fn cutoff_import_route_applies_csv() {
    let (service, _) = build_service();
    let router = recommendation_router(service);

    let response = router
        .oneshot(
            Request::post("/api/v1/admin/programs/cutoffs")
                .header(header::CONTENT_TYPE, "text/csv")
                .body(Body::from(
                    "program_id,year,cutoff,confidence\nedu-unilag,2025,51.5,verified\n",
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let payload = json_body(response).await;
    assert_eq!(payload["data"]["records_written"], 1);
    assert_eq!(payload["data"]["programs_updated"], 1);
}

#[tokio::test]
async fn cutoff_import_route_rejects_bad_rows() {
    let (service, _) = build_service();
    let router = recommendation_router(service);

    let response = router
        .oneshot(
            Request::post("/api/v1/admin/programs/cutoffs")
                .body(Body::from("program_id,year,cutoff\nedu-unilag,2025,180\n"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = json_body(response).await;
    assert_eq!(payload["kind"], "invalid_row");
}

#[tokio::test]
async fn unavailable_catalog_is_internal_error() {
    let service: Arc<RecommendationService<UnavailableCatalog>> =
        build_service_with(Arc::new(UnavailableCatalog), rate_limit(30));
    let router = recommendation_router(service);

    let response = router
        .oneshot(post_json("/api/v1/recommendations", candidate_body(250)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
