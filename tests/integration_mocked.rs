/// Integration tests with a mocked persistence backend
/// Exercises the REST client and the HTTP routes end to end without a real backend
use advisory_backoffice::app::build_router;
use advisory_backoffice::auth::AuthToken;
use advisory_backoffice::backend_client::BackendClient;
use advisory_backoffice::clock::FixedClock;
use advisory_backoffice::config::Config;
use advisory_backoffice::errors::AppError;
use advisory_backoffice::handlers::AppState;
use advisory_backoffice::lead_stage::LeadStage;
use advisory_backoffice::notifier::{CollectingNotifier, NoticeLevel};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::NaiveDate;
use moka::future::Cache;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper function to create test config
fn create_test_config(backend_base_url: String) -> Config {
    Config {
        port: 8080,
        backend_base_url,
        backend_timeout_secs: 5,
        subscription_cache_ttl_secs: 60,
        default_phone_region: "IN".to_string(),
    }
}

fn create_test_state(server: &MockServer, notifier: Arc<CollectingNotifier>) -> Arc<AppState> {
    let config = create_test_config(server.uri());
    let backend = BackendClient::new(config.backend_base_url.clone(), Duration::from_secs(5))
        .expect("client builds");

    Arc::new(AppState {
        config,
        backend,
        subscription_cache: Cache::builder().max_capacity(100).build(),
        clock: Arc::new(FixedClock::new(
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        )),
        notifier,
    })
}

fn token() -> AuthToken {
    AuthToken("test-token".to_string())
}

fn sample_subscriptions() -> Value {
    json!([
        {"id": 1, "client": 7, "plan_name": "Equity", "start_date": "2024-01-01", "end_date": "2024-01-31"},
        {"id": 2, "client": 7, "plan_name": "Equity", "start_date": "2024-02-01", "end_date": "2024-02-29"},
        {"id": 3, "client": 7, "plan_name": "Starter", "start_date": "2023-12-01", "end_date": "2023-12-31"}
    ])
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn authed(request: axum::http::request::Builder) -> axum::http::request::Builder {
    request.header("Authorization", "Bearer test-token")
}

#[tokio::test]
async fn test_list_subscriptions_accepts_paginated_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/subscriptions/"))
        .and(query_param("client", "7"))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 3,
            "results": sample_subscriptions()
        })))
        .mount(&mock_server)
        .await;

    let client = BackendClient::new(mock_server.uri(), Duration::from_secs(5)).unwrap();
    let records = client
        .list_client_subscriptions(&token(), "7")
        .await
        .unwrap();

    assert_eq!(records.len(), 3);
    assert_eq!(records[2].plan_name.as_deref(), Some("Starter"));
}

#[tokio::test]
async fn test_backend_status_codes_map_to_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/subscriptions/"))
        .and(query_param("client", "401"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/subscriptions/"))
        .and(query_param("client", "500"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database down"))
        .mount(&mock_server)
        .await;

    let client = BackendClient::new(mock_server.uri(), Duration::from_secs(5)).unwrap();

    let unauthorized = client.list_client_subscriptions(&token(), "401").await;
    assert!(matches!(unauthorized, Err(AppError::Unauthorized(_))));

    match client.list_client_subscriptions(&token(), "500").await {
        Err(AppError::ExternalApiError(msg)) => assert!(msg.contains("database down")),
        other => panic!("Expected backend error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_timeline_route_classifies_backend_records() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/subscriptions/"))
        .and(query_param("client", "7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_subscriptions()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let state = create_test_state(&mock_server, Arc::new(CollectingNotifier::new()));
    let app = build_router(state);

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(
                authed(Request::get("/api/v1/clients/7/subscriptions/timeline"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["as_of"], "2024-01-15");
        assert_eq!(body["current"]["id"], 1);
        assert_eq!(body["upcoming"][0]["id"], 2);
        assert_eq!(body["past"][0]["id"], 3);
    }
    // second request is served from the cache; `expect(1)` is verified on drop
}

#[tokio::test]
async fn test_timeline_route_requires_token() {
    let mock_server = MockServer::start().await;
    let state = create_test_state(&mock_server, Arc::new(CollectingNotifier::new()));

    let response = build_router(state)
        .oneshot(
            Request::get("/api/v1/clients/7/subscriptions/timeline")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_renewal_starts_after_existing_coverage() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/subscriptions/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_subscriptions()))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/subscriptions/"))
        .and(body_partial_json(json!({
            "client": "7",
            "start_date": "2024-03-01",
            "end_date": "2024-04-01"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 4,
            "client": 7,
            "plan_name": "Equity",
            "start_date": "2024-03-01",
            "end_date": "2024-04-01"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let notifier = Arc::new(CollectingNotifier::new());
    let app = build_router(create_test_state(&mock_server, notifier.clone()));

    let response = app
        .oneshot(
            authed(Request::post("/api/v1/clients/7/renewals"))
                .header("Content-Type", "application/json")
                .body(Body::from(
                    json!({"plan_name": "Equity", "amount_paid": "4999.00", "cadence": "Monthly"})
                        .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["id"], 4);

    let notices = notifier.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Success);
    assert!(notices[0].message.contains("2024-04-01"));
}

#[tokio::test]
async fn test_renewal_backend_failure_raises_error_notice() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/subscriptions/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let notifier = Arc::new(CollectingNotifier::new());
    let app = build_router(create_test_state(&mock_server, notifier.clone()));

    let response = app
        .oneshot(
            authed(Request::post("/api/v1/clients/7/renewals"))
                .header("Content-Type", "application/json")
                .body(Body::from(
                    json!({"cadence": "Yearly", "start_date": "2024-01-01"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(notifier.notices()[0].level, NoticeLevel::Error);
}

#[tokio::test]
async fn test_renewal_history_failure_raises_error_notice() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/subscriptions/"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database unavailable"))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/subscriptions/"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&mock_server)
        .await;

    let notifier = Arc::new(CollectingNotifier::new());
    let app = build_router(create_test_state(&mock_server, notifier.clone()));

    // No start date, so the existing history has to be loaded first
    let response = app
        .oneshot(
            authed(Request::post("/api/v1/clients/7/renewals"))
                .header("Content-Type", "application/json")
                .body(Body::from(json!({"cadence": "Monthly"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let notices = notifier.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Error);
}

#[tokio::test]
async fn test_renewal_date_previews() {
    let mock_server = MockServer::start().await;
    let app = build_router(create_test_state(
        &mock_server,
        Arc::new(CollectingNotifier::new()),
    ));

    let cases = [
        ("/api/v1/renewals/next-date?cadence=Weekly&anchor=2024-01-01", "2024-01-08"),
        ("/api/v1/renewals/next-date?cadence=Yearly&anchor=2024-01-01", "2024-12-31"),
        // anchor defaults to the injected clock
        ("/api/v1/renewals/next-date?cadence=Monthly", "2024-02-15"),
        ("/api/v1/renewals/scheduled-date?interval=monthly&start=2024-01-31", "2024-03-01"),
    ];

    for (uri, expected) in cases {
        let response = app
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{}", uri);
        assert_eq!(body_json(response).await["renewal_date"], expected, "{}", uri);
    }

    let response = app
        .oneshot(
            Request::get("/api/v1/renewals/scheduled-date?interval=weekly&start=someday")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stage_update_switches_to_onboarding_tab() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/leads/31/"))
        .and(body_partial_json(json!({"stage": "ONBOARDING"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 31, "stage": "ONBOARDING"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = build_router(create_test_state(
        &mock_server,
        Arc::new(CollectingNotifier::new()),
    ));

    let response = app
        .oneshot(
            authed(Request::patch("/api/v1/leads/31/stage"))
                .header("Content-Type", "application/json")
                .body(Body::from(
                    json!({"stage": "ONBOARDING", "previous_stage": "CONTACTED"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["stage"], "ONBOARDING");
    assert_eq!(body["active_tab"], "onboarding");
    assert_eq!(body["backward"], false);
}

#[tokio::test]
async fn test_backward_stage_move_is_accepted_with_warning() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/leads/9/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 9})))
        .mount(&mock_server)
        .await;

    let notifier = Arc::new(CollectingNotifier::new());
    let client = BackendClient::new(mock_server.uri(), Duration::from_secs(5)).unwrap();
    client
        .update_lead_stage(&token(), "9", LeadStage::Lead)
        .await
        .unwrap();

    let app = build_router(create_test_state(&mock_server, notifier.clone()));
    let response = app
        .oneshot(
            authed(Request::patch("/api/v1/leads/9/stage"))
                .header("Content-Type", "application/json")
                .body(Body::from(
                    json!({"stage": "LEAD", "previous_stage": "AWAITING_PAYMENT"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["backward"], true);
    assert_eq!(body["active_tab"], Value::Null);
    assert_eq!(notifier.notices()[0].level, NoticeLevel::Warning);
}

#[tokio::test]
async fn test_import_blocks_on_rejected_rows_unless_partial() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/leads/bulk/"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"created": 1})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = build_router(create_test_state(
        &mock_server,
        Arc::new(CollectingNotifier::new()),
    ));
    let rows = json!({"rows": [
        {"name": "Asha Rao", "email": "asha@example.com", "phone": "9876543210"},
        {"name": "", "email": "nobody@example.com"}
    ]});

    let blocked = app
        .clone()
        .oneshot(
            authed(Request::post("/api/v1/leads/import"))
                .header("Content-Type", "application/json")
                .body(Body::from(rows.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(blocked.status(), StatusCode::OK);
    let body = body_json(blocked).await;
    assert_eq!(body["forwarded"], false);
    assert_eq!(body["accepted"], 1);
    assert_eq!(body["rejected"][0]["row"], 3);

    let partial = app
        .oneshot(
            authed(Request::post("/api/v1/leads/import?partial=true"))
                .header("Content-Type", "application/json")
                .body(Body::from(rows.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_json(partial).await;
    assert_eq!(body["forwarded"], true);
    assert_eq!(body["backend"]["created"], 1);
}

#[tokio::test]
async fn test_import_accepts_spreadsheet_cell_types() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/leads/bulk/"))
        .and(body_partial_json(json!({"leads": [
            {"name": "Asha Rao", "phone": "+919876543210", "stage": "CONTACTED"}
        ]})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"created": 1})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = build_router(create_test_state(
        &mock_server,
        Arc::new(CollectingNotifier::new()),
    ));
    // Spreadsheet exports send numeric phones and display-cased stages
    let rows = json!({"rows": [
        {"name": "Asha Rao", "phone": 9876543210u64, "stage": "Contacted"}
    ]});

    let response = app
        .oneshot(
            authed(Request::post("/api/v1/leads/import"))
                .header("Content-Type", "application/json")
                .body(Body::from(rows.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["accepted"], 1);
    assert_eq!(body["rejected"], json!([]));
    assert_eq!(body["forwarded"], true);
}
