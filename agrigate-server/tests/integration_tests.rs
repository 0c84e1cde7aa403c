// End-to-end tests for the gateway: auth, querying, weather caching,
// conversations, and the error surface.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use agrigate_core::{GatewayConfig, ToolError};
use agrigate_server::{build_router, build_state_with_upstream};
use agrigate_tools::weather::{
    CurrentConditions, DailyForecast, UpstreamForecast, WeatherUpstream,
};
use async_trait::async_trait;
use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use serde_json::{json, Value};

struct CountingUpstream {
    calls: AtomicUsize,
}

#[async_trait]
impl WeatherUpstream for CountingUpstream {
    async fn fetch(&self, _lat: f64, _lon: f64, days: u32) -> Result<UpstreamForecast, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(UpstreamForecast {
            current: CurrentConditions {
                temperature_c: 27.5,
                humidity_pct: 52.0,
                rainfall_mm: 1.0,
                wind_kmh: 9.0,
                soil_temperature_c: 25.0,
                soil_moisture_m3m3: 0.2,
                description: "clear sky".into(),
            },
            daily: (0..days)
                .map(|i| DailyForecast {
                    date: format!("2025-06-{:02}", i + 1),
                    temp_min_c: 19.0,
                    temp_max_c: 31.0,
                    rainfall_mm: 3.0,
                    description: "clear sky".into(),
                })
                .collect(),
        })
    }
}

async fn test_server_with(config: GatewayConfig) -> (TestServer, Arc<CountingUpstream>) {
    let upstream = Arc::new(CountingUpstream {
        calls: AtomicUsize::new(0),
    });
    let state = build_state_with_upstream(config, upstream.clone())
        .await
        .expect("state builds");
    let server = TestServer::new(build_router(state)).expect("server builds");
    (server, upstream)
}

async fn test_server() -> (TestServer, Arc<CountingUpstream>) {
    test_server_with(GatewayConfig::default()).await
}

async fn register_and_login(server: &TestServer) -> (String, Value) {
    let response = server
        .post("/auth/register")
        .json(&json!({
            "email": "a@x.com",
            "password": "Abcdef12",
            "full_name": "A"
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    (
        body["token"].as_str().unwrap().to_string(),
        body["user"].clone(),
    )
}

async fn admin_token(server: &TestServer) -> String {
    let response = server
        .post("/auth/login")
        .json(&json!({
            "email": "admin@agrigate.local",
            "password": "ChangeMe1"
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_auth_happy_path() {
    let (server, _) = test_server().await;
    let (token, user) = register_and_login(&server).await;

    assert_eq!(user["role"], "user");
    assert_eq!(user["is_active"], true);
    assert!(user.get("password_hash").is_none());

    let response = server
        .post("/auth/login")
        .json(&json!({ "email": "a@x.com", "password": "Abcdef12" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["user"]["id"], user["id"]);

    let response = server
        .get("/auth/me")
        .authorization_bearer(&token)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let me: Value = response.json();
    assert_eq!(me["id"], user["id"]);
}

#[tokio::test]
async fn test_register_policy_and_duplicates() {
    let (server, _) = test_server().await;

    let response = server
        .post("/auth/register")
        .json(&json!({ "email": "weak@x.com", "password": "short", "full_name": "W" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    register_and_login(&server).await;
    let response = server
        .post("/auth/register")
        .json(&json!({ "email": "A@X.COM", "password": "Abcdef12", "full_name": "Dup" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_protected_routes_reject_missing_token() {
    let (server, _) = test_server().await;
    for route in ["/ask", "/agent", "/rag", "/translate"] {
        let response = server.post(route).json(&json!({ "query": "hi" })).await;
        assert_eq!(
            response.status_code(),
            StatusCode::UNAUTHORIZED,
            "route {} should require auth",
            route
        );
    }
}

#[tokio::test]
async fn test_agent_yield_query_persists_session() {
    let (server, _) = test_server().await;
    let (token, user) = register_and_login(&server).await;

    let response = server
        .post("/agent")
        .authorization_bearer(&token)
        .json(&json!({
            "query": "Predict wheat yield in Punjab with 800mm rainfall, 120 kg fertilizer, 2 hectares."
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();

    assert!(body["tools_used"]
        .as_array()
        .unwrap()
        .iter()
        .any(|t| t == "predict_yield"));
    assert!(body["answer"].as_str().unwrap().contains("Tools used"));
    let session_id = body["session_id"].as_str().unwrap();

    let response = server
        .post("/conversations/get")
        .authorization_bearer(&token)
        .json(&json!({ "session_id": session_id, "user_id": user["id"] }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let conversation: Value = response.json();
    let messages = conversation["conversation"]["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(
        conversation["conversation"]["message_count"],
        messages.len()
    );
}

#[tokio::test]
async fn test_rag_returns_documents() {
    let (server, _) = test_server().await;
    let (token, _) = register_and_login(&server).await;

    let response = server
        .post("/rag")
        .authorization_bearer(&token)
        .json(&json!({ "query": "What is crop rotation?", "top_k": 3 }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    let documents = body["documents"].as_array().unwrap();
    assert!(!documents.is_empty());
    assert!(documents[0]["metadata"]["topic"].is_string());
}

#[tokio::test]
async fn test_predict_yield_direct_endpoint() {
    let (server, _) = test_server().await;
    let (token, _) = register_and_login(&server).await;

    let response = server
        .post("/predict_yield")
        .authorization_bearer(&token)
        .json(&json!({
            "crop": "wheat",
            "rainfall_mm": 800.0,
            "fertilizer_kg": 120.0,
            "area_ha": 2.0
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert!(body["predicted_yield_t_ha"].as_f64().unwrap() > 0.0);

    let response = server
        .post("/predict_yield")
        .authorization_bearer(&token)
        .json(&json!({
            "crop": "wheat",
            "rainfall_mm": 9999.0,
            "fertilizer_kg": 120.0
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_detect_pest_multipart() {
    let (server, _) = test_server().await;
    let (token, _) = register_and_login(&server).await;

    let form = MultipartForm::new()
        .add_part(
            "file",
            Part::bytes(b"\x89PNG fake image".to_vec())
                .file_name("leaf.png")
                .mime_type("image/png"),
        )
        .add_text("top_k", "3");
    let response = server
        .post("/detect_pest")
        .authorization_bearer(&token)
        .multipart(form)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert!(body["top_prediction"]["label"].is_string());
    assert_eq!(body["all_predictions"].as_array().unwrap().len(), 3);
    assert!(body["agent_analysis"].as_str().unwrap().contains("detect_pest"));

    let form = MultipartForm::new().add_part(
        "file",
        Part::bytes(b"not an image".to_vec())
            .file_name("notes.txt")
            .mime_type("text/plain"),
    );
    let response = server
        .post("/detect_pest")
        .authorization_bearer(&token)
        .multipart(form)
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_weather_cache_single_upstream_call() {
    let (server, upstream) = test_server().await;

    let first = server
        .post("/weather")
        .json(&json!({ "location": "Punjab", "days": 3 }))
        .await;
    assert_eq!(first.status_code(), StatusCode::OK);

    let second = server
        .post("/weather")
        .json(&json!({ "location": "Punjab", "days": 3 }))
        .await;
    assert_eq!(second.status_code(), StatusCode::OK);

    assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
    assert_eq!(first.text(), second.text());
}

#[tokio::test]
async fn test_weather_unknown_location_404_with_suggestions() {
    let (server, _) = test_server().await;
    let response = server
        .post("/weather")
        .json(&json!({ "location": "Atlantis" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["suggestions"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_weather_days_bounds() {
    let (server, _) = test_server().await;
    for days in [0, 17] {
        let response = server
            .post("/weather")
            .json(&json!({ "location": "Punjab", "days": days }))
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    }

    let response = server
        .post("/weather")
        .json(&json!({ "location": "Punjab", "days": 1 }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["forecast"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_weather_locations_and_admin_cache_clear() {
    let (server, _) = test_server().await;

    let response = server.get("/weather/locations").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let listed: Value = response.json();
    assert!(listed.as_array().unwrap().len() >= 60);

    // cache something, then clear as admin
    server
        .post("/weather")
        .json(&json!({ "location": "Punjab", "days": 2 }))
        .await;

    let (user_token, _) = register_and_login(&server).await;
    let response = server
        .post("/weather/cache/clear")
        .authorization_bearer(&user_token)
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let token = admin_token(&server).await;
    let response = server
        .post("/weather/cache/clear")
        .authorization_bearer(&token)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["cleared"], 1);
}

#[tokio::test]
async fn test_iteration_cap_truncates_but_answers() {
    let config = GatewayConfig {
        max_iterations: 2,
        ..GatewayConfig::default()
    };
    let (server, _) = test_server_with(config).await;
    let (token, _) = register_and_login(&server).await;

    let response = server
        .post("/ask")
        .authorization_bearer(&token)
        .json(&json!({
            "query": "What is crop rotation? Find sources then analyze them then compare options."
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["truncated"], true);
    assert!(body["trace"]["steps"].as_array().unwrap().len() <= 2);
    assert!(!body["answer"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_management_rules() {
    let (server, _) = test_server().await;
    let (_user_token, user) = register_and_login(&server).await;
    let token = admin_token(&server).await;
    let user_id = user["id"].as_str().unwrap();

    // deactivate the user
    let response = server
        .post(&format!("/auth/users/{}/manage", user_id))
        .authorization_bearer(&token)
        .json(&json!({ "op": "deactivate" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let managed: Value = response.json();
    assert_eq!(managed["is_active"], false);

    // deactivated users cannot log in
    let response = server
        .post("/auth/login")
        .json(&json!({ "email": "a@x.com", "password": "Abcdef12" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    // self-targeting is a conflict
    let response = server
        .get("/auth/me")
        .authorization_bearer(&token)
        .await;
    let admin: Value = response.json();
    let admin_id = admin["id"].as_str().unwrap();
    let response = server
        .post(&format!("/auth/users/{}/manage", admin_id))
        .authorization_bearer(&token)
        .json(&json!({ "op": "delete" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);

    // unknown target
    let response = server
        .post("/auth/users/nonexistent/manage")
        .authorization_bearer(&token)
        .json(&json!({ "op": "activate" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_conversations_crud_and_scoping() {
    let (server, _) = test_server().await;
    let (token, user) = register_and_login(&server).await;
    let user_id = user["id"].as_str().unwrap();

    let message = json!({
        "id": "m-1",
        "role": "user",
        "text": "How do I store onions after harvest?",
        "timestamp": "2025-06-01T10:00:00Z"
    });
    let save = json!({
        "session_id": "s-1",
        "user_id": user_id,
        "messages": [message]
    });

    let response = server
        .post("/conversations/save")
        .authorization_bearer(&token)
        .json(&save)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    // replay is idempotent on message id
    server
        .post("/conversations/save")
        .authorization_bearer(&token)
        .json(&save)
        .await;

    let response = server
        .post("/conversations/list")
        .authorization_bearer(&token)
        .json(&json!({ "user_id": user_id }))
        .await;
    let body: Value = response.json();
    let conversations = body["conversations"].as_array().unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0]["message_count"], 1);

    // a different user_id in the body is rejected
    let response = server
        .post("/conversations/list")
        .authorization_bearer(&token)
        .json(&json!({ "user_id": "someone-else" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = server
        .post("/conversations/delete")
        .authorization_bearer(&token)
        .json(&json!({ "session_id": "s-1", "user_id": user_id }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let response = server
        .post("/conversations/delete")
        .authorization_bearer(&token)
        .json(&json!({ "session_id": "s-1", "user_id": user_id }))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_translate_unconfigured_is_503() {
    let (server, _) = test_server().await;
    let (token, _) = register_and_login(&server).await;

    let response = server
        .post("/translate")
        .authorization_bearer(&token)
        .json(&json!({ "text": "hello", "target_lang": "hi" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_health_reports_components() {
    let (server, _) = test_server().await;
    let response = server.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["components"]["generation"], "offline");
    assert!(body["components"]["registry"]["tools"].as_u64().unwrap() >= 8);
}
