//! Integration tests for the HTTP surface

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use passgate_domain::{BypassWindow, Identity, Score, ScoreRecord, UserId};
use passgate_domain::traits::ScoreCache;
use passgate_gatekeeper::{GatingConfig, GatingEngine, GENERIC_FAILURE_MESSAGE};
use passgate_provider::{MockProvider, ProviderError};
use passgate_server::{
    auth::AdminAuth,
    config::{ConfigError, ServerConfig},
    handlers::{
        create_router, AppState, AuthenticatedResponse, DecisionResponse, ErrorResponse,
        HealthCheckResponse, LinkIdentityResponse, RefreshResponse, RequirementsResponse,
        UserScoreResponse,
    },
};
use serde::de::DeserializeOwned;
use std::io::Write;
use std::sync::Arc;
use tower::ServiceExt; // for oneshot

const SECRET: &str = "test-secret-key";

struct TestApp {
    state: AppState<MockProvider>,
    provider: MockProvider,
    admin_token: String,
    host_token: String,
}

impl TestApp {
    fn new(config: GatingConfig, bypass: BypassWindow) -> Self {
        let provider = MockProvider::new(Score::new(25.0).unwrap());
        let engine = GatingEngine::new(
            config,
            bypass,
            provider.clone(),
            passgate_store::SqliteStore::new(":memory:").unwrap(),
        );
        let auth = AdminAuth::new(SECRET, 3600);
        let admin_token = auth.issue_token("ops", true).unwrap();
        let host_token = auth.issue_token("forum", false).unwrap();

        Self {
            state: AppState {
                engine: Arc::new(engine),
                auth: Arc::new(auth),
                score_max_age_secs: 3600,
            },
            provider,
            admin_token,
            host_token,
        }
    }

    fn enforcing() -> Self {
        Self::new(GatingConfig::enabled("335", 20.0), BypassWindow::disabled())
    }

    fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    fn link(&self, user: u64, addr: &str) {
        self.state
            .engine
            .store()
            .link_identity(UserId(user), &Identity::new(addr).unwrap())
            .unwrap();
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    async fn json<T: DeserializeOwned>(&self, request: Request<Body>) -> (StatusCode, T) {
        let (status, body) = self.send(request).await;
        (status, serde_json::from_slice(&body).unwrap())
    }
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

// ============================================================================
// Health and authentication
// ============================================================================

#[tokio::test]
async fn test_health_check_endpoint() {
    let app = TestApp::enforcing();

    let (status, health): (_, HealthCheckResponse) =
        app.json(request("GET", "/health", None, None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(health.status, "healthy");
    assert!(health.gating_enabled);
    assert!(health.enforcing);
}

#[tokio::test]
async fn test_admin_routes_reject_missing_and_non_admin_tokens() {
    let app = TestApp::enforcing();
    let body = r#"{"requiredScore": 10, "action": "reply"}"#;

    let (status, _) = app
        .send(request("PUT", "/passport/saveUserScore", None, Some(body)))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, error): (_, ErrorResponse) = app
        .json(request("PUT", "/passport/saveUserScore", Some(&app.host_token), Some(body)))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(error.error.contains("Admin"));

    let (status, _) = app
        .send(request("PUT", "/passport/saveUserScore", Some("not-a-jwt"), Some(body)))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Admin routes
// ============================================================================

#[tokio::test]
async fn test_save_user_score_then_read_requirements() {
    let app = TestApp::enforcing();

    let (status, _) = app
        .send(request(
            "PUT",
            "/passport/saveUserScore",
            Some(&app.admin_token),
            Some(r#"{"requiredScore": 12.5, "action": "new_topic"}"#),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, view): (_, RequirementsResponse) = app
        .json(request("GET", "/passport/requirements", Some(&app.host_token), None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view.min_score_to_create_topic, 12.5);
    assert_eq!(view.min_score_to_post, 0.0);
}

#[tokio::test]
async fn test_save_category_score_accepts_snake_case() {
    let app = TestApp::enforcing();

    let (status, _) = app
        .send(request(
            "PUT",
            "/passport/saveCategoryScore",
            Some(&app.admin_token),
            Some(r#"{"category_id": 7, "required_score": 10, "action": "reply"}"#),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    // Second write replaces the first
    let (status, _) = app
        .send(request(
            "PUT",
            "/passport/saveCategoryScore",
            Some(&app.admin_token),
            Some(r#"{"categoryId": 7, "requiredScore": 15, "action": "reply"}"#),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, view): (_, RequirementsResponse) = app
        .json(request(
            "GET",
            "/passport/categories/7/requirements",
            Some(&app.host_token),
            None,
        ))
        .await;
    assert_eq!(view.min_score_to_post, 15.0);

    let (_, other): (_, RequirementsResponse) = app
        .json(request(
            "GET",
            "/passport/categories/9/requirements",
            Some(&app.host_token),
            None,
        ))
        .await;
    assert_eq!(other.min_score_to_post, 0.0);
    assert_eq!(other.min_score_to_create_topic, 0.0);
}

#[tokio::test]
async fn test_save_rejects_bad_input() {
    let app = TestApp::enforcing();
    let cases = [
        r#"{"requiredScore": -1, "action": "reply"}"#,
        r#"{"requiredScore": 5, "action": "delete_everything"}"#,
        r#"{"requiredScore": 5, "action": "create_account"}"#,
        r#"{"action": "reply"}"#,
        r#"not json"#,
    ];

    for body in cases {
        let (status, error): (_, ErrorResponse) = app
            .json(request(
                "PUT",
                "/passport/saveUserScore",
                Some(&app.admin_token),
                Some(body),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {}", body);
        assert!(!error.error.is_empty());
    }
}

#[tokio::test]
async fn test_refresh_passport_score() {
    let app = TestApp::enforcing();
    app.link(1, "0xa11ce");
    app.provider
        .set_score(&Identity::new("0xa11ce").unwrap(), Score::new(31.0).unwrap());

    let (status, refreshed): (_, RefreshResponse) = app
        .json(request(
            "PUT",
            "/passport/refreshPassportScore",
            Some(&app.admin_token),
            Some(r#"{"userId": 1}"#),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(refreshed.user_id, 1);
    assert_eq!(refreshed.score, 31.0);

    let (status, cached): (_, UserScoreResponse) = app
        .json(request("GET", "/passport/users/1/score", Some(&app.host_token), None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cached.identity, "0xa11ce");
    assert_eq!(cached.score, Some(31.0));
    assert!(cached.fetched_at.is_some());
    assert!(!cached.stale);
}

#[tokio::test]
async fn test_refresh_without_identity_returns_zero() {
    let app = TestApp::enforcing();

    let (status, refreshed): (_, RefreshResponse) = app
        .json(request(
            "PUT",
            "/passport/refreshPassportScore",
            Some(&app.admin_token),
            Some(r#"{"user_id": 42}"#),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(refreshed.score, 0.0);
    assert_eq!(app.provider.call_count(), 0);
}

#[tokio::test]
async fn test_refresh_provider_failure_is_bad_gateway() {
    let app = TestApp::enforcing();
    app.link(1, "0xa11ce");
    app.provider
        .fail_by_default(ProviderError::Unavailable("down".to_string()));

    let (status, _) = app
        .send(request(
            "PUT",
            "/passport/refreshPassportScore",
            Some(&app.admin_token),
            Some(r#"{"userId": 1}"#),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_link_identity_seeds_score() {
    let app = TestApp::enforcing();

    let (status, linked): (_, LinkIdentityResponse) = app
        .json(request(
            "PUT",
            "/passport/linkIdentity",
            Some(&app.admin_token),
            Some(r#"{"userId": 5, "identity": "  0x52908400098527886E0F7030069857D2E4169EE7  "}"#),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(linked.identity, "0x52908400098527886e0f7030069857d2e4169ee7");
    assert_eq!(linked.score, Some(25.0));

    // The same address cannot be claimed by another user
    let (status, _) = app
        .send(request(
            "PUT",
            "/passport/linkIdentity",
            Some(&app.admin_token),
            Some(r#"{"userId": 6, "identity": "0x52908400098527886e0f7030069857d2e4169ee7"}"#),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for bad in ["   ", "0xabcdef", "vitalik.eth"] {
        let body = format!(r#"{{"userId": 6, "identity": "{}"}}"#, bad);
        let (status, _) = app
            .send(request(
                "PUT",
                "/passport/linkIdentity",
                Some(&app.admin_token),
                Some(&body),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "identity: {:?}", bad);
    }
}

// ============================================================================
// Host routes
// ============================================================================

#[tokio::test]
async fn test_account_check_decisions() {
    let app = TestApp::enforcing();
    app.provider
        .set_score(&Identity::new("0xlow").unwrap(), Score::new(15.0).unwrap());

    let (status, allowed): (_, DecisionResponse) = app
        .json(request(
            "POST",
            "/passport/accountCheck",
            Some(&app.host_token),
            Some(r#"{"identity": "0xhigh"}"#),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(allowed.allowed);
    assert!(allowed.message.is_none());

    let (_, low): (_, DecisionResponse) = app
        .json(request(
            "POST",
            "/passport/accountCheck",
            Some(&app.host_token),
            Some(r#"{"identity": "0xlow"}"#),
        ))
        .await;
    assert!(!low.allowed);
    assert!(low.message.unwrap().contains("15"));

    let (_, no_wallet): (_, DecisionResponse) = app
        .json(request(
            "POST",
            "/passport/accountCheck",
            Some(&app.host_token),
            Some("{}"),
        ))
        .await;
    assert!(!no_wallet.allowed);
    assert!(no_wallet.message.unwrap().contains("wallet"));
}

#[tokio::test]
async fn test_account_check_provider_failure_is_generic_denial() {
    let app = TestApp::enforcing();
    app.provider
        .fail_by_default(ProviderError::InvalidResponse("secret internals".to_string()));

    let (status, denied): (_, DecisionResponse) = app
        .json(request(
            "POST",
            "/passport/accountCheck",
            Some(&app.host_token),
            Some(r#"{"identity": "0xabc"}"#),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!denied.allowed);
    assert_eq!(denied.message.as_deref(), Some(GENERIC_FAILURE_MESSAGE));
}

#[tokio::test]
async fn test_authenticated_hook_never_fails() {
    let app = TestApp::enforcing();
    app.link(1, "0xa11ce");

    let (status, ok): (_, AuthenticatedResponse) = app
        .json(request(
            "POST",
            "/passport/authenticated",
            Some(&app.host_token),
            Some(r#"{"userId": 1}"#),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ok.score, Some(25.0));

    app.provider
        .fail_by_default(ProviderError::Unavailable("down".to_string()));
    let (status, skipped): (_, AuthenticatedResponse) = app
        .json(request(
            "POST",
            "/passport/authenticated",
            Some(&app.host_token),
            Some(r#"{"userId": 1}"#),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(skipped.score.is_none());

    // Previous score survives the failed refresh
    let record = app
        .state
        .engine
        .store()
        .get_score(&Identity::new("0xa11ce").unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(record.score.value(), 25.0);
}

#[tokio::test]
async fn test_check_combines_site_and_category_requirements() {
    let app = TestApp::enforcing();
    app.link(1, "0xa11ce");
    app.state
        .engine
        .store()
        .put_score(&ScoreRecord::new(
            Identity::new("0xa11ce").unwrap(),
            Score::new(10.0).unwrap(),
            app.state.engine.now(),
        ))
        .unwrap();

    app.send(request(
        "PUT",
        "/passport/saveUserScore",
        Some(&app.admin_token),
        Some(r#"{"requiredScore": 5, "action": "reply"}"#),
    ))
    .await;
    app.send(request(
        "PUT",
        "/passport/saveCategoryScore",
        Some(&app.admin_token),
        Some(r#"{"categoryId": 7, "requiredScore": 10, "action": "reply"}"#),
    ))
    .await;
    app.send(request(
        "PUT",
        "/passport/saveCategoryScore",
        Some(&app.admin_token),
        Some(r#"{"categoryId": 8, "requiredScore": 11, "action": "reply"}"#),
    ))
    .await;

    let check = |uri: &'static str| request("GET", uri, Some(&app.host_token), None);

    let (_, site): (_, DecisionResponse) = app.json(check("/passport/check?userId=1&action=reply")).await;
    assert!(site.allowed);

    let (_, inclusive): (_, DecisionResponse) = app
        .json(check("/passport/check?userId=1&action=reply&categoryId=7"))
        .await;
    assert!(inclusive.allowed, "Meeting the requirement exactly passes");

    let (_, blocked): (_, DecisionResponse) = app
        .json(check("/passport/check?userId=1&action=reply&categoryId=8"))
        .await;
    assert!(!blocked.allowed);

    let (_, stranger): (_, DecisionResponse) = app
        .json(check("/passport/check?userId=2&action=reply"))
        .await;
    assert!(!stranger.allowed, "No cached score counts as zero");

    let (status, _) = app.send(check("/passport/check?userId=1&action=fly")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.send(check("/passport/check?action=reply")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_check_allows_everything_during_bypass() {
    let app = TestApp::new(
        GatingConfig::enabled("335", 20.0),
        BypassWindow::starting_at(app_now(), std::time::Duration::from_secs(86_400)),
    );
    app.send(request(
        "PUT",
        "/passport/saveUserScore",
        Some(&app.admin_token),
        Some(r#"{"requiredScore": 99, "action": "new_topic"}"#),
    ))
    .await;

    let (_, decision): (_, DecisionResponse) = app
        .json(request(
            "GET",
            "/passport/check?userId=3&action=new_topic&categoryId=1",
            Some(&app.host_token),
            None,
        ))
        .await;
    assert!(decision.allowed);

    let (_, health): (_, HealthCheckResponse) = app.json(request("GET", "/health", None, None)).await;
    assert!(!health.enforcing);
}

fn app_now() -> u64 {
    use passgate_domain::{Clock, SystemClock};
    SystemClock.now()
}

#[tokio::test]
async fn test_user_score_without_identity_is_not_found() {
    let app = TestApp::enforcing();

    let (status, _) = app
        .send(request("GET", "/passport/users/77/score", Some(&app.host_token), None))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_user_score_reports_staleness() {
    let app = TestApp::enforcing();
    app.link(1, "0xa11ce");

    let (_, missing): (_, UserScoreResponse) = app
        .json(request("GET", "/passport/users/1/score", Some(&app.host_token), None))
        .await;
    assert!(missing.score.is_none());
    assert!(missing.stale);

    let old = app.state.engine.now() - 7_200;
    app.state
        .engine
        .store()
        .put_score(&ScoreRecord::new(
            Identity::new("0xa11ce").unwrap(),
            Score::new(40.0).unwrap(),
            old,
        ))
        .unwrap();

    let (_, stale): (_, UserScoreResponse) = app
        .json(request("GET", "/passport/users/1/score", Some(&app.host_token), None))
        .await;
    assert_eq!(stale.score, Some(40.0));
    assert_eq!(stale.fetched_at, Some(old));
    assert!(stale.stale);
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
bind_address = "127.0.0.1"
bind_port = 8181
jwt_secret = "file-secret"
database_path = ":memory:"

[gating]
enabled = true
scorer_id = "335"
min_score_to_create_account = 20.0

[provider]
endpoint = "http://localhost:9000"
api_key = "key"
"#
    )
    .unwrap();

    let config = ServerConfig::from_file(file.path()).unwrap();
    assert_eq!(config.bind_addr(), "127.0.0.1:8181");
    assert_eq!(config.gating.min_score_to_create_account, 20.0);
    assert!(passgate_server::build_state(&config).is_ok());
}

#[test]
fn test_config_file_errors() {
    assert!(matches!(
        ServerConfig::from_file("/definitely/not/here.toml"),
        Err(ConfigError::FileRead(_))
    ));

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "bind_port = \"not a number\"").unwrap();
    assert!(matches!(
        ServerConfig::from_file(file.path()),
        Err(ConfigError::TomlParse(_))
    ));
}
