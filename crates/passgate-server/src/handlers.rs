//! HTTP request handlers for the server.
//!
//! Admin routes change requirements and force refreshes. Host routes let the
//! forum ask for decisions and report sign-ins.

use crate::auth::{AdminAuth, AuthError};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router as AxumRouter,
};
use passgate_domain::{ActionKind, CategoryId, Decision, Identity, Score, Scope, UserId};
use passgate_gatekeeper::{GatingEngine, GatingError};
use passgate_provider::ScoreProvider;
use passgate_store::{SqliteStore, StoreError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Engine type served over HTTP
pub type Engine<P> = GatingEngine<P, SqliteStore>;

/// Shared application state
pub struct AppState<P> {
    /// Gating engine
    pub engine: Arc<Engine<P>>,
    /// Bearer token verification
    pub auth: Arc<AdminAuth>,
    /// Age after which a cached score is reported stale
    pub score_max_age_secs: u64,
}

impl<P> Clone for AppState<P> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            auth: Arc::clone(&self.auth),
            score_max_age_secs: self.score_max_age_secs,
        }
    }
}

/// PUT /passport/saveUserScore body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveUserScoreRequest {
    /// Minimum score (non-negative)
    #[serde(alias = "required_score")]
    pub required_score: f64,
    /// "reply" or "new_topic"
    pub action: String,
}

/// PUT /passport/saveCategoryScore body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveCategoryScoreRequest {
    /// Category the requirement applies to
    #[serde(alias = "category_id")]
    pub category_id: u64,
    /// Minimum score (non-negative)
    #[serde(alias = "required_score")]
    pub required_score: f64,
    /// "reply" or "new_topic"
    pub action: String,
}

/// Body carrying a single user id
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRequest {
    /// Host user id
    #[serde(alias = "user_id")]
    pub user_id: u64,
}

/// PUT /passport/linkIdentity body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkIdentityRequest {
    /// Host user id
    #[serde(alias = "user_id")]
    pub user_id: u64,
    /// External address
    pub identity: String,
}

/// POST /passport/accountCheck body
#[derive(Debug, Default, Deserialize)]
pub struct AccountCheckRequest {
    /// Wallet the prospective user signed in with
    #[serde(default)]
    pub identity: Option<String>,
}

/// GET /passport/check query
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckQuery {
    /// Host user id
    #[serde(alias = "user_id")]
    pub user_id: u64,
    /// "reply" or "new_topic"
    pub action: String,
    /// Category of the target, if any
    #[serde(default, alias = "category_id")]
    pub category_id: Option<u64>,
}

/// A stored requirement
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementResponse {
    /// Category, for category requirements
    pub category_id: Option<u64>,
    /// Gated action
    pub action: String,
    /// Minimum score
    pub required_score: f64,
}

/// Requirements for the two gated actions in one scope
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementsResponse {
    /// Minimum score to reply
    pub min_score_to_post: f64,
    /// Minimum score to start a topic
    pub min_score_to_create_topic: f64,
}

/// Result of a manual refresh
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    /// Host user id
    pub user_id: u64,
    /// Freshly fetched score
    pub score: f64,
}

/// Result of linking an identity
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkIdentityResponse {
    /// Host user id
    pub user_id: u64,
    /// Normalized address
    pub identity: String,
    /// Seeded score, when the initial fetch succeeded
    pub score: Option<f64>,
}

/// Outcome of a decision
#[derive(Debug, Serialize, Deserialize)]
pub struct DecisionResponse {
    /// Whether the action may proceed
    pub allowed: bool,
    /// Explanation for the user when denied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Result of a sign-in hook
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthenticatedResponse {
    /// Refreshed score, absent when the refresh was skipped
    pub score: Option<f64>,
}

/// Cached score of a user
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserScoreResponse {
    /// Host user id
    pub user_id: u64,
    /// Linked address
    pub identity: String,
    /// Last known score
    pub score: Option<f64>,
    /// When the score was fetched (Unix seconds)
    pub fetched_at: Option<u64>,
    /// Whether the score is missing or older than the configured maximum age
    pub stale: bool,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckResponse {
    /// Overall health status
    pub status: String,
    /// Whether gating is switched on
    pub gating_enabled: bool,
    /// Whether requirements are currently enforced
    pub enforcing: bool,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    /// Malformed request
    BadRequest(String),
    /// Authentication or authorization failure
    Auth(AuthError),
    /// Gating failure
    Gating(GatingError),
    /// Store failure outside the engine
    Store(StoreError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Auth(AuthError::Forbidden) => {
                (StatusCode::FORBIDDEN, AuthError::Forbidden.to_string())
            }
            AppError::Auth(AuthError::JwtEncode(e)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            AppError::Auth(e) => (StatusCode::UNAUTHORIZED, e.to_string()),
            AppError::Gating(e @ GatingError::IdentityNotLinked(_)) => {
                (StatusCode::NOT_FOUND, e.to_string())
            }
            AppError::Gating(e) if e.is_provider_failure() => (StatusCode::BAD_GATEWAY, e.to_string()),
            AppError::Gating(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            AppError::Store(e @ StoreError::IdentityInUse { .. }) => {
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            AppError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        AppError::Auth(e)
    }
}

impl From<GatingError> for AppError {
    fn from(e: GatingError) -> Self {
        AppError::Gating(e)
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Store(e)
    }
}

impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self {
        AppError::BadRequest(e.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(e: QueryRejection) -> Self {
        AppError::BadRequest(e.body_text())
    }
}

/// Parse an action that can carry a requirement
fn gated_action(action: &str) -> Result<ActionKind, AppError> {
    match ActionKind::parse(action) {
        Some(kind) if kind.is_scoped() => Ok(kind),
        _ => Err(AppError::BadRequest(format!(
            "Unknown action '{}', expected 'reply' or 'new_topic'",
            action
        ))),
    }
}

fn required_score(value: f64) -> Result<Score, AppError> {
    Score::new(value).map_err(|e| AppError::BadRequest(format!("Invalid requiredScore: {}", e)))
}

fn identity(value: &str) -> Result<Identity, AppError> {
    Identity::new(value).map_err(|e| AppError::BadRequest(format!("Invalid identity: {}", e)))
}

/// Only EVM accounts can hold a passport
fn evm_identity(value: &str) -> Result<Identity, AppError> {
    let identity = identity(value)?;
    if !identity.is_evm_address() {
        return Err(AppError::BadRequest(format!(
            "Invalid identity: '{}' is not an EVM address",
            identity
        )));
    }
    Ok(identity)
}

fn requirements_view<P: ScoreProvider>(
    engine: &Engine<P>,
    scope: Scope,
) -> Result<RequirementsResponse, AppError> {
    let mut view = RequirementsResponse {
        min_score_to_post: 0.0,
        min_score_to_create_topic: 0.0,
    };
    for requirement in engine.requirements(scope)? {
        match requirement.action {
            ActionKind::Reply => view.min_score_to_post = requirement.required_score.value(),
            ActionKind::NewTopic => {
                view.min_score_to_create_topic = requirement.required_score.value()
            }
            ActionKind::CreateAccount => {}
        }
    }
    Ok(view)
}

/// PUT /passport/saveUserScore - Set a site-wide requirement
async fn save_user_score<P: ScoreProvider + 'static>(
    State(state): State<AppState<P>>,
    headers: HeaderMap,
    payload: Result<Json<SaveUserScoreRequest>, JsonRejection>,
) -> Result<Json<RequirementResponse>, AppError> {
    let claims = state.auth.authorize(&headers, true)?;
    let Json(request) = payload?;

    let action = gated_action(&request.action)?;
    let score = required_score(request.required_score)?;
    state.engine.set_requirement(Scope::UserLevel, action, score)?;

    info!("{} set site-wide {} requirement to {}", claims.sub, action, score);
    Ok(Json(RequirementResponse {
        category_id: None,
        action: action.as_str().to_string(),
        required_score: score.value(),
    }))
}

/// PUT /passport/saveCategoryScore - Set a category requirement
async fn save_category_score<P: ScoreProvider + 'static>(
    State(state): State<AppState<P>>,
    headers: HeaderMap,
    payload: Result<Json<SaveCategoryScoreRequest>, JsonRejection>,
) -> Result<Json<RequirementResponse>, AppError> {
    let claims = state.auth.authorize(&headers, true)?;
    let Json(request) = payload?;

    let action = gated_action(&request.action)?;
    let score = required_score(request.required_score)?;
    let category = CategoryId(request.category_id);
    state
        .engine
        .set_requirement(Scope::Category(category), action, score)?;

    info!(
        "{} set {} requirement in category {} to {}",
        claims.sub, action, category, score
    );
    Ok(Json(RequirementResponse {
        category_id: Some(category.0),
        action: action.as_str().to_string(),
        required_score: score.value(),
    }))
}

/// PUT /passport/refreshPassportScore - Fetch and cache a fresh score
async fn refresh_passport_score<P: ScoreProvider + 'static>(
    State(state): State<AppState<P>>,
    headers: HeaderMap,
    payload: Result<Json<UserRequest>, JsonRejection>,
) -> Result<Json<RefreshResponse>, AppError> {
    state.auth.authorize(&headers, true)?;
    let Json(request) = payload?;

    let score = state.engine.refresh_score(UserId(request.user_id)).await?;
    Ok(Json(RefreshResponse {
        user_id: request.user_id,
        score: score.value(),
    }))
}

/// PUT /passport/linkIdentity - Associate an address with a user
///
/// Seeds the score cache the same way account creation does.
async fn link_identity<P: ScoreProvider + 'static>(
    State(state): State<AppState<P>>,
    headers: HeaderMap,
    payload: Result<Json<LinkIdentityRequest>, JsonRejection>,
) -> Result<Json<LinkIdentityResponse>, AppError> {
    state.auth.authorize(&headers, true)?;
    let Json(request) = payload?;

    let user = UserId(request.user_id);
    let identity = evm_identity(&request.identity)?;
    state.engine.store().link_identity(user, &identity)?;
    info!("Linked {} to user {}", identity, user);

    let score = state.engine.on_account_created(user).await;
    Ok(Json(LinkIdentityResponse {
        user_id: user.0,
        identity: identity.to_string(),
        score: score.map(|s| s.value()),
    }))
}

/// POST /passport/accountCheck - May this prospective user sign up?
///
/// Provider failures become a denial with a generic message.
async fn account_check<P: ScoreProvider + 'static>(
    State(state): State<AppState<P>>,
    headers: HeaderMap,
    payload: Result<Json<AccountCheckRequest>, JsonRejection>,
) -> Result<Json<DecisionResponse>, AppError> {
    state.auth.authorize(&headers, false)?;
    let Json(request) = payload?;

    let identity = request.identity.as_deref().map(identity).transpose()?;

    let response = match state.engine.can_create_account(identity.as_ref()).await {
        Ok(Decision::Allow) => DecisionResponse {
            allowed: true,
            message: None,
        },
        Ok(Decision::Deny(reason)) => DecisionResponse {
            allowed: false,
            message: Some(reason.message()),
        },
        Err(e) if e.is_provider_failure() => {
            warn!("Denying account creation, score unavailable: {}", e);
            DecisionResponse {
                allowed: false,
                message: Some(e.user_message().to_string()),
            }
        }
        Err(e) => return Err(e.into()),
    };

    Ok(Json(response))
}

/// POST /passport/authenticated - Sign-in hook
async fn authenticated<P: ScoreProvider + 'static>(
    State(state): State<AppState<P>>,
    headers: HeaderMap,
    payload: Result<Json<UserRequest>, JsonRejection>,
) -> Result<Json<AuthenticatedResponse>, AppError> {
    state.auth.authorize(&headers, false)?;
    let Json(request) = payload?;

    let score = state.engine.on_authenticated(UserId(request.user_id)).await;
    Ok(Json(AuthenticatedResponse {
        score: score.map(|s| s.value()),
    }))
}

/// GET /passport/check - May this user reply or start a topic?
async fn check<P: ScoreProvider + 'static>(
    State(state): State<AppState<P>>,
    headers: HeaderMap,
    query: Result<Query<CheckQuery>, QueryRejection>,
) -> Result<Json<DecisionResponse>, AppError> {
    state.auth.authorize(&headers, false)?;
    let Query(query) = query?;

    let action = gated_action(&query.action)?;
    let allowed = state.engine.meets_requirements(
        UserId(query.user_id),
        query.category_id.map(CategoryId),
        action,
    )?;

    Ok(Json(DecisionResponse {
        allowed,
        message: None,
    }))
}

/// GET /passport/users/:id/score - Cached score of a user
async fn user_score<P: ScoreProvider + 'static>(
    State(state): State<AppState<P>>,
    headers: HeaderMap,
    Path(user_id): Path<u64>,
) -> Result<Json<UserScoreResponse>, AppError> {
    state.auth.authorize(&headers, false)?;

    let user = UserId(user_id);
    let identity = state.engine.linked_identity(user)?;
    let record = state.engine.cached_score(user)?;
    let now = state.engine.now();

    Ok(Json(UserScoreResponse {
        user_id,
        identity: identity.to_string(),
        score: record.as_ref().map(|r| r.score.value()),
        fetched_at: record.as_ref().map(|r| r.fetched_at),
        stale: record
            .as_ref()
            .map_or(true, |r| r.is_stale(state.score_max_age_secs, now)),
    }))
}

/// GET /passport/categories/:id/requirements
async fn category_requirements<P: ScoreProvider + 'static>(
    State(state): State<AppState<P>>,
    headers: HeaderMap,
    Path(category_id): Path<u64>,
) -> Result<Json<RequirementsResponse>, AppError> {
    state.auth.authorize(&headers, false)?;
    let view = requirements_view(&state.engine, Scope::Category(CategoryId(category_id)))?;
    Ok(Json(view))
}

/// GET /passport/requirements - Site-wide requirements
async fn user_level_requirements<P: ScoreProvider + 'static>(
    State(state): State<AppState<P>>,
    headers: HeaderMap,
) -> Result<Json<RequirementsResponse>, AppError> {
    state.auth.authorize(&headers, false)?;
    let view = requirements_view(&state.engine, Scope::UserLevel)?;
    Ok(Json(view))
}

/// GET /health - Liveness
async fn health_check<P: ScoreProvider + 'static>(
    State(state): State<AppState<P>>,
) -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "healthy".to_string(),
        gating_enabled: state.engine.config().enabled,
        enforcing: state.engine.is_enforcing(),
    })
}

/// Create the axum router with all routes
pub fn create_router<P: ScoreProvider + 'static>(state: AppState<P>) -> AxumRouter {
    AxumRouter::new()
        .route("/passport/saveUserScore", put(save_user_score::<P>))
        .route("/passport/saveCategoryScore", put(save_category_score::<P>))
        .route("/passport/refreshPassportScore", put(refresh_passport_score::<P>))
        .route("/passport/linkIdentity", put(link_identity::<P>))
        .route("/passport/accountCheck", post(account_check::<P>))
        .route("/passport/authenticated", post(authenticated::<P>))
        .route("/passport/check", get(check::<P>))
        .route("/passport/users/:id/score", get(user_score::<P>))
        .route(
            "/passport/categories/:id/requirements",
            get(category_requirements::<P>),
        )
        .route("/passport/requirements", get(user_level_requirements::<P>))
        .route("/health", get(health_check::<P>))
        .with_state(state)
}
