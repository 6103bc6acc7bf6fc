//! REST surface over the wizard machine.
//!
//! Each session lives in the registry behind its own mutex, so requests for
//! one session are handled one at a time. A session is dropped as soon as a
//! transition exits; the exit payload is what the next screen works from.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::config::WizardConfig;
use crate::error::{CodecError, TransportError, ValidationError};
use crate::quotes::{QuoteGateway, QuoteRequest};
use crate::session::{decode_payload, InviteCodec, Role, SessionPatch, SessionState};
use crate::verification::CodeChannel;
use crate::wizard::{
    SharedWizard, StepId, Transition, WizardDeps, WizardEntry, WizardMachine, WizardRegistry,
    WizardStatus,
};

/// Shared state for wizard routes.
#[derive(Clone)]
pub struct WizardRouteState {
    pub registry: Arc<WizardRegistry>,
    pub deps: WizardDeps,
    pub quotes: Arc<dyn QuoteGateway>,
    pub config: Arc<WizardConfig>,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, message: impl ToString) -> ApiError {
    (status, Json(serde_json::json!({ "error": message.to_string() })))
}

/// Build the wizard REST routes.
pub fn wizard_routes(state: WizardRouteState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/wizard/sessions", post(create_session))
        .route(
            "/api/wizard/sessions/{id}",
            get(get_session).patch(patch_session),
        )
        .route("/api/wizard/sessions/{id}/continue", post(continue_step))
        .route("/api/wizard/sessions/{id}/back", post(back))
        .route("/api/wizard/sessions/{id}/role", post(choose_role))
        .route("/api/wizard/sessions/{id}/code", post(submit_code))
        .route("/api/wizard/sessions/{id}/resend", post(resend_code))
        .route("/api/wizard/sessions/{id}/change-number", post(change_number))
        .route("/api/wizard/sessions/{id}/share", get(share))
        .route("/api/wizard/invite", get(open_invite))
        .route("/api/quotes", post(fetch_quotes))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "parcel-wizard"
    }))
}

async fn find(state: &WizardRouteState, id: Uuid) -> Result<SharedWizard, ApiError> {
    state
        .registry
        .get(id)
        .await
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Session {id} not found")))
}

/// Exits hand the draft over; the live session is no longer needed.
async fn settle(state: &WizardRouteState, id: Uuid, transition: &Transition) {
    if let Some(signal) = transition.exit() {
        tracing::info!(session_id = %id, target = %signal.target, "Session handed off");
        state.registry.remove(id).await;
    }
}

// ── Sessions ────────────────────────────────────────────────────────────

/// POST /api/wizard/sessions
///
/// Mounts a wizard from a tagged entry. An unusable invite link is a 404.
async fn create_session(
    State(state): State<WizardRouteState>,
    Json(entry): Json<WizardEntry>,
) -> Result<(StatusCode, Json<WizardStatus>), ApiError> {
    let machine = WizardMachine::mount(entry, state.deps.clone()).map_err(|e| match e {
        CodecError::InvalidInvite => api_error(StatusCode::NOT_FOUND, "link invalid or expired"),
        other => api_error(StatusCode::BAD_REQUEST, other),
    })?;
    let status = machine.status();
    state.registry.insert(machine).await;
    Ok((StatusCode::CREATED, Json(status)))
}

/// GET /api/wizard/sessions/{id}
async fn get_session(
    State(state): State<WizardRouteState>,
    Path(id): Path<Uuid>,
) -> Result<Json<WizardStatus>, ApiError> {
    let wizard = find(&state, id).await?;
    let status = wizard.lock().await.status();
    Ok(Json(status))
}

/// PATCH /api/wizard/sessions/{id}
async fn patch_session(
    State(state): State<WizardRouteState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<SessionPatch>,
) -> Result<Json<WizardStatus>, ApiError> {
    let wizard = find(&state, id).await?;
    let mut machine = wizard.lock().await;
    machine.update(patch);
    Ok(Json(machine.status()))
}

/// POST /api/wizard/sessions/{id}/continue
async fn continue_step(
    State(state): State<WizardRouteState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Transition>, ApiError> {
    let wizard = find(&state, id).await?;
    let transition = wizard.lock().await.continue_step().await;
    settle(&state, id, &transition).await;
    Ok(Json(transition))
}

/// POST /api/wizard/sessions/{id}/back
async fn back(
    State(state): State<WizardRouteState>,
    Path(id): Path<Uuid>,
) -> Result<Json<WizardStatus>, ApiError> {
    let wizard = find(&state, id).await?;
    let mut machine = wizard.lock().await;
    machine.back();
    Ok(Json(machine.status()))
}

#[derive(Deserialize)]
struct RoleBody {
    role: Role,
}

/// POST /api/wizard/sessions/{id}/role
///
/// Picks the role on the role step, or switches it later while allowed.
async fn choose_role(
    State(state): State<WizardRouteState>,
    Path(id): Path<Uuid>,
    Json(body): Json<RoleBody>,
) -> Result<Json<WizardStatus>, ApiError> {
    let wizard = find(&state, id).await?;
    let mut machine = wizard.lock().await;
    let result = if machine.current_step() == StepId::RoleSelect {
        machine.select_role(body.role)
    } else {
        machine.switch_role(body.role).map(|_| ())
    };
    match result {
        Ok(()) => Ok(Json(machine.status())),
        Err(e) => Err(api_error(StatusCode::CONFLICT, e)),
    }
}

#[derive(Deserialize)]
struct CodeBody {
    code: String,
}

/// POST /api/wizard/sessions/{id}/code
async fn submit_code(
    State(state): State<WizardRouteState>,
    Path(id): Path<Uuid>,
    Json(body): Json<CodeBody>,
) -> Result<Json<Transition>, ApiError> {
    let wizard = find(&state, id).await?;
    let transition = wizard.lock().await.submit_code(&body.code).await;
    settle(&state, id, &transition).await;
    Ok(Json(transition))
}

#[derive(Deserialize)]
struct ResendBody {
    #[serde(default)]
    channel: Option<CodeChannel>,
}

/// POST /api/wizard/sessions/{id}/resend
async fn resend_code(
    State(state): State<WizardRouteState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ResendBody>,
) -> Result<Json<Transition>, ApiError> {
    let wizard = find(&state, id).await?;
    let transition = wizard.lock().await.resend_code(body.channel).await;
    Ok(Json(transition))
}

/// POST /api/wizard/sessions/{id}/change-number
async fn change_number(
    State(state): State<WizardRouteState>,
    Path(id): Path<Uuid>,
) -> Result<Json<WizardStatus>, ApiError> {
    let wizard = find(&state, id).await?;
    let mut machine = wizard.lock().await;
    machine.change_number();
    Ok(Json(machine.status()))
}

/// GET /api/wizard/sessions/{id}/share
async fn share(
    State(state): State<WizardRouteState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let wizard = find(&state, id).await?;
    let machine = wizard.lock().await;
    Ok(Json(serde_json::json!({
        "payload": machine.serialize_for_share(),
        "link": machine.share_link(&state.config.share_base_url),
    })))
}

// ── Invites & quotes ────────────────────────────────────────────────────

#[derive(Deserialize)]
struct InviteQuery {
    data: String,
}

/// GET /api/wizard/invite?data=...
///
/// Previews an invite before a session is mounted from it.
async fn open_invite(Query(query): Query<InviteQuery>) -> impl IntoResponse {
    match InviteCodec::decode_invite(&query.data) {
        Some(invite) => Json(serde_json::to_value(invite).unwrap_or_default()).into_response(),
        None => api_error(StatusCode::NOT_FOUND, "link invalid or expired").into_response(),
    }
}

#[derive(Deserialize)]
struct QuoteBody {
    /// Serialized draft, as carried by an exit to the quote screen.
    payload: String,
}

/// POST /api/quotes
async fn fetch_quotes(
    State(state): State<WizardRouteState>,
    Json(body): Json<QuoteBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let session: SessionState = decode_payload(&body.payload)
        .map_err(|e: CodecError| api_error(StatusCode::BAD_REQUEST, e))?;
    let request = QuoteRequest::from_session(&session)
        .map_err(|e: ValidationError| api_error(StatusCode::UNPROCESSABLE_ENTITY, e))?;
    let offers = state
        .quotes
        .fetch_quotes(&request)
        .await
        .map_err(|e: TransportError| {
            tracing::warn!("Quote fetch failed: {}", e);
            api_error(StatusCode::BAD_GATEWAY, e)
        })?;
    Ok(Json(serde_json::json!({
        "request": request,
        "options": offers,
    })))
}
