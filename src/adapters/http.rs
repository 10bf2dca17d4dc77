//! JSON API over the roster.
//!
//! - `GET /api/rsvps`: both lists plus capacity
//! - `POST /api/rsvp`: register `{ "name": "..." }`
//! - `POST /api/cancel`: cancel by `{ "id": "..." }` or `{ "name": "..." }`
//! - `GET /health`
//!
//! Anything else falls through to the static directory when one is configured.

use crate::core::roster::Roster;
use crate::core::{CancelOutcome, CancelTarget, Registration, RegistrationId, RosterStore, Status};
use crate::utils::error::{ErrorKind, RosterError};
use axum::{
    extract::{rejection::JsonRejection, FromRequest, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

pub struct AppState<S: RosterStore> {
    roster: Arc<Roster<S>>,
}

// Manual impl: `S` itself need not be `Clone`.
impl<S: RosterStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            roster: Arc::clone(&self.roster),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RosterView {
    pub confirmed: Vec<Registration>,
    pub waitlist: Vec<Registration>,
    pub capacity: usize,
    pub spots_left: usize,
}

#[derive(Debug, Deserialize)]
pub struct RsvpRequest {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RsvpResponse {
    pub success: bool,
    pub message: &'static str,
    pub status: &'static str,
    pub id: RegistrationId,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub id: Option<RegistrationId>,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub success: bool,
    pub message: String,
    pub cancelled: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promoted: Option<String>,
}

impl From<CancelOutcome> for CancelResponse {
    fn from(outcome: CancelOutcome) -> Self {
        let name = outcome.cancelled.name;
        let message = match (&outcome.from, &outcome.promoted) {
            (Status::Confirmed, Some(p)) => format!(
                "{} has been removed. {} has been moved from waiting list to confirmed.",
                name, p.name
            ),
            (Status::Confirmed, None) => format!("{} has been removed from the RSVP list.", name),
            (Status::Waitlisted, _) => format!("{} has been removed from the waiting list.", name),
        };
        Self {
            success: true,
            message,
            cancelled: name,
            promoted: outcome.promoted.map(|p| p.name),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

/// Maps roster errors onto HTTP responses.
#[derive(Debug)]
pub struct ApiError(RosterError);

impl From<RosterError> for ApiError {
    fn from(err: RosterError) -> Self {
        Self(err)
    }
}

/// Malformed bodies, wrong content types and undecodable ids are client errors.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(RosterError::invalid_input(format!(
            "Invalid request body: {}",
            rejection.body_text()
        )))
    }
}

/// `Json` whose rejections are answered with the API's own error body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match self.0.kind() {
            ErrorKind::InvalidInput => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ErrorKind::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ErrorKind::Closed => (StatusCode::GONE, "REGISTRATION_CLOSED"),
            ErrorKind::Persistence | ErrorKind::Configuration => {
                tracing::error!("Request failed: {}", self.0);
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };
        let body = ErrorBody {
            error: self.0.user_friendly_message(),
            code,
        };
        (status, Json(body)).into_response()
    }
}

pub fn router<S>(roster: Arc<Roster<S>>, static_dir: Option<&Path>) -> Router
where
    S: RosterStore + 'static,
{
    let app = Router::new()
        .route("/api/rsvps", get(list_rsvps::<S>))
        .route("/api/rsvp", post(submit_rsvp::<S>))
        .route("/api/cancel", post(cancel_rsvp::<S>))
        .route("/health", get(health))
        .with_state(AppState { roster });

    let app = match static_dir {
        Some(dir) => app.fallback_service(ServeDir::new(dir)),
        None => app,
    };

    app.layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serves `app` on `addr` until Ctrl-C.
pub async fn serve(addr: SocketAddr, app: Router) -> crate::utils::error::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Server running at http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn list_rsvps<S: RosterStore>(State(state): State<AppState<S>>) -> Json<RosterView> {
    let snapshot = state.roster.list_all().await;
    let spots_left = snapshot.spots_left();
    Json(RosterView {
        confirmed: snapshot.confirmed,
        waitlist: snapshot.waitlisted,
        capacity: snapshot.capacity,
        spots_left,
    })
}

async fn submit_rsvp<S: RosterStore>(
    State(state): State<AppState<S>>,
    ApiJson(request): ApiJson<RsvpRequest>,
) -> Result<Json<RsvpResponse>, ApiError> {
    let name = request.name.unwrap_or_default();
    let outcome = state.roster.register(&name).await?;

    let (message, status) = match outcome.status() {
        Status::Confirmed => ("RSVP confirmed!", "confirmed"),
        Status::Waitlisted => ("Added to waiting list", "waitlist"),
    };
    Ok(Json(RsvpResponse {
        success: true,
        message,
        status,
        id: outcome.registration.id,
    }))
}

async fn cancel_rsvp<S: RosterStore>(
    State(state): State<AppState<S>>,
    ApiJson(request): ApiJson<CancelRequest>,
) -> Result<Json<CancelResponse>, ApiError> {
    let target = match (request.id, request.name) {
        (Some(id), _) => CancelTarget::Id(id),
        (None, name) => CancelTarget::Name(name.unwrap_or_default()),
    };
    let outcome = state.roster.cancel(&target).await?;
    Ok(Json(outcome.into()))
}
