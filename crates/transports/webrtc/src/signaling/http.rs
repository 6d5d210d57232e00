//! HTTP endpoints for offer/answer negotiation and candidate brokering
//!
//! - `POST /offer` — offer in, answer out; starts the media pumps
//! - `POST /candidate` — remote candidate submission
//! - `GET /answer-candidates?sessionId=s` — drain the local candidate
//!   mailbox (destructive)
//! - `GET /health` — liveness probe
//!
//! When a static directory is configured it is served at the root as a
//! fallback, so the same process can host the demo page.

use crate::config::RelayConfig;
use crate::peer::Negotiator;
use crate::session::SessionRegistry;
use crate::{Error, Result};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

/// Shared state for all handlers
#[derive(Clone)]
struct AppState {
    negotiator: Arc<Negotiator>,
}

/// HTTP signaling server
pub struct SignalingServer {
    bind_address: String,
    config: Arc<RelayConfig>,
    state: AppState,
}

impl SignalingServer {
    /// Create a server bound to `bind_address` once served
    pub fn new(
        bind_address: impl Into<String>,
        config: Arc<RelayConfig>,
        registry: Arc<SessionRegistry>,
    ) -> Self {
        let negotiator = Arc::new(Negotiator::new(Arc::clone(&config), registry));
        Self {
            bind_address: bind_address.into(),
            config,
            state: AppState { negotiator },
        }
    }

    /// Build the router with all endpoints and layers
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            .route("/health", get(health_handler))
            .route("/offer", post(offer_handler))
            .route("/candidate", post(candidate_handler))
            .route("/answer-candidates", get(answer_candidates_handler))
            .with_state(self.state.clone());

        if let Some(static_dir) = &self.config.static_dir {
            router = router.fallback_service(ServeDir::new(static_dir));
        }

        router.layer(
            tower::ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                // Browser clients negotiate from arbitrary origins; the
                // permissive layer also answers OPTIONS preflights.
                .layer(CorsLayer::permissive()),
        )
    }

    /// Bind and serve until the listener fails
    pub async fn serve(self) -> Result<()> {
        let addr: std::net::SocketAddr = self
            .bind_address
            .parse()
            .map_err(|e| Error::InvalidConfig(format!("Invalid bind address: {}", e)))?;

        let router = self.router();
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(addr = %addr, "signaling server listening");

        axum::serve(listener, router)
            .await
            .map_err(|e| Error::InternalError(format!("Server error: {}", e)))?;
        Ok(())
    }
}

/// Error body for non-2xx responses
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

type HandlerError = (StatusCode, Json<ErrorResponse>);

fn error_response(status: StatusCode, message: impl Into<String>) -> HandlerError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Map library errors onto HTTP statuses
fn map_error(e: Error) -> HandlerError {
    let status = if e.is_not_found() {
        StatusCode::NOT_FOUND
    } else if e.is_config_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    error_response(status, e.to_string())
}

async fn health_handler() -> StatusCode {
    StatusCode::OK
}

#[derive(Debug, Deserialize)]
struct OfferRequest {
    sdp: RTCSessionDescription,
    #[serde(rename = "sessionId")]
    session_id: String,
}

#[derive(Debug, Serialize)]
struct OfferResponse {
    sdp: RTCSessionDescription,
    #[serde(rename = "sessionId")]
    session_id: String,
}

/// `POST /offer`
async fn offer_handler(
    State(state): State<AppState>,
    Json(request): Json<OfferRequest>,
) -> std::result::Result<Json<OfferResponse>, HandlerError> {
    if request.session_id.is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "sessionId must not be empty",
        ));
    }

    let answer = state
        .negotiator
        .handle_offer(&request.session_id, request.sdp)
        .await
        .map_err(map_error)?;

    Ok(Json(OfferResponse {
        sdp: answer,
        session_id: request.session_id,
    }))
}

#[derive(Debug, Deserialize)]
struct CandidateRequest {
    candidate: RTCIceCandidateInit,
    #[serde(rename = "sessionId")]
    session_id: String,
}

/// `POST /candidate`
async fn candidate_handler(
    State(state): State<AppState>,
    Json(request): Json<CandidateRequest>,
) -> std::result::Result<StatusCode, HandlerError> {
    if request.session_id.is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "sessionId must not be empty",
        ));
    }

    state
        .negotiator
        .add_remote_candidate(&request.session_id, request.candidate)
        .await
        .map_err(map_error)?;

    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
struct CandidateQuery {
    #[serde(rename = "sessionId")]
    session_id: String,
}

#[derive(Debug, Serialize)]
struct CandidateListResponse {
    candidates: Vec<RTCIceCandidateInit>,
}

/// `GET /answer-candidates`
///
/// Destructive poll: returned candidates are removed from the mailbox.
/// Unknown sessions get an empty list, a missing or empty `sessionId`
/// gets a 400.
async fn answer_candidates_handler(
    State(state): State<AppState>,
    Query(query): Query<CandidateQuery>,
) -> std::result::Result<Json<CandidateListResponse>, HandlerError> {
    if query.session_id.is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "sessionId is required",
        ));
    }

    Ok(Json(CandidateListResponse {
        candidates: state.negotiator.poll_local_candidates(&query.session_id),
    }))
}
