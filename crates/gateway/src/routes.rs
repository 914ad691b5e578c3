use crate::decode::{self, DecodeError};
use crate::dispatch::DispatchError;
use crate::encode::{self, DetectResponse};
use crate::session;
use crate::state::AppState;
use crate::status::{StatusCheck, StatusCheckCreate};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use thiserror::Error;
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
};

/// Assemble the full HTTP surface: streaming WebSocket, one-shot
/// detect, status records, and optional static hosting (the host page
/// at `/` plus its assets under `/static`).
pub fn router(state: AppState, static_dir: Option<&str>) -> Router {
    let mut app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/api/", get(root_handler))
        .route("/api/detect", post(detect_handler))
        .route("/api/status", post(create_status_handler).get(list_status_handler))
        .layer(CorsLayer::permissive())
        .with_state(state);

    if let Some(dir) = static_dir {
        let dir = std::path::Path::new(dir);
        app = app
            .route_service("/", ServeFile::new(dir.join("index.html")))
            .nest_service("/static", ServeDir::new(dir));
    }

    app
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl ApiError {
    fn kind(&self) -> &'static str {
        match self {
            ApiError::Decode(_) => "decode",
            ApiError::Dispatch(DispatchError::Overloaded) => "overloaded",
            ApiError::Dispatch(DispatchError::Timeout(_)) => "timeout",
            ApiError::Dispatch(DispatchError::Engine(_)) => "inference",
            ApiError::Dispatch(DispatchError::Closed) => "unavailable",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Decode(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Dispatch(DispatchError::Overloaded) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Dispatch(DispatchError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Dispatch(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = encode::error_payload(self.kind(), &self.to_string());
        (
            self.status(),
            [("content-type", "application/json")],
            body,
        )
            .into_response()
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| session::handle_socket(socket, state))
}

/// One-shot detection: binary image body in, detection list out. Shares
/// the same dispatch queue as the streaming sessions, so bursts here
/// stay FIFO-fair with active streams.
async fn detect_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<DetectResponse>, ApiError> {
    let image = decode::decode_binary_frame(&body)?;
    let detections = state.dispatch.submit(image, state.next_session_id()).await?;

    Ok(Json(DetectResponse {
        detections: encode::encode_detections(&detections),
    }))
}

async fn root_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "detection gateway" }))
}

async fn create_status_handler(
    State(state): State<AppState>,
    Json(body): Json<StatusCheckCreate>,
) -> Json<StatusCheck> {
    Json(state.status.create(body.client_name).await)
}

async fn list_status_handler(State(state): State<AppState>) -> Json<Vec<StatusCheck>> {
    Json(state.status.list().await)
}
