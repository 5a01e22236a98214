//! Axum WebSocket upgrade handler.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};

use super::session::run_session;
use crate::app_state::AppState;
use crate::error::ChatError;

/// `GET /ws/{client_name}` — Upgrade HTTP connection to a chat session.
///
/// # Errors
///
/// Returns [`ChatError::RegistryClosed`] while the server is shutting down.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(client_name): Path<String>,
    State(state): State<AppState>,
) -> Result<Response, ChatError> {
    if state.registry.is_closed().await {
        return Err(ChatError::RegistryClosed);
    }
    tracing::debug!(client = %client_name, "websocket upgrade");
    Ok(ws
        .on_upgrade(move |socket| run_session(socket, client_name, state))
        .into_response())
}
