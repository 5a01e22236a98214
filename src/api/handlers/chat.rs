//! Chat handlers: moderation, summaries, topics and connection count.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    ConnectionsResponse, ModerateResponse, SummarizeResponse, TextRequest, TopicRequest,
    TopicResponse, non_blank,
};
use crate::app_state::AppState;
use crate::domain::{BroadcastMessage, ChatEvent, Origin};
use crate::error::ChatError;
use crate::service::ModerationResult;

/// `POST /moderate` — Run the moderation gate on a piece of text.
#[utoipa::path(
    post,
    path = "/api/v1/moderate",
    tag = "Chat",
    summary = "Moderate text",
    request_body = TextRequest,
    responses(
        (status = 200, description = "Moderation verdict", body = ModerateResponse),
        (status = 400, description = "Blank text"),
    )
)]
pub async fn moderate(
    State(state): State<AppState>,
    Json(req): Json<TextRequest>,
) -> Result<impl IntoResponse, ChatError> {
    let text = non_blank("text", &req.text)?;
    let verdict = state.gate.moderate(text).await;
    Ok(Json(ModerateResponse {
        safe: verdict.is_safe(),
        reason: verdict.reason().to_string(),
    }))
}

/// `POST /summarize` — Summarize text into bullet points.
#[utoipa::path(
    post,
    path = "/api/v1/summarize",
    tag = "Chat",
    summary = "Summarize text",
    request_body = TextRequest,
    responses(
        (status = 200, description = "Summary or placeholder", body = SummarizeResponse),
        (status = 400, description = "Blank or rejected text"),
    )
)]
pub async fn summarize(
    State(state): State<AppState>,
    Json(req): Json<TextRequest>,
) -> Result<impl IntoResponse, ChatError> {
    let text = non_blank("text", &req.text)?;
    if let ModerationResult::Unsafe { reason } = state.gate.moderate(text).await {
        return Err(ChatError::Rejected(reason));
    }
    let summary = state.augmenter.summarize(text).await;
    Ok(Json(SummarizeResponse { summary }))
}

/// `POST /topic` — Open a debate topic for every connected client.
#[utoipa::path(
    post,
    path = "/api/v1/topic",
    tag = "Chat",
    summary = "Broadcast an opening question",
    request_body = TopicRequest,
    responses(
        (status = 200, description = "Question broadcast", body = TopicResponse),
        (status = 400, description = "Blank or rejected topic"),
    )
)]
pub async fn open_topic(
    State(state): State<AppState>,
    Json(req): Json<TopicRequest>,
) -> Result<impl IntoResponse, ChatError> {
    let topic = non_blank("topic", &req.topic)?.to_string();
    if let ModerationResult::Unsafe { reason } = state.gate.moderate(&topic).await {
        return Err(ChatError::Rejected(reason));
    }
    let question = state.augmenter.opening_question(&topic).await;
    let message = BroadcastMessage::new(
        Origin::Host,
        ChatEvent::OpeningQuestion {
            topic: topic.clone(),
            question: question.clone(),
        },
    );
    let report = state.registry.broadcast(&message).await;
    tracing::info!(%topic, recipients = report.delivered, "topic opened");
    Ok(Json(TopicResponse {
        topic,
        question,
        recipients: report.delivered,
        broadcast_at: message.timestamp(),
    }))
}

/// `GET /connections` — Number of live connections.
#[utoipa::path(
    get,
    path = "/api/v1/connections",
    tag = "Chat",
    summary = "Count live connections",
    responses(
        (status = 200, description = "Connection count", body = ConnectionsResponse),
    )
)]
pub async fn connections(State(state): State<AppState>) -> impl IntoResponse {
    Json(ConnectionsResponse {
        count: state.registry.len().await,
    })
}

/// Chat routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/moderate", post(moderate))
        .route("/summarize", post(summarize))
        .route("/topic", post(open_topic))
        .route("/connections", get(connections))
}
