//! Per-connection session state machine.
//!
//! `Connecting → Open → Closing → Closed`. Each accepted socket runs one
//! session task with three parts:
//!
//! - the read loop, which only watches the transport and hands frames to
//!   the dispatch worker, so a disconnect is seen even while a frame is
//!   being moderated;
//! - a dispatch worker, which moderates and augments one frame at a time
//!   and broadcasts accepted content through the registry;
//! - a writer task, which drains the connection's outbound queue into the
//!   socket and is the only code touching the sink.
//!
//! The session ends when the client closes, the transport errors, or the
//! writer exits (send failure or eviction). Moderation and augmentation
//! failures never end a session. A frame still being processed when the
//! session ends finishes on its own and its result is dropped.

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use super::command::Inbound;
use crate::app_state::AppState;
use crate::domain::{
    BroadcastMessage, ChatEvent, Connection, ConnectionState, Liveness, Origin, OutboundQueue,
    PrivateNotice, RegistrationHandle,
};
use crate::error::ChatError;
use crate::service::{AugmentationRequest, AugmentationResult, ModerationResult};

/// Frames buffered between the read loop and the dispatch worker. When
/// full, the read loop stops reading and the client sees backpressure.
const INBOUND_BACKLOG: usize = 32;

/// Why a session's read loop stopped.
#[derive(Debug)]
enum Exit {
    ClientClosed,
    Transport(ChatError),
    WriterEnded,
    WorkerEnded,
}

/// Content frame handed from the read loop to the dispatch worker.
#[derive(Debug)]
enum Frame {
    Text(String),
    Audio(Vec<u8>),
}

/// Runs one client session to completion.
pub async fn run_session(mut socket: WebSocket, client_name: String, state: AppState) {
    let (connection, outbound) =
        Connection::new(client_name.as_str(), state.settings.outbound_queue_capacity);
    let liveness = connection.liveness();
    let origin = Origin::Client {
        id: connection.id(),
        name: client_name,
    };

    let handle = match state.registry.add(connection).await {
        Ok(handle) => handle,
        Err(e) => {
            tracing::warn!(error = %e, "refusing connection");
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    let (sink, mut stream) = socket.split();
    let mut writer = tokio::spawn(write_loop(sink, outbound));
    let dispatcher = SessionDispatcher::new(state, handle, origin, liveness);
    let (frames, backlog) = mpsc::channel(INBOUND_BACKLOG);
    tokio::spawn(dispatch_loop(dispatcher.clone(), backlog));

    let exit = loop {
        let frame = tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => Frame::Text(text.as_str().to_owned()),
                Some(Ok(Message::Binary(bytes))) => Frame::Audio(bytes.to_vec()),
                Some(Ok(Message::Close(_))) | None => break Exit::ClientClosed,
                Some(Ok(_)) => continue,
                Some(Err(e)) => break Exit::Transport(ChatError::Transport(e.to_string())),
            },
            _ = &mut writer => break Exit::WriterEnded,
        };
        tokio::select! {
            sent = frames.send(frame) => if sent.is_err() {
                break Exit::WorkerEnded;
            },
            _ = &mut writer => break Exit::WriterEnded,
        }
    };

    match &exit {
        Exit::Transport(e) => tracing::info!(error = %e, "session ended by transport error"),
        Exit::ClientClosed | Exit::WriterEnded | Exit::WorkerEnded => {
            tracing::debug!(?exit, "session ended");
        }
    }
    drop(frames);
    dispatcher.close().await;
    writer.abort();
}

/// Processes one sender's frames strictly in arrival order.
///
/// Stops at the first frame seen after the connection left `Open`.
async fn dispatch_loop(dispatcher: SessionDispatcher, mut backlog: mpsc::Receiver<Frame>) {
    while let Some(frame) = backlog.recv().await {
        if !dispatcher.liveness.is_open() {
            break;
        }
        match frame {
            Frame::Text(text) => dispatcher.on_text(&text).await,
            Frame::Audio(audio) => dispatcher.on_audio(audio).await,
        }
    }
}

/// Drains the outbound queue into the socket until either side stops.
///
/// Removal is honoured up to the frame boundary: a frame already handed to
/// the sink when removal completes is still written.
async fn write_loop(mut sink: SplitSink<WebSocket, Message>, mut queue: OutboundQueue) {
    while let Some(text) = queue.next().await {
        if !queue.is_open() {
            break;
        }
        if let Err(e) = sink.send(Message::text(&*text)).await {
            tracing::debug!(error = %e, "websocket send failed");
            break;
        }
    }
    queue.close();
    let _ = sink.close().await;
}

/// Routes one connection's inbound content through moderation,
/// augmentation and broadcast.
#[derive(Debug, Clone)]
pub struct SessionDispatcher {
    state: AppState,
    handle: RegistrationHandle,
    origin: Origin,
    liveness: Liveness,
}

impl SessionDispatcher {
    /// Creates a dispatcher for an already registered connection.
    #[must_use]
    pub const fn new(
        state: AppState,
        handle: RegistrationHandle,
        origin: Origin,
        liveness: Liveness,
    ) -> Self {
        Self {
            state,
            handle,
            origin,
            liveness,
        }
    }

    /// Handles one text frame.
    pub async fn on_text(&self, text: &str) {
        match Inbound::parse(text) {
            Inbound::Blank => {}
            Inbound::Chat(body) => {
                if self.cleared(&body).await {
                    self.publish(ChatEvent::Said { text: body }).await;
                }
            }
            Inbound::Topic(topic) => {
                if self.cleared(&topic).await {
                    let event = self
                        .augment(AugmentationRequest::OpeningQuestion { topic })
                        .await;
                    self.publish(event).await;
                }
            }
            Inbound::Summarize(text) => {
                if self.cleared(&text).await {
                    let event = self
                        .augment(AugmentationRequest::TextSummary { text })
                        .await;
                    self.publish(event).await;
                }
            }
            Inbound::MissingArgument(command) => {
                self.notify(PrivateNotice::Usage { command }).await;
            }
        }
    }

    /// Handles one binary (audio) frame.
    ///
    /// A non-empty transcript is moderated before broadcast; placeholder
    /// summaries are broadcast as they are.
    pub async fn on_audio(&self, audio: Vec<u8>) {
        let event = self
            .augment(AugmentationRequest::AudioTranscribe {
                audio,
                mime_type: self.state.settings.default_audio_mime.clone(),
            })
            .await;
        if let ChatEvent::Voice { transcript, .. } = &event {
            if !transcript.is_empty() && !self.cleared(transcript).await {
                return;
            }
        }
        self.publish(event).await;
    }

    /// `Open → Closing → Closed`: deregisters the connection and tells the
    /// remaining members.
    pub async fn close(&self) {
        self.liveness.set(ConnectionState::Closing);
        let removed = self.state.registry.remove(&self.handle).await;
        self.liveness.set(ConnectionState::Closed);
        tracing::info!(conn_id = %self.handle.id(), removed, "connection closed");
        let notice = BroadcastMessage::new(self.origin.clone(), ChatEvent::Left);
        self.state.registry.broadcast(&notice).await;
    }

    /// Runs the moderation gate, privately notifying the sender on
    /// rejection.
    async fn cleared(&self, text: &str) -> bool {
        match self.state.gate.moderate(text).await {
            ModerationResult::Safe => true,
            ModerationResult::Unsafe { reason } => {
                tracing::info!(conn_id = %self.handle.id(), %reason, "message rejected");
                self.notify(PrivateNotice::Rejected { reason }).await;
                false
            }
        }
    }

    /// Runs one augmentation and turns its result into a chat event.
    async fn augment(&self, request: AugmentationRequest) -> ChatEvent {
        let topic = match &request {
            AugmentationRequest::OpeningQuestion { topic } => topic.clone(),
            AugmentationRequest::TextSummary { .. }
            | AugmentationRequest::AudioTranscribe { .. } => String::new(),
        };
        match self.state.augmenter.run(request).await {
            AugmentationResult::TextSummary(summary) => ChatEvent::Summary { summary },
            AugmentationResult::AudioTranscribe {
                transcript,
                summary,
            } => ChatEvent::Voice {
                transcript,
                summary,
            },
            AugmentationResult::OpeningQuestion(question) => {
                ChatEvent::OpeningQuestion { topic, question }
            }
        }
    }

    /// Broadcasts unless the connection went away while the result was
    /// being produced.
    async fn publish(&self, event: ChatEvent) {
        let message = BroadcastMessage::new(self.origin.clone(), event);
        if self.state.registry.publish(&message).await.is_none() {
            tracing::debug!(conn_id = %self.handle.id(), "discarding result for closed connection");
        }
    }

    async fn notify(&self, notice: PrivateNotice) {
        self.state
            .registry
            .send_to(self.handle.id(), &notice.render())
            .await;
    }
}
