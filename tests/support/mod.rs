//! Fake storefront backend for integration tests.
//!
//! Serves the chat REST routes and the `/socket` live channel over an
//! [`axum`] router bound to an ephemeral port, backed by a [`ChatStore`].
//! Callers authenticate with `Authorization: Bearer <role>:<user_id>`.

#![allow(dead_code, clippy::panic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use storefront_chat::api::ChatStore;
use storefront_chat::api::dto::{ApiErrorBody, SendMessageRequest};
use storefront_chat::config::ChatClientConfig;
use storefront_chat::domain::{ChatEvent, ConversationId, Identity, UserRole};
use storefront_chat::error::ChatError;
use storefront_chat::ws::SocketFrame;

/// Shared state of the fake backend handlers.
#[derive(Debug, Clone)]
struct FakeState {
    store: Arc<ChatStore>,
    registrations: watch::Sender<usize>,
    kick: broadcast::Sender<()>,
}

/// Handler error rendered as `{ "message": ... }` with the store's status.
#[derive(Debug)]
struct FakeError(StatusCode, String);

impl From<ChatError> for FakeError {
    fn from(err: ChatError) -> Self {
        let status = err
            .status()
            .and_then(|s| StatusCode::from_u16(s).ok())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let message = match err {
            ChatError::Request { message, .. } => message,
            other => other.to_string(),
        };
        Self(status, message)
    }
}

impl IntoResponse for FakeError {
    fn into_response(self) -> Response {
        (self.0, Json(ApiErrorBody::new(self.1))).into_response()
    }
}

/// A running fake backend.
#[derive(Debug)]
pub struct FakeBackend {
    /// Bound address.
    pub addr: SocketAddr,
    /// Store behind the routes.
    pub store: Arc<ChatStore>,
    registrations: watch::Receiver<usize>,
    kick: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl FakeBackend {
    /// Starts the server on `127.0.0.1:0`.
    pub async fn spawn() -> Self {
        let store = Arc::new(ChatStore::default());
        let (registrations_tx, registrations) = watch::channel(0);
        let (kick, _) = broadcast::channel(4);
        let state = FakeState {
            store: Arc::clone(&store),
            registrations: registrations_tx,
            kick: kick.clone(),
        };

        let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
            panic!("failed to bind fake backend");
        };
        let Ok(addr) = listener.local_addr() else {
            panic!("fake backend has no local address");
        };
        let app = router().with_state(state);
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            store,
            registrations,
            kick,
            task,
        }
    }

    /// Client configuration pointing at this server, authenticated as
    /// `identity`.
    pub fn config_for(&self, identity: &Identity) -> ChatClientConfig {
        ChatClientConfig {
            api_base_url: format!("http://{}/api", self.addr),
            socket_url: format!("ws://{}/socket", self.addr),
            auth_token: Some(format!("{}:{}", identity.role, identity.user_id)),
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(5),
            ..ChatClientConfig::default()
        }
    }

    /// Waits until at least `count` sockets have registered in total.
    pub async fn wait_for_registrations(&self, count: usize) -> bool {
        let mut rx = self.registrations.clone();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|n| *n >= count))
            .await
            .is_ok_and(|r| r.is_ok())
    }

    /// Sockets registered so far.
    pub fn registration_count(&self) -> usize {
        *self.registrations.borrow()
    }

    /// Drops every open socket without a close handshake.
    pub fn drop_sockets(&self) {
        let _ = self.kick.send(());
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn router() -> Router<FakeState> {
    Router::new()
        .route("/api/conversations/start", post(start_conversation))
        .route("/api/conversations/close/{id}", put(close_conversation))
        .route("/api/conversations", get(list_own))
        .route("/api/conversations/all", get(list_all))
        .route("/api/messages", post(post_message))
        .route("/api/messages/{id}", get(history))
        .route("/api/messages/{id}/read", put(mark_read))
        .route("/socket", get(socket))
}

fn caller(headers: &HeaderMap) -> Result<Identity, FakeError> {
    let unauthorized = || FakeError(StatusCode::UNAUTHORIZED, "Not authorized".to_string());
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(unauthorized)?;
    let (role, user_id) = token.split_once(':').ok_or_else(unauthorized)?;
    let role = UserRole::parse(role).ok_or_else(unauthorized)?;
    Ok(Identity::new(user_id, role))
}

async fn start_conversation(
    State(state): State<FakeState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, FakeError> {
    let caller = caller(&headers)?;
    let conversation = state.store.start_conversation(&caller).await?;
    Ok((StatusCode::CREATED, Json(conversation)))
}

async fn close_conversation(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, FakeError> {
    let caller = caller(&headers)?;
    state
        .store
        .close_conversation(&caller, &ConversationId::from(id))
        .await?;
    Ok(Json(serde_json::json!({ "message": "Conversation closed" })))
}

async fn list_own(
    State(state): State<FakeState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, FakeError> {
    let caller = caller(&headers)?;
    Ok(Json(state.store.list_own(&caller).await?))
}

async fn list_all(
    State(state): State<FakeState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, FakeError> {
    let caller = caller(&headers)?;
    Ok(Json(state.store.list_all(&caller).await?))
}

async fn post_message(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, FakeError> {
    let caller = caller(&headers)?;
    let message = state
        .store
        .post_message(&caller, &req.conversation_id, &req.content)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

async fn history(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, FakeError> {
    let caller = caller(&headers)?;
    Ok(Json(
        state
            .store
            .history(&caller, &ConversationId::from(id))
            .await?,
    ))
}

async fn mark_read(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, FakeError> {
    let caller = caller(&headers)?;
    state
        .store
        .mark_read(&caller, &ConversationId::from(id))
        .await?;
    Ok(StatusCode::OK)
}

async fn socket(ws: WebSocketUpgrade, State(state): State<FakeState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_socket(socket, state))
}

/// Waits for `register`, then forwards every stored message to the
/// registered user when they take part in its conversation.
async fn serve_socket(mut socket: WebSocket, state: FakeState) {
    let mut events = state.store.events().subscribe();
    let mut kick = state.kick.subscribe();

    let user_id = loop {
        match socket.recv().await {
            Some(Ok(WsMessage::Text(text))) => {
                if let Ok(SocketFrame::Register(user_id)) =
                    serde_json::from_str::<SocketFrame>(text.as_str())
                {
                    break user_id;
                }
            }
            Some(Ok(_)) => {}
            Some(Err(_)) | None => return,
        }
    };
    state.registrations.send_modify(|n| *n += 1);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(ChatEvent::MessageReceived(message)) => {
                    let participant = state
                        .store
                        .conversation(message.conversation_id())
                        .await
                        .is_some_and(|c| c.has_participant(&user_id));
                    if !participant {
                        continue;
                    }
                    let Ok(json) = SocketFrame::NewMessage(message).to_json() else {
                        continue;
                    };
                    if socket.send(WsMessage::Text(json.into())).await.is_err() {
                        return;
                    }
                }
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return,
            },
            _ = kick.recv() => return,
            incoming = socket.recv() => match incoming {
                Some(Ok(WsMessage::Close(_)) | Err(_)) | None => return,
                Some(Ok(_)) => {}
            },
        }
    }
}
