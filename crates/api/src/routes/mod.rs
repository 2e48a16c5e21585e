use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Extension, Path, State};
use axum::{
    Json, Router,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures_util::{SinkExt, StreamExt};
use flatmate_domain::{
    chat::{ChatMessage, ChatService, ChatThread, ThreadSummary, ThreadView},
    error::DomainError,
    identity::ActorIdentity,
    realtime::{NewMessageEvent, ThreadSubscriptions},
    unread::UnreadTracker,
    util::format_ms_rfc3339,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::interval;
use validator::Validate;

use crate::middleware::AuthContext;
use crate::observability;
use crate::{error::ApiError, middleware as app_middleware, state::AppState, validation};

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/v1/chat/threads", get(list_chat_threads))
        .route("/v1/chat/threads/:thread_id", get(open_chat_thread))
        .route(
            "/v1/chat/threads/:thread_id/messages",
            post(send_chat_message),
        )
        .route("/v1/chat/start/:user_id", post(start_chat_thread))
        .route("/v1/chat/ws", get(chat_ws))
        .route_layer(middleware::from_fn(app_middleware::require_auth_middleware));

    let mut app = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/v1/chat/unread-count", get(unread_count))
        .merge(protected)
        .layer(app_middleware::timeout_layer())
        .layer(app_middleware::trace_layer())
        .layer(app_middleware::set_request_id_layer())
        .layer(app_middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(app_middleware::metrics_layer))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            app_middleware::auth_middleware,
        ));

    if !state.config.app_env.eq_ignore_ascii_case("test") {
        app = app.layer(app_middleware::rate_limit_layer());
    }

    app.with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    environment: String,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.app_env.clone(),
    })
}

async fn metrics() -> Response {
    match observability::render_metrics() {
        Some(body) => (StatusCode::OK, body).into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

#[derive(Serialize)]
struct UnreadCountResponse {
    unread_count: u64,
}

async fn unread_count(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<UnreadCountResponse>, ApiError> {
    let unread_count = match auth.user_id.as_deref().filter(|_| auth.is_authenticated) {
        Some(user_id) => UnreadTracker::new(state.chat_repo.clone())
            .count_unread(user_id)
            .await
            .map_err(map_domain_error)?,
        None => 0,
    };
    Ok(Json(UnreadCountResponse { unread_count }))
}

async fn list_chat_threads(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<ThreadSummary>>, ApiError> {
    let actor = actor_identity(&auth)?;
    let threads = chat_service(&state)
        .list_threads(&actor)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(threads))
}

async fn open_chat_thread(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<ThreadView>, ApiError> {
    let actor = actor_identity(&auth)?;
    let thread = chat_service(&state)
        .open_thread(&actor, &thread_id)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(thread))
}

async fn start_chat_thread(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<ChatThread>, ApiError> {
    let actor = actor_identity(&auth)?;
    let thread = chat_service(&state)
        .start_or_get_thread(&actor, &user_id)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(thread))
}

#[derive(Debug, Deserialize, Validate)]
struct SendMessageRequest {
    #[validate(length(min = 1, max = 2000))]
    content: String,
}

async fn send_chat_message(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<ChatMessage>), ApiError> {
    validation::validate(&payload)?;
    let actor = actor_identity(&auth)?;
    let message = chat_service(&state)
        .send_message(&actor, &thread_id, &payload.content)
        .await
        .map_err(map_domain_error)?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    JoinThread { thread_id: String },
    #[serde(rename_all = "camelCase")]
    SendMessage { thread_id: String, content: String },
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    NewMessage { thread_id: String, message: WireMessage },
    Error { message: String },
}

#[derive(Serialize)]
struct WireMessage {
    sender: WireSender,
    content: String,
    #[serde(rename = "sentAt")]
    sent_at: String,
}

#[derive(Serialize)]
struct WireSender {
    id: String,
    name: String,
}

fn new_message_payload(event: NewMessageEvent) -> String {
    let payload = ServerEvent::NewMessage {
        thread_id: event.thread_id,
        message: WireMessage {
            sender: WireSender {
                id: event.message.sender.user_id,
                name: event.message.sender.name,
            },
            content: event.message.content,
            sent_at: format_ms_rfc3339(event.message.sent_at_ms),
        },
    };
    serde_json::to_string(&payload).unwrap_or_default()
}

fn error_payload(message: impl Into<String>) -> String {
    serde_json::to_string(&ServerEvent::Error {
        message: message.into(),
    })
    .unwrap_or_default()
}

async fn chat_ws(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let actor = actor_identity(&auth)?;
    Ok(ws.on_upgrade(move |socket| handle_chat_socket(socket, state, actor)))
}

async fn handle_chat_socket(socket: WebSocket, state: AppState, actor: ActorIdentity) {
    let (mut sink, mut incoming) = socket.split();
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<NewMessageEvent>();
    let mut subscriptions = ThreadSubscriptions::new();
    let mut forwarders: Vec<tokio::task::JoinHandle<()>> = Vec::new();
    let mut heartbeat = interval(Duration::from_secs(15));
    let service = chat_service(&state);

    loop {
        tokio::select! {
            event = events_rx.recv() => {
                let Some(event) = event else { break };
                if sink
                    .send(Message::Text(new_message_payload(event)))
                    .await
                    .is_err()
                {
                    break;
                }
            }
            msg = incoming.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_client_event(
                            &state,
                            &service,
                            &actor,
                            &mut subscriptions,
                            &mut forwarders,
                            &events_tx,
                            &text,
                        )
                        .await;
                        if let Some(reply) = reply {
                            if sink.send(Message::Text(reply)).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
            _ = heartbeat.tick() => {
                if sink.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    for task in forwarders {
        task.abort();
    }
}

/// Applies one inbound socket event. Returns a payload to send back, if any.
async fn handle_client_event(
    state: &AppState,
    service: &ChatService,
    actor: &ActorIdentity,
    subscriptions: &mut ThreadSubscriptions,
    forwarders: &mut Vec<tokio::task::JoinHandle<()>>,
    events_tx: &mpsc::UnboundedSender<NewMessageEvent>,
    text: &str,
) -> Option<String> {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(_) => {
            observability::register_chat_realtime_event("unknown", "rejected");
            return Some(error_payload("unrecognized event"));
        }
    };

    match event {
        ClientEvent::JoinThread { thread_id } => {
            if subscriptions.contains(&thread_id) {
                return None;
            }
            if let Err(err) = service.assert_participant(actor, &thread_id).await {
                observability::register_chat_realtime_event("join_thread", "denied");
                return Some(error_payload(err.to_string()));
            }
            subscriptions.join(&thread_id);
            let mut receiver = state.chat_realtime.subscribe(&thread_id).await;
            let tx = events_tx.clone();
            forwarders.push(tokio::spawn(async move {
                loop {
                    match receiver.recv().await {
                        Ok(event) => {
                            if tx.send(event).is_err() {
                                break;
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            }));
            observability::register_chat_realtime_event("join_thread", "ok");
            None
        }
        ClientEvent::SendMessage { thread_id, content } => {
            match service.send_message(actor, &thread_id, &content).await {
                Ok(_) => {
                    observability::register_chat_realtime_event("send_message", "ok");
                    None
                }
                Err(err) => {
                    observability::register_chat_realtime_event("send_message", "rejected");
                    Some(error_payload(err.to_string()))
                }
            }
        }
    }
}

fn chat_service(state: &AppState) -> ChatService {
    ChatService::new(
        state.chat_repo.clone(),
        state.user_directory.clone(),
        state.chat_realtime.clone(),
    )
}

fn actor_identity(auth: &AuthContext) -> Result<ActorIdentity, ApiError> {
    let user_id = auth
        .user_id
        .as_ref()
        .filter(|user_id| !user_id.trim().is_empty())
        .ok_or(ApiError::Unauthorized)?;
    let username = auth
        .username
        .clone()
        .unwrap_or_else(|| user_id.to_string());
    Ok(ActorIdentity {
        user_id: user_id.to_string(),
        username,
    })
}

fn map_domain_error(err: DomainError) -> ApiError {
    match err {
        DomainError::AccessDenied => ApiError::AccessDenied,
        DomainError::InvalidInput(message) => ApiError::Validation(message),
        DomainError::StoreUnavailable(message) => ApiError::StoreUnavailable(message),
    }
}
