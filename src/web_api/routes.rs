//! Route handlers for the two protocol transports.

use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::HeaderMap,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use futures::{SinkExt, StreamExt};

use crate::device::Transport;
use crate::protocol::{Answer, ClientMessage};
use crate::realtime_hub::Subscription;
use crate::{AppState, Error, Result};

/// Create the API router
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(super::health_check))
        .route("/sync", post(sync_handler))
        .route("/async", get(websocket_handler))
}

/// `POST /sync`: decode, bracket with an implicit lock when the
/// operation needs one, dispatch, always release what we acquired.
async fn sync_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Answer>> {
    let message = ClientMessage::decode(&body)?;

    let implicit_lock = if message.requires_locking() {
        let password = headers.get("password").and_then(|v| v.to_str().ok());
        if !state.store.lock_for_request(password).await {
            return Err(Error::Authorization(format!(
                "Cannot lock device for {}: locked by another party or bad password",
                message.operation()
            )));
        }
        true
    } else {
        false
    };

    let result = state.device.dispatch(&message, Transport::Http).await;

    // The request's lock never outlives the request, even on failure
    if implicit_lock {
        state.store.unlock().await;
    }

    result.map(Json)
}

/// `GET /async`: upgrade to the persistent streaming session.
async fn websocket_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

async fn handle_websocket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (conn_id, mut rx) = state.realtime.register().await;

    // Writer: everything queued for this connection, answers and
    // broadcast frames alike, goes out in queue order.
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sender.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    let recv_state = state.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(frame)) = receiver.next().await {
            let raw = match &frame {
                Message::Text(text) => text.as_bytes(),
                Message::Binary(bytes) => bytes.as_slice(),
                Message::Close(_) => break,
                _ => continue,
            };

            let answer = process_frame(&recv_state, &conn_id, raw).await;
            match serde_json::to_string(&answer) {
                Ok(frame) => recv_state.realtime.push(&conn_id, frame).await,
                Err(e) => {
                    tracing::error!(connection_id = %conn_id, error = %e, "Cannot serialize answer")
                }
            }
        }
        conn_id
    });

    let conn_id = tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
            conn_id
        }
        res = &mut recv_task => {
            send_task.abort();
            res.unwrap_or(conn_id)
        }
    };

    state.realtime.unregister(&conn_id).await;
}

/// One inbound frame: decode, track subscriptions, dispatch. Every
/// fault becomes a `failed` answer so the session survives bad input.
async fn process_frame(state: &AppState, conn_id: &uuid::Uuid, raw: &[u8]) -> Answer {
    let message = match ClientMessage::decode(raw) {
        Ok(message) => message,
        Err(e) => return Answer::failed(e.to_string()),
    };

    if let ClientMessage::SetEnableStreams(flags) = &message {
        state
            .realtime
            .set_subscription(conn_id, Subscription::from(flags))
            .await;
    }

    match state.device.dispatch(&message, Transport::WebSocket).await {
        Ok(answer) => answer,
        Err(e) => Answer::failed(e.to_string()),
    }
}
