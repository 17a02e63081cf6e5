//! Websocket channels
//!
//! Every websocket connection is one channel: opened on upgrade, closed
//! exactly once when the socket ends. Responses and pushed notifications
//! share the channel's outbound queue.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use crate::protocol::Outcome;
use crate::subscriber::ChannelHandle;
use crate::AppState;

pub(super) async fn upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| serve_channel(socket, state))
}

async fn serve_channel(socket: WebSocket, state: Arc<AppState>) {
    let (channel, mut outbound) = state.transport.attach().await;
    state.handler.on_open(channel).await;
    info!(channel = %channel, "Channel opened");

    let (mut sink, mut stream) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if let Err(e) = sink.send(Message::Text(frame)).await {
                debug!(error = %e, "Websocket write failed");
                break;
            }
        }
    });

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => handle_frame(&state, channel, &text).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(channel = %channel, error = %e, "Websocket error");
                break;
            }
        }
    }

    state.handler.on_close(channel).await;
    state.transport.detach(channel).await;
    writer.abort();
    info!(channel = %channel, "Channel closed");
}

async fn handle_frame(state: &AppState, channel: ChannelHandle, text: &str) {
    let (reply, watch) = match state.handler.on_frame(text, Some(channel)).await {
        Ok(Outcome { response, watch }) => (response.map(|r| serde_json::to_string(&r)), watch),
        Err(e) => {
            if !e.is_configuration() {
                debug!(channel = %channel, error = %e, "Request failed");
            }
            let frame = serde_json::to_string(&serde_json::json!({
                "type": "error",
                "data": e.to_string()
            }));
            (Some(frame), None)
        }
    };

    match reply {
        Some(Ok(frame)) => {
            if let Err(e) = state.transport.push(channel, frame).await {
                warn!(channel = %channel, error = %e, "Failed to queue reply");
            }
        }
        Some(Err(e)) => warn!(channel = %channel, error = %e, "Failed to serialize reply"),
        None => {}
    }

    // The acknowledgement is queued; pushes for the new subscription follow it.
    if let Some(key) = watch {
        state.bridge.watch(&key).await;
    }
}
