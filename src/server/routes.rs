//! HTTP surface: dashboard page, static files, WebSocket feed and health check

use super::hub::BroadcastHub;
use crate::aggregator_core::{lock_buffer, AggregationBuffer};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tower_http::services::ServeDir;

#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<BroadcastHub>,
    pub buffer: Arc<Mutex<AggregationBuffer>>,
    pub frontend_dir: PathBuf,
}

pub fn router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(root))
        .route("/ws", get(websocket))
        .route("/api/health", get(health));

    if state.frontend_dir.is_dir() {
        router = router.nest_service("/static", ServeDir::new(&state.frontend_dir));
    } else {
        log::warn!(
            "⚠️  Frontend directory not found at {}",
            state.frontend_dir.display()
        );
    }

    router.with_state(state)
}

/// Serve the router until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn root(State(state): State<AppState>) -> Response {
    let index = state.frontend_dir.join("index.html");
    match tokio::fs::read_to_string(&index).await {
        Ok(html) => Html(html).into_response(),
        Err(_) => Json(json!({
            "error": format!("Frontend file not found at {}", index.display())
        }))
        .into_response(),
    }
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let (buffered, window_secs) = {
        let buffer = lock_buffer(&state.buffer);
        (buffer.len(), buffer.window_secs())
    };

    Json(json!({
        "status": "ok",
        "clients_connected": state.hub.clients_connected(),
        "buffered_readings": buffered,
        "window_seconds": window_secs,
    }))
}

async fn websocket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.hub))
}

async fn handle_socket(socket: WebSocket, hub: Arc<BroadcastHub>) {
    let mut frames = hub.subscribe();
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Ok(text) => {
                    if let Err(e) = sender.send(Message::Text(text)).await {
                        log::error!("Error sending to client: {}", e);
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("⚠️  Client lagging, skipped {} frames", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => log::debug!("Received from client: {}", text),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    log::error!("WebSocket error: {}", e);
                    break;
                }
            },
        }
    }

    drop(frames);
    log::info!(
        "Client disconnected. Total clients: {}",
        hub.clients_connected()
    );
}
