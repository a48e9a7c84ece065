//! WebSocket upgrade and connection handling.

use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tokio::sync::broadcast;

use crate::logging::profile_id;
use crate::server::error::{api_error, authenticate, ApiError};
use crate::server::registry::ConnectionRegistry;
use crate::server::state::{PushEvent, SharedState};

#[derive(Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
    Query(query): Query<WsQuery>,
) -> Response {
    let token = match query.token.as_deref().map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => return ApiError::Unauthorized.into_response(),
    };

    let (profile, registry) = {
        let st = state.lock().await;
        match authenticate(&st, &token) {
            Ok(profile) => (profile, Arc::clone(&st.registry)),
            Err(e) => return e.into_response(),
        }
    };

    // Check connection limit before upgrading
    if registry.at_capacity() {
        return api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "too many WebSocket connections",
        );
    }

    ws.on_upgrade(move |socket| ws_connection(socket, registry, profile.id))
        .into_response()
}

/// The frame to send for a channel read, or `None` once the channel closed.
fn outgoing_event(result: Result<PushEvent, broadcast::error::RecvError>) -> Option<PushEvent> {
    match result {
        Ok(event) => Some(event),
        Err(broadcast::error::RecvError::Lagged(count)) => Some(PushEvent::EventsMissed { count }),
        Err(broadcast::error::RecvError::Closed) => None,
    }
}

async fn ws_connection(mut socket: WebSocket, registry: Arc<ConnectionRegistry>, owner: i64) {
    let mut subscription = match registry.register(owner).await {
        Ok(sub) => sub,
        Err(e) => {
            crate::tlog!("ws {} refused: {}", profile_id(owner), e);
            let _ = socket.send(WsMessage::Close(None)).await;
            return;
        }
    };
    crate::tlog!(
        "ws {} connected ({} open)",
        profile_id(owner),
        registry.connection_count()
    );

    loop {
        tokio::select! {
            // Forward push events to the client
            result = subscription.rx.recv() => {
                if let Err(broadcast::error::RecvError::Lagged(n)) = &result {
                    crate::tlog!("ws {} lagged, skipped {n} events", profile_id(owner));
                }
                let Some(event) = outgoing_event(result) else {
                    break;
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    if socket.send(WsMessage::Text(json)).await.is_err() {
                        break; // client disconnected
                    }
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(WsMessage::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(WsMessage::Ping(data))) => {
                        let _ = socket.send(WsMessage::Pong(data)).await;
                    }
                    _ => {} // the channel is push only
                }
            }
        }
    }

    registry.deregister(subscription).await;
    crate::tlog!(
        "ws {} disconnected ({} open)",
        profile_id(owner),
        registry.connection_count()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_overflow_becomes_events_missed_frame() {
        let registry = ConnectionRegistry::new(4, 1);
        let mut sub = registry.register(5).await.unwrap();
        for _ in 0..3 {
            registry.publish(5, PushEvent::CatalogUpdated).await;
        }

        let frame = outgoing_event(sub.rx.recv().await).unwrap();
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "events_missed");
        assert_eq!(json["count"], 2);

        // The newest event is still delivered after the gap.
        assert!(matches!(
            outgoing_event(sub.rx.recv().await),
            Some(PushEvent::CatalogUpdated)
        ));
        registry.deregister(sub).await;
    }
}
