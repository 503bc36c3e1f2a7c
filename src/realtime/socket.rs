//! # WebSocket 연결 처리
//!
//! 연결마다 태스크 두 개가 돕니다:
//! - writer: mpsc 큐에 쌓인 [`ServerEvent`]를 JSON 텍스트 프레임으로 내보냅니다.
//! - reader (현재 태스크): 받은 프레임을 순서대로 [`EventRouter`]에 넘깁니다.
//!
//! 한 연결의 이벤트는 도착 순서대로 하나씩 처리됩니다.
//! 파싱할 수 없는 프레임은 로그만 남기고 건너뜁니다.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::models::{ClientEvent, ServerEvent};
use crate::realtime::router::{Connection, EventRouter};

pub async fn serve_connection(socket: WebSocket, router: EventRouter) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
    let mut conn = Connection::new(tx);
    tracing::debug!(connection = %conn.id, "WebSocket connected");

    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!("Failed to encode server event: {}", e);
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(connection = %conn.id, "WebSocket read error: {}", e);
                break;
            }
        };

        let text = match frame {
            Message::Text(text) => text,
            Message::Close(_) => break,
            // ping/pong은 axum이 처리합니다. 바이너리 프레임은 쓰지 않습니다.
            _ => continue,
        };

        let event: ClientEvent = match serde_json::from_str(text.as_str()) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(connection = %conn.id, "Ignoring malformed event: {}", e);
                continue;
            }
        };

        let name = event.name();
        if let Err(e) = router.handle(&mut conn, event).await {
            tracing::error!(connection = %conn.id, event = name, "Event handling failed: {}", e);
        }
    }

    router.disconnect(&conn);
    writer.abort();
}
