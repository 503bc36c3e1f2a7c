//! # WebSocket 업그레이드 핸들러
//!
//! `GET /ws` 요청을 WebSocket으로 전환하고 연결 루프를 시작합니다.
//! 이벤트 처리는 `realtime` 모듈이 담당합니다.

use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};

use crate::{realtime::socket::serve_connection, routes::sessions::AppState};

/// `GET /ws`
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let router = state.realtime.clone();
    ws.on_upgrade(move |socket| serve_connection(socket, router))
}
