//! # 실시간 이벤트 라우터
//!
//! 클라이언트 이벤트 하나를 받아:
//! 1. 세션 코드를 정제하고
//! 2. 문서 저장소에 변경을 반영한 뒤 (필요한 경우)
//! 3. 방의 다른 연결들에게 결과를 전달합니다.
//!
//! ## 전달 범위
//! | 이벤트            | 받는 쪽           |
//! |-------------------|-------------------|
//! | `table:update`    | 보낸 연결 제외     |
//! | `canvas:stroke`   | 보낸 연결 제외     |
//! | `canvas:clear`    | 방 전체           |
//! | `canvas:undo`     | 방 전체           |
//! | `chat:message`    | 방 전체           |
//! | `text:update`     | 방 전체 (origin 포함) |
//!
//! 존재하지 않는 세션에 대한 이벤트는 조용히 무시합니다.
//! 변경 이벤트는 `join` 여부와 관계없이 payload의 `code`를 기준으로 처리합니다.

use std::sync::Arc;

use chrono::Utc;

use crate::error::AppError;
use crate::models::{
    ChatPayload, ClientEvent, CodePayload, ConnectionId, JoinPayload, PresenceEntry,
    PresencePatch, ServerEvent, SessionCode, StateSnapshot, StrokePayload, TableUpdatePayload,
    TextUpdatePayload,
};
use crate::realtime::presence::PresenceTracker;
use crate::realtime::rooms::{EventSender, RoomRegistry};
use crate::store::DocumentStore;

/// WebSocket 연결 하나의 상태
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    /// 마지막으로 join한 세션
    pub session: Option<SessionCode>,
    sender: EventSender,
}

impl Connection {
    pub fn new(sender: EventSender) -> Self {
        Self {
            id: ConnectionId::generate(),
            session: None,
            sender,
        }
    }

    /// 이 연결에만 보냅니다. 연결이 이미 닫혔으면 버립니다.
    pub fn send(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }
}

#[derive(Debug, Clone)]
pub struct EventRouter {
    store: DocumentStore,
    presence: Arc<PresenceTracker>,
    rooms: Arc<RoomRegistry>,
}

impl EventRouter {
    /// 접속자 목록은 밖에서 만들어 넘깁니다. 방 목록은 라우터가 소유합니다.
    pub fn new(store: DocumentStore, presence: Arc<PresenceTracker>) -> Self {
        Self {
            store,
            presence,
            rooms: Arc::new(RoomRegistry::new()),
        }
    }

    /// HTTP 핸들러가 방 전체에 알릴 때 사용합니다 (`files:update` 등).
    pub fn notify(&self, code: &SessionCode, event: ServerEvent) {
        let delivered = self.rooms.broadcast(code, &event);
        tracing::debug!(session = %code, delivered, "Notified room");
    }

    /// 이벤트 하나를 처리합니다.
    ///
    /// 세션이 없어서 생긴 `NotFound`는 여기서 삼킵니다.
    /// 그 밖의 에러(손상된 문서, 디스크 에러)는 호출자가 로그로 남깁니다.
    pub async fn handle(&self, conn: &mut Connection, event: ClientEvent) -> Result<(), AppError> {
        let result = match event {
            ClientEvent::Join(payload) => self.join(conn, payload).await,
            ClientEvent::TableUpdate(payload) => self.table_update(conn, payload).await,
            ClientEvent::CanvasStroke(payload) => self.canvas_stroke(conn, payload).await,
            ClientEvent::CanvasClear(payload) => self.canvas_clear(payload).await,
            ClientEvent::CanvasUndo(payload) => self.canvas_undo(payload).await,
            ClientEvent::ChatMessage(payload) => self.chat_message(payload).await,
            ClientEvent::TextUpdate(payload) => self.text_update(payload).await,
            ClientEvent::PresenceSet(patch) => {
                self.presence_set(conn, &patch);
                Ok(())
            }
        };

        match result {
            Err(AppError::NotFound) => {
                tracing::debug!(connection = %conn.id, "Event for unknown session ignored");
                Ok(())
            }
            other => other,
        }
    }

    /// 연결 종료: 방과 접속자 목록에서 빼고 남은 사람들에게 알립니다.
    pub fn disconnect(&self, conn: &Connection) {
        self.rooms.leave_all(&conn.id);
        for code in self.presence.remove(&conn.id) {
            self.broadcast_presence(&code);
        }
        tracing::debug!(connection = %conn.id, "Connection closed");
    }

    // ============================================================
    // 이벤트별 처리
    // ============================================================

    async fn join(&self, conn: &mut Connection, payload: JoinPayload) -> Result<(), AppError> {
        let Some(code) = SessionCode::parse(&payload.code) else {
            return Ok(());
        };
        if !self.store.exists(&code).await? {
            return Err(AppError::NotFound);
        }

        // 다른 세션으로 옮겨가면 이전 방에서 먼저 나갑니다.
        if let Some(previous) = conn.session.take() {
            if previous != code {
                self.rooms.leave(&previous, &conn.id);
                for left in self.presence.remove(&conn.id) {
                    self.broadcast_presence(&left);
                }
            }
        }

        self.rooms.join(&code, &conn.id, conn.sender.clone());
        conn.session = Some(code.clone());

        let entry = PresenceEntry::from_join(
            &conn.id,
            payload.user_id.as_deref(),
            payload.name.as_deref(),
            payload.color.as_deref(),
        );
        self.presence.add(&code, &conn.id, entry);

        let doc = self.store.load(&code).await?;
        conn.send(ServerEvent::StateInit(StateSnapshot {
            table: doc.table,
            canvas: doc.canvas,
            text: doc.text,
            chat: doc.chat,
            presence: self.presence.list_for(&code),
            public: doc.is_public,
        }));
        self.broadcast_presence(&code);

        tracing::info!(
            session = %code,
            connection = %conn.id,
            members = self.rooms.member_count(&code),
            "Joined session"
        );
        Ok(())
    }

    async fn table_update(&self, conn: &Connection, payload: TableUpdatePayload) -> Result<(), AppError> {
        let Some(code) = SessionCode::parse(&payload.code) else {
            return Ok(());
        };
        let (Some(r), Some(c)) = (payload.r, payload.c) else {
            tracing::debug!(session = %code, "Table update without usable coordinates ignored");
            return Ok(());
        };
        let text = payload.cell_text();

        let value = self
            .store
            .mutate_with(&code, |doc| doc.set_cell(r, c, text).to_string())
            .await?;
        self.rooms
            .broadcast_except(&code, &conn.id, &ServerEvent::TablePatch { r, c, value });
        Ok(())
    }

    async fn canvas_stroke(&self, conn: &Connection, payload: StrokePayload) -> Result<(), AppError> {
        let Some(code) = SessionCode::parse(&payload.code) else {
            return Ok(());
        };
        let stroke = payload.stroke.sanitize();

        let stored = stroke.clone();
        self.store.mutate(&code, |doc| doc.push_stroke(stored)).await?;
        self.rooms
            .broadcast_except(&code, &conn.id, &ServerEvent::CanvasStroke(stroke));
        Ok(())
    }

    async fn canvas_clear(&self, payload: CodePayload) -> Result<(), AppError> {
        let Some(code) = SessionCode::parse(&payload.code) else {
            return Ok(());
        };
        self.store.mutate(&code, |doc| doc.clear_canvas()).await?;
        self.rooms.broadcast(&code, &ServerEvent::CanvasClear);
        Ok(())
    }

    async fn canvas_undo(&self, payload: CodePayload) -> Result<(), AppError> {
        let Some(code) = SessionCode::parse(&payload.code) else {
            return Ok(());
        };
        // 획이 없어도 undo 이벤트는 전달합니다. 클라이언트가 같은 규칙으로 처리합니다.
        self.store
            .mutate(&code, |doc| {
                doc.undo_stroke();
            })
            .await?;
        self.rooms.broadcast(&code, &ServerEvent::CanvasUndo);
        Ok(())
    }

    async fn chat_message(&self, payload: ChatPayload) -> Result<(), AppError> {
        let Some(code) = SessionCode::parse(&payload.code) else {
            return Ok(());
        };
        let now = Utc::now().timestamp_millis();

        let message = self
            .store
            .mutate_with(&code, |doc| {
                let message = payload.message.canonicalize(&doc.files, now);
                doc.push_message(message.clone());
                message
            })
            .await?;
        self.rooms.broadcast(&code, &ServerEvent::ChatMessage(message));
        Ok(())
    }

    async fn text_update(&self, payload: TextUpdatePayload) -> Result<(), AppError> {
        let Some(code) = SessionCode::parse(&payload.code) else {
            return Ok(());
        };
        let incoming = payload.text.unwrap_or_default();

        let text = self
            .store
            .mutate_with(&code, |doc| doc.replace_text(&incoming).to_string())
            .await?;
        self.rooms.broadcast(
            &code,
            &ServerEvent::TextUpdate {
                text,
                origin: payload.origin,
            },
        );
        Ok(())
    }

    fn presence_set(&self, conn: &Connection, patch: &PresencePatch) {
        if conn.session.is_none() {
            return;
        }
        if let Some(code) = self.presence.update(&conn.id, patch) {
            self.broadcast_presence(&code);
        }
    }

    fn broadcast_presence(&self, code: &SessionCode) {
        let users = self.presence.list_for(code);
        self.rooms.broadcast(code, &ServerEvent::PresenceUpdate { users });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChatMessageInput, FileRecord, Point, StrokeInput};
    use crate::models::event::PointInput;
    use serde_json::json;
    use tempfile::TempDir;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    struct Fixture {
        _dir: TempDir,
        store: DocumentStore,
        presence: Arc<PresenceTracker>,
        router: EventRouter,
    }

    async fn fixture(sessions: &[&str]) -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = DocumentStore::new(dir.path());
        for raw in sessions {
            store.ensure(&code(raw)).await.unwrap();
        }
        let presence = Arc::new(PresenceTracker::new());
        let router = EventRouter::new(store.clone(), presence.clone());
        Fixture { _dir: dir, store, presence, router }
    }

    fn code(raw: &str) -> SessionCode {
        SessionCode::parse(raw).unwrap()
    }

    fn connect() -> (Connection, UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Connection::new(tx), rx)
    }

    fn drain(rx: &mut UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    fn join_event(raw: &str, user: &str) -> ClientEvent {
        ClientEvent::Join(JoinPayload {
            code: raw.into(),
            user_id: Some(user.into()),
            name: None,
            color: None,
        })
    }

    async fn joined(f: &Fixture, raw: &str, user: &str) -> (Connection, UnboundedReceiver<ServerEvent>) {
        let (mut conn, mut rx) = connect();
        f.router.handle(&mut conn, join_event(raw, user)).await.unwrap();
        drain(&mut rx);
        (conn, rx)
    }

    #[tokio::test]
    async fn join_sends_state_to_requester_and_presence_to_room() {
        let f = fixture(&["S1"]).await;
        let (_a, mut rx_a) = joined(&f, "S1", "alice").await;

        let (mut b, mut rx_b) = connect();
        f.router.handle(&mut b, join_event("S1", "bob")).await.unwrap();

        let to_b = drain(&mut rx_b);
        match &to_b[0] {
            ServerEvent::StateInit(snapshot) => {
                assert_eq!(snapshot.table.rows, 10);
                assert_eq!(snapshot.presence.len(), 2);
                assert!(!snapshot.public);
            }
            other => panic!("expected state:init, got {other:?}"),
        }
        assert!(matches!(&to_b[1], ServerEvent::PresenceUpdate { users } if users.len() == 2));

        // alice는 state:init 없이 presence만 받습니다.
        let to_a = drain(&mut rx_a);
        assert_eq!(to_a.len(), 1);
        assert!(matches!(&to_a[0], ServerEvent::PresenceUpdate { users } if users[1].user_id == "bob"));
    }

    #[tokio::test]
    async fn join_unknown_session_is_silent() {
        let f = fixture(&[]).await;
        let (mut conn, mut rx) = connect();
        f.router.handle(&mut conn, join_event("NOPE", "u")).await.unwrap();
        assert!(drain(&mut rx).is_empty());
        assert!(conn.session.is_none());
        assert!(f.presence.list_for(&code("NOPE")).is_empty());
    }

    #[tokio::test]
    async fn rejoin_leaves_previous_session() {
        let f = fixture(&["S1", "S2"]).await;
        let (_a, mut rx_a) = joined(&f, "S1", "alice").await;
        let (mut b, _rx_b) = joined(&f, "S1", "bob").await;
        drain(&mut rx_a);

        f.router.handle(&mut b, join_event("S2", "bob")).await.unwrap();

        assert_eq!(b.session, Some(code("S2")));
        assert_eq!(f.presence.list_for(&code("S1")).len(), 1);
        assert_eq!(f.presence.list_for(&code("S2")).len(), 1);
        assert!(matches!(&drain(&mut rx_a)[..], [ServerEvent::PresenceUpdate { users }] if users.len() == 1));
    }

    #[tokio::test]
    async fn table_update_persists_and_skips_sender() {
        let f = fixture(&["S1"]).await;
        let (mut a, mut rx_a) = joined(&f, "S1", "alice").await;
        let (_b, mut rx_b) = joined(&f, "S1", "bob").await;
        drain(&mut rx_a);

        let event: ClientEvent = serde_json::from_value(json!({
            "type": "table:update",
            "data": { "code": "S1", "r": 2, "c": 3, "value": "hello" }
        }))
        .unwrap();
        f.router.handle(&mut a, event).await.unwrap();

        assert!(drain(&mut rx_a).is_empty());
        assert_eq!(
            drain(&mut rx_b),
            vec![ServerEvent::TablePatch { r: 2, c: 3, value: "hello".into() }]
        );
        let doc = f.store.load(&code("S1")).await.unwrap();
        assert_eq!(doc.cell(2, 3), Some("hello"));
    }

    #[tokio::test]
    async fn mutations_work_without_join() {
        let f = fixture(&["S1"]).await;
        let (_b, mut rx_b) = joined(&f, "S1", "bob").await;
        let (mut outsider, _rx) = connect();

        let event = ClientEvent::CanvasClear(CodePayload { code: "S1".into() });
        f.router.handle(&mut outsider, event).await.unwrap();
        assert_eq!(drain(&mut rx_b), vec![ServerEvent::CanvasClear]);
    }

    #[tokio::test]
    async fn stroke_then_undo() {
        let f = fixture(&["S1"]).await;
        let (mut a, mut rx_a) = joined(&f, "S1", "alice").await;
        let (_b, mut rx_b) = joined(&f, "S1", "bob").await;
        drain(&mut rx_a);

        let stroke = ClientEvent::CanvasStroke(StrokePayload {
            code: "S1".into(),
            stroke: StrokeInput {
                width: Some(99.0),
                color: Some("#ff0000".into()),
                points: vec![PointInput { x: 1.4, y: 2.6 }],
            },
        });
        f.router.handle(&mut a, stroke).await.unwrap();

        let received = drain(&mut rx_b);
        match &received[..] {
            [ServerEvent::CanvasStroke(s)] => {
                assert_eq!(s.width, 20);
                assert_eq!(s.points.len(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(f.store.load(&code("S1")).await.unwrap().canvas.strokes.len(), 1);

        let undo = ClientEvent::CanvasUndo(CodePayload { code: "S1".into() });
        f.router.handle(&mut a, undo).await.unwrap();
        assert_eq!(drain(&mut rx_a), vec![ServerEvent::CanvasUndo]);
        assert_eq!(drain(&mut rx_b), vec![ServerEvent::CanvasUndo]);
        assert!(f.store.load(&code("S1")).await.unwrap().canvas.strokes.is_empty());
    }

    #[tokio::test]
    async fn clear_after_five_strokes_empties_canvas() {
        let f = fixture(&["ABC123"]).await;
        let (mut a, mut rx_a) = joined(&f, "ABC123", "alice").await;

        for i in 0..5 {
            let stroke = ClientEvent::CanvasStroke(StrokePayload {
                code: "ABC123".into(),
                stroke: StrokeInput {
                    points: vec![PointInput { x: i as f64, y: 0.0 }],
                    ..Default::default()
                },
            });
            f.router.handle(&mut a, stroke).await.unwrap();
        }
        assert_eq!(f.store.load(&code("ABC123")).await.unwrap().canvas.strokes.len(), 5);
        // 획은 보낸 쪽에 다시 오지 않습니다.
        assert!(drain(&mut rx_a).is_empty());

        let clear = ClientEvent::CanvasClear(CodePayload { code: "ABC123".into() });
        f.router.handle(&mut a, clear).await.unwrap();
        assert!(f.store.load(&code("ABC123")).await.unwrap().canvas.strokes.is_empty());
        assert_eq!(drain(&mut rx_a), vec![ServerEvent::CanvasClear]);
    }

    #[tokio::test]
    async fn chat_message_is_canonicalized_and_sent_to_all() {
        let f = fixture(&["S1"]).await;
        let (mut a, mut rx_a) = joined(&f, "S1", "alice").await;

        let chat = ClientEvent::ChatMessage(ChatPayload {
            code: "S1".into(),
            message: ChatMessageInput {
                id: Some("m1".into()),
                author_id: Some("alice".into()),
                text: Some("hi".into()),
                ..Default::default()
            },
        });
        f.router.handle(&mut a, chat).await.unwrap();

        let sent = drain(&mut rx_a);
        let [ServerEvent::ChatMessage(message)] = &sent[..] else {
            panic!("unexpected {sent:?}");
        };
        assert_eq!(message.text, "hi");
        assert!(message.at > 0);
        assert_eq!(f.store.load(&code("S1")).await.unwrap().chat.messages, vec![message.clone()]);
    }

    #[tokio::test]
    async fn text_update_echoes_origin() {
        let f = fixture(&["S1"]).await;
        let (mut a, mut rx_a) = joined(&f, "S1", "alice").await;

        let update = ClientEvent::TextUpdate(TextUpdatePayload {
            code: "S1".into(),
            text: Some("draft".into()),
            origin: Some(json!("tab-7")),
        });
        f.router.handle(&mut a, update).await.unwrap();

        assert_eq!(
            drain(&mut rx_a),
            vec![ServerEvent::TextUpdate { text: "draft".into(), origin: Some(json!("tab-7")) }]
        );
    }

    #[tokio::test]
    async fn presence_set_and_disconnect() {
        let f = fixture(&["S1"]).await;
        let (mut a, mut rx_a) = joined(&f, "S1", "alice").await;
        let (b, mut rx_b) = joined(&f, "S1", "bob").await;
        drain(&mut rx_a);

        let patch = PresencePatch { name: Some("Alice".into()), color: None };
        f.router.handle(&mut a, ClientEvent::PresenceSet(patch)).await.unwrap();
        let to_b = drain(&mut rx_b);
        assert!(matches!(&to_b[..], [ServerEvent::PresenceUpdate { users }]
            if users[0].name.as_deref() == Some("Alice")));

        f.router.disconnect(&b);
        assert_eq!(f.presence.list_for(&code("S1")).len(), 1);
        let to_a = drain(&mut rx_a);
        assert!(matches!(&to_a[..], [_, ServerEvent::PresenceUpdate { users }] if users.len() == 1));
    }

    #[tokio::test]
    async fn presence_set_before_join_is_ignored() {
        let f = fixture(&["S1"]).await;
        let (mut conn, mut rx) = connect();
        let patch = PresencePatch { name: Some("x".into()), color: None };
        f.router.handle(&mut conn, ClientEvent::PresenceSet(patch)).await.unwrap();
        assert!(drain(&mut rx).is_empty());
    }

    fn decode(raw: serde_json::Value) -> ClientEvent {
        serde_json::from_value(raw).unwrap()
    }

    #[tokio::test]
    async fn chat_message_survives_loosely_typed_fields() {
        let f = fixture(&["S1"]).await;
        let (mut a, mut rx_a) = joined(&f, "S1", "alice").await;
        let record = f
            .store
            .mutate_with(&code("S1"), |doc| {
                let record = FileRecord {
                    id: "5".into(),
                    original_name: "five.txt".into(),
                    size: 1,
                    mimetype: "text/plain".into(),
                    uploaded_at: 1,
                };
                doc.files.push(record.clone());
                record
            })
            .await
            .unwrap();

        let frames = [
            json!({ "type": "chat:message", "data": { "code": "S1",
                "message": { "text": "hi", "attachments": null } } }),
            json!({ "type": "chat:message", "data": { "code": "S1",
                "message": { "id": 123, "text": "numbered", "attachments": [{ "id": 5 }, null, "junk"] } } }),
        ];
        for frame in frames {
            f.router.handle(&mut a, decode(frame)).await.unwrap();
        }

        let messages = f.store.load(&code("S1")).await.unwrap().chat.messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text, "hi");
        assert!(messages[0].attachments.is_empty());
        assert_eq!(messages[1].id, "123");
        assert_eq!(messages[1].attachments.len(), 1);
        assert_eq!(messages[1].attachments[0].id, record.id);
        assert_eq!(drain(&mut rx_a).len(), 2);
    }

    #[tokio::test]
    async fn stroke_and_table_fields_are_coerced_individually() {
        let f = fixture(&["S1"]).await;
        let (mut a, _rx_a) = joined(&f, "S1", "alice").await;

        let stroke = decode(json!({ "type": "canvas:stroke", "data": { "code": "S1",
            "stroke": { "width": "4", "color": null, "points": [{ "x": 1, "y": 2 }, { "x": 3 }] } } }));
        f.router.handle(&mut a, stroke).await.unwrap();
        let table = decode(json!({ "type": "table:update",
            "data": { "code": "S1", "r": "2", "c": 1, "value": 7 } }));
        f.router.handle(&mut a, table).await.unwrap();
        let unusable = decode(json!({ "type": "table:update",
            "data": { "code": "S1", "r": "two", "c": 1, "value": "x" } }));
        f.router.handle(&mut a, unusable).await.unwrap();

        let doc = f.store.load(&code("S1")).await.unwrap();
        let [stroke] = &doc.canvas.strokes[..] else {
            panic!("unexpected strokes {:?}", doc.canvas.strokes);
        };
        assert_eq!(stroke.width, 4);
        assert_eq!(stroke.color, "#000000");
        assert_eq!(stroke.points, vec![Point { x: 1, y: 2 }]);
        assert_eq!(doc.cell(2, 1), Some("7"));
        assert_eq!(doc.table.cells.len(), 1);
    }

    #[tokio::test]
    async fn mutations_for_unknown_session_reach_nobody() {
        let f = fixture(&["S1"]).await;
        let (mut a, mut rx_a) = joined(&f, "S1", "alice").await;
        let (_b, mut rx_b) = joined(&f, "S1", "bob").await;
        drain(&mut rx_a);

        let frames = [
            json!({ "type": "table:update", "data": { "code": "NOPE", "r": 0, "c": 0, "value": "v" } }),
            json!({ "type": "chat:message", "data": { "code": "NOPE", "message": { "text": "hi" } } }),
            json!({ "type": "canvas:clear", "data": { "code": "NOPE" } }),
        ];
        for frame in frames {
            f.router.handle(&mut a, decode(frame)).await.unwrap();
        }

        assert!(drain(&mut rx_a).is_empty());
        assert!(drain(&mut rx_b).is_empty());
        assert!(!f.store.session_dir(&code("NOPE")).exists());
    }

    #[tokio::test]
    async fn corrupt_document_surfaces_error() {
        let f = fixture(&["S1"]).await;
        std::fs::write(f.store.document_path(&code("S1")), b"{broken").unwrap();
        let (mut conn, _rx) = connect();
        let event = ClientEvent::CanvasClear(CodePayload { code: "S1".into() });
        let err = f.router.handle(&mut conn, event).await.unwrap_err();
        assert!(matches!(err, AppError::CorruptDocument { .. }));
    }
}
