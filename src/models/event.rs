//! # 실시간 이벤트 모델
//!
//! WebSocket 텍스트 프레임 하나가 이벤트 하나입니다:
//!
//! ```text
//! { "type": "table:update", "data": { "code": "ABC123", "r": 2, "c": 3, "value": "hello" } }
//! ```
//!
//! - [`ClientEvent`]: 클라이언트 → 서버. 종류별 payload 구조체로 나뉘며,
//!   범위를 벗어난 값은 저장 전에 잘리거나 버려집니다.
//! - [`ServerEvent`]: 서버 → 클라이언트.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::document::{
    Attachment, Canvas, Chat, ChatMessage, FileRecord, Point, Stroke, Table, TextContent,
};
use crate::models::lenient;
use crate::models::presence::{PresenceEntry, PresencePatch};
use crate::services::sanitize::{
    non_empty_truncated, normalize_color, safe_basename, truncate_chars, value_to_text,
};

pub const MAX_CELL_LEN: usize = 1024;
pub const MAX_STROKE_POINTS: usize = 200;
pub const MAX_STROKE_COLOR_LEN: usize = 16;
pub const MIN_STROKE_WIDTH: f64 = 1.0;
pub const MAX_STROKE_WIDTH: f64 = 20.0;
pub const MAX_CHAT_TEXT_LEN: usize = 5000;
pub const MAX_AUTHOR_ID_LEN: usize = 64;
pub const MAX_AUTHOR_NAME_LEN: usize = 50;
pub const MAX_ATTACHMENTS: usize = 10;

/// 클라이언트가 보내는 이벤트
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "join")]
    Join(JoinPayload),
    #[serde(rename = "table:update")]
    TableUpdate(TableUpdatePayload),
    #[serde(rename = "canvas:stroke")]
    CanvasStroke(StrokePayload),
    #[serde(rename = "canvas:clear")]
    CanvasClear(CodePayload),
    #[serde(rename = "canvas:undo")]
    CanvasUndo(CodePayload),
    #[serde(rename = "chat:message")]
    ChatMessage(ChatPayload),
    #[serde(rename = "text:update")]
    TextUpdate(TextUpdatePayload),
    #[serde(rename = "presence:set")]
    PresenceSet(PresencePatch),
}

impl ClientEvent {
    /// 로그용 이벤트 이름
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Join(_) => "join",
            ClientEvent::TableUpdate(_) => "table:update",
            ClientEvent::CanvasStroke(_) => "canvas:stroke",
            ClientEvent::CanvasClear(_) => "canvas:clear",
            ClientEvent::CanvasUndo(_) => "canvas:undo",
            ClientEvent::ChatMessage(_) => "chat:message",
            ClientEvent::TextUpdate(_) => "text:update",
            ClientEvent::PresenceSet(_) => "presence:set",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPayload {
    #[serde(default, deserialize_with = "lenient::text")]
    pub code: String,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub color: Option<String>,
}

/// 좌표가 정수로 해석되지 않으면 갱신할 셀이 없으므로 이벤트는 무시됩니다.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TableUpdatePayload {
    #[serde(default, deserialize_with = "lenient::text")]
    pub code: String,
    #[serde(default, deserialize_with = "lenient::index")]
    pub r: Option<i64>,
    #[serde(default, deserialize_with = "lenient::index")]
    pub c: Option<i64>,
    #[serde(default)]
    pub value: Value,
}

impl TableUpdatePayload {
    /// 셀에 저장할 텍스트 (최대 1024자)
    pub fn cell_text(&self) -> String {
        truncate_chars(&value_to_text(&self.value), MAX_CELL_LEN)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CodePayload {
    #[serde(default, deserialize_with = "lenient::text")]
    pub code: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StrokePayload {
    #[serde(default, deserialize_with = "lenient::text")]
    pub code: String,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub stroke: StrokeInput,
}

/// 클라이언트가 보낸 획. 좌표와 굵기는 실수로 올 수 있습니다.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StrokeInput {
    #[serde(default, deserialize_with = "lenient::number")]
    pub width: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub color: Option<String>,
    /// 좌표가 빠졌거나 숫자가 아닌 점은 그 점만 버립니다.
    #[serde(default, deserialize_with = "lenient::each")]
    pub points: Vec<PointInput>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PointInput {
    pub x: f64,
    pub y: f64,
}

impl StrokeInput {
    /// 저장 가능한 획으로 정제합니다.
    ///
    /// - 굵기: 없거나 0이면 2, 그 뒤 `[1, 20]`으로 제한
    /// - 색상: 없거나 비어 있으면 `#000000`, 최대 16자
    /// - 점: 최대 200개, 좌표는 내림(floor)
    pub fn sanitize(&self) -> Stroke {
        let width = match self.width {
            Some(w) if w.is_finite() && w != 0.0 => w,
            _ => 2.0,
        };
        let color = match self.color.as_deref() {
            Some(c) if !c.is_empty() => truncate_chars(c, MAX_STROKE_COLOR_LEN),
            _ => "#000000".to_string(),
        };
        Stroke {
            width: width.clamp(MIN_STROKE_WIDTH, MAX_STROKE_WIDTH) as i64,
            color,
            points: self
                .points
                .iter()
                .take(MAX_STROKE_POINTS)
                .map(|p| Point {
                    x: p.x.floor() as i64,
                    y: p.y.floor() as i64,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatPayload {
    #[serde(default, deserialize_with = "lenient::text")]
    pub code: String,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub message: ChatMessageInput,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageInput {
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub author_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub author_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub author_color: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub text: Option<String>,
    /// 배열이 아니면 첨부 없음. 객체가 아닌 원소는 버립니다.
    #[serde(default, deserialize_with = "lenient::each")]
    pub attachments: Vec<AttachmentRef>,
}

/// 첨부 참조. 구버전 클라이언트는 `fileId`를 보냅니다. 숫자 ID도 문자열로 받습니다.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRef {
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub file_id: Option<String>,
}

impl ChatMessageInput {
    /// 서버 기준 메시지로 정규화합니다.
    ///
    /// `at`은 항상 서버 시각으로 덮어씁니다. 첨부 ID는 세션 파일 색인에서 찾고,
    /// 찾지 못한 ID는 조용히 버립니다.
    pub fn canonicalize(&self, files: &[FileRecord], now_ms: i64) -> ChatMessage {
        let id = non_empty_truncated(self.id.as_deref(), MAX_AUTHOR_ID_LEN)
            .unwrap_or_else(|| uuid::Uuid::now_v7().simple().to_string());
        let author_id = non_empty_truncated(self.author_id.as_deref(), MAX_AUTHOR_ID_LEN)
            .unwrap_or_else(|| "anon".to_string());

        let attachments = self
            .attachments
            .iter()
            .take(MAX_ATTACHMENTS)
            .filter_map(|a| {
                let raw = a.id.as_deref().or(a.file_id.as_deref()).unwrap_or_default();
                let id = safe_basename(raw);
                if id.is_empty() {
                    return None;
                }
                files.iter().find(|f| f.id == id).map(Attachment::from)
            })
            .collect();

        ChatMessage {
            id,
            at: now_ms,
            author_id,
            author_name: non_empty_truncated(self.author_name.as_deref(), MAX_AUTHOR_NAME_LEN),
            author_color: normalize_color(self.author_color.as_deref()),
            text: truncate_chars(self.text.as_deref().unwrap_or_default(), MAX_CHAT_TEXT_LEN),
            attachments,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TextUpdatePayload {
    #[serde(default, deserialize_with = "lenient::text")]
    pub code: String,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub text: Option<String>,
    /// 보낸 쪽이 자신의 에코를 알아보기 위한 태그. 서버는 그대로 돌려줍니다.
    #[serde(default)]
    pub origin: Option<Value>,
}

/// 서버가 보내는 이벤트
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "state:init")]
    StateInit(StateSnapshot),
    #[serde(rename = "presence:update")]
    PresenceUpdate { users: Vec<PresenceEntry> },
    #[serde(rename = "table:patch")]
    TablePatch { r: i64, c: i64, value: String },
    #[serde(rename = "canvas:stroke")]
    CanvasStroke(Stroke),
    #[serde(rename = "canvas:clear")]
    CanvasClear,
    #[serde(rename = "canvas:undo")]
    CanvasUndo,
    #[serde(rename = "chat:message")]
    ChatMessage(ChatMessage),
    #[serde(rename = "text:update")]
    TextUpdate { text: String, origin: Option<Value> },
    #[serde(rename = "files:update")]
    FilesUpdate,
    #[serde(rename = "session:public")]
    SessionPublic { public: bool },
    #[serde(rename = "session:deleted")]
    SessionDeleted,
}

/// join 직후 요청자에게만 보내는 전체 상태
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSnapshot {
    pub table: Table,
    pub canvas: Canvas,
    pub text: TextContent,
    pub chat: Chat,
    pub presence: Vec<PresenceEntry>,
    pub public: bool,
}
