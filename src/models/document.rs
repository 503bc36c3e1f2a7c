//! # 세션 문서(SessionDocument) 모델
//!
//! 세션 하나의 모든 영속 상태입니다. 세션 디렉토리의 `meta.json`에
//! 통째로 직렬화되어 저장됩니다.
//!
//! ## 상한(cap)
//! | 필드 | 상한 | 초과 시 |
//! |------|------|---------|
//! | `canvas.strokes` | 2000 | 가장 오래된 획부터 제거 (FIFO) |
//! | `chat.messages` | 1000 | 가장 오래된 메시지부터 제거 |
//! | `text.content` | 256 KiB | 뒤쪽을 잘라냄 |
//!
//! 표 셀 좌표는 `rows`/`cols` 범위를 검사하지 않습니다.
//! 범위 밖의 `"r,c"` 키도 그대로 저장됩니다.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const DEFAULT_ROWS: u32 = 10;
pub const DEFAULT_COLS: u32 = 20;
pub const MAX_STROKES: usize = 2000;
pub const MAX_MESSAGES: usize = 1000;
pub const MAX_TEXT_BYTES: usize = 256 * 1024;

/// 세션 하나의 영속 상태
///
/// 필드가 빠진 문서도 읽을 수 있도록 `createdAt` 외에는 모두 `#[serde(default)]`입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDocument {
    /// 생성 시각 (epoch 밀리초). 한 번 정해지면 바뀌지 않습니다.
    pub created_at: i64,
    /// 공개 목록 노출 여부. 저장 형식의 키는 `public`입니다.
    #[serde(rename = "public", default)]
    pub is_public: bool,
    #[serde(default)]
    pub table: Table,
    #[serde(default)]
    pub canvas: Canvas,
    #[serde(default)]
    pub text: TextContent,
    #[serde(default)]
    pub chat: Chat,
    /// 업로드된 파일의 색인. 실제 바이트는 `files/` 하위 디렉토리에 있습니다.
    #[serde(default)]
    pub files: Vec<FileRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub rows: u32,
    pub cols: u32,
    /// `"r,c"` → 셀 값. 키가 없으면 빈 셀입니다.
    #[serde(default)]
    pub cells: BTreeMap<String, String>,
}

impl Default for Table {
    fn default() -> Self {
        Self {
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
            cells: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Canvas {
    #[serde(default)]
    pub strokes: Vec<Stroke>,
}

/// 캔버스의 한 획. 추가된 뒤에는 바뀌지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub width: i64,
    /// `"eraser"` 또는 16진수 색상. 최대 16자.
    pub color: String,
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

/// 서버가 정규화한 채팅 메시지
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    /// 서버 시각 (epoch 밀리초). 클라이언트가 보낸 시각은 무시됩니다.
    pub at: i64,
    pub author_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_color: Option<String>,
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// 채팅 메시지에 붙은 파일. 메타데이터는 파일 색인에서 복사합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub original_name: String,
    pub mimetype: String,
    pub size: u64,
}

/// 파일 색인 항목
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// 서버가 생성한 ID이자 `files/` 안의 파일 이름
    pub id: String,
    pub original_name: String,
    pub size: u64,
    pub mimetype: String,
    pub uploaded_at: i64,
}

impl From<&FileRecord> for Attachment {
    fn from(file: &FileRecord) -> Self {
        Self {
            id: file.id.clone(),
            original_name: file.original_name.clone(),
            mimetype: file.mimetype.clone(),
            size: file.size,
        }
    }
}

impl SessionDocument {
    /// 기본 문서: 10×20 빈 표, 빈 캔버스/텍스트/채팅/파일, 비공개
    pub fn new(created_at: i64) -> Self {
        Self {
            created_at,
            is_public: false,
            table: Table::default(),
            canvas: Canvas::default(),
            text: TextContent::default(),
            chat: Chat::default(),
            files: Vec::new(),
        }
    }

    /// 셀 값을 저장하고 저장된 값을 돌려줍니다.
    pub fn set_cell(&mut self, r: i64, c: i64, value: String) -> &str {
        let key = format!("{r},{c}");
        // entry API: 키가 있으면 덮어쓰고, 없으면 새로 넣습니다.
        let slot = self.table.cells.entry(key).or_default();
        *slot = value;
        slot.as_str()
    }

    pub fn cell(&self, r: i64, c: i64) -> Option<&str> {
        self.table.cells.get(&format!("{r},{c}")).map(String::as_str)
    }

    /// 획을 추가하고, 상한을 넘으면 가장 오래된 획을 버립니다.
    pub fn push_stroke(&mut self, stroke: Stroke) {
        self.canvas.strokes.push(stroke);
        if self.canvas.strokes.len() > MAX_STROKES {
            let overflow = self.canvas.strokes.len() - MAX_STROKES;
            self.canvas.strokes.drain(..overflow);
        }
    }

    /// 마지막 획을 제거합니다. 비어 있으면 아무 일도 하지 않습니다.
    pub fn undo_stroke(&mut self) -> Option<Stroke> {
        self.canvas.strokes.pop()
    }

    pub fn clear_canvas(&mut self) {
        self.canvas.strokes.clear();
    }

    /// 메시지를 추가하고, 상한을 넘는 오래된 메시지를 잘라냅니다.
    pub fn push_message(&mut self, message: ChatMessage) {
        self.chat.messages.push(message);
        if self.chat.messages.len() > MAX_MESSAGES {
            let overflow = self.chat.messages.len() - MAX_MESSAGES;
            self.chat.messages.drain(..overflow);
        }
    }

    /// 텍스트 전체를 교체합니다. 256 KiB를 넘는 부분은 잘립니다.
    pub fn replace_text(&mut self, text: &str) -> &str {
        self.text.content = crate::services::sanitize::truncate_bytes(text, MAX_TEXT_BYTES);
        &self.text.content
    }

    pub fn find_file(&self, id: &str) -> Option<&FileRecord> {
        self.files.iter().find(|f| f.id == id)
    }

    pub fn add_file(&mut self, record: FileRecord) {
        self.files.push(record);
    }

    /// 색인에서 파일을 제거하고, 실제로 제거되었는지 반환합니다.
    pub fn remove_file(&mut self, id: &str) -> bool {
        let before = self.files.len();
        self.files.retain(|f| f.id != id);
        self.files.len() != before
    }

    /// 만료 시각 = 생성 시각 + TTL
    pub fn expires_at(&self, ttl_ms: i64) -> i64 {
        self.created_at + ttl_ms
    }

    pub fn is_expired(&self, ttl_ms: i64, now_ms: i64) -> bool {
        now_ms > self.expires_at(ttl_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stroke(tag: i64) -> Stroke {
        Stroke {
            width: 2,
            color: "#000000".into(),
            points: vec![Point { x: tag, y: tag }],
        }
    }

    fn message(id: &str) -> ChatMessage {
        ChatMessage {
            id: id.into(),
            at: 1,
            author_id: "anon".into(),
            author_name: None,
            author_color: None,
            text: "hi".into(),
            attachments: vec![],
        }
    }

    #[test]
    fn stroke_cap_evicts_oldest_first() {
        let mut doc = SessionDocument::new(0);
        for i in 0..=MAX_STROKES as i64 {
            doc.push_stroke(stroke(i));
        }
        assert_eq!(doc.canvas.strokes.len(), MAX_STROKES);
        assert_eq!(doc.canvas.strokes[0], stroke(1));
        assert_eq!(doc.canvas.strokes.last(), Some(&stroke(MAX_STROKES as i64)));
    }

    #[test]
    fn chat_cap_trims_oldest_first() {
        let mut doc = SessionDocument::new(0);
        for i in 0..MAX_MESSAGES + 5 {
            doc.push_message(message(&i.to_string()));
        }
        assert_eq!(doc.chat.messages.len(), MAX_MESSAGES);
        assert_eq!(doc.chat.messages[0].id, "5");
        assert_eq!(doc.chat.messages.last().unwrap().id, (MAX_MESSAGES + 4).to_string());
    }

    #[test]
    fn undo_on_empty_canvas_is_a_no_op() {
        let mut doc = SessionDocument::new(0);
        assert!(doc.undo_stroke().is_none());
        doc.push_stroke(stroke(1));
        doc.push_stroke(stroke(2));
        assert_eq!(doc.undo_stroke(), Some(stroke(2)));
        assert_eq!(doc.canvas.strokes, vec![stroke(1)]);
    }

    #[test]
    fn out_of_range_cells_are_accepted() {
        let mut doc = SessionDocument::new(0);
        doc.set_cell(500, -3, "far away".into());
        assert_eq!(doc.cell(500, -3), Some("far away"));
        assert_eq!(doc.table.rows, DEFAULT_ROWS);
    }

    #[test]
    fn text_is_capped() {
        let mut doc = SessionDocument::new(0);
        let long = "x".repeat(MAX_TEXT_BYTES + 10);
        assert_eq!(doc.replace_text(&long).len(), MAX_TEXT_BYTES);
    }

    #[test]
    fn populated_document_survives_a_json_round_trip() {
        let mut doc = SessionDocument::new(1_700_000_000_000);
        doc.is_public = true;
        doc.set_cell(2, 3, "hello".into());
        doc.push_stroke(stroke(7));
        doc.replace_text("notes");
        doc.add_file(FileRecord {
            id: "a_1_x.txt".into(),
            original_name: "a.txt".into(),
            size: 3,
            mimetype: "text/plain".into(),
            uploaded_at: 5,
        });
        let mut msg = message("m1");
        msg.attachments.push(Attachment::from(&doc.files[0]));
        doc.push_message(msg);

        let raw = serde_json::to_string_pretty(&doc).unwrap();
        assert!(raw.contains("\"public\": true"));
        assert!(raw.contains("\"createdAt\""));
        let back: SessionDocument = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn sparse_legacy_document_gets_defaults() {
        let doc: SessionDocument = serde_json::from_str(r#"{"createdAt": 10}"#).unwrap();
        assert_eq!(doc, SessionDocument::new(10));
    }
}
