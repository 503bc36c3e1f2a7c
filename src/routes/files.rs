//! # 파일 라우트 핸들러
//!
//! ## 엔드포인트
//! - `GET    /api/session/{code}/files`     → 파일 색인
//! - `POST   /api/session/{code}/upload`    → multipart 업로드 (필드 이름 `file`)
//! - `POST   /api/session/{code}/save-note` → 텍스트를 `.txt` 파일로 저장
//! - `GET    /api/session/{code}/file/{id}` → 다운로드
//! - `DELETE /api/session/{code}/file/{id}` → 삭제
//!
//! 색인이 바뀌는 요청은 성공 후 방에 `files:update`를 보냅니다.
//! 클라이언트는 이 알림을 받으면 목록을 다시 가져옵니다.

use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS},
        HeaderMap, HeaderValue,
    },
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tokio::fs;
use tokio_util::io::ReaderStream;

use crate::{
    error::AppError,
    models::*,
    routes::sessions::{parse_code, AppState},
    services::files::DEFAULT_MIMETYPE,
};

/// multipart에서 파일을 담는 필드 이름
pub const UPLOAD_FIELD: &str = "file";

/// `GET /api/session/{code}/files` — 세션이 없으면 만든 뒤 색인을 반환합니다.
pub async fn list_files(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Value>, AppError> {
    let code = parse_code(&code)?;
    let files = state.files.list_files(&code).await?;
    Ok(Json(json!({ "files": files })))
}

/// `POST /api/session/{code}/upload`
///
/// 본문 전체를 메모리에 올리지 않고 청크 단위로 디스크에 씁니다.
/// `file` 이외의 필드는 건너뜁니다.
pub async fn upload_file(
    State(state): State<AppState>,
    Path(code): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let code = parse_code(&code)?;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let original_name = field.file_name().unwrap_or(UPLOAD_FIELD).to_string();
        let mimetype = field.content_type().unwrap_or(DEFAULT_MIMETYPE).to_string();

        let record = state
            .files
            .receive_upload(&code, &original_name, &mimetype, field, state.config.max_upload_bytes)
            .await?;
        state.realtime.notify(&code, ServerEvent::FilesUpdate);
        return Ok(Json(json!({ "ok": true, "file": record })));
    }

    Err(AppError::BadRequest("No file provided".into()))
}

/// `POST /api/session/{code}/save-note`
pub async fn save_note(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<SaveNoteRequest>,
) -> Result<Json<Value>, AppError> {
    let code = parse_code(&code)?;
    let text = body.text.unwrap_or_default();
    let record = state
        .files
        .save_note(&code, &text, body.filename.as_deref())
        .await?;
    state.realtime.notify(&code, ServerEvent::FilesUpdate);
    Ok(Json(json!({ "ok": true, "file": record })))
}

/// `GET /api/session/{code}/file/{id}` — 파일 바이트를 스트리밍합니다.
///
/// 이미지는 미리보기를 위해 원래 MIME 타입으로 inline 전송하고,
/// 그 밖의 파일은 `application/octet-stream` 첨부파일로 보냅니다.
pub async fn download_file(
    State(state): State<AppState>,
    Path((code, id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let code = parse_code(&code)?;
    let target = state.files.download_target(&code, &id).await?;

    let file = fs::File::open(&target.path).await?;
    let len = file.metadata().await?.len();

    let mut headers = download_headers(target.record.as_ref(), &target.id)?;
    headers.insert(CONTENT_LENGTH, HeaderValue::from(len));

    let body = Body::from_stream(ReaderStream::new(file));
    Ok((headers, body).into_response())
}

/// `DELETE /api/session/{code}/file/{id}`
pub async fn delete_file(
    State(state): State<AppState>,
    Path((code, id)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    let code = parse_code(&code)?;
    state.files.delete_file(&code, &id).await?;
    state.realtime.notify(&code, ServerEvent::FilesUpdate);
    Ok(Json(json!({ "ok": true })))
}

fn download_headers(record: Option<&FileRecord>, id: &str) -> Result<HeaderMap, AppError> {
    let mut headers = HeaderMap::new();
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));

    let image_type = record
        .map(|r| r.mimetype.as_str())
        .filter(|m| m.to_ascii_lowercase().starts_with("image/"));

    match image_type {
        Some(mimetype) => {
            let value = HeaderValue::from_str(mimetype)
                .map_err(|e| AppError::Internal(format!("Invalid stored mimetype: {e}")))?;
            headers.insert(CONTENT_TYPE, value);
        }
        None => {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(DEFAULT_MIMETYPE));
            let disposition = format!("attachment; filename=\"{}\"", attachment_name(record, id));
            // 비 ASCII 파일 이름도 그대로 보냅니다 (obs-text 허용).
            let value = HeaderValue::from_bytes(disposition.as_bytes())
                .map_err(|e| AppError::Internal(format!("Invalid attachment name: {e}")))?;
            headers.insert(CONTENT_DISPOSITION, value);
        }
    }
    Ok(headers)
}

/// 첨부파일 이름: 원래 이름 → ID의 첫 `_` 앞부분 → `download`
fn attachment_name(record: Option<&FileRecord>, id: &str) -> String {
    let raw = match record {
        Some(r) => r.original_name.as_str(),
        None => id.split('_').next().unwrap_or_default(),
    };
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '\r' | '\n' | '"' | '\'') && !c.is_control())
        .collect();
    if cleaned.is_empty() {
        "download".to_string()
    } else {
        cleaned
    }
}
