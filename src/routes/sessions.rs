//! # 세션 라우트 핸들러
//!
//! ## 엔드포인트
//! - `PUT    /api/session/{code}`        → 세션 보장 (없으면 생성)
//! - `PUT    /api/session/{code}/public` → 공개 여부 변경
//! - `GET    /api/public-sessions`       → 공개 세션 목록
//! - `DELETE /api/session/{code}`        → 세션 전체 삭제
//!
//! 공개 여부 변경과 삭제는 같은 세션의 WebSocket 방에도 알립니다.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use crate::{
    config::Config,
    error::AppError,
    models::*,
    realtime::{EventRouter, PresenceTracker},
    services::{files::FileService, quota::QuotaGuard},
    store::DocumentStore,
};

/// 공개 세션 목록의 최대 길이
pub const MAX_PUBLIC_SESSIONS: usize = 200;

/// 애플리케이션 공유 상태
///
/// 모든 요청 핸들러가 `State(state): State<AppState>`로 접근합니다.
/// 필드들은 모두 clone 비용이 작습니다 (경로, Arc).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: DocumentStore,
    pub files: FileService,
    /// WebSocket 방으로 알림을 보낼 때 사용합니다.
    pub realtime: EventRouter,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let store = DocumentStore::new(&config.data_dir);
        let quota = QuotaGuard::new(config.session_quota_bytes, config.upgrade_url.clone());
        let presence = Arc::new(PresenceTracker::new());
        Self {
            files: FileService::new(store.clone(), quota),
            realtime: EventRouter::new(store.clone(), presence),
            store,
            config: Arc::new(config),
        }
    }
}

/// URL 경로의 세션 코드를 정제합니다. 남는 문자가 없으면 400.
pub fn parse_code(raw: &str) -> Result<SessionCode, AppError> {
    SessionCode::parse(raw).ok_or_else(|| AppError::BadRequest("Invalid session code".into()))
}

/// `PUT /api/session/{code}` — 세션을 보장하고 만료 정보를 반환합니다.
pub async fn ensure_session(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<EnsureSessionResponse>, AppError> {
    let code = parse_code(&code)?;
    let doc = state.store.ensure(&code).await?;
    Ok(Json(EnsureSessionResponse {
        ok: true,
        expires_at: doc.expires_at(state.config.session_ttl_ms()),
        created_at: doc.created_at,
        public: doc.is_public,
        code,
    }))
}

/// `PUT /api/session/{code}/public` — 공개 여부를 바꾸고 방에 `session:public`을 보냅니다.
pub async fn set_session_public(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<TogglePublicRequest>,
) -> Result<Json<Value>, AppError> {
    let code = parse_code(&code)?;
    state.store.ensure(&code).await?;
    let doc = state
        .store
        .mutate(&code, |doc| doc.is_public = body.public)
        .await?;

    state
        .realtime
        .notify(&code, ServerEvent::SessionPublic { public: doc.is_public });
    tracing::info!(session = %code, public = doc.is_public, "Changed session visibility");
    Ok(Json(json!({ "ok": true, "public": doc.is_public })))
}

/// `GET /api/public-sessions` — 만료되지 않은 공개 세션 목록 (최신순, 최대 200개)
///
/// 읽을 수 없는 세션 문서는 목록에서 빠집니다.
pub async fn list_public_sessions(
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let ttl = state.config.session_ttl_ms();
    let now = Utc::now().timestamp_millis();

    let mut sessions = Vec::new();
    for code in state.store.list_sessions().await? {
        let doc = match state.store.load(&code).await {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(session = %code, "Skipping unreadable session: {}", e);
                continue;
            }
        };
        if !doc.is_public || doc.is_expired(ttl, now) {
            continue;
        }
        sessions.push(PublicSessionSummary {
            expires_at: doc.expires_at(ttl),
            created_at: doc.created_at,
            code,
        });
    }

    sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    sessions.truncate(MAX_PUBLIC_SESSIONS);
    Ok(Json(json!({ "sessions": sessions })))
}

/// `DELETE /api/session/{code}` — 세션 디렉토리를 통째로 지우고 방에 `session:deleted`를 보냅니다.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Value>, AppError> {
    let code = parse_code(&code)?;
    state.store.delete(&code).await?;
    state.realtime.notify(&code, ServerEvent::SessionDeleted);
    Ok(Json(json!({ "ok": true })))
}
