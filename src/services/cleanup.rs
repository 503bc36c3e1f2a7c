//! # 만료 세션 정리 작업
//!
//! 서버 시작 직후 한 번, 이후 한 시간마다 실행됩니다.
//! `createdAt`이 없거나 TTL을 넘긴 세션 디렉토리를 통째로 삭제합니다.
//! 문서를 읽을 수 없는 세션은 삭제하지 않고 건너뜁니다.

use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use tokio::fs;

use crate::error::AppError;
use crate::services::fs::read_json;
use crate::store::DocumentStore;

pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// 정리 작업에 필요한 필드만 읽기 위한 구조체
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExpiryStamp {
    #[serde(default)]
    created_at: Option<i64>,
}

/// 정리 작업을 백그라운드 태스크로 시작합니다.
///
/// `tokio::time::interval`의 첫 tick은 즉시 완료되므로 시작 시 바로 한 번 실행됩니다.
pub fn spawn_cleanup(store: DocumentStore, ttl_ms: i64) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            match sweep_expired(&store, ttl_ms, Utc::now().timestamp_millis()).await {
                Ok(0) => tracing::debug!("Cleanup: no expired sessions"),
                Ok(n) => tracing::info!("Cleanup: removed {} expired session(s)", n),
                Err(e) => tracing::error!("Cleanup error: {}", e),
            }
        }
    })
}

/// 만료된 세션을 삭제하고 삭제한 개수를 반환합니다.
pub async fn sweep_expired(store: &DocumentStore, ttl_ms: i64, now_ms: i64) -> Result<usize, AppError> {
    let mut removed = 0;
    for code in store.list_sessions().await? {
        let stamp: ExpiryStamp = match read_json(&store.document_path(&code)).await {
            Ok(stamp) => stamp,
            Err(e) => {
                tracing::warn!(session = %code, "Cleanup skipped unreadable session: {}", e);
                continue;
            }
        };

        let expired = match stamp.created_at {
            Some(created_at) if created_at != 0 => now_ms - created_at > ttl_ms,
            _ => true,
        };
        if !expired {
            continue;
        }

        match fs::remove_dir_all(store.session_dir(&code)).await {
            Ok(()) => {
                tracing::info!(session = %code, "Removed expired session");
                removed += 1;
            }
            Err(e) => tracing::error!(session = %code, "Failed to remove expired session: {}", e),
        }
    }
    Ok(removed)
}
