//! # 세션 용량 한도 검사
//!
//! 쓰기 → 검사 → 초과 시 롤백 순서로 사용합니다:
//!
//! ```text
//! 1. 새 파일을 세션 디렉토리에 씁니다.
//! 2. check_within_quota(세션 디렉토리)
//! 3. Err(QuotaExceeded)이면 방금 쓴 파일을 지우고 에러를 그대로 올려보냅니다.
//! ```
//!
//! 크기는 매번 디스크에서 다시 계산합니다. 동시에 진행 중인 다른 업로드가
//! 디렉토리 크기를 바꿨을 수 있기 때문입니다.

use std::path::Path;

use crate::error::AppError;
use crate::services::fs::directory_size;

#[derive(Debug, Clone)]
pub struct QuotaGuard {
    limit_bytes: u64,
    upgrade_url: String,
}

impl QuotaGuard {
    pub fn new(limit_bytes: u64, upgrade_url: impl Into<String>) -> Self {
        Self {
            limit_bytes,
            upgrade_url: upgrade_url.into(),
        }
    }

    /// 세션 디렉토리 전체 크기가 한도 이하인지 확인합니다.
    ///
    /// 한도와 정확히 같으면 통과입니다.
    pub async fn check_within_quota(&self, session_dir: &Path) -> Result<(), AppError> {
        let used = directory_size(session_dir).await?;
        if used > self.limit_bytes {
            tracing::warn!(
                "Quota exceeded for {}: {} > {} bytes",
                session_dir.display(),
                used,
                self.limit_bytes
            );
            return Err(AppError::QuotaExceeded {
                upgrade_url: self.upgrade_url.clone(),
            });
        }
        Ok(())
    }
}
