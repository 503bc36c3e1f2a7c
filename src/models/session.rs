//! # 세션 코드와 세션 HTTP 요청/응답 모델
//!
//! 세션 코드는 세션 디렉토리 이름으로 그대로 쓰이기 때문에,
//! 어떤 조회보다도 먼저 파일시스템에 안전한 문자만 남기고 길이를 자릅니다.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::services::sanitize::safe_basename;

/// 세션 코드 최대 길이
pub const MAX_CODE_LEN: usize = 8;

/// 정제된 세션 코드
///
/// 뉴타입(newtype) 패턴: `String`을 감싸 "이미 검증된 코드"라는 의미를 타입으로 표현합니다.
/// `SessionCode`를 받는 함수는 다시 검증할 필요가 없습니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SessionCode(String);

impl SessionCode {
    /// 원시 입력에서 세션 코드를 만듭니다.
    ///
    /// `[A-Za-z0-9._-]` 외의 문자를 제거하고 8자로 자릅니다.
    /// 결과가 비어 있거나 `.`/`..`이면 `None`을 반환합니다.
    pub fn parse(raw: &str) -> Option<Self> {
        let cleaned: String = safe_basename(raw).chars().take(MAX_CODE_LEN).collect();
        match cleaned.as_str() {
            "" | "." | ".." => None,
            _ => Some(Self(cleaned)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `PUT /api/session/{code}` 응답
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsureSessionResponse {
    pub ok: bool,
    pub code: SessionCode,
    pub created_at: i64,
    pub expires_at: i64,
    pub public: bool,
}

/// `PUT /api/session/{code}/public` 요청 본문
#[derive(Debug, Default, Deserialize)]
pub struct TogglePublicRequest {
    #[serde(default)]
    pub public: bool,
}

/// 공개 세션 목록의 한 항목
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicSessionSummary {
    pub code: SessionCode,
    pub created_at: i64,
    pub expires_at: i64,
}

/// `POST /api/session/{code}/save-note` 요청 본문
#[derive(Debug, Default, Deserialize)]
pub struct SaveNoteRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}
