//! # 에러 처리 모듈
//!
//! 애플리케이션에서 발생할 수 있는 모든 에러 타입을 정의합니다.
//!
//! 에러는 두 부류로 나뉩니다:
//! - **흡수되는 에러**: 알 수 없는 세션(`NotFound`), 잘못된 입력 등.
//!   실시간 라우터는 이런 에러를 로그만 남기고 무시합니다.
//! - **드러나는 에러**: 용량 초과(`QuotaExceeded`), 손상된 문서(`CorruptDocument`).
//!   호출자가 롤백하거나 사용자에게 알려야 합니다.
//!
//! `IntoResponse` 구현으로 HTTP 핸들러에서는 에러가 자동으로 JSON 응답이 됩니다.

use std::path::PathBuf;

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// 애플리케이션에서 발생할 수 있는 모든 에러 종류
///
/// 각 에러 variant는 적절한 HTTP 상태 코드와 메시지로 변환됩니다.
#[derive(Debug, Error)]
pub enum AppError {
    /// 알 수 없는 세션 또는 파일 (HTTP 404)
    #[error("Resource not found")]
    NotFound,

    /// 잘못된 요청 (HTTP 400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// 세션 디렉토리 용량 초과 (HTTP 413)
    /// 방금 쓴 파일은 호출자가 이미 삭제한 상태여야 합니다.
    #[error("Quota exceeded")]
    QuotaExceeded { upgrade_url: String },

    /// 업로드 한 건의 크기 초과 (HTTP 413)
    #[error("File too large (limit {limit} bytes)")]
    PayloadTooLarge { limit: u64 },

    /// 저장된 세션 문서를 파싱할 수 없음 (HTTP 500)
    /// 자동 복구하지 않습니다. 해당 작업만 실패합니다.
    #[error("Corrupt session document {}: {source}", path.display())]
    CorruptDocument {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// 파일 입출력 오류 (HTTP 500)
    /// #[from]: std::io::Error → AppError::Io 자동 변환
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// multipart 본문 파싱 오류 (HTTP 400)
    #[error("Upload error: {0}")]
    Multipart(#[from] MultipartError),

    /// 서버 내부 오류 (HTTP 500)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    /// AppError를 HTTP 응답으로 변환합니다.
    ///
    /// 내부 에러(CorruptDocument, Io, Internal)는 실제 에러 내용을 로그에만 기록하고,
    /// 클라이언트에는 일반적인 메시지만 반환합니다.
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "not_found", self.to_string()),
            AppError::BadRequest(ref msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::QuotaExceeded { ref upgrade_url } => {
                // 용량 초과는 안내 링크를 함께 내려보냅니다.
                let body = Json(json!({
                    "error": {
                        "code": "quota_exceeded",
                        "message": "Quota exceeded",
                        "upgradeUrl": upgrade_url
                    }
                }));
                return (StatusCode::PAYLOAD_TOO_LARGE, body).into_response();
            }
            AppError::PayloadTooLarge { limit } => {
                let body = Json(json!({
                    "error": {
                        "code": "file_too_large",
                        "message": "File too large",
                        "limit": limit
                    }
                }));
                return (StatusCode::PAYLOAD_TOO_LARGE, body).into_response();
            }
            AppError::CorruptDocument { ref path, ref source } => {
                tracing::error!("Corrupt session document {}: {}", path.display(), source);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "corrupt_document",
                    "Session data is unreadable".to_string(),
                )
            }
            AppError::Io(ref e) => {
                tracing::error!("IO error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "io_error",
                    "An IO error occurred".to_string(),
                )
            }
            AppError::Multipart(ref e) => {
                tracing::warn!("Multipart error: {}", e);
                (StatusCode::BAD_REQUEST, "upload_error", "Upload error".to_string())
            }
            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        // 결과: { "error": { "code": "not_found", "message": "Resource not found" } }
        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(AppError::NotFound.into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::QuotaExceeded { upgrade_url: "https://example.com".into() }
                .into_response()
                .status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            AppError::BadRequest("empty code".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Internal("boom".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
