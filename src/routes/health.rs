//! # 헬스체크(Health Check) 핸들러
//!
//! ## 엔드포인트
//! - `GET /healthz` → `{ "ok": true }`
//!
//! 리버스 프록시나 컨테이너 오케스트레이터가 서버 상태를 확인할 때 사용합니다.

use axum::Json;
use serde_json::{json, Value};

/// `GET /healthz` — 고정된 JSON만 반환하며 실패하지 않습니다.
pub async fn health_check() -> Json<Value> {
    Json(json!({ "ok": true }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_ok() {
        let Json(body) = health_check().await;
        assert_eq!(body, json!({ "ok": true }));
    }
}
