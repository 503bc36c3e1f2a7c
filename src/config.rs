//! # 애플리케이션 설정(Configuration) 모듈
//!
//! 환경변수에서 서버 설정값을 읽어오는 모듈입니다.
//! `.env` 파일이나 시스템 환경변수에서 값을 가져옵니다.
//!
//! 설정 항목:
//! - `HOST` / `PORT`: 서버 바인딩 주소와 포트
//! - `DATA_DIR`: 세션 디렉토리들이 저장되는 루트 경로
//! - `SESSION_TTL_DAYS`: 세션 수명 (일)
//! - `SESSION_QUOTA_BYTES`: 세션당 저장 용량 한도 (바이트)
//! - `MAX_UPLOAD_BYTES`: 업로드 한 건의 최대 크기 (바이트)
//! - `UPGRADE_URL`: 용량 초과 시 안내할 링크 (`PAYPAL_URL`도 인식)
//! - `BASE_PATH`: 리버스 프록시 하위 경로 (예: `/quickshare-chat`)
//! - `PUBLIC_DIR`: 정적 클라이언트 파일 디렉토리

use std::env;
use std::str::FromStr;

/// 하루를 밀리초로 표현한 값
pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// 애플리케이션 전체 설정을 담는 구조체
///
/// 서버 시작 시 환경변수에서 한 번 읽어온 후,
/// 애플리케이션 전체에서 공유됩니다.
#[derive(Debug, Clone)]
pub struct Config {
    /// 서버가 바인딩할 호스트 주소 (기본값: "0.0.0.0")
    pub host: String,
    /// 서버 포트 번호 (기본값: 3900)
    pub port: u16,
    /// 세션 데이터 루트 디렉토리 (기본값: "./data")
    pub data_dir: String,
    /// 세션 수명(일). 만료 계산과 정리 작업에 사용됩니다.
    pub session_ttl_days: i64,
    /// 세션 디렉토리 하나가 차지할 수 있는 최대 바이트 수 (기본값: 5 GiB)
    pub session_quota_bytes: u64,
    /// 업로드 한 건의 최대 바이트 수 (기본값: 500 MiB)
    pub max_upload_bytes: u64,
    /// 용량 초과 응답에 실어 보내는 안내 링크
    pub upgrade_url: String,
    /// 하위 경로 접두사. 끝의 `/`는 제거된 상태로 저장됩니다.
    pub base_path: String,
    /// 정적 클라이언트 파일 디렉토리
    pub public_dir: String,
}

impl Config {
    /// 환경변수에서 설정값을 읽어 Config 인스턴스를 생성합니다.
    ///
    /// 모든 항목에 기본값이 있으므로 실패하지 않습니다.
    /// 숫자 항목을 파싱할 수 없으면 기본값을 사용합니다.
    pub fn from_env() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_or("PORT", 3900),
            data_dir: env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string()),
            session_ttl_days: parse_or("SESSION_TTL_DAYS", 7),
            session_quota_bytes: parse_or("SESSION_QUOTA_BYTES", 5 * 1024 * 1024 * 1024),
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", 500 * 1024 * 1024),
            // or_else: 첫 번째 변수가 없으면 두 번째 변수를 시도합니다.
            upgrade_url: env::var("UPGRADE_URL")
                .or_else(|_| env::var("PAYPAL_URL"))
                .unwrap_or_else(|_| "https://example.com/upgrade".to_string()),
            base_path: normalize_base_path(&env::var("BASE_PATH").unwrap_or_default()),
            public_dir: env::var("PUBLIC_DIR").unwrap_or_else(|_| "./public".to_string()),
        }
    }

    /// 세션 수명을 밀리초로 반환합니다.
    pub fn session_ttl_ms(&self) -> i64 {
        self.session_ttl_days * DAY_MS
    }
}

/// 환경변수를 읽어 `T`로 파싱하고, 없거나 잘못된 값이면 `default`를 반환합니다.
///
/// 제네릭 `T: FromStr`: 문자열에서 파싱할 수 있는 모든 타입(u16, i64, u64 ...)에 사용 가능
fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

/// `BASE_PATH` 끝의 `/`를 하나 제거하고, 앞에 `/`가 없으면 붙입니다.
/// (`"/app/"` → `"/app"`, `"app"` → `"/app"`, `"/"` → `""`)
fn normalize_base_path(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
    if trimmed.is_empty() || trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_path_drops_trailing_slash() {
        assert_eq!(normalize_base_path("/quickshare-chat/"), "/quickshare-chat");
        assert_eq!(normalize_base_path("/quickshare-chat"), "/quickshare-chat");
        assert_eq!(normalize_base_path("/"), "");
        assert_eq!(normalize_base_path(""), "");
        assert_eq!(normalize_base_path("app/"), "/app");
    }

    #[test]
    fn unparsable_number_falls_back_to_default() {
        env::set_var("QUICKSHARE_TEST_PORT", "not-a-port");
        assert_eq!(parse_or::<u16>("QUICKSHARE_TEST_PORT", 3900), 3900);
        env::set_var("QUICKSHARE_TEST_PORT", " 4100 ");
        assert_eq!(parse_or::<u16>("QUICKSHARE_TEST_PORT", 3900), 4100);
        env::remove_var("QUICKSHARE_TEST_PORT");
    }
}
