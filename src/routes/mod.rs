//! # 라우트 핸들러 모듈
//!
//! HTTP 요청을 처리하는 핸들러 함수들을 모아둔 모듈입니다.
//!
//! 각 하위 모듈:
//! - `files`: 업로드, 노트 저장, 다운로드, 삭제
//! - `health`: 서버 상태 확인 (헬스체크)
//! - `sessions`: 세션 보장/공개 설정/목록/삭제, 공유 상태(`AppState`)
//! - `socket`: WebSocket 업그레이드

pub mod files;
pub mod health;
pub mod sessions;
pub mod socket;

// main.rs에서 `routes::ensure_session`처럼 바로 접근할 수 있게 재공개합니다.
pub use files::*;
pub use health::*;
pub use sessions::*;
pub use socket::*;
