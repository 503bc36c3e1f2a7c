//! # 데이터 모델 모듈
//!
//! 애플리케이션에서 사용하는 데이터 구조체(struct)들을 정의합니다.
//! 각 하위 모듈은 특정 도메인의 데이터 타입을 담당합니다:
//! - `document`: 세션 문서(표, 캔버스, 텍스트, 채팅, 파일 색인)
//! - `event`: WebSocket으로 주고받는 실시간 이벤트
//! - `lenient`: 이벤트 필드용 느슨한 serde 디코더
//! - `presence`: 접속자 정보와 연결 ID
//! - `session`: 세션 코드와 세션 HTTP API 요청/응답
//!
//! `pub use X::*;`로 재공개하여 `crate::models::SessionDocument`처럼 짧게 접근합니다.

pub mod document;
pub mod event;
pub mod lenient;
pub mod presence;
pub mod session;

pub use document::*;
pub use event::*;
pub use presence::*;
pub use session::*;
