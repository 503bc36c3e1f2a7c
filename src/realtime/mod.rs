//! # 실시간 협업 계층
//!
//! - `presence`: 세션별 접속자 목록
//! - `rooms`: 세션별 연결 송신 채널 (브로드캐스트 대상)
//! - `router`: 클라이언트 이벤트 처리와 전달 범위 결정
//! - `socket`: WebSocket 프레임 읽기/쓰기 루프

pub mod presence;
pub mod rooms;
pub mod router;
pub mod socket;

pub use presence::PresenceTracker;
pub use router::EventRouter;
