//! # 서비스 계층
//!
//! 라우트와 실시간 라우터가 공유하는 기능들입니다.
//! - `cleanup`: 만료 세션 정리 작업
//! - `files`: 업로드/노트 파일 저장과 삭제
//! - `fs`: 원자적 JSON 저장, 디렉토리 크기 계산
//! - `quota`: 세션 용량 한도 검사
//! - `sanitize`: 입력 정제 유틸리티

pub mod cleanup;
pub mod files;
pub mod fs;
pub mod quota;
pub mod sanitize;
