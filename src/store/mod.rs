//! # 저장소 계층
//!
//! 세션 문서의 읽기/쓰기를 담당합니다.
//! 라우트 핸들러와 실시간 라우터는 문서를 직접 고치지 않고
//! 이 모듈의 `DocumentStore`를 통해서만 접근합니다.

pub mod documents;

pub use documents::*;
