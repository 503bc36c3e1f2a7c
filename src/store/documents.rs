//! # 세션 문서 저장소
//!
//! 세션 하나 = 디렉토리 하나입니다:
//!
//! ```text
//! {DATA_DIR}/
//!   ABC123/
//!     meta.json        ← SessionDocument
//!     files/           ← 업로드된 파일 (이름 = FileRecord.id)
//! ```
//!
//! ## 동시성
//! `mutate()`는 매번 독립적으로 읽기 → 수정 → 저장을 수행하며 잠금을 걸지 않습니다.
//! 같은 세션에 대한 두 mutate가 겹치면 **나중에 저장한 쪽이 파일 전체를 덮어씁니다**
//! (필드 단위가 아니라 파일 단위의 last-writer-wins).
//! 저장 자체는 원자적이므로 반쯤 쓰인 문서가 보이는 일은 없습니다.

use std::path::PathBuf;

use chrono::Utc;
use tokio::fs;

use crate::error::AppError;
use crate::models::{SessionCode, SessionDocument};
use crate::services::fs::{ensure_dir, read_json, write_json_atomic};

pub const DOCUMENT_FILE: &str = "meta.json";
pub const FILES_DIR: &str = "files";

/// 세션 문서 저장소
///
/// 데이터 루트 경로만 들고 있으므로 clone 비용이 작습니다.
/// 핸들러와 실시간 라우터가 각각 clone해서 사용합니다.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 세션 디렉토리 경로
    pub fn session_dir(&self, code: &SessionCode) -> PathBuf {
        self.root.join(code.as_str())
    }

    /// 업로드 파일 디렉토리 경로
    pub fn files_dir(&self, code: &SessionCode) -> PathBuf {
        self.session_dir(code).join(FILES_DIR)
    }

    /// 세션 문서(meta.json) 경로
    pub fn document_path(&self, code: &SessionCode) -> PathBuf {
        self.session_dir(code).join(DOCUMENT_FILE)
    }

    pub async fn exists(&self, code: &SessionCode) -> Result<bool, AppError> {
        Ok(fs::try_exists(self.document_path(code)).await?)
    }

    /// 세션이 없으면 기본 문서로 만들고, 현재 문서를 반환합니다.
    ///
    /// 이미 있는 세션은 건드리지 않으므로 `createdAt`은 처음 생성된 값 그대로입니다.
    pub async fn ensure(&self, code: &SessionCode) -> Result<SessionDocument, AppError> {
        ensure_dir(&self.files_dir(code)).await?;

        let path = self.document_path(code);
        if !fs::try_exists(&path).await? {
            let doc = SessionDocument::new(Utc::now().timestamp_millis());
            write_json_atomic(&path, &doc).await?;
            tracing::info!(session = %code, "Created session");
            return Ok(doc);
        }
        self.load(code).await
    }

    /// 세션 문서를 읽습니다.
    ///
    /// - 세션이 없으면 `AppError::NotFound`
    /// - 문서가 손상되었으면 `AppError::CorruptDocument` (복구하지 않음)
    pub async fn load(&self, code: &SessionCode) -> Result<SessionDocument, AppError> {
        read_json(&self.document_path(code)).await
    }

    /// 문서를 원자적으로 저장합니다.
    pub async fn store(&self, code: &SessionCode, doc: &SessionDocument) -> Result<(), AppError> {
        write_json_atomic(&self.document_path(code), doc).await
    }

    /// 읽기 → `f` 적용 → 저장 후, 저장된 문서를 반환합니다.
    pub async fn mutate<F>(&self, code: &SessionCode, f: F) -> Result<SessionDocument, AppError>
    where
        F: FnOnce(&mut SessionDocument),
    {
        self.mutate_with(code, |doc| {
            f(doc);
            doc.clone()
        })
        .await
    }

    /// `mutate()`와 같지만 클로저의 반환값을 돌려줍니다.
    ///
    /// 클로저 안에서 만든 값(정규화된 채팅 메시지 등)을 호출자에게 넘길 때 사용합니다.
    pub async fn mutate_with<F, T>(&self, code: &SessionCode, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut SessionDocument) -> T,
    {
        let mut doc = self.load(code).await?;
        let out = f(&mut doc);
        self.store(code, &doc).await?;
        Ok(out)
    }

    /// 세션 디렉토리를 통째로 삭제합니다. 세션이 없으면 `NotFound`.
    pub async fn delete(&self, code: &SessionCode) -> Result<(), AppError> {
        let dir = self.session_dir(code);
        if !fs::try_exists(&dir).await? {
            return Err(AppError::NotFound);
        }
        fs::remove_dir_all(&dir).await?;
        tracing::info!(session = %code, "Deleted session");
        Ok(())
    }

    /// 문서 파일이 있는 모든 세션 코드를 나열합니다.
    ///
    /// 정리 작업과 공개 세션 목록이 이 목록을 순회합니다.
    /// 세션 코드 규칙에 맞지 않는 디렉토리 이름은 건너뜁니다.
    pub async fn list_sessions(&self) -> Result<Vec<SessionCode>, AppError> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut codes = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(code) = SessionCode::parse(&name) else {
                continue;
            };
            // 정제 후 이름이 달라지는 디렉토리는 세션 디렉토리가 아닙니다.
            if code.as_str() != name {
                continue;
            }
            if fs::try_exists(entry.path().join(DOCUMENT_FILE)).await? {
                codes.push(code);
            }
        }
        codes.sort();
        Ok(codes)
    }
}
