//! # 업로드 파일 서비스
//!
//! 파일 바이트는 `{세션}/files/{id}`에, 색인은 세션 문서의 `files`에 있습니다.
//! 이 모듈이 둘을 함께 갱신합니다:
//!
//! - 저장: 바이트 쓰기 → 용량 검사(초과 시 바이트 삭제) → 색인 추가
//! - 삭제: 색인 제거 → 바이트 삭제

use std::path::{Path, PathBuf};

use axum::body::Bytes;
use chrono::Utc;
use futures_util::{Stream, StreamExt};
use rand_core::{OsRng, RngCore};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::AppError;
use crate::models::{FileRecord, SessionCode};
use crate::services::quota::QuotaGuard;
use crate::services::sanitize::{
    is_safe_char, replace_unsafe_runs, safe_basename, to_base36, truncate_chars, BASE36_DIGITS,
};
use crate::store::DocumentStore;

pub const MAX_EXTENSION_LEN: usize = 16;
pub const MAX_STEM_LEN: usize = 120;
pub const MAX_NOTE_NAME_LEN: usize = 128;
pub const NOTE_MIMETYPE: &str = "text/plain";
pub const DEFAULT_MIMETYPE: &str = "application/octet-stream";

#[derive(Debug, Clone)]
pub struct FileService {
    store: DocumentStore,
    quota: QuotaGuard,
}

/// 다운로드할 파일의 위치와 (있다면) 색인 정보
#[derive(Debug)]
pub struct DownloadTarget {
    pub path: PathBuf,
    pub id: String,
    pub record: Option<FileRecord>,
}

impl FileService {
    pub fn new(store: DocumentStore, quota: QuotaGuard) -> Self {
        Self { store, quota }
    }

    /// 세션의 파일 색인을 반환합니다. 세션이 없으면 만듭니다.
    pub async fn list_files(&self, code: &SessionCode) -> Result<Vec<FileRecord>, AppError> {
        Ok(self.store.ensure(code).await?.files)
    }

    /// 업로드를 시작합니다: 세션을 보장하고 새 파일 ID와 저장 경로를 돌려줍니다.
    ///
    /// 호출자는 이 경로에 바이트를 쓴 다음 [`FileService::commit`]을 호출해야 합니다.
    pub async fn begin_upload(
        &self,
        code: &SessionCode,
        original_name: &str,
    ) -> Result<(String, PathBuf), AppError> {
        self.store.ensure(code).await?;
        let id = upload_file_id(original_name, Utc::now().timestamp_millis(), &random_suffix());
        let path = self.store.files_dir(code).join(&id);
        Ok((id, path))
    }

    /// 이미 디스크에 쓰인 파일을 용량 검사 후 색인에 등록합니다.
    ///
    /// 용량 초과나 색인 저장 실패 시 파일을 지우고 에러를 반환합니다.
    pub async fn commit(
        &self,
        code: &SessionCode,
        id: &str,
        original_name: &str,
        mimetype: &str,
    ) -> Result<FileRecord, AppError> {
        let path = self.store.files_dir(code).join(id);
        match self.register(code, id, original_name, mimetype, &path).await {
            Ok(record) => Ok(record),
            Err(e) => {
                remove_if_exists(&path).await;
                Err(e)
            }
        }
    }

    async fn register(
        &self,
        code: &SessionCode,
        id: &str,
        original_name: &str,
        mimetype: &str,
        path: &Path,
    ) -> Result<FileRecord, AppError> {
        self.quota.check_within_quota(&self.store.session_dir(code)).await?;

        let size = fs::metadata(path).await?.len();
        let record = FileRecord {
            id: id.to_string(),
            original_name: original_name.to_string(),
            size,
            mimetype: mimetype.to_string(),
            uploaded_at: Utc::now().timestamp_millis(),
        };
        let stored = record.clone();
        self.store.mutate(code, move |doc| doc.add_file(stored)).await?;
        tracing::info!(session = %code, file = %record.id, size = record.size, "Stored file");
        Ok(record)
    }

    /// 청크 스트림(multipart 필드 등)을 업로드 파일로 받아 저장합니다.
    ///
    /// 누적 크기가 `limit`를 넘으면 쓰던 파일을 지우고 `PayloadTooLarge`를 반환합니다.
    pub async fn receive_upload<S, E>(
        &self,
        code: &SessionCode,
        original_name: &str,
        mimetype: &str,
        chunks: S,
        limit: u64,
    ) -> Result<FileRecord, AppError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        AppError: From<E>,
    {
        let (id, path) = self.begin_upload(code, original_name).await?;
        if let Err(e) = write_chunks(&path, chunks, limit).await {
            remove_if_exists(&path).await;
            return Err(e);
        }
        self.commit(code, &id, original_name, mimetype).await
    }

    /// 메모리에 이미 있는 바이트를 업로드 파일로 저장합니다.
    pub async fn store_uploaded_bytes(
        &self,
        code: &SessionCode,
        original_name: &str,
        mimetype: &str,
        bytes: &[u8],
    ) -> Result<FileRecord, AppError> {
        let chunk = Bytes::copy_from_slice(bytes);
        let chunks = futures_util::stream::iter([Ok::<_, AppError>(chunk)]);
        self.receive_upload(code, original_name, mimetype, chunks, u64::MAX).await
    }

    /// 텍스트 노트를 `.txt` 파일로 저장합니다.
    ///
    /// 파일 이름을 주지 않으면 `note_<ISO 시각>.txt`를 사용합니다.
    pub async fn save_note(
        &self,
        code: &SessionCode,
        text: &str,
        filename: Option<&str>,
    ) -> Result<FileRecord, AppError> {
        self.store.ensure(code).await?;

        let now = Utc::now();
        let preferred: String = filename
            .unwrap_or_default()
            .chars()
            .filter(|c| *c != '/' && *c != '\\')
            .take(MAX_NOTE_NAME_LEN)
            .collect();
        let base_name = if preferred.is_empty() {
            format!("note_{}.txt", now.format("%Y-%m-%dT%H-%M-%S-%3fZ"))
        } else {
            preferred
        };

        let id = note_file_id(&base_name, now.timestamp_millis(), &random_suffix());
        let path = self.store.files_dir(code).join(&id);
        fs::write(&path, text.as_bytes()).await?;
        self.commit(code, &id, &base_name, NOTE_MIMETYPE).await
    }

    /// 색인 항목과 실제 파일을 함께 삭제합니다.
    ///
    /// 세션이 없으면 `NotFound`. 색인에 없는 ID라도 바이트가 남아 있으면 지웁니다.
    pub async fn delete_file(&self, code: &SessionCode, id: &str) -> Result<(), AppError> {
        let id = stored_file_id(id).ok_or(AppError::NotFound)?;
        let target = id.clone();
        self.store.mutate(code, move |doc| {
            doc.remove_file(&target);
        })
        .await?;
        remove_if_exists(&self.store.files_dir(code).join(&id)).await;
        tracing::info!(session = %code, file = %id, "Deleted file");
        Ok(())
    }

    /// 다운로드 대상 파일을 찾습니다.
    ///
    /// 바이트가 없으면 `NotFound`. 색인 조회 실패는 무시하고 `record: None`으로 둡니다.
    pub async fn download_target(
        &self,
        code: &SessionCode,
        id: &str,
    ) -> Result<DownloadTarget, AppError> {
        let id = stored_file_id(id).ok_or(AppError::NotFound)?;
        let path = self.store.files_dir(code).join(&id);
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(AppError::NotFound),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(AppError::NotFound),
            Err(e) => return Err(e.into()),
        }
        let record = match self.store.load(code).await {
            Ok(doc) => doc.find_file(&id).cloned(),
            Err(e) => {
                tracing::debug!(session = %code, "No file index for download: {}", e);
                None
            }
        };
        Ok(DownloadTarget { path, id, record })
    }
}

/// 요청 경로의 파일 ID를 정제합니다. `.`과 `..`은 `files/` 밖을 가리키므로 거부합니다.
fn stored_file_id(raw: &str) -> Option<String> {
    let id = safe_basename(raw);
    match id.as_str() {
        "" | "." | ".." => None,
        _ => Some(id),
    }
}

/// 업로드 파일 ID를 만듭니다.
///
/// `<정제된 이름>_<epoch ms 36진수>_<랜덤 6자><확장자>`
///
/// - 확장자: 최대 16자, `[.A-Za-z0-9_-]`만 유지
/// - 이름: 공백 압축, 안전하지 않은 문자 구간은 `-`로, 최대 120자, 비면 `file`
pub fn upload_file_id(original_name: &str, now_ms: i64, suffix: &str) -> String {
    // 경로 구분자 앞부분은 버립니다 (basename).
    let raw: String = original_name
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| *c != '\\')
        .collect();

    let (stem, ext) = split_extension(&raw);
    let ext: String = ext
        .chars()
        .take(MAX_EXTENSION_LEN)
        .filter(|c| is_safe_char(*c))
        .collect();

    let stem = stem.split_whitespace().collect::<Vec<_>>().join(" ");
    let stem = truncate_chars(&replace_unsafe_runs(&stem, '-'), MAX_STEM_LEN);
    let stem = if stem.is_empty() { "file".to_string() } else { stem };

    format!("{stem}_{}_{suffix}{ext}", to_base36(now_ms.max(0) as u64))
}

/// 노트 파일 ID: `<정제된 이름>_<epoch ms 36진수>_<랜덤 6자>`
pub fn note_file_id(base_name: &str, now_ms: i64, suffix: &str) -> String {
    let name = truncate_chars(&replace_unsafe_runs(base_name, '-'), MAX_STEM_LEN);
    let name = if name.is_empty() { "note".to_string() } else { name };
    format!("{name}_{}_{suffix}", to_base36(now_ms.max(0) as u64))
}

/// 6자리 36진수 랜덤 문자열
pub fn random_suffix() -> String {
    let mut bytes = [0u8; 6];
    OsRng.fill_bytes(&mut bytes);
    bytes
        .iter()
        .map(|b| BASE36_DIGITS[(*b % 36) as usize] as char)
        .collect()
}

/// 파일 이름을 (이름, 확장자)로 나눕니다. 맨 앞의 `.`은 확장자로 보지 않습니다.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}

async fn write_chunks<S, E>(path: &Path, chunks: S, limit: u64) -> Result<u64, AppError>
where
    S: Stream<Item = Result<Bytes, E>>,
    AppError: From<E>,
{
    let mut chunks = std::pin::pin!(chunks);
    let mut file = fs::File::create(path).await?;
    let mut written: u64 = 0;
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        written += chunk.len() as u64;
        if written > limit {
            return Err(AppError::PayloadTooLarge { limit });
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(written)
}

async fn remove_if_exists(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}
