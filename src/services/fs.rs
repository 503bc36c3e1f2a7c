//! # 파일시스템 I/O 서비스
//!
//! - `write_json_atomic()`: 임시 파일에 쓴 뒤 rename으로 교체 (원자적 저장)
//! - `read_json()`: JSON 파일을 읽어 역직렬화
//! - `directory_size()`: 디렉토리 하위 모든 파일 크기의 합

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::AppError;

/// 값을 JSON으로 직렬화해 `path`에 원자적으로 저장합니다.
///
/// 1. 같은 디렉토리에 고유한 이름의 임시 파일(`meta.json.<uuid>.tmp`)을 씁니다.
/// 2. `sync_all()`로 디스크에 내려보냅니다.
/// 3. `rename()`으로 원래 경로를 덮어씁니다.
///
/// rename은 같은 파일시스템 안에서 원자적이므로, 읽는 쪽은 항상
/// 이전 버전 전체 또는 새 버전 전체만 보게 됩니다.
/// 임시 파일 이름이 쓰기마다 다르므로 동시에 저장해도 서로의 임시 파일을 덮지 않습니다.
pub async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), AppError> {
    let payload = serde_json::to_vec_pretty(value)
        .map_err(|e| AppError::Internal(format!("failed to encode {}: {e}", path.display())))?;

    let tmp_path = temp_sibling(path);
    let result: std::io::Result<()> = async {
        // tokio::fs::File: 비동기 파일 핸들
        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(&payload).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp_path, path).await
    }
    .await;

    if let Err(e) = result {
        // 실패한 임시 파일은 남기지 않습니다.
        let _ = fs::remove_file(&tmp_path).await;
        return Err(e.into());
    }
    Ok(())
}

/// JSON 파일을 읽어 `T`로 역직렬화합니다.
///
/// - 파일이 없으면 `AppError::NotFound`
/// - 파싱에 실패하면 `AppError::CorruptDocument`
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let raw = match fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(AppError::NotFound),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_slice(&raw).map_err(|source| AppError::CorruptDocument {
        path: path.to_path_buf(),
        source,
    })
}

/// 디렉토리를 (중간 경로까지) 생성합니다. 이미 있으면 아무 일도 하지 않습니다.
pub async fn ensure_dir(path: &Path) -> Result<(), AppError> {
    fs::create_dir_all(path).await?;
    Ok(())
}

/// 디렉토리 하위 모든 파일의 크기 합(바이트)을 재귀적으로 계산합니다.
///
/// 디렉토리가 없으면 0을 반환합니다. 순회 중 사라진 파일은 건너뜁니다.
/// 재귀 대신 스택을 사용합니다 (async 함수는 직접 재귀 호출할 수 없습니다).
pub async fn directory_size(root: &Path) -> Result<u64, AppError> {
    if !fs::try_exists(root).await? {
        return Ok(0);
    }

    let mut total = 0u64;
    let mut stack: Vec<PathBuf> = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let file_type = match entry.file_type().await {
                Ok(t) => t,
                Err(_) => continue,
            };
            if file_type.is_dir() {
                stack.push(entry.path());
            } else if let Ok(meta) = entry.metadata().await {
                total += meta.len();
            }
        }
    }
    Ok(total)
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{name}.{}.tmp", uuid::Uuid::now_v7().simple()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    #[tokio::test]
    async fn atomic_write_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("meta.json");

        write_json_atomic(&path, &json!({ "generation": 1 })).await.unwrap();
        write_json_atomic(&path, &json!({ "generation": 2 })).await.unwrap();

        let value: Value = read_json(&path).await.unwrap();
        assert_eq!(value["generation"], 2);

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["meta.json".to_string()]);
    }

    #[tokio::test]
    async fn interrupted_write_never_replaces_committed_generation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("meta.json");
        write_json_atomic(&path, &json!({ "generation": 1 })).await.unwrap();

        // rename 전에 죽은 쓰기 작업은 불완전한 임시 파일만 남깁니다.
        std::fs::write(dir.path().join("meta.json.dead.tmp"), b"{\"generation\": 2, \"tr").unwrap();

        let value: Value = read_json(&path).await.unwrap();
        assert_eq!(value["generation"], 1);
    }

    #[tokio::test]
    async fn read_json_distinguishes_missing_and_corrupt() {
        let dir = TempDir::new().unwrap();
        let missing = read_json::<Value>(&dir.path().join("nope.json")).await;
        assert!(matches!(missing, Err(AppError::NotFound)));

        let corrupt_path = dir.path().join("bad.json");
        std::fs::write(&corrupt_path, b"{ not json").unwrap();
        let corrupt = read_json::<Value>(&corrupt_path).await;
        assert!(matches!(corrupt, Err(AppError::CorruptDocument { .. })));
    }

    #[tokio::test]
    async fn directory_size_walks_nested_directories() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("files/nested")).unwrap();
        std::fs::write(dir.path().join("meta.json"), vec![0u8; 10]).unwrap();
        std::fs::write(dir.path().join("files/a.bin"), vec![0u8; 100]).unwrap();
        std::fs::write(dir.path().join("files/nested/b.bin"), vec![0u8; 1000]).unwrap();

        assert_eq!(directory_size(dir.path()).await.unwrap(), 1110);
        assert_eq!(directory_size(&dir.path().join("absent")).await.unwrap(), 0);
    }
}
