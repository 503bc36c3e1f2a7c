//! # 접속자(Presence) 모델
//!
//! 접속자 정보는 저장되지 않습니다. 서버가 재시작되면 모두 사라집니다.

use std::fmt;

use serde::Serialize;

use crate::services::sanitize::{non_empty_truncated, normalize_color, truncate_chars};

pub const MAX_USER_ID_LEN: usize = 64;
pub const MAX_NAME_LEN: usize = 50;

/// 서버가 WebSocket 연결마다 부여하는 ID
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().simple().to_string())
    }

    /// ID 끝 6자. 사용자 ID가 없을 때 기본 ID를 만드는 데 씁니다.
    pub fn short(&self) -> &str {
        let start = self.0.len().saturating_sub(6);
        &self.0[start..]
    }
}

impl From<&str> for ConnectionId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 접속자 목록의 한 항목
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEntry {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl PresenceEntry {
    /// join 요청 값으로 항목을 만듭니다.
    ///
    /// 사용자 ID가 비어 있으면 `u_<연결 ID 끝 6자>`를 사용합니다.
    pub fn from_join(
        connection: &ConnectionId,
        user_id: Option<&str>,
        name: Option<&str>,
        color: Option<&str>,
    ) -> Self {
        let user_id = truncate_chars(user_id.unwrap_or_default(), MAX_USER_ID_LEN);
        let user_id = if user_id.is_empty() {
            format!("u_{}", connection.short())
        } else {
            user_id
        };
        Self {
            user_id,
            name: non_empty_truncated(name, MAX_NAME_LEN),
            color: normalize_color(color),
        }
    }

    /// `presence:set`: 이름과 색상을 통째로 교체합니다. 사용자 ID는 유지됩니다.
    pub fn apply(&mut self, patch: &PresencePatch) {
        self.name = non_empty_truncated(patch.name.as_deref(), MAX_NAME_LEN);
        self.color = normalize_color(patch.color.as_deref());
    }
}

/// 프로필 변경 요청
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct PresencePatch {
    #[serde(default, deserialize_with = "crate::models::lenient::opt_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "crate::models::lenient::opt_text")]
    pub color: Option<String>,
}
