//! # 접속자 추적기
//!
//! 세션 코드 → (연결 ID, 접속자 정보) 목록. 메모리에만 존재합니다.
//! 알 수 없는 연결이나 세션에 대한 호출은 에러 없이 아무 일도 하지 않습니다.
//!
//! 목록 순서는 입장 순서입니다.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::models::{ConnectionId, PresenceEntry, PresencePatch, SessionCode};

type SessionPresence = Vec<(ConnectionId, PresenceEntry)>;

#[derive(Debug, Default)]
pub struct PresenceTracker {
    sessions: Mutex<HashMap<SessionCode, SessionPresence>>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    // 다른 스레드가 잠금을 쥔 채 패닉해도 접속자 정보는 계속 사용합니다.
    fn lock(&self) -> MutexGuard<'_, HashMap<SessionCode, SessionPresence>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 접속자를 등록합니다. 같은 연결이 이미 있으면 그 자리에서 교체합니다.
    pub fn add(&self, code: &SessionCode, connection: &ConnectionId, entry: PresenceEntry) {
        let mut sessions = self.lock();
        let list = sessions.entry(code.clone()).or_default();
        match list.iter_mut().find(|(id, _)| id == connection) {
            Some((_, existing)) => *existing = entry,
            None => list.push((connection.clone(), entry)),
        }
    }

    /// 연결의 이름/색상을 바꾸고, 바뀐 세션 코드를 반환합니다.
    pub fn update(&self, connection: &ConnectionId, patch: &PresencePatch) -> Option<SessionCode> {
        let mut sessions = self.lock();
        for (code, list) in sessions.iter_mut() {
            if let Some((_, entry)) = list.iter_mut().find(|(id, _)| id == connection) {
                entry.apply(patch);
                return Some(code.clone());
            }
        }
        None
    }

    /// 연결을 모든 세션에서 제거하고, 제거된 세션 코드들을 반환합니다.
    pub fn remove(&self, connection: &ConnectionId) -> Vec<SessionCode> {
        let mut sessions = self.lock();
        let mut affected = Vec::new();
        for (code, list) in sessions.iter_mut() {
            let before = list.len();
            list.retain(|(id, _)| id != connection);
            if list.len() != before {
                affected.push(code.clone());
            }
        }
        sessions.retain(|_, list| !list.is_empty());
        affected
    }

    /// 세션의 접속자 목록 (입장 순서)
    pub fn list_for(&self, code: &SessionCode) -> Vec<PresenceEntry> {
        self.lock()
            .get(code)
            .map(|list| list.iter().map(|(_, entry)| entry.clone()).collect())
            .unwrap_or_default()
    }
}
