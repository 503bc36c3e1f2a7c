//! # 방(Room) 레지스트리
//!
//! 세션마다 현재 입장한 연결들의 송신 채널을 보관합니다.
//! 브로드캐스트는 각 연결의 unbounded 큐에 넣고 끝납니다.
//! 수신 확인을 기다리지 않으며, 느린 수신자가 보내는 쪽을 막지 않습니다.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use crate::models::{ConnectionId, ServerEvent, SessionCode};

/// 연결 하나로 이벤트를 보내는 채널. 연결의 writer 태스크가 반대편을 읽습니다.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

type Members = HashMap<ConnectionId, EventSender>;

#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: Mutex<HashMap<SessionCode, Members>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionCode, Members>> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn join(&self, code: &SessionCode, connection: &ConnectionId, sender: EventSender) {
        self.lock()
            .entry(code.clone())
            .or_default()
            .insert(connection.clone(), sender);
    }

    pub fn leave(&self, code: &SessionCode, connection: &ConnectionId) {
        let mut rooms = self.lock();
        if let Some(members) = rooms.get_mut(code) {
            members.remove(connection);
            if members.is_empty() {
                rooms.remove(code);
            }
        }
    }

    /// 연결을 모든 방에서 내보냅니다.
    pub fn leave_all(&self, connection: &ConnectionId) {
        let mut rooms = self.lock();
        for members in rooms.values_mut() {
            members.remove(connection);
        }
        rooms.retain(|_, members| !members.is_empty());
    }

    pub fn member_count(&self, code: &SessionCode) -> usize {
        self.lock().get(code).map_or(0, HashMap::len)
    }

    /// 방의 모든 연결에 보냅니다. 큐에 넣은 연결 수를 반환합니다.
    pub fn broadcast(&self, code: &SessionCode, event: &ServerEvent) -> usize {
        self.send_filtered(code, event, None)
    }

    /// `except`를 제외한 방의 모든 연결에 보냅니다.
    pub fn broadcast_except(&self, code: &SessionCode, except: &ConnectionId, event: &ServerEvent) -> usize {
        self.send_filtered(code, event, Some(except))
    }

    fn send_filtered(&self, code: &SessionCode, event: &ServerEvent, except: Option<&ConnectionId>) -> usize {
        let rooms = self.lock();
        let Some(members) = rooms.get(code) else {
            return 0;
        };
        members
            .iter()
            .filter(|(id, _)| Some(*id) != except)
            // 닫힌 연결로의 전송 실패는 무시합니다. 정리는 disconnect에서 합니다.
            .filter(|(_, sender)| sender.send(event.clone()).is_ok())
            .count()
    }
}
