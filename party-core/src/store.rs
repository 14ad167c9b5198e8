use std::collections::HashMap;

use crate::error::SessionError;
use crate::room::{Room, RoomId};

/// Owns every live room. The server wraps one store in a `RwLock`; taking
/// the write lock is what serializes mutations per room and fixes the
/// broadcast order. Injectable so tests can seed rooms directly.
#[derive(Debug, Default)]
pub struct RoomStore {
    rooms: HashMap<RoomId, Room>,
}

impl RoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rooms(rooms: HashMap<RoomId, Room>) -> Self {
        Self { rooms }
    }

    pub fn insert(&mut self, room: Room) -> Result<(), SessionError> {
        if self.rooms.contains_key(&room.id) {
            return Err(SessionError::StateConflict(format!(
                "room {} already exists",
                room.id
            )));
        }
        self.rooms.insert(room.id.clone(), room);
        Ok(())
    }

    pub fn get(&self, room_id: &str) -> Result<&Room, SessionError> {
        self.rooms
            .get(room_id)
            .ok_or_else(|| SessionError::RoomNotFound(room_id.to_string()))
    }

    pub fn get_mut(&mut self, room_id: &str) -> Result<&mut Room, SessionError> {
        self.rooms
            .get_mut(room_id)
            .ok_or_else(|| SessionError::RoomNotFound(room_id.to_string()))
    }

    pub fn remove(&mut self, room_id: &str) -> Option<Room> {
        self.rooms.remove(room_id)
    }

    pub fn contains(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RoomId, &Room)> {
        self.rooms.iter()
    }

    /// Ids of rooms idle for longer than `max_idle`, for the cleanup sweep.
    pub fn idle_room_ids(&self, max_idle: std::time::Duration) -> Vec<RoomId> {
        self.rooms
            .iter()
            .filter(|(_, room)| room.idle_for() > max_idle)
            .map(|(id, _)| id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::room::{GameMode, RoomConfig};

    fn test_room(id: &str) -> Room {
        Room::new(
            id.to_string(),
            GameMode::Letter {
                categories: vec!["Stadt".to_string()],
            },
            RoomConfig {
                time_limit: Duration::from_secs(60),
                max_players: 8,
            },
        )
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut store = RoomStore::new();
        store.insert(test_room("AB12")).unwrap();
        assert!(store.contains("AB12"));
        assert_eq!(store.get("AB12").unwrap().id, "AB12");
        assert!(matches!(
            store.get("ZZ99"),
            Err(SessionError::RoomNotFound(_))
        ));
    }

    #[test]
    fn test_insert_rejects_duplicate_id() {
        let mut store = RoomStore::new();
        store.insert(test_room("AB12")).unwrap();
        assert!(matches!(
            store.insert(test_room("AB12")),
            Err(SessionError::StateConflict(_))
        ));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_remove_returns_room() {
        let mut store = RoomStore::new();
        store.insert(test_room("AB12")).unwrap();
        let removed = store.remove("AB12").expect("room should exist");
        assert_eq!(removed.id, "AB12");
        assert!(store.is_empty());
        assert!(store.remove("AB12").is_none());
    }

    #[test]
    fn test_seeded_store() {
        let mut rooms = HashMap::new();
        rooms.insert("AB12".to_string(), test_room("AB12"));
        let store = RoomStore::with_rooms(rooms);
        assert_eq!(store.len(), 1);
        assert!(store.contains("AB12"));
    }
}
