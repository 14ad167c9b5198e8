use party_types::{PlayerId, ServerMessage};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One live socket. `room_id`/`player_id` are bookkeeping for routing;
/// the room's roster stays the source of truth for membership.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub room_id: Option<String>,
    pub player_id: Option<PlayerId>,
    pub connected_at: Instant,
    pub last_activity: Instant,
    pub sender: mpsc::UnboundedSender<ServerMessage>,
}

impl Connection {
    pub fn new(id: ConnectionId) -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let now = Instant::now();

        let connection = Self {
            id,
            room_id: None,
            player_id: None,
            connected_at: now,
            last_activity: now,
            sender,
        };

        (connection, receiver)
    }

    pub fn update_activity(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn set_binding(&mut self, room_id: String, player_id: PlayerId) {
        self.room_id = Some(room_id);
        self.player_id = Some(player_id);
    }

    pub fn clear_binding(&mut self) {
        self.room_id = None;
        self.player_id = None;
    }

    pub fn send_message(&self, message: ServerMessage) -> Result<(), String> {
        self.sender
            .send(message)
            .map_err(|_| "Connection closed".to_string())
    }

    pub fn is_inactive(&self, timeout: Duration) -> bool {
        self.last_activity.elapsed() > timeout
    }
}

pub struct ConnectionManager {
    connections: RwLock<HashMap<ConnectionId, Connection>>,
    player_to_connection: RwLock<HashMap<PlayerId, ConnectionId>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            player_to_connection: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create_connection(
        &self,
        id: ConnectionId,
    ) -> mpsc::UnboundedReceiver<ServerMessage> {
        let (conn, receiver) = Connection::new(id);

        {
            let mut connections = self.connections.write().await;
            connections.insert(id, conn);
        }

        receiver
    }

    /// Drops the connection and returns the (room, player) binding it held
    /// so the caller can run the leave flow.
    pub async fn remove_connection(&self, id: ConnectionId) -> Option<(String, PlayerId)> {
        let binding = {
            let mut connections = self.connections.write().await;
            connections
                .remove(&id)
                .and_then(|conn| Some((conn.room_id?, conn.player_id?)))
        };

        if let Some((_, player_id)) = &binding {
            let mut player_to_connection = self.player_to_connection.write().await;
            player_to_connection.remove(player_id);
        }
        binding
    }

    pub async fn get_connection(&self, id: ConnectionId) -> Option<Connection> {
        let connections = self.connections.read().await;
        connections.get(&id).cloned()
    }

    pub async fn get_binding(&self, id: ConnectionId) -> Option<(String, PlayerId)> {
        let connections = self.connections.read().await;
        connections
            .get(&id)
            .and_then(|conn| Some((conn.room_id.clone()?, conn.player_id?)))
    }

    pub async fn bind_to_room(&self, id: ConnectionId, room_id: String, player_id: PlayerId) {
        {
            let mut connections = self.connections.write().await;
            if let Some(connection) = connections.get_mut(&id) {
                connection.set_binding(room_id, player_id);
            }
        }
        let mut player_to_connection = self.player_to_connection.write().await;
        player_to_connection.insert(player_id, id);
    }

    pub async fn clear_binding(&self, id: ConnectionId) {
        let player_id = {
            let mut connections = self.connections.write().await;
            connections.get_mut(&id).and_then(|conn| {
                let player_id = conn.player_id;
                conn.clear_binding();
                player_id
            })
        };
        if let Some(player_id) = player_id {
            let mut player_to_connection = self.player_to_connection.write().await;
            player_to_connection.remove(&player_id);
        }
    }

    pub async fn update_activity(&self, id: ConnectionId) {
        let mut connections = self.connections.write().await;
        if let Some(connection) = connections.get_mut(&id) {
            connection.update_activity();
        }
    }

    pub async fn send_to_connection(
        &self,
        id: ConnectionId,
        message: ServerMessage,
    ) -> Result<(), String> {
        let connections = self.connections.read().await;
        if let Some(connection) = connections.get(&id) {
            connection.send_message(message)
        } else {
            Err("Connection not found".to_string())
        }
    }

    pub async fn send_to_player(
        &self,
        player_id: PlayerId,
        message: ServerMessage,
    ) -> Result<(), String> {
        let connection_id = {
            let player_to_connection = self.player_to_connection.read().await;
            player_to_connection.get(&player_id).copied()
        };

        if let Some(connection_id) = connection_id {
            self.send_to_connection(connection_id, message).await
        } else {
            Err("Player not connected".to_string())
        }
    }

    pub async fn send_to_room(&self, room_id: &str, message: ServerMessage) {
        let connections = self.connections.read().await;
        for connection in connections.values() {
            if let Some(ref conn_room_id) = connection.room_id {
                if conn_room_id == room_id {
                    let _ = connection.send_message(message.clone());
                }
            }
        }
    }

    pub async fn send_to_room_except(
        &self,
        room_id: &str,
        except_connection: ConnectionId,
        message: ServerMessage,
    ) {
        let connections = self.connections.read().await;
        for connection in connections.values() {
            if connection.id != except_connection {
                if let Some(ref conn_room_id) = connection.room_id {
                    if conn_room_id == room_id {
                        let _ = connection.send_message(message.clone());
                    }
                }
            }
        }
    }

    pub async fn connections_in_room(&self, room_id: &str) -> Vec<ConnectionId> {
        let connections = self.connections.read().await;
        connections
            .values()
            .filter(|conn| conn.room_id.as_deref() == Some(room_id))
            .map(|conn| conn.id)
            .collect()
    }

    /// Unbinds every connection pointing at a torn-down room.
    pub async fn clear_room(&self, room_id: &str) {
        let mut cleared_players = Vec::new();
        {
            let mut connections = self.connections.write().await;
            for connection in connections.values_mut() {
                if connection.room_id.as_deref() == Some(room_id) {
                    if let Some(player_id) = connection.player_id {
                        cleared_players.push(player_id);
                    }
                    connection.clear_binding();
                }
            }
        }
        let mut player_to_connection = self.player_to_connection.write().await;
        for player_id in cleared_players {
            player_to_connection.remove(&player_id);
        }
    }

    /// Connections with no activity inside `timeout`. Listing only; the
    /// caller runs the full disconnect path so room seats are released too.
    pub async fn inactive_connections(&self, timeout: Duration) -> Vec<ConnectionId> {
        let connections = self.connections.read().await;
        connections
            .values()
            .filter(|conn| conn.is_inactive(timeout))
            .map(|conn| conn.id)
            .collect()
    }

    // Test helper methods
    pub async fn connection_count(&self) -> usize {
        let connections = self.connections.read().await;
        connections.len()
    }

    pub async fn bound_player_count(&self) -> usize {
        let player_to_connection = self.player_to_connection.read().await;
        player_to_connection.len()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
