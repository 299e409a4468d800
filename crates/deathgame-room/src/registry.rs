//! Room registry: creates rooms, finds them by code, forgets stopped ones.

use std::collections::HashMap;
use std::sync::Arc;

use deathgame_protocol::{PlayerId, RoomCode};
use rand::Rng;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::RoomConfig;
use crate::error::GameError;
use crate::room::{PlayerSender, RoomHandle, spawn_room};
use crate::session::validate_name;

/// Characters room codes are drawn from. No `0`/`O` or `1`/`I`, which are
/// easy to misread.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub const CODE_LEN: usize = 6;

fn random_code() -> RoomCode {
    let mut rng = rand::rng();
    let code: String = (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect();
    RoomCode::new(code)
}

/// Every live room, keyed by code.
///
/// Cheap to clone; clones share the same rooms. The lock only guards the
/// map and is never held while talking to a room.
#[derive(Debug, Clone)]
pub struct RoomRegistry {
    rooms: Arc<Mutex<HashMap<RoomCode, RoomHandle>>>,
    config: RoomConfig,
}

impl RoomRegistry {
    pub fn new(config: RoomConfig) -> Self {
        Self {
            rooms: Arc::new(Mutex::new(HashMap::new())),
            config: config.validated(),
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Opens a new room with its creator seated as the first player.
    ///
    /// The name is checked before anything is allocated, so a bad name
    /// never leaves an empty room behind.
    pub async fn create_room(
        &self,
        player_name: &str,
        sender: PlayerSender,
    ) -> Result<(RoomHandle, PlayerId), GameError> {
        validate_name(player_name)?;

        let handle = {
            let mut rooms = self.rooms.lock().await;
            let code = loop {
                let candidate = random_code();
                if !rooms.contains_key(&candidate) {
                    break candidate;
                }
                debug!(code = %candidate, "room code collision, regenerating");
            };
            let handle = spawn_room(code.clone(), self.config.clone());
            rooms.insert(code, handle.clone());
            handle
        };
        info!(room = %handle.code(), "room created");

        match handle.join(player_name, sender).await {
            Ok(player_id) => Ok((handle, player_id)),
            Err(e) => {
                self.rooms.lock().await.remove(handle.code());
                let _ = handle.shutdown().await;
                Err(e)
            }
        }
    }

    /// Seats a player in an existing room.
    pub async fn join_room(
        &self,
        code: &RoomCode,
        player_name: &str,
        sender: PlayerSender,
    ) -> Result<(RoomHandle, PlayerId), GameError> {
        let handle = self.get_room(code).await?;
        let player_id = handle.join(player_name, sender).await?;
        Ok((handle, player_id))
    }

    /// Looks a room up. Rooms that have stopped count as missing even
    /// before the sweep removes them.
    pub async fn get_room(&self, code: &RoomCode) -> Result<RoomHandle, GameError> {
        let rooms = self.rooms.lock().await;
        match rooms.get(code) {
            Some(handle) if !handle.is_closed() => Ok(handle.clone()),
            _ => Err(GameError::RoomNotFound(code.clone())),
        }
    }

    /// Stops a room and forgets it.
    pub async fn dispose_room(&self, code: &RoomCode) -> Result<(), GameError> {
        let handle = self
            .rooms
            .lock()
            .await
            .remove(code)
            .ok_or_else(|| GameError::RoomNotFound(code.clone()))?;
        // Already stopped is fine.
        let _ = handle.shutdown().await;
        info!(room = %code, "room disposed");
        Ok(())
    }

    /// Forgets rooms whose actor has stopped. Returns how many went.
    pub async fn sweep(&self) -> usize {
        let mut rooms = self.rooms.lock().await;
        let before = rooms.len();
        rooms.retain(|_, handle| !handle.is_closed());
        let removed = before - rooms.len();
        if removed > 0 {
            debug!(removed, remaining = rooms.len(), "swept stopped rooms");
        }
        removed
    }

    /// Rooms in the map, stopped ones included until the next sweep.
    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }

    /// Stops every room. Used on server shutdown.
    pub async fn shutdown_all(&self) {
        let handles: Vec<RoomHandle> = self.rooms.lock().await.drain().map(|(_, h)| h).collect();
        for handle in &handles {
            let _ = handle.shutdown().await;
        }
        info!(rooms = handles.len(), "all rooms stopped");
    }
}
