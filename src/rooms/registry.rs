use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use tokio::sync::OnceCell;

use crate::{MessageStore, RelayError};

use super::room::Room;

const MAX_ROOM_NAME_LEN: usize = 64;

/// All rooms of this process, started lazily when the first session joins.
///
/// Each room gets its own database file under `data_dir` and is started at
/// most once. A failed start leaves nothing behind, so the next request tries
/// again.
#[derive(Clone)]
pub struct Rooms {
    data_dir: PathBuf,
    capacity: usize,
    rooms: Arc<Mutex<HashMap<String, Arc<OnceCell<Arc<Room>>>>>>,
}

impl Rooms {
    pub fn new(data_dir: PathBuf, capacity: usize) -> Self {
        Self {
            data_dir,
            capacity,
            rooms: Arc::default(),
        }
    }

    /// The room called `name`, if it is already running.
    pub fn get(&self, name: &str) -> Option<Arc<Room>> {
        let rooms = self.rooms.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rooms.get(name).and_then(|cell| cell.get().cloned())
    }

    pub async fn get_or_start(&self, name: &str) -> Result<Arc<Room>, RelayError> {
        if !is_valid_room_name(name) {
            return Err(RelayError::InvalidRoomName(name.to_owned()));
        }

        let cell = {
            let mut rooms = self.rooms.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            rooms.entry(name.to_owned()).or_default().clone()
        };

        let room = cell
            .get_or_try_init(|| async {
                tokio::fs::create_dir_all(&self.data_dir).await?;
                let store = MessageStore::open(&self.data_dir.join(format!("{name}.sqlite"))).await?;
                Room::start(name, store, self.capacity).await.map(Arc::new)
            })
            .await?;

        Ok(room.clone())
    }
}

/// Room names become file names, so only a conservative alphabet is allowed.
pub fn is_valid_room_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_ROOM_NAME_LEN
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_name_alphabet() {
        assert!(is_valid_room_name("lobby"));
        assert!(is_valid_room_name("team-42_ops"));
        assert!(!is_valid_room_name(""));
        assert!(!is_valid_room_name("../etc"));
        assert!(!is_valid_room_name("a b"));
        assert!(!is_valid_room_name(&"x".repeat(65)));
    }

    #[tokio::test]
    async fn same_name_yields_same_room() {
        let dir = tempfile::tempdir().unwrap();
        let rooms = Rooms::new(dir.path().to_path_buf(), 8);

        let (a, b) = tokio::join!(rooms.get_or_start("lobby"), rooms.get_or_start("lobby"));
        let (a, b) = (a.unwrap(), b.unwrap());
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&rooms.get("lobby").unwrap(), &a));
        assert!(dir.path().join("lobby.sqlite").exists());
    }

    #[tokio::test]
    async fn rooms_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let rooms = Rooms::new(dir.path().to_path_buf(), 8);

        let lobby = rooms.get_or_start("lobby").await.unwrap();
        let other = rooms.get_or_start("other").await.unwrap();
        let sender = lobby.connect().await.unwrap();
        let mut elsewhere = other.connect().await.unwrap();

        lobby
            .on_message(sender.id, r#"{"type":"add","id":"m1","user":"ada","role":"user","content":"hi"}"#)
            .await
            .unwrap();

        assert_eq!(lobby.messages().await.len(), 1);
        assert!(other.messages().await.is_empty());
        assert_eq!(elsewhere.try_next_frame(), None);
    }

    #[test]
    fn get_does_not_start_rooms() {
        let dir = tempfile::tempdir().unwrap();
        let rooms = Rooms::new(dir.path().to_path_buf(), 8);
        assert!(rooms.get("lobby").is_none());
        assert!(!dir.path().join("lobby.sqlite").exists());
    }

    #[tokio::test]
    async fn invalid_name_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let rooms = Rooms::new(dir.path().to_path_buf(), 8);
        let err = rooms.get_or_start("../escape").await.err().unwrap();
        assert!(matches!(err, RelayError::InvalidRoomName(_)));
    }

    #[tokio::test]
    async fn creates_missing_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested").join("rooms");
        let rooms = Rooms::new(nested.clone(), 8);
        rooms.get_or_start("lobby").await.unwrap();
        assert!(nested.join("lobby.sqlite").exists());
    }
}
