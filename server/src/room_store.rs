//! Process-wide registry of live rooms
//!
//! Owns room creation, lookup and deletion. Room codes are short base36
//! strings; a freshly generated code that collides with a live room is
//! discarded and regenerated, so codes are unique among live rooms.

use crate::room::Room;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{RoomId, ROOM_ID_LEN};
use std::collections::HashMap;

const ROOM_ID_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

pub struct RoomStore {
    rooms: HashMap<RoomId, Room>,
    rng: StdRng,
}

impl Default for RoomStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomStore {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic room codes, for tests and reproducible runs
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            rooms: HashMap::new(),
            rng,
        }
    }

    /// Creates an empty room under a code no live room uses.
    ///
    /// The caller seats the creator before handling any other request.
    pub fn create_room(&mut self) -> RoomId {
        let rng = &mut self.rng;
        let id = unique_room_id(&self.rooms, || generate_room_id(rng));

        self.rooms.insert(id.clone(), Room::new(id.clone()));
        info!("Room {} created", id);
        id
    }

    pub fn get_room(&self, id: &RoomId) -> Option<&Room> {
        self.rooms.get(id)
    }

    pub fn get_room_mut(&mut self, id: &RoomId) -> Option<&mut Room> {
        self.rooms.get_mut(id)
    }

    /// Removes a room. Returns false if it was already gone.
    pub fn delete_room(&mut self, id: &RoomId) -> bool {
        if self.rooms.remove(id).is_some() {
            info!("Room {} deleted", id);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, id: &RoomId) -> bool {
        self.rooms.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

/// Draws a random uppercase base36 room code
pub fn generate_room_id<R: Rng>(rng: &mut R) -> RoomId {
    let code: String = (0..ROOM_ID_LEN)
        .map(|_| ROOM_ID_ALPHABET[rng.gen_range(0..ROOM_ID_ALPHABET.len())] as char)
        .collect();
    RoomId::new(&code)
}

fn unique_room_id(
    rooms: &HashMap<RoomId, Room>,
    mut generate: impl FnMut() -> RoomId,
) -> RoomId {
    loop {
        let candidate = generate();
        if !rooms.contains_key(&candidate) {
            return candidate;
        }
        debug!("Room code {} already live, regenerating", candidate);
    }
}
