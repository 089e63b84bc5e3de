//! Session gateway: per-connection request handling over the room store
//!
//! Each handler validates a client action against the [`RoomStore`], applies
//! it, and queues the resulting room events for delivery. Handlers return
//! their outcome directly to the caller; the transport turns that into an
//! acknowledgement for the requesting connection only, while queued
//! [`Broadcast`]s go to every current member of the affected room.
//!
//! Every connection owns a [`Session`] recording the rooms it is seated in.
//! Disconnect cleanup walks that set directly, so a connection seated in
//! several rooms leaves all of them.
//!
//! The gateway is not internally synchronized. The server owns it from a
//! single event loop and feeds it one event at a time.

use crate::room::{ClientId, Room};
use crate::room_store::RoomStore;
use log::info;
use shared::{Packet, RoomError, RoomId, RoomTicket};
use std::collections::{BTreeSet, HashMap};

/// An event addressed to the members of one room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Broadcast {
    pub recipients: Vec<ClientId>,
    pub packet: Packet,
}

/// Rooms a single connection is seated in
#[derive(Debug, Default)]
struct Session {
    rooms: BTreeSet<RoomId>,
}

pub struct SessionGateway {
    store: RoomStore,
    sessions: HashMap<ClientId, Session>,
    outbox: Vec<Broadcast>,
}

impl Default for SessionGateway {
    fn default() -> Self {
        Self::new(RoomStore::new())
    }
}

impl SessionGateway {
    pub fn new(store: RoomStore) -> Self {
        Self {
            store,
            sessions: HashMap::new(),
            outbox: Vec::new(),
        }
    }

    pub fn store(&self) -> &RoomStore {
        &self.store
    }

    /// Registers a new connection with no room memberships
    pub fn connect(&mut self, client_id: ClientId) {
        self.sessions.entry(client_id).or_default();
    }

    /// Rooms the connection is currently seated in
    pub fn rooms_of(&self, client_id: ClientId) -> Vec<RoomId> {
        self.sessions
            .get(&client_id)
            .map(|session| session.rooms.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Takes every event queued since the last drain, in emission order
    pub fn drain_broadcasts(&mut self) -> Vec<Broadcast> {
        std::mem::take(&mut self.outbox)
    }

    /// Opens a new room and seats the caller as its first player.
    ///
    /// Creation and seating happen in one call, so no other request can
    /// observe the room while it is empty.
    pub fn create_room(&mut self, client_id: ClientId) -> Result<RoomTicket, RoomError> {
        let room_id = self.store.create_room();
        let room = self
            .store
            .get_room_mut(&room_id)
            .ok_or(RoomError::RoomNotFound)?;

        let mark = room.seat(client_id)?;
        emit(&mut self.outbox, room, room_update(room));

        self.sessions
            .entry(client_id)
            .or_default()
            .rooms
            .insert(room_id.clone());

        Ok(RoomTicket { room_id, mark })
    }

    pub fn join_room(
        &mut self,
        client_id: ClientId,
        raw_room_id: &str,
    ) -> Result<RoomTicket, RoomError> {
        let room_id = RoomId::parse(raw_room_id).ok_or(RoomError::RoomNotFound)?;
        let room = self
            .store
            .get_room_mut(&room_id)
            .ok_or(RoomError::RoomNotFound)?;

        if let Some(mark) = room.mark_of(client_id) {
            return Ok(RoomTicket { room_id, mark });
        }

        let mark = room.seat(client_id)?;
        info!("Client {} joined room {} as {}", client_id, room_id, mark);

        if room.players_count() == crate::room::MAX_PLAYERS {
            let start = Packet::StartGame {
                room_id: room_id.clone(),
                board: *room.board(),
                turn: room.turn(),
                players: room.marks(),
            };
            emit(&mut self.outbox, room, start);
        }
        emit(&mut self.outbox, room, room_update(room));

        self.sessions
            .entry(client_id)
            .or_default()
            .rooms
            .insert(room_id.clone());

        Ok(RoomTicket { room_id, mark })
    }

    pub fn make_move(
        &mut self,
        client_id: ClientId,
        raw_room_id: &str,
        index: i32,
    ) -> Result<(), RoomError> {
        let room_id = RoomId::parse(raw_room_id).ok_or(RoomError::RoomNotFound)?;
        let room = self
            .store
            .get_room_mut(&room_id)
            .ok_or(RoomError::RoomNotFound)?;

        let outcome = room.apply_move(client_id, index)?;

        let update = Packet::Update {
            room_id: room_id.clone(),
            board: *room.board(),
            turn: room.turn(),
        };
        emit(&mut self.outbox, room, update);

        if let Some(winner) = outcome.result() {
            info!("Room {} finished: {}", room_id, winner);
            emit(&mut self.outbox, room, Packet::GameOver { room_id, winner });
        }

        Ok(())
    }

    pub fn reset_game(
        &mut self,
        client_id: ClientId,
        raw_room_id: &str,
    ) -> Result<(), RoomError> {
        let room_id = RoomId::parse(raw_room_id).ok_or(RoomError::RoomNotFound)?;
        let room = self
            .store
            .get_room_mut(&room_id)
            .ok_or(RoomError::RoomNotFound)?;

        room.reset();
        info!("Room {} reset by client {}", room_id, client_id);

        let update = Packet::Update {
            room_id: room_id.clone(),
            board: *room.board(),
            turn: room.turn(),
        };
        emit(&mut self.outbox, room, update);
        emit(&mut self.outbox, room, Packet::Reset { room_id });

        Ok(())
    }

    /// Removes the caller from one room. No-op if it is not seated there.
    pub fn leave_room(&mut self, client_id: ClientId, raw_room_id: &str) {
        let Some(room_id) = RoomId::parse(raw_room_id) else {
            return;
        };

        if let Some(session) = self.sessions.get_mut(&client_id) {
            session.rooms.remove(&room_id);
        }
        self.depart(client_id, &room_id);
    }

    /// Removes the connection from every room it is seated in and forgets it
    pub fn disconnect(&mut self, client_id: ClientId) {
        let Some(session) = self.sessions.remove(&client_id) else {
            return;
        };

        for room_id in &session.rooms {
            self.depart(client_id, room_id);
        }
    }

    fn depart(&mut self, client_id: ClientId, room_id: &RoomId) {
        let Some(room) = self.store.get_room_mut(room_id) else {
            return;
        };
        let Some(mark) = room.remove_player(client_id) else {
            return;
        };
        info!("Client {} ({}) left room {}", client_id, mark, room_id);

        if room.is_empty() {
            self.store.delete_room(room_id);
            return;
        }

        emit(&mut self.outbox, room, room_update(room));
        emit(
            &mut self.outbox,
            room,
            Packet::OpponentLeft {
                room_id: room_id.clone(),
            },
        );
    }
}

fn room_update(room: &Room) -> Packet {
    Packet::RoomUpdate {
        room_id: room.id().clone(),
        players_count: room.players_count(),
    }
}

fn emit(outbox: &mut Vec<Broadcast>, room: &Room, packet: Packet) {
    outbox.push(Broadcast {
        recipients: room.members(),
        packet,
    });
}
