//! Per-room game state and the rules that guard it
//!
//! A room seats at most two players. Marks are handed out in join order
//! (first X, then O) and stay unique within the room. Every mutation is
//! validated before any state changes, so a rejected request leaves the
//! room exactly as it was.

use shared::{evaluate, Board, Mark, Outcome, RoomError, RoomId, BOARD_CELLS, EMPTY_BOARD};
use std::collections::HashMap;

/// Server-assigned connection identifier
pub type ClientId = u32;

pub const MAX_PLAYERS: usize = 2;

/// Lifecycle of a room as seen from its membership and board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    Empty,
    WaitingForOpponent,
    InProgress,
    Finished,
}

#[derive(Debug, Clone)]
pub struct Room {
    id: RoomId,
    players: HashMap<ClientId, Mark>,
    board: Board,
    turn: Mark,
    finished: bool,
}

impl Room {
    pub fn new(id: RoomId) -> Self {
        Self {
            id,
            players: HashMap::new(),
            board: EMPTY_BOARD,
            turn: Mark::X,
            finished: false,
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn turn(&self) -> Mark {
        self.turn
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn players_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn mark_of(&self, client_id: ClientId) -> Option<Mark> {
        self.players.get(&client_id).copied()
    }

    /// Connections currently seated in this room
    pub fn members(&self) -> Vec<ClientId> {
        let mut members: Vec<ClientId> = self.players.keys().copied().collect();
        members.sort_unstable();
        members
    }

    /// Seated marks, X first
    pub fn marks(&self) -> Vec<Mark> {
        let mut marks: Vec<Mark> = self.players.values().copied().collect();
        marks.sort();
        marks
    }

    pub fn phase(&self) -> RoomPhase {
        match self.players.len() {
            0 => RoomPhase::Empty,
            _ if self.finished => RoomPhase::Finished,
            n if n < MAX_PLAYERS => RoomPhase::WaitingForOpponent,
            _ => RoomPhase::InProgress,
        }
    }

    /// Seats a connection under the first free mark.
    ///
    /// A connection that is already seated keeps its mark.
    pub fn seat(&mut self, client_id: ClientId) -> Result<Mark, RoomError> {
        if let Some(mark) = self.mark_of(client_id) {
            return Ok(mark);
        }
        if self.players.len() >= MAX_PLAYERS {
            return Err(RoomError::RoomFull);
        }

        let mark = [Mark::X, Mark::O]
            .into_iter()
            .find(|mark| !self.players.values().any(|taken| taken == mark))
            .ok_or(RoomError::RoomFull)?;

        self.players.insert(client_id, mark);
        Ok(mark)
    }

    /// Removes a connection, returning the mark it held
    pub fn remove_player(&mut self, client_id: ClientId) -> Option<Mark> {
        self.players.remove(&client_id)
    }

    /// Places the caller's mark at `index` and classifies the resulting board.
    ///
    /// The turn only advances when the game continues; on a terminal board
    /// the room is marked finished instead.
    pub fn apply_move(&mut self, client_id: ClientId, index: i32) -> Result<Outcome, RoomError> {
        if self.finished {
            return Err(RoomError::GameFinished);
        }
        let mark = self.mark_of(client_id).ok_or(RoomError::NotAPlayer)?;
        if self.turn != mark {
            return Err(RoomError::NotYourTurn);
        }
        let cell = usize::try_from(index)
            .ok()
            .filter(|i| *i < BOARD_CELLS)
            .ok_or(RoomError::InvalidIndex)?;
        if self.board[cell].is_some() {
            return Err(RoomError::CellOccupied);
        }

        self.board[cell] = Some(mark);
        let outcome = evaluate(&self.board);
        if outcome.is_terminal() {
            self.finished = true;
        } else {
            self.turn = mark.opponent();
        }

        Ok(outcome)
    }

    /// Clears the board for a fresh game; membership is untouched
    pub fn reset(&mut self) {
        self.board = EMPTY_BOARD;
        self.turn = Mark::X;
        self.finished = false;
    }
}
