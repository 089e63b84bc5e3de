//! Local view of the room, fed only by server events
//!
//! Nothing here is authoritative. The board is whatever the server last
//! broadcast; [`ClientGameState::can_move`] only avoids sending requests
//! the server would reject anyway.

use crate::network::{Request, ServerEvent};
use shared::{Board, GameResult, Mark, Packet, Reply, RoomId, BOARD_CELLS, EMPTY_BOARD};

#[derive(Debug, Clone)]
pub struct ClientGameState {
    pub connected: bool,
    pub room_id: Option<RoomId>,
    pub mark: Option<Mark>,
    pub board: Board,
    pub turn: Option<Mark>,
    pub players_count: usize,
    pub started: bool,
    pub finished: bool,
    pub status: String,
}

impl Default for ClientGameState {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientGameState {
    pub fn new() -> Self {
        Self {
            connected: false,
            room_id: None,
            mark: None,
            board: EMPTY_BOARD,
            turn: None,
            players_count: 0,
            started: false,
            finished: false,
            status: "Connecting...".to_string(),
        }
    }

    /// True when clicking `index` would be a legal move for us
    pub fn can_move(&self, index: usize) -> bool {
        self.started
            && !self.finished
            && index < BOARD_CELLS
            && self.board[index].is_none()
            && self.mark.is_some()
            && self.mark == self.turn
    }

    pub fn apply(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::Connected { .. } => {
                self.connected = true;
                self.status = "Create a room or type a code to join.".to_string();
            }
            ServerEvent::Disconnected { reason } => {
                *self = Self::new();
                self.status = format!("Disconnected: {}", reason);
            }
            ServerEvent::Acked { request, reply } => self.apply_reply(request, reply),
            ServerEvent::Room(packet) => self.apply_room_event(packet),
        }
    }

    /// Forgets the current room after we asked to leave it
    pub fn leave(&mut self) {
        let connected = self.connected;
        *self = Self::new();
        self.connected = connected;
        self.status = "Left the room.".to_string();
    }

    fn enter_room(&mut self, room_id: &RoomId, mark: Mark) {
        self.room_id = Some(room_id.clone());
        self.mark = Some(mark);
        self.board = EMPTY_BOARD;
        self.turn = None;
        self.started = false;
        self.finished = false;
    }

    fn apply_reply(&mut self, request: &Request, reply: &Reply) {
        match (request, reply) {
            (Request::CreateRoom, Reply::Seated(ticket)) => {
                self.enter_room(&ticket.room_id, ticket.mark);
                self.status = "Waiting for another player to join...".to_string();
            }
            (Request::JoinRoom { .. }, Reply::Seated(ticket)) => {
                self.enter_room(&ticket.room_id, ticket.mark);
                self.status = "Joined successfully! Waiting for opponent...".to_string();
            }
            (_, Reply::Rejected(error)) => {
                self.status = error.to_string();
            }
            _ => {}
        }
    }

    fn apply_room_event(&mut self, packet: &Packet) {
        match packet {
            Packet::RoomUpdate {
                room_id,
                players_count,
            } if self.is_current(room_id) => {
                self.players_count = *players_count;
            }
            Packet::StartGame {
                room_id,
                board,
                turn,
                ..
            } if self.is_current(room_id) => {
                self.board = *board;
                self.turn = Some(*turn);
                self.started = true;
                self.finished = false;
                let mark = self.mark.map(Mark::as_str).unwrap_or("?");
                self.status = format!("Game started! You are {}. Turn: {}", mark, turn);
            }
            Packet::Update {
                room_id,
                board,
                turn,
            } if self.is_current(room_id) => {
                self.board = *board;
                self.turn = Some(*turn);
                self.status = format!("Turn: {}", turn);
            }
            Packet::GameOver { room_id, winner } if self.is_current(room_id) => {
                self.finished = true;
                self.status = match winner {
                    GameResult::Draw => "It's a draw!".to_string(),
                    GameResult::Winner(mark) => format!("Game Over! {} wins!", mark),
                };
            }
            Packet::Reset { room_id } if self.is_current(room_id) => {
                self.finished = false;
                self.started = true;
            }
            Packet::OpponentLeft { room_id } if self.is_current(room_id) => {
                self.status = "Opponent left the game.".to_string();
            }
            _ => {}
        }
    }

    fn is_current(&self, room_id: &RoomId) -> bool {
        self.room_id.as_ref() == Some(room_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{RoomError, RoomTicket};

    fn room() -> RoomId {
        RoomId::parse("AB12CD").unwrap()
    }

    fn seated(mark: Mark) -> ClientGameState {
        let mut state = ClientGameState::new();
        state.apply(&ServerEvent::Connected { client_id: 1 });
        state.apply(&ServerEvent::Acked {
            request: Request::CreateRoom,
            reply: Reply::Seated(RoomTicket {
                room_id: room(),
                mark,
            }),
        });
        state
    }

    fn start(state: &mut ClientGameState) {
        state.apply(&ServerEvent::Room(Packet::StartGame {
            room_id: room(),
            board: EMPTY_BOARD,
            turn: Mark::X,
            players: vec![Mark::X, Mark::O],
        }));
    }

    #[test]
    fn test_create_waits_for_opponent() {
        let state = seated(Mark::X);
        assert_eq!(state.room_id, Some(room()));
        assert_eq!(state.mark, Some(Mark::X));
        assert_eq!(state.status, "Waiting for another player to join...");
        assert!(!state.can_move(0));
    }

    #[test]
    fn test_start_game_enables_moves_for_x() {
        let mut state = seated(Mark::X);
        start(&mut state);
        assert_eq!(state.status, "Game started! You are X. Turn: X");
        assert!(state.can_move(0));
        assert!(!state.can_move(9));

        let mut other = seated(Mark::O);
        start(&mut other);
        assert!(!other.can_move(0));
    }

    #[test]
    fn test_update_and_game_over() {
        let mut state = seated(Mark::O);
        start(&mut state);

        let mut board = EMPTY_BOARD;
        board[4] = Some(Mark::X);
        state.apply(&ServerEvent::Room(Packet::Update {
            room_id: room(),
            board,
            turn: Mark::O,
        }));
        assert_eq!(state.status, "Turn: O");
        assert!(state.can_move(0));
        assert!(!state.can_move(4));

        state.apply(&ServerEvent::Room(Packet::GameOver {
            room_id: room(),
            winner: GameResult::Draw,
        }));
        assert_eq!(state.status, "It's a draw!");
        assert!(!state.can_move(0));
    }

    #[test]
    fn test_events_for_other_rooms_ignored() {
        let mut state = seated(Mark::X);
        state.apply(&ServerEvent::Room(Packet::OpponentLeft {
            room_id: RoomId::parse("ZZZZZZ").unwrap(),
        }));
        assert_eq!(state.status, "Waiting for another player to join...");
    }

    #[test]
    fn test_rejection_shown_in_status() {
        let mut state = seated(Mark::X);
        state.apply(&ServerEvent::Acked {
            request: Request::MakeMove {
                room_id: "AB12CD".to_string(),
                index: 0,
            },
            reply: Reply::Rejected(RoomError::NotYourTurn),
        });
        assert_eq!(state.status, "Not your turn.");
    }

    #[test]
    fn test_opponent_left_and_leave() {
        let mut state = seated(Mark::X);
        start(&mut state);
        state.apply(&ServerEvent::Room(Packet::OpponentLeft { room_id: room() }));
        assert_eq!(state.status, "Opponent left the game.");

        state.leave();
        assert!(state.connected);
        assert!(state.room_id.is_none());
    }
}
