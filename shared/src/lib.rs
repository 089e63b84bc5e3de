use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const PROTOCOL_VERSION: u32 = 1;
pub const BOARD_CELLS: usize = 9;
pub const ROOM_ID_LEN: usize = 6;
pub const MAX_PACKET_SIZE: usize = 2048;

/// Symbol identifying a player and the occupant of a cell
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Mark {
    X,
    O,
}

impl Mark {
    pub fn opponent(self) -> Mark {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mark::X => "X",
            Mark::O => "O",
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row-major 3x3 grid, index 0 is top-left
pub type Board = [Option<Mark>; BOARD_CELLS];

pub const EMPTY_BOARD: Board = [None; BOARD_CELLS];

const WINNING_LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// Classification of a board produced by [`evaluate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Winner(Mark),
    Draw,
    InProgress,
}

impl Outcome {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Outcome::InProgress)
    }

    /// The result announced to players, if the game is over
    pub fn result(self) -> Option<GameResult> {
        match self {
            Outcome::Winner(mark) => Some(GameResult::Winner(mark)),
            Outcome::Draw => Some(GameResult::Draw),
            Outcome::InProgress => None,
        }
    }
}

/// Determines whether a board is won, drawn or still being played.
///
/// A line of three equal marks wins even when the board is also full.
pub fn evaluate(board: &Board) -> Outcome {
    for [a, b, c] in WINNING_LINES {
        if let Some(mark) = board[a] {
            if board[b] == Some(mark) && board[c] == Some(mark) {
                return Outcome::Winner(mark);
            }
        }
    }

    if board.iter().all(Option::is_some) {
        Outcome::Draw
    } else {
        Outcome::InProgress
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum GameResult {
    Winner(Mark),
    Draw,
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameResult::Winner(mark) => write!(f, "{}", mark),
            GameResult::Draw => f.write_str("draw"),
        }
    }
}

/// Case-insensitive room code, always stored uppercase
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomId(String);

impl RoomId {
    /// Wraps a code that is known to be non-blank, uppercasing it
    pub fn new(code: &str) -> RoomId {
        RoomId(code.trim().to_uppercase())
    }

    /// Normalizes a user supplied code. Returns None for blank input.
    pub fn parse(raw: &str) -> Option<RoomId> {
        if raw.trim().is_empty() {
            return None;
        }
        Some(RoomId::new(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Request-level validation failures, reported only to the requester
#[derive(Debug, Error, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum RoomError {
    #[error("Room not found.")]
    RoomNotFound,
    #[error("Room full.")]
    RoomFull,
    #[error("You are not in this room.")]
    NotAPlayer,
    #[error("Not your turn.")]
    NotYourTurn,
    #[error("Invalid move.")]
    InvalidIndex,
    #[error("Cell already occupied.")]
    CellOccupied,
    #[error("Game finished.")]
    GameFinished,
}

/// Seat assignment returned by create and join
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RoomTicket {
    pub room_id: RoomId,
    pub mark: Mark,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum Reply {
    Seated(RoomTicket),
    Done,
    Rejected(RoomError),
}

impl Reply {
    pub fn is_ok(&self) -> bool {
        !matches!(self, Reply::Rejected(_))
    }
}

impl From<Result<RoomTicket, RoomError>> for Reply {
    fn from(result: Result<RoomTicket, RoomError>) -> Self {
        match result {
            Ok(ticket) => Reply::Seated(ticket),
            Err(error) => Reply::Rejected(error),
        }
    }
}

impl From<Result<(), RoomError>> for Reply {
    fn from(result: Result<(), RoomError>) -> Self {
        match result {
            Ok(()) => Reply::Done,
            Err(error) => Reply::Rejected(error),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum Packet {
    // Client -> server
    Connect {
        client_version: u32,
    },
    Heartbeat,
    Disconnect,
    CreateRoom {
        request_id: u32,
    },
    JoinRoom {
        request_id: u32,
        room_id: String,
    },
    MakeMove {
        request_id: u32,
        room_id: String,
        index: i32,
    },
    ResetGame {
        request_id: u32,
        room_id: String,
    },
    LeaveRoom {
        room_id: String,
    },

    // Server -> client
    Connected {
        client_id: u32,
    },
    Disconnected {
        reason: String,
    },
    Ack {
        request_id: u32,
        reply: Reply,
    },

    // Server -> room members
    RoomUpdate {
        room_id: RoomId,
        players_count: usize,
    },
    StartGame {
        room_id: RoomId,
        board: Board,
        turn: Mark,
        players: Vec<Mark>,
    },
    Update {
        room_id: RoomId,
        board: Board,
        turn: Mark,
    },
    GameOver {
        room_id: RoomId,
        winner: GameResult,
    },
    Reset {
        room_id: RoomId,
    },
    OpponentLeft {
        room_id: RoomId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn board_from(cells: &str) -> Board {
        let mut board = EMPTY_BOARD;
        for (i, c) in cells.chars().enumerate() {
            board[i] = match c {
                'X' => Some(Mark::X),
                'O' => Some(Mark::O),
                _ => None,
            };
        }
        board
    }

    fn relabel(board: &Board) -> Board {
        let mut swapped = *board;
        for cell in swapped.iter_mut() {
            *cell = cell.map(Mark::opponent);
        }
        swapped
    }

    #[test]
    fn test_empty_board_in_progress() {
        assert_eq!(evaluate(&EMPTY_BOARD), Outcome::InProgress);
    }

    #[test]
    fn test_every_winning_line() {
        for line in WINNING_LINES {
            let mut board = EMPTY_BOARD;
            for i in line {
                board[i] = Some(Mark::O);
            }
            assert_eq!(evaluate(&board), Outcome::Winner(Mark::O), "line {:?}", line);
        }
    }

    #[test]
    fn test_top_row_win() {
        let board = board_from("XXXOO....");
        assert_eq!(evaluate(&board), Outcome::Winner(Mark::X));
    }

    #[test]
    fn test_full_board_draw() {
        let board = board_from("XOXXOOOXX");
        assert_eq!(evaluate(&board), Outcome::Draw);
        assert!(Outcome::Draw.is_terminal());
    }

    #[test]
    fn test_win_on_full_board_is_not_draw() {
        let board = board_from("XXXOOXOXO");
        assert_eq!(evaluate(&board), Outcome::Winner(Mark::X));
    }

    #[test]
    fn test_mixed_line_does_not_win() {
        let board = board_from("XOX......");
        assert_eq!(evaluate(&board), Outcome::InProgress);
        assert!(!Outcome::InProgress.is_terminal());
    }

    #[test]
    fn test_outcome_result() {
        assert_eq!(
            Outcome::Winner(Mark::X).result(),
            Some(GameResult::Winner(Mark::X))
        );
        assert_eq!(Outcome::Draw.result(), Some(GameResult::Draw));
        assert_eq!(Outcome::InProgress.result(), None);
    }

    #[test]
    fn test_game_result_display() {
        assert_eq!(GameResult::Winner(Mark::O).to_string(), "O");
        assert_eq!(GameResult::Draw.to_string(), "draw");
    }

    #[test]
    fn test_room_id_normalization() {
        let id = RoomId::parse("  ab12cd ").unwrap();
        assert_eq!(id.as_str(), "AB12CD");
        assert_eq!(id, RoomId::parse("AB12CD").unwrap());
        assert!(RoomId::parse("").is_none());
        assert!(RoomId::parse("   ").is_none());
        assert_eq!(RoomId::new("x9y8z7"), RoomId::parse("X9Y8Z7").unwrap());
    }

    #[test]
    fn test_room_error_messages() {
        assert_eq!(RoomError::RoomNotFound.to_string(), "Room not found.");
        assert_eq!(RoomError::RoomFull.to_string(), "Room full.");
        assert_eq!(RoomError::NotYourTurn.to_string(), "Not your turn.");
        assert_eq!(RoomError::CellOccupied.to_string(), "Cell already occupied.");
        assert_eq!(RoomError::GameFinished.to_string(), "Game finished.");
    }

    #[test]
    fn test_reply_from_result() {
        let ticket = RoomTicket {
            room_id: RoomId::parse("abc123").unwrap(),
            mark: Mark::X,
        };
        assert_eq!(Reply::from(Ok(ticket.clone())), Reply::Seated(ticket));
        assert_eq!(Reply::from(Ok(())), Reply::Done);
        let rejected = Reply::from(Err::<(), _>(RoomError::RoomFull));
        assert_eq!(rejected, Reply::Rejected(RoomError::RoomFull));
        assert!(!rejected.is_ok());
    }

    #[test]
    fn test_packet_serialization_start_game() {
        let mut board = EMPTY_BOARD;
        board[4] = Some(Mark::X);
        let packet = Packet::StartGame {
            room_id: RoomId::parse("AB12CD").unwrap(),
            board,
            turn: Mark::O,
            players: vec![Mark::X, Mark::O],
        };

        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();
        assert_eq!(deserialized, packet);
        assert!(serialized.len() < MAX_PACKET_SIZE);
    }

    #[test]
    fn test_packet_serialization_rejected_ack() {
        let packet = Packet::Ack {
            request_id: 7,
            reply: Reply::Rejected(RoomError::NotYourTurn),
        };

        let serialized = bincode::serialize(&packet).unwrap();
        match bincode::deserialize::<Packet>(&serialized).unwrap() {
            Packet::Ack { request_id, reply } => {
                assert_eq!(request_id, 7);
                assert_eq!(reply, Reply::Rejected(RoomError::NotYourTurn));
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    fn arb_board() -> impl Strategy<Value = Board> {
        let cell = prop_oneof![Just(None), Just(Some(Mark::X)), Just(Some(Mark::O))];
        proptest::array::uniform9(cell)
    }

    proptest! {
        #[test]
        fn evaluate_is_symmetric_under_relabeling(board in arb_board()) {
            let swapped = relabel(&board);
            let expected = match evaluate(&board) {
                Outcome::Winner(mark) => Outcome::Winner(mark.opponent()),
                other => other,
            };
            prop_assert_eq!(evaluate(&swapped), expected);
        }

        #[test]
        fn boards_with_empty_cells_never_draw(board in arb_board()) {
            if board.iter().any(Option::is_none) {
                prop_assert_ne!(evaluate(&board), Outcome::Draw);
            }
        }
    }
}
