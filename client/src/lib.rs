//! # Tic-Tac-Toe Room Client
//!
//! A macroquad front end for the room server. The client holds no game
//! rules of its own: it sends requests and draws whatever the server
//! broadcasts back.
//!
//! ## Module Organization
//!
//! - `network`: UDP connection on a tokio worker thread, request ids and heartbeats
//! - `game`: the local view model built from server events
//! - `input`: screen layout, hit-testing and the typed room code
//! - `rendering`: draws the board, buttons and status line
//!
//! ## Frame Loop
//!
//! Each frame the client polls the connection, folds the events into
//! [`game::ClientGameState`], turns input into requests, sends a heartbeat
//! when one is due and renders.

pub mod game;
pub mod input;
pub mod network;
pub mod rendering;
