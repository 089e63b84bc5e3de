//! # Room Server Library
//!
//! Authoritative server for two-player tic-tac-toe rooms. Clients create a
//! room, share its short code, and the second client joins with it. The
//! server owns the only real copy of every board: it seats players,
//! enforces turn order, validates moves, detects wins and draws, and pushes
//! the resulting state to both members of the room after each action.
//!
//! ## Module Organization
//!
//! ### Room Module (`room`)
//! State of a single room and the rules that guard it:
//! - At most two seats, X assigned before O
//! - Strict turn alternation and write-once cells
//! - Terminal detection through [`shared::evaluate`]
//!
//! ### Room Store Module (`room_store`)
//! Registry of live rooms with creation, lookup and deletion. Room codes
//! are regenerated on collision so they stay unique among live rooms.
//!
//! ### Gateway Module (`gateway`)
//! Maps each client action onto the store, returns the outcome to the
//! caller and queues room events for every member. Tracks which rooms each
//! connection is seated in so a disconnect leaves all of them.
//!
//! ### Client Manager Module (`client_manager`)
//! Transport-side connection bookkeeping: ids, addresses, capacity and
//! heartbeat timeouts.
//!
//! ### Network Module (`network`)
//! UDP socket handling and the single event loop that serializes all
//! room mutations.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         bind_addr: "0.0.0.0:3000".to_string(),
//!         ..ServerConfig::default()
//!     };
//!
//!     let mut server = Server::new(&config).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod config;
pub mod error;
pub mod gateway;
pub mod network;
pub mod room;
pub mod room_store;
