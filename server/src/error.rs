//! Process-level server errors
//!
//! Request validation failures are not errors of the server; they travel
//! back to the client as [`shared::RoomError`] inside an acknowledgement.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("server event channel closed")]
    ChannelClosed,
}
