use crate::error::ServerError;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;

/// Runtime settings for [`crate::network::Server`]
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the UDP socket binds to
    pub bind_addr: String,
    /// Maximum number of concurrent connections
    pub max_clients: usize,
    /// Silence after which a connection is treated as disconnected
    pub client_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("127.0.0.1:{}", DEFAULT_PORT),
            max_clients: 256,
            client_timeout: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.max_clients == 0 {
            return Err(ServerError::InvalidConfig {
                reason: "max_clients must be at least 1".to_string(),
            });
        }
        if self.client_timeout.is_zero() {
            return Err(ServerError::InvalidConfig {
                reason: "client timeout must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}
