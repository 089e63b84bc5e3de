//! Connection tracking for the UDP transport
//!
//! This module handles the server-side bookkeeping of connected clients:
//! - Connection lifecycle: connect, explicit disconnect and timeout
//! - Attributing each datagram to a connection by its source address
//! - Liveness monitoring, refreshed by heartbeats and any other request
//! - Capacity limits and connection id allocation
//!
//! Room membership is not tracked here. The session gateway owns it, and
//! the server loop forwards every removal reported by this module to the
//! gateway so both views stay in step.

use crate::room::ClientId;
use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A connected client as seen by the transport
///
/// Holds only what the transport needs to reach the client and to decide
/// whether it is still alive.
#[derive(Debug)]
pub struct Client {
    /// Connection id assigned by the server
    pub id: ClientId,
    /// Where replies and room events are sent
    pub addr: SocketAddr,
    /// Arrival time of the latest datagram from this address
    pub last_seen: Instant,
}

impl Client {
    /// Creates a client record that counts as active right now
    pub fn new(id: ClientId, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
        }
    }

    /// Marks the client as recently active
    ///
    /// Called for heartbeats and for every request from the client's
    /// address, so an active player never needs a separate heartbeat.
    pub fn refresh(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Checks if the client has exceeded the connection timeout
    ///
    /// Returns true once nothing has arrived from the client for longer
    /// than `timeout`. UDP gives no close notification, so this is how a
    /// vanished client is noticed.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected clients
///
/// The ClientManager enforces server capacity, hands out connection ids and
/// maps datagram source addresses back to them. Silent clients are reported
/// by [`ClientManager::check_timeouts`] so the server can run the same
/// cleanup as an explicit disconnect.
pub struct ClientManager {
    /// Connected clients indexed by id
    clients: HashMap<ClientId, Client>,
    /// Candidate for the next allocated id
    next_client_id: ClientId,
    /// Maximum number of concurrent connections
    max_clients: usize,
    /// Silence after which a client counts as disconnected
    timeout: Duration,
}

impl ClientManager {
    /// Creates an empty manager with the given capacity and timeout
    ///
    /// Ids are handed out from 1 upwards. After `ClientId::MAX` the counter
    /// wraps back to 1 and skips ids that are still connected.
    pub fn new(max_clients: usize, timeout: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
            timeout,
        }
    }

    /// Attempts to register a new connection from `addr`
    ///
    /// Returns the new id, or None when the server is at capacity.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<ClientId> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.allocate_id();

        info!("Client {} connected from {}", client_id, addr);
        self.clients.insert(client_id, Client::new(client_id, addr));

        Some(client_id)
    }

    /// Next id not held by a connected client; 0 is never used.
    ///
    /// Terminates because the capacity check leaves at least one id free.
    fn allocate_id(&mut self) -> ClientId {
        loop {
            let candidate = self.next_client_id;
            self.next_client_id = self.next_client_id.wrapping_add(1).max(1);
            if !self.clients.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    /// Removes a client from the server
    ///
    /// Returns true if the client was found and removed, false if it was
    /// already gone. Room cleanup is the caller's job.
    pub fn remove_client(&mut self, client_id: &ClientId) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!("Client {} disconnected", client.id);
            true
        } else {
            false
        }
    }

    /// Finds the connection sending from `addr`, without touching liveness
    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<ClientId> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Looks up the client sending from `addr` and refreshes its liveness
    ///
    /// Returns None for addresses with no connection, which the server
    /// answers with a "Not connected" refusal.
    pub fn touch(&mut self, addr: SocketAddr) -> Option<ClientId> {
        let client = self.clients.values_mut().find(|client| client.addr == addr)?;
        client.refresh();
        Some(client.id)
    }

    /// Network address of a connected client
    pub fn addr_of(&self, client_id: ClientId) -> Option<SocketAddr> {
        self.clients.get(&client_id).map(|client| client.addr)
    }

    /// Checks for and removes timed-out clients
    ///
    /// Returns the removed ids so the caller can run the same room cleanup
    /// as for an explicit disconnect.
    pub fn check_timeouts(&mut self) -> Vec<ClientId> {
        let timeout = self.timeout;
        let timed_out: Vec<ClientId> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        for client_id in &timed_out {
            self.remove_client(client_id);
        }

        timed_out
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no clients are currently connected
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
