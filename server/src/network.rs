//! Server network layer: UDP transport around the session gateway

use crate::client_manager::ClientManager;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::gateway::{Broadcast, SessionGateway};
use crate::room::ClientId;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Packet, Reply, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

/// Messages sent from network tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { client_id: ClientId },
    Shutdown,
}

/// Messages sent from the main server loop to the sender task
#[derive(Debug)]
pub enum OutboundMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    BroadcastPacket {
        packet: Packet,
        recipients: Vec<ClientId>,
    },
}

/// Authoritative room server
///
/// Datagrams are decoded by a receiver task and funnelled into one event
/// loop that owns the [`SessionGateway`], so every action is applied to
/// room state strictly one at a time. Replies and room events are queued
/// to a sender task.
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    gateway: SessionGateway,
    client_timeout: Duration,
    tasks: Vec<JoinHandle<()>>,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    outbound_tx: mpsc::UnboundedSender<OutboundMessage>,
    outbound_rx: Option<mpsc::UnboundedReceiver<OutboundMessage>>,
}

impl Server {
    /// Binds the socket described by `config` with an empty room store
    pub async fn new(config: &ServerConfig) -> Result<Self, ServerError> {
        Self::with_gateway(config, SessionGateway::default()).await
    }

    /// Binds the socket and serves rooms through `gateway`
    ///
    /// Tests use this to supply a seeded store. Fails with
    /// [`ServerError::InvalidConfig`] before binding if `config` is invalid.
    pub async fn with_gateway(
        config: &ServerConfig,
        gateway: SessionGateway,
    ) -> Result<Self, ServerError> {
        config.validate()?;

        let socket = Arc::new(UdpSocket::bind(&config.bind_addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(
                config.max_clients,
                config.client_timeout,
            ))),
            gateway,
            client_timeout: config.client_timeout,
            tasks: Vec::new(),
            server_tx,
            server_rx,
            outbound_tx,
            outbound_rx: Some(outbound_rx),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.socket.local_addr()?)
    }

    /// Handle for injecting events, e.g. [`ServerMessage::Shutdown`]
    pub fn control(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that continuously listens for incoming packets
    ///
    /// Each datagram is decoded and forwarded to the event loop together
    /// with its source address. Undecodable datagrams are logged and
    /// dropped without a reply.
    fn spawn_network_receiver(&mut self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        self.tasks.push(tokio::spawn(async move {
            let mut buffer = [0u8; MAX_PACKET_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        }));
    }

    /// Spawns task that processes the outgoing packet queue
    ///
    /// Broadcast recipients are resolved to addresses at send time, so a
    /// member that disconnected in the meantime is skipped. Messages leave
    /// in the order the event loop queued them.
    fn spawn_network_sender(&mut self) {
        let Some(mut outbound_rx) = self.outbound_rx.take() else {
            return;
        };
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);

        self.tasks.push(tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                match message {
                    OutboundMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    OutboundMessage::BroadcastPacket { packet, recipients } => {
                        let addrs: Vec<(ClientId, SocketAddr)> = {
                            let clients_guard = clients.read().await;
                            recipients
                                .iter()
                                .filter_map(|id| clients_guard.addr_of(*id).map(|addr| (*id, addr)))
                                .collect()
                        };

                        for (client_id, addr) in addrs {
                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to client {}: {}", client_id, e);
                            }
                        }
                    }
                }
            }
        }));
    }

    /// Spawns task that monitors client timeouts
    ///
    /// Checks twice per timeout period (at most once a second) and reports
    /// every silent client to the event loop as a [`ServerMessage::ClientTimeout`].
    fn spawn_timeout_checker(&mut self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();
        let period =
            (self.client_timeout / 2).clamp(Duration::from_millis(1), Duration::from_secs(1));

        self.tasks.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for client_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        }));
    }

    /// Encodes and sends a single packet; used only by the sender task
    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), ServerError> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    /// Queues a packet for one address without waiting for the send
    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self
            .outbound_tx
            .send(OutboundMessage::SendPacket { packet, addr })
        {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    /// Queues every room event the gateway produced for delivery
    fn flush_broadcasts(&self, events: Vec<Broadcast>) {
        for broadcast in events {
            if let Err(e) = self.outbound_tx.send(OutboundMessage::BroadcastPacket {
                packet: broadcast.packet,
                recipients: broadcast.recipients,
            }) {
                error!("Failed to queue broadcast packet: {}", e);
            }
        }
    }

    /// Removes a connection from every room it was seated in
    ///
    /// Shared by explicit disconnects, timeouts and reconnects from the same
    /// address. The caller removes the transport record first.
    fn drop_session(&mut self, client_id: ClientId) {
        self.gateway.disconnect(client_id);
        let events = self.gateway.drain_broadcasts();
        self.flush_broadcasts(events);
    }

    /// Handles a connection handshake
    ///
    /// Refuses mismatched protocol versions and a full server with
    /// [`Packet::Disconnected`]. A repeat `Connect` from an address that is
    /// already connected replaces the old connection, including its rooms.
    async fn handle_connect(&mut self, client_version: u32, addr: SocketAddr) {
        info!(
            "Client connecting from {} (version: {})",
            addr, client_version
        );

        if client_version != PROTOCOL_VERSION {
            let response = Packet::Disconnected {
                reason: "Unsupported client version".to_string(),
            };
            self.send_packet(response, addr);
            return;
        }

        // Remove existing connection if present
        let existing_client_id = {
            let clients = self.clients.read().await;
            clients.find_client_by_addr(addr)
        };

        if let Some(existing_id) = existing_client_id {
            info!("Removing existing client {} from {}", existing_id, addr);
            self.clients.write().await.remove_client(&existing_id);
            self.drop_session(existing_id);
        }

        let client_id = {
            let mut clients = self.clients.write().await;
            clients.add_client(addr)
        };

        let response = match client_id {
            Some(client_id) => {
                self.gateway.connect(client_id);
                Packet::Connected { client_id }
            }
            None => Packet::Disconnected {
                reason: "Server full".to_string(),
            },
        };
        self.send_packet(response, addr);
    }

    /// Applies one client request to the gateway and acknowledges it
    fn handle_request(&mut self, client_id: ClientId, packet: Packet, addr: SocketAddr) {
        let (request_id, reply) = match packet {
            Packet::CreateRoom { request_id } => {
                (request_id, Reply::from(self.gateway.create_room(client_id)))
            }
            Packet::JoinRoom {
                request_id,
                room_id,
            } => (
                request_id,
                Reply::from(self.gateway.join_room(client_id, &room_id)),
            ),
            Packet::MakeMove {
                request_id,
                room_id,
                index,
            } => (
                request_id,
                Reply::from(self.gateway.make_move(client_id, &room_id, index)),
            ),
            Packet::ResetGame {
                request_id,
                room_id,
            } => (
                request_id,
                Reply::from(self.gateway.reset_game(client_id, &room_id)),
            ),
            Packet::LeaveRoom { room_id } => {
                self.gateway.leave_room(client_id, &room_id);
                let events = self.gateway.drain_broadcasts();
                self.flush_broadcasts(events);
                return;
            }
            other => {
                warn!("Unexpected packet from client {}: {:?}", client_id, other);
                return;
            }
        };

        if let Reply::Rejected(reason) = &reply {
            debug!(
                "Request {} from client {} rejected: {}",
                request_id, client_id, reason
            );
        }

        self.send_packet(Packet::Ack { request_id, reply }, addr);
        let events = self.gateway.drain_broadcasts();
        self.flush_broadcasts(events);
    }

    /// Processes incoming packets and updates room state
    ///
    /// Any packet from a connected address refreshes its liveness. Requests
    /// from unknown addresses are refused; heartbeats from them are ignored.
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect { client_version } => {
                self.handle_connect(client_version, addr).await;
            }

            Packet::Heartbeat => {
                self.clients.write().await.touch(addr);
            }

            Packet::Disconnect => {
                let client_id = {
                    let mut clients = self.clients.write().await;
                    let client_id = clients.find_client_by_addr(addr);
                    if let Some(id) = &client_id {
                        clients.remove_client(id);
                    }
                    client_id
                };

                if let Some(client_id) = client_id {
                    self.drop_session(client_id);
                }
            }

            request => {
                let client_id = self.clients.write().await.touch(addr);

                match client_id {
                    Some(client_id) => self.handle_request(client_id, request, addr),
                    None => {
                        warn!("Packet from unconnected address {}", addr);
                        let response = Packet::Disconnected {
                            reason: "Not connected".to_string(),
                        };
                        self.send_packet(response, addr);
                    }
                }
            }
        }
    }

    /// Applies events one at a time until a shutdown request arrives
    async fn event_loop(&mut self) -> Result<(), ServerError> {
        loop {
            let message = self
                .server_rx
                .recv()
                .await
                .ok_or(ServerError::ChannelClosed)?;

            match message {
                ServerMessage::PacketReceived { packet, addr } => {
                    self.handle_packet(packet, addr).await;
                }
                ServerMessage::ClientTimeout { client_id } => {
                    info!("Client {} timed out", client_id);
                    self.drop_session(client_id);
                }
                ServerMessage::Shutdown => {
                    info!("Server shutting down");
                    return Ok(());
                }
            }
        }
    }

    /// Main server loop; returns after a [`ServerMessage::Shutdown`]
    pub async fn run(&mut self) -> Result<(), ServerError> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        info!("Server started successfully");
        let result = self.event_loop().await;

        for task in self.tasks.drain(..) {
            task.abort();
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room_store::RoomStore;
    use shared::{Mark, RoomError};

    fn test_config() -> ServerConfig {
        ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            ..ServerConfig::default()
        }
    }

    async fn start_server(
        config: ServerConfig,
    ) -> (SocketAddr, mpsc::UnboundedSender<ServerMessage>) {
        let gateway = SessionGateway::new(RoomStore::with_seed(5));
        let mut server = Server::with_gateway(&config, gateway).await.unwrap();
        let addr = server.local_addr().unwrap();
        let control = server.control();
        tokio::spawn(async move {
            let _ = server.run().await;
        });
        (addr, control)
    }

    fn connect_packet() -> Packet {
        Packet::Connect {
            client_version: PROTOCOL_VERSION,
        }
    }

    async fn exchange(socket: &UdpSocket, server: SocketAddr, packet: &Packet) -> Packet {
        socket.send_to(&serialize(packet).unwrap(), server).await.unwrap();
        recv(socket).await
    }

    async fn recv(socket: &UdpSocket) -> Packet {
        let mut buf = [0u8; MAX_PACKET_SIZE];
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
            .await
            .expect("timed out waiting for server")
            .unwrap();
        deserialize(&buf[..len]).unwrap()
    }

    #[tokio::test]
    async fn test_rejects_invalid_config() {
        let config = ServerConfig {
            max_clients: 0,
            ..test_config()
        };
        assert!(matches!(
            Server::new(&config).await,
            Err(ServerError::InvalidConfig { .. })
        ));
    }

    #[tokio::test]
    async fn test_connect_and_create_room() {
        let (server, control) = start_server(test_config()).await;
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let connected = exchange(&socket, server, &connect_packet()).await;
        assert!(matches!(connected, Packet::Connected { client_id: 1 }));

        let ack = exchange(&socket, server, &Packet::CreateRoom { request_id: 1 }).await;
        match ack {
            Packet::Ack {
                request_id: 1,
                reply: Reply::Seated(ticket),
            } => assert_eq!(ticket.mark, Mark::X),
            other => panic!("Unexpected reply: {:?}", other),
        }
        assert!(matches!(
            recv(&socket).await,
            Packet::RoomUpdate { players_count: 1, .. }
        ));

        control.send(ServerMessage::Shutdown).unwrap();
    }

    #[tokio::test]
    async fn test_version_mismatch_refused() {
        let (server, control) = start_server(test_config()).await;
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let reply = exchange(&socket, server, &Packet::Connect { client_version: 999 }).await;
        assert!(matches!(reply, Packet::Disconnected { .. }));

        control.send(ServerMessage::Shutdown).unwrap();
    }

    #[tokio::test]
    async fn test_server_full() {
        let config = ServerConfig {
            max_clients: 1,
            ..test_config()
        };
        let (server, control) = start_server(config).await;
        let first = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let second = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let connect = connect_packet();

        assert!(matches!(
            exchange(&first, server, &connect).await,
            Packet::Connected { .. }
        ));
        match exchange(&second, server, &connect).await {
            Packet::Disconnected { reason } => assert_eq!(reason, "Server full"),
            other => panic!("Unexpected reply: {:?}", other),
        }

        control.send(ServerMessage::Shutdown).unwrap();
    }

    #[tokio::test]
    async fn test_unconnected_request_refused() {
        let (server, control) = start_server(test_config()).await;
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let reply = exchange(&socket, server, &Packet::CreateRoom { request_id: 3 }).await;
        assert!(matches!(reply, Packet::Disconnected { .. }));

        control.send(ServerMessage::Shutdown).unwrap();
    }

    #[tokio::test]
    async fn test_rejected_join_acknowledged() {
        let (server, control) = start_server(test_config()).await;
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        exchange(&socket, server, &connect_packet()).await;

        let join = Packet::JoinRoom {
            request_id: 9,
            room_id: "nope".to_string(),
        };
        assert_eq!(
            exchange(&socket, server, &join).await,
            Packet::Ack {
                request_id: 9,
                reply: Reply::Rejected(RoomError::RoomNotFound),
            }
        );

        control.send(ServerMessage::Shutdown).unwrap();
    }

    #[tokio::test]
    async fn test_reconnect_drops_old_session() {
        let (server, control) = start_server(test_config()).await;
        let first = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let second = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let old_id = match exchange(&first, server, &connect_packet()).await {
            Packet::Connected { client_id } => client_id,
            other => panic!("Unexpected reply: {:?}", other),
        };
        let room_id = match exchange(&first, server, &Packet::CreateRoom { request_id: 1 }).await {
            Packet::Ack {
                reply: Reply::Seated(ticket),
                ..
            } => ticket.room_id,
            other => panic!("Unexpected reply: {:?}", other),
        };
        assert!(matches!(recv(&first).await, Packet::RoomUpdate { .. }));

        // Same address connects again: the old seat goes and the room with it
        match exchange(&first, server, &connect_packet()).await {
            Packet::Connected { client_id } => assert_ne!(client_id, old_id),
            other => panic!("Unexpected reply: {:?}", other),
        }

        exchange(&second, server, &connect_packet()).await;
        let join = Packet::JoinRoom {
            request_id: 2,
            room_id: room_id.as_str().to_string(),
        };
        assert_eq!(
            exchange(&second, server, &join).await,
            Packet::Ack {
                request_id: 2,
                reply: Reply::Rejected(RoomError::RoomNotFound),
            }
        );

        control.send(ServerMessage::Shutdown).unwrap();
    }

    #[tokio::test]
    async fn test_heartbeat_from_unknown_address_ignored() {
        let (server, control) = start_server(test_config()).await;
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        socket
            .send_to(&serialize(&Packet::Heartbeat).unwrap(), server)
            .await
            .unwrap();

        // The first reply is for the connect, nothing was sent for the heartbeat
        assert!(matches!(
            exchange(&socket, server, &connect_packet()).await,
            Packet::Connected { .. }
        ));

        control.send(ServerMessage::Shutdown).unwrap();
    }

    #[tokio::test]
    async fn test_undecodable_datagram_dropped() {
        let (server, control) = start_server(test_config()).await;
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        socket.send_to(&[0xff; 16], server).await.unwrap();

        assert!(matches!(
            exchange(&socket, server, &connect_packet()).await,
            Packet::Connected { .. }
        ));
        let ack = exchange(&socket, server, &Packet::CreateRoom { request_id: 4 }).await;
        assert!(matches!(
            ack,
            Packet::Ack {
                request_id: 4,
                reply: Reply::Seated(_),
            }
        ));

        control.send(ServerMessage::Shutdown).unwrap();
    }
}
