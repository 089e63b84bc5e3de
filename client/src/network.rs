//! UDP connection to the room server
//!
//! macroquad owns the main thread and its own frame loop, so the socket
//! lives on a worker thread running a small tokio runtime. The frame loop
//! talks to it over two unbounded channels: requests are queued without
//! waiting, and [`Connection::poll`] drains whatever the server has sent
//! since the previous frame. Each acknowledgement is matched back to the
//! request that caused it.

use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Packet, Reply, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

/// A request awaiting its acknowledgement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    CreateRoom,
    JoinRoom { room_id: String },
    MakeMove { room_id: String, index: i32 },
    ResetGame { room_id: String },
}

/// Something the server told us
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    Connected { client_id: u32 },
    Disconnected { reason: String },
    Acked { request: Request, reply: Reply },
    /// Room broadcast (`RoomUpdate`, `StartGame`, `Update`, ...)
    Room(Packet),
}

pub struct Connection {
    server_addr: SocketAddr,
    outbound_tx: mpsc::UnboundedSender<Packet>,
    inbound_rx: mpsc::UnboundedReceiver<Packet>,
    worker: JoinHandle<()>,

    client_id: Option<u32>,
    next_request_id: u32,
    pending: HashMap<u32, Request>,
    last_heartbeat: Instant,
}

impl Connection {
    /// Starts the socket worker for `server_addr`.
    ///
    /// Binding happens on the worker; if it fails, the next [`poll`] reports
    /// a [`ServerEvent::Disconnected`] with the reason.
    ///
    /// [`poll`]: Connection::poll
    pub fn new(server_addr: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let server_addr: SocketAddr = server_addr.parse()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let worker = thread::Builder::new()
            .name("client-network".to_string())
            .spawn(move || {
                runtime.block_on(run_socket(server_addr, outbound_rx, inbound_tx));
            })?;

        Ok(Self {
            server_addr,
            outbound_tx,
            inbound_rx,
            worker,
            client_id: None,
            next_request_id: 1,
            pending: HashMap::new(),
            last_heartbeat: Instant::now(),
        })
    }

    pub fn client_id(&self) -> Option<u32> {
        self.client_id
    }

    pub fn is_connected(&self) -> bool {
        self.client_id.is_some()
    }

    fn send_packet(&self, packet: Packet) -> Result<(), Box<dyn std::error::Error>> {
        self.outbound_tx.send(packet)?;
        Ok(())
    }

    fn send_request(&mut self, request: Request) -> Result<u32, Box<dyn std::error::Error>> {
        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);

        let packet = match &request {
            Request::CreateRoom => Packet::CreateRoom { request_id },
            Request::JoinRoom { room_id } => Packet::JoinRoom {
                request_id,
                room_id: room_id.clone(),
            },
            Request::MakeMove { room_id, index } => Packet::MakeMove {
                request_id,
                room_id: room_id.clone(),
                index: *index,
            },
            Request::ResetGame { room_id } => Packet::ResetGame {
                request_id,
                room_id: room_id.clone(),
            },
        };

        self.send_packet(packet)?;
        self.pending.insert(request_id, request);
        Ok(request_id)
    }

    pub fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to {}", self.server_addr);
        self.send_packet(Packet::Connect {
            client_version: PROTOCOL_VERSION,
        })
    }

    pub fn create_room(&mut self) -> Result<u32, Box<dyn std::error::Error>> {
        self.send_request(Request::CreateRoom)
    }

    /// Room codes are uppercased before sending
    pub fn join_room(&mut self, room_id: &str) -> Result<u32, Box<dyn std::error::Error>> {
        self.send_request(Request::JoinRoom {
            room_id: room_id.trim().to_uppercase(),
        })
    }

    pub fn make_move(
        &mut self,
        room_id: &str,
        index: i32,
    ) -> Result<u32, Box<dyn std::error::Error>> {
        self.send_request(Request::MakeMove {
            room_id: room_id.to_string(),
            index,
        })
    }

    pub fn reset_game(&mut self, room_id: &str) -> Result<u32, Box<dyn std::error::Error>> {
        self.send_request(Request::ResetGame {
            room_id: room_id.to_string(),
        })
    }

    pub fn leave_room(&mut self, room_id: &str) -> Result<(), Box<dyn std::error::Error>> {
        self.send_packet(Packet::LeaveRoom {
            room_id: room_id.to_string(),
        })
    }

    pub fn disconnect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.client_id = None;
        self.pending.clear();
        self.send_packet(Packet::Disconnect)
    }

    /// Sends a heartbeat if one is due; the server drops silent clients
    pub fn heartbeat_if_due(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if !self.is_connected() || self.last_heartbeat.elapsed() < HEARTBEAT_INTERVAL {
            return Ok(());
        }
        self.last_heartbeat = Instant::now();
        self.send_packet(Packet::Heartbeat)
    }

    /// Takes every packet the worker has received since the last call
    pub fn poll(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(packet) = self.inbound_rx.try_recv() {
            events.extend(self.handle_packet(packet));
        }
        events
    }

    /// Stops the worker once everything already queued has been sent
    pub fn shutdown(self) {
        let Connection {
            outbound_tx,
            worker,
            ..
        } = self;

        drop(outbound_tx);
        if worker.join().is_err() {
            error!("Network worker panicked");
        }
    }

    fn handle_packet(&mut self, packet: Packet) -> Option<ServerEvent> {
        match packet {
            Packet::Connected { client_id } => {
                info!("Connected! Client ID: {}", client_id);
                self.client_id = Some(client_id);
                self.last_heartbeat = Instant::now();
                Some(ServerEvent::Connected { client_id })
            }
            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.client_id = None;
                self.pending.clear();
                Some(ServerEvent::Disconnected { reason })
            }
            Packet::Ack { request_id, reply } => match self.pending.remove(&request_id) {
                Some(request) => Some(ServerEvent::Acked { request, reply }),
                None => {
                    warn!("Ack for unknown request {}", request_id);
                    None
                }
            },
            Packet::RoomUpdate { .. }
            | Packet::StartGame { .. }
            | Packet::Update { .. }
            | Packet::GameOver { .. }
            | Packet::Reset { .. }
            | Packet::OpponentLeft { .. } => Some(ServerEvent::Room(packet)),
            other => {
                warn!("Unexpected packet type: {:?}", other);
                None
            }
        }
    }
}

/// Socket loop run on the worker thread.
///
/// Exits when the [`Connection`] side of either channel is dropped.
async fn run_socket(
    server_addr: SocketAddr,
    mut outbound_rx: mpsc::UnboundedReceiver<Packet>,
    inbound_tx: mpsc::UnboundedSender<Packet>,
) {
    let bind_addr = if server_addr.is_ipv4() {
        "0.0.0.0:0"
    } else {
        "[::]:0"
    };

    let socket = match UdpSocket::bind(bind_addr).await {
        Ok(socket) => socket,
        Err(e) => {
            error!("Failed to bind client socket: {}", e);
            let _ = inbound_tx.send(Packet::Disconnected {
                reason: format!("Failed to bind socket: {}", e),
            });
            return;
        }
    };

    let mut buffer = [0u8; MAX_PACKET_SIZE];

    loop {
        tokio::select! {
            outgoing = outbound_rx.recv() => match outgoing {
                Some(packet) => {
                    if let Err(e) = send_to_server(&socket, &packet, server_addr).await {
                        error!("Error sending packet: {}", e);
                    }
                }
                None => break,
            },

            result = socket.recv_from(&mut buffer) => match result {
                Ok((len, addr)) if addr == server_addr => {
                    match deserialize::<Packet>(&buffer[0..len]) {
                        Ok(packet) => {
                            if inbound_tx.send(packet).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Failed to deserialize packet: {}", e),
                    }
                }
                Ok((_, addr)) => debug!("Ignoring datagram from {}", addr),
                Err(e) => error!("Error receiving packet: {}", e),
            },
        }
    }
}

async fn send_to_server(
    socket: &UdpSocket,
    packet: &Packet,
    server_addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = serialize(packet)?;
    socket.send_to(&data, server_addr).await?;
    Ok(())
}
