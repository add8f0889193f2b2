//! Server network layer: UDP transport, room membership and broadcast fan-out

use crate::client_manager::ClientManager;
use crate::config::RoomConfig;
use crate::room::{Room, RoomError};
use crate::simulation::{RoomBroadcaster, RoomSimulationLoop, SharedRoom};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{CarConfig, MapObject, Packet, PlayerId, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex, RwLock};

/// Outbound packets queued per sender task before new ones are dropped.
const OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { client_id: PlayerId },
    Shutdown,
}

/// Messages sent from the room to the network sender task
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    BroadcastPacket {
        packet: Packet,
        exclude: Option<PlayerId>,
    },
}

/// Bounded outbound queue. Full queues drop packets instead of blocking the tick.
#[derive(Clone)]
pub struct OutboundQueue {
    tx: mpsc::Sender<GameMessage>,
}

impl OutboundQueue {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<GameMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    fn push(&self, message: GameMessage) {
        match self.tx.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => debug!("Outbound queue full, dropping packet"),
            Err(TrySendError::Closed(_)) => debug!("Outbound queue closed, dropping packet"),
        }
    }

    pub fn send_to(&self, packet: Packet, addr: SocketAddr) {
        self.push(GameMessage::SendPacket { packet, addr });
    }
}

impl RoomBroadcaster for OutboundQueue {
    fn send_broadcast_action(&self, exclude: Option<PlayerId>, packet: Packet) {
        self.push(GameMessage::BroadcastPacket { packet, exclude });
    }
}

/// Racing server hosting a single room
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    room: SharedRoom,
    simulation: RoomSimulationLoop,
    outbound: OutboundQueue,
    player_idle_time: Duration,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_rx: Option<mpsc::Receiver<GameMessage>>,
}

impl Server {
    pub async fn new(
        addr: &str,
        config: RoomConfig,
        car_config: CarConfig,
        fixtures: Vec<MapObject>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let player_idle_time = config.player_idle_time;
        let max_clients = config.players_limit;
        let room = Arc::new(Mutex::new(Room::new(config, car_config, fixtures)?));

        let (outbound, game_rx) = OutboundQueue::new(OUTBOUND_QUEUE_CAPACITY);
        let simulation = RoomSimulationLoop::new(Arc::clone(&room), Arc::new(outbound.clone()));
        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(max_clients))),
            room,
            simulation,
            outbound,
            player_idle_time,
            server_tx,
            server_rx,
            game_rx: Some(game_rx),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Handle for requesting shutdown from another task
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 4096];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if server_tx
                                .send(ServerMessage::PacketReceived { packet, addr })
                                .is_err()
                            {
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
        });
    }

    /// Spawns task that drains the outbound queue onto the socket
    fn spawn_network_sender(&mut self) {
        let Some(mut game_rx) = self.game_rx.take() else {
            return;
        };
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet, exclude } => {
                        let data = match serialize(&packet) {
                            Ok(data) => data,
                            Err(e) => {
                                error!("Failed to serialize broadcast: {}", e);
                                continue;
                            }
                        };
                        let client_addrs = clients.read().await.get_client_addrs();

                        for (client_id, addr) in client_addrs {
                            if Some(client_id) == exclude {
                                continue;
                            }
                            if let Err(e) = socket.send_to(&data, addr).await {
                                debug!("Failed to send to client {}: {}", client_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that removes clients idle for longer than the room allows
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();
        let idle_time = self.player_idle_time;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = clients.write().await.check_timeouts(idle_time);

                for client_id in timed_out {
                    if server_tx
                        .send(ServerMessage::ClientTimeout { client_id })
                        .is_err()
                    {
                        return;
                    }
                }
            }
        });
    }

    /// Removes a player from the room and tells everyone else.
    async fn leave_room(&self, client_id: PlayerId) {
        let removed = self.room.lock().await.remove_player(client_id);

        if let Some(player) = removed {
            self.outbound
                .send_broadcast_action(Some(client_id), Packet::PlayerLeft { player });
        }
    }

    async fn join_room(&self, addr: SocketAddr, nick: String) {
        let client_id = self.clients.write().await.add_client(addr);

        let Some(client_id) = client_id else {
            self.outbound.send_to(
                Packet::Disconnected {
                    reason: "Room full".to_string(),
                },
                addr,
            );
            return;
        };

        let joined = {
            let mut room = self.room.lock().await;
            room.add_player(client_id, nick)
                .map(|(player, car)| (player, car, room.initial_room_state()))
        };

        match joined {
            Ok((player, car, state)) => {
                self.outbound.send_to(
                    Packet::Connected {
                        player_id: client_id,
                        car_id: player.car_id,
                    },
                    addr,
                );
                self.outbound
                    .send_to(Packet::RoomInitialState(state), addr);
                self.outbound.send_broadcast_action(
                    Some(client_id),
                    Packet::PlayerJoined { player, car },
                );
            }
            Err(e) => {
                warn!("Rejecting client {} from {}: {}", client_id, addr, e);
                self.clients.write().await.remove_client(&client_id);
                let reason = match e {
                    RoomError::RoomFull(_) => "Room full".to_string(),
                    other => other.to_string(),
                };
                self.outbound.send_to(Packet::Disconnected { reason }, addr);
            }
        }
    }

    /// Processes one inbound packet
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect {
                client_version,
                nick,
            } => {
                info!(
                    "Client connecting from {} (version: {}, nick: {})",
                    addr, client_version, nick
                );

                if client_version != PROTOCOL_VERSION {
                    self.outbound.send_to(
                        Packet::Disconnected {
                            reason: "Protocol version mismatch".to_string(),
                        },
                        addr,
                    );
                    return;
                }

                let existing_client_id = self.clients.read().await.find_client_by_addr(addr);
                if let Some(existing_id) = existing_client_id {
                    info!("Removing existing client {} from {}", existing_id, addr);
                    self.clients.write().await.remove_client(&existing_id);
                    self.leave_room(existing_id).await;
                }

                self.join_room(addr, nick).await;
            }

            Packet::SendKeyMap { key_map } => {
                let client_id = self.clients.write().await.touch_by_addr(addr);

                if let Some(client_id) = client_id {
                    if let Err(e) = self.room.lock().await.enqueue_input(client_id, key_map) {
                        debug!("Dropping key map from {}: {}", addr, e);
                    }
                }
            }

            Packet::GetRoomInitialState => {
                let client_id = self.clients.write().await.touch_by_addr(addr);

                if client_id.is_some() {
                    let state = self.room.lock().await.initial_room_state();
                    self.outbound.send_to(Packet::RoomInitialState(state), addr);
                }
            }

            Packet::Disconnect => {
                let client_id = self.clients.read().await.find_client_by_addr(addr);

                if let Some(client_id) = client_id {
                    self.clients.write().await.remove_client(&client_id);
                    self.leave_room(client_id).await;
                }
            }

            other => {
                warn!(
                    "Unexpected packet (action {}) from client at {}",
                    other.action().code(),
                    addr
                );
            }
        }
    }

    /// Main server loop: network events in, simulation running alongside
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();
        self.simulation.start().await?;

        info!("Server started successfully");

        while let Some(message) = self.server_rx.recv().await {
            match message {
                ServerMessage::PacketReceived { packet, addr } => {
                    self.handle_packet(packet, addr).await;
                }
                ServerMessage::ClientTimeout { client_id } => {
                    info!("Client {} timed out", client_id);
                    self.leave_room(client_id).await;
                }
                ServerMessage::Shutdown => break,
            }
        }

        info!("Server shutting down");
        self.simulation.shutdown().await;
        self.room.lock().await.release();

        Ok(())
    }
}

async fn send_packet_impl(
    socket: &UdpSocket,
    packet: &Packet,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = serialize(packet)?;
    socket.send_to(&data, addr).await?;
    Ok(())
}
