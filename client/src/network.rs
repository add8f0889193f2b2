use crate::game::GameBoard;
use crate::input::{DrivingMode, InputManager};
use crate::reconciler::{ReconcilerConfig, RemoteStateReconciler};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{KeyMap, ObjectId, Packet, PlayerId, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, MissedTickBehavior};

/// Local frame interval for input sampling and own-car simulation.
const FRAME_INTERVAL: Duration = Duration::from_millis(16);

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    nick: String,
    player_id: Option<PlayerId>,
    connected: bool,

    reconciler: RemoteStateReconciler<GameBoard>,
    input_manager: InputManager,
    frames_received: u64,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        nick: String,
        mode: DrivingMode,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            nick,
            player_id: None,
            connected: false,
            reconciler: RemoteStateReconciler::new(ReconcilerConfig::default(), GameBoard::new()),
            input_manager: InputManager::new(mode),
            frames_received: 0,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn board(&self) -> Option<&GameBoard> {
        self.reconciler.listeners()
    }

    async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to server as {}...", self.nick);

        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
            nick: self.nick.clone(),
        };
        self.send_packet(&packet).await
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    fn set_local_car(&mut self, car_id: Option<ObjectId>) {
        self.reconciler.set_local_car(car_id);
        if let Some(board) = self.reconciler.listeners_mut() {
            board.set_local_car(car_id);
        }
    }

    fn handle_packet(&mut self, packet: Packet) {
        match packet {
            Packet::Connected { player_id, car_id } => {
                info!("Connected! Player ID: {}, car: {}", player_id, car_id);
                self.player_id = Some(player_id);
                self.connected = true;
                self.set_local_car(Some(car_id));
            }

            Packet::RoomInitialState(state) => {
                if let Some(board) = self.reconciler.listeners_mut() {
                    board.load_initial_room_state(state);
                }
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.connected = false;
                self.player_id = None;
                self.set_local_car(None);
            }

            packet @ (Packet::RaceState { .. }
            | Packet::PlayerJoined { .. }
            | Packet::PlayerLeft { .. }) => {
                if matches!(packet, Packet::RaceState { .. }) {
                    self.frames_received += 1;
                    if self.frames_received % 300 == 0 {
                        debug!("Received {} race state frames", self.frames_received);
                    }
                }
                self.reconciler.handle_packet(&packet);
            }

            other => {
                warn!("Unexpected packet (action {})", other.action().code());
            }
        }
    }

    async fn send_key_map(&self, key_map: KeyMap) -> Result<(), Box<dyn std::error::Error>> {
        if !self.connected {
            return Ok(());
        }
        self.send_packet(&Packet::SendKeyMap { key_map }).await
    }

    /// Runs until `duration` elapses, or forever when it is `None`.
    pub async fn run(
        &mut self,
        duration: Option<Duration>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;

        let mut frame_interval = interval(FRAME_INTERVAL);
        frame_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let deadline = duration.map(|d| tokio::time::Instant::now() + d);

        let mut buffer = [0u8; 65_536];

        loop {
            if deadline.is_some_and(|deadline| tokio::time::Instant::now() >= deadline) {
                break;
            }

            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => match deserialize::<Packet>(&buffer[0..len]) {
                            Ok(packet) => self.handle_packet(packet),
                            Err(e) => warn!("Failed to deserialize packet: {}", e),
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                _ = frame_interval.tick() => {
                    let key_map = self.input_manager.update();
                    let current = self.input_manager.current().clone();

                    if let Some(board) = self.reconciler.listeners_mut() {
                        board.drive_local_car(&current, FRAME_INTERVAL.as_secs_f32());
                    }

                    if let Some(key_map) = key_map {
                        if let Err(e) = self.send_key_map(key_map).await {
                            error!("Error sending key map: {}", e);
                        }
                    }
                },

                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C, leaving room");
                    break;
                }
            }
        }

        if self.connected {
            let _ = self.send_packet(&Packet::Disconnect).await;
        }
        self.reconciler.release_listeners();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::snapshot::encode_frame;
    use shared::{CarConfig, CarPhysicsBody, CarSyncInfo, InitialRoomState, MapObject, PlayerInfo, Vec2};
    use tokio_test::assert_ok;

    fn state() -> InitialRoomState {
        let body = CarPhysicsBody::new(CarConfig::default(), Vec2::ZERO, 0.0).unwrap();
        InitialRoomState {
            players: vec![
                PlayerInfo {
                    id: 1,
                    nick: "me".to_string(),
                    car_id: 5,
                },
                PlayerInfo {
                    id: 2,
                    nick: "other".to_string(),
                    car_id: 6,
                },
            ],
            objects: vec![MapObject::car(5, body.clone()), MapObject::car(6, body)],
        }
    }

    #[tokio::test]
    async fn test_connected_tags_local_car() {
        let mut client = assert_ok!(Client::new("127.0.0.1:9", "me".to_string(), DrivingMode::Idle).await);

        client.handle_packet(Packet::Connected {
            player_id: 1,
            car_id: 5,
        });
        client.handle_packet(Packet::RoomInitialState(state()));

        assert!(client.is_connected());
        assert_eq!(client.board().unwrap().local_car_id(), Some(5));

        let moved = |id| CarSyncInfo {
            id,
            pos: Vec2::new(3.0, 3.0),
            ..CarSyncInfo::default()
        };
        client.handle_packet(Packet::RaceState {
            frame: encode_frame(&[moved(5), moved(6)]).unwrap(),
        });

        let board = client.board().unwrap();
        assert_eq!(board.car(5).unwrap().pos, Vec2::ZERO);
        assert_eq!(board.car(6).unwrap().pos, Vec2::new(3.0, 3.0));
    }

    #[tokio::test]
    async fn test_disconnected_clears_session() {
        let mut client = assert_ok!(Client::new("127.0.0.1:9", "me".to_string(), DrivingMode::Idle).await);

        client.handle_packet(Packet::Connected {
            player_id: 1,
            car_id: 5,
        });
        client.handle_packet(Packet::Disconnected {
            reason: "Room full".to_string(),
        });

        assert!(!client.is_connected());
        assert_eq!(client.reconciler.config().local_car, None);
    }
}
