//! # Shared Racing Core
//!
//! Everything the server and its clients must agree on bit for bit: the car
//! dynamics, the keyboard driver, the snapshot frame layout, the room object
//! registry and the packet envelope.
//!
//! Control traffic (joins, key maps, room state) travels as bincode-encoded
//! [`Packet`]s. The per-tick race state is a raw snapshot frame from
//! [`snapshot`] carried inside [`Packet::RaceState`].

pub mod car;
pub mod driver;
pub mod math;
pub mod registry;
pub mod snapshot;

use serde::{Deserialize, Serialize};

pub use car::{CarBodyState, CarConfig, CarConfigError, CarPhysicsBody, PHYSICS_TIMESTEP};
pub use driver::{car_keyboard_driver, KeyMap};
pub use math::Vec2;
pub use registry::{InitialRoomState, MapObject, ObjectType, PlayerInfo, RoomObjectRegistry};
pub use snapshot::{CarSyncInfo, FrameError};

pub type PlayerId = u32;
pub type ObjectId = u32;

pub const PROTOCOL_VERSION: u32 = 1;

/// Numeric action codes identifying each message on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerAction {
    GetRoomInitialState = 2,
    JoinRoom = 3,
    LeaveRoom = 4,
    SendKeymap = 5,
    PlayerJoinedToRoom = 8,
    PlayerLeftRoom = 9,
    UpdatePlayersRaceState = 11,
    ConnectionSuccess = 17,
    ConnectionError = 18,
}

impl PlayerAction {
    pub fn code(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    Connect {
        client_version: u32,
        nick: String,
    },
    SendKeyMap {
        key_map: KeyMap,
    },
    GetRoomInitialState,
    Disconnect,

    Connected {
        player_id: PlayerId,
        car_id: ObjectId,
    },
    RoomInitialState(InitialRoomState),
    PlayerJoined {
        player: PlayerInfo,
        car: MapObject,
    },
    PlayerLeft {
        player: PlayerInfo,
    },
    RaceState {
        frame: Vec<u8>,
    },
    Disconnected {
        reason: String,
    },
}

impl Packet {
    pub fn action(&self) -> PlayerAction {
        match self {
            Packet::Connect { .. } => PlayerAction::JoinRoom,
            Packet::SendKeyMap { .. } => PlayerAction::SendKeymap,
            Packet::GetRoomInitialState | Packet::RoomInitialState(_) => {
                PlayerAction::GetRoomInitialState
            }
            Packet::Disconnect => PlayerAction::LeaveRoom,
            Packet::Connected { .. } => PlayerAction::ConnectionSuccess,
            Packet::PlayerJoined { .. } => PlayerAction::PlayerJoinedToRoom,
            Packet::PlayerLeft { .. } => PlayerAction::PlayerLeftRoom,
            Packet::RaceState { .. } => PlayerAction::UpdatePlayersRaceState,
            Packet::Disconnected { .. } => PlayerAction::ConnectionError,
        }
    }
}
