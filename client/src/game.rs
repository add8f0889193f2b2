use crate::reconciler::RoomListeners;
use log::{debug, info, warn};
use shared::registry::SyncOutcome;
use shared::{
    car_keyboard_driver, CarPhysicsBody, CarSyncInfo, InitialRoomState, KeyMap, MapObject,
    ObjectId, PlayerInfo, RoomObjectRegistry,
};

/// Client view of the room.
///
/// Remote cars are overwritten by every snapshot; the local car is only ever
/// advanced here, from the player's own key map.
#[derive(Debug, Default)]
pub struct GameBoard {
    registry: RoomObjectRegistry,
    local_car: Option<ObjectId>,
    frames: u64,
    unknown_syncs: u64,
}

impl GameBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_initial_room_state(state: InitialRoomState) -> Self {
        let mut board = Self::new();
        board.load_initial_room_state(state);
        board
    }

    pub fn load_initial_room_state(&mut self, state: InitialRoomState) {
        self.registry.load_initial_room_state(state);
        info!(
            "Room loaded: {} players, {} road elements",
            self.registry.player_count(),
            self.registry.road_elements().len()
        );
    }

    pub fn set_local_car(&mut self, car_id: Option<ObjectId>) {
        self.local_car = car_id;
    }

    pub fn local_car_id(&self) -> Option<ObjectId> {
        self.local_car
    }

    pub fn local_car(&self) -> Option<&CarPhysicsBody> {
        self.local_car.and_then(|id| self.car(id))
    }

    pub fn car(&self, id: ObjectId) -> Option<&CarPhysicsBody> {
        self.registry.object(id).and_then(|object| object.body.as_ref())
    }

    /// Applies the local key map and steps the local car.
    ///
    /// Returns false while the local car is not known yet.
    pub fn drive_local_car(&mut self, key_map: &KeyMap, delta: f32) -> bool {
        let Some(id) = self.local_car else {
            return false;
        };
        let Some(body) = self
            .registry
            .object_mut(id)
            .and_then(|object| object.body.as_mut())
        else {
            return false;
        };

        car_keyboard_driver(key_map, body);
        body.update(delta);
        self.frames += 1;
        true
    }

    pub fn registry(&self) -> &RoomObjectRegistry {
        &self.registry
    }

    /// Snapshot records that named an object this board does not know.
    pub fn unknown_syncs(&self) -> u64 {
        self.unknown_syncs
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn release(&mut self) {
        self.registry.release();
        self.local_car = None;
        self.frames = 0;
        self.unknown_syncs = 0;
    }
}

impl RoomListeners for GameBoard {
    fn on_sync_object(&mut self, info: &CarSyncInfo) {
        match self.registry.sync_object(info) {
            SyncOutcome::Applied => {}
            SyncOutcome::UnknownObject => {
                self.unknown_syncs += 1;
                warn!("Snapshot for unknown object {}", info.id);
            }
            SyncOutcome::NotACar => {
                debug!("Snapshot for object {} without a car body", info.id);
            }
        }
    }

    fn on_leave_player(&mut self, player: &PlayerInfo) {
        if self.registry.remove_player_car(player.id) {
            info!("{} left the room", player.nick);
        } else {
            debug!("Leave for unknown player {}", player.id);
        }
    }

    fn on_join_player(&mut self, player: PlayerInfo, car: MapObject) {
        info!("{} joined the room", player.nick);
        self.registry.append_objects(vec![player], vec![car]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::driver::key_codes;
    use shared::{CarConfig, ObjectType, Vec2};

    fn car_object(id: ObjectId, x: f32) -> MapObject {
        let body = CarPhysicsBody::new(CarConfig::default(), Vec2::new(x, 0.0), 0.0).unwrap();
        MapObject::car(id, body)
    }

    fn room_state() -> InitialRoomState {
        InitialRoomState {
            players: vec![
                PlayerInfo {
                    id: 1,
                    nick: "local".to_string(),
                    car_id: 10,
                },
                PlayerInfo {
                    id: 2,
                    nick: "remote".to_string(),
                    car_id: 11,
                },
            ],
            objects: vec![
                MapObject::fixture(1, ObjectType::Road),
                car_object(10, 0.0),
                car_object(11, 4.0),
            ],
        }
    }

    #[test]
    fn test_sync_overwrites_remote_car() {
        let mut board = GameBoard::from_initial_room_state(room_state());
        let info = CarSyncInfo {
            id: 11,
            pos: Vec2::new(9.0, 3.0),
            velocity: Vec2::new(1.0, 0.5),
            angle: 0.2,
            ..CarSyncInfo::default()
        };

        board.on_sync_object(&info);

        let car = board.car(11).unwrap();
        assert_eq!(car.pos, Vec2::new(9.0, 3.0));
        assert_eq!(car.velocity, Vec2::new(1.0, 0.5));
        assert_approx_eq!(car.angle, 0.2);
    }

    #[test]
    fn test_sync_for_unknown_object_is_counted() {
        let mut board = GameBoard::from_initial_room_state(room_state());
        board.on_sync_object(&CarSyncInfo {
            id: 99,
            ..CarSyncInfo::default()
        });
        board.on_sync_object(&CarSyncInfo {
            id: 1,
            ..CarSyncInfo::default()
        });

        assert_eq!(board.unknown_syncs(), 1);
    }

    #[test]
    fn test_leave_removes_player_and_car() {
        let mut board = GameBoard::from_initial_room_state(room_state());
        let remote = board.registry().player(2).unwrap().clone();

        board.on_leave_player(&remote);
        board.on_leave_player(&remote);

        assert!(board.registry().player(2).is_none());
        assert!(board.car(11).is_none());
        assert!(board.car(10).is_some());
    }

    #[test]
    fn test_join_adds_player_and_car() {
        let mut board = GameBoard::from_initial_room_state(room_state());
        board.on_join_player(
            PlayerInfo {
                id: 3,
                nick: "late".to_string(),
                car_id: 12,
            },
            car_object(12, 8.0),
        );

        assert_eq!(board.registry().player_count(), 3);
        assert_eq!(board.car(12).unwrap().pos, Vec2::new(8.0, 0.0));
    }

    #[test]
    fn test_drive_local_car() {
        let mut board = GameBoard::from_initial_room_state(room_state());
        let throttle: KeyMap = [key_codes::W].into_iter().collect();

        assert!(!board.drive_local_car(&throttle, 0.016));

        board.set_local_car(Some(10));
        for _ in 0..10 {
            assert!(board.drive_local_car(&throttle, 0.016));
        }

        let car = board.local_car().unwrap();
        assert_eq!(car.throttle, 1.0);
        assert!(car.velocity.magnitude() > 0.0);
        assert_eq!(board.car(11).unwrap().velocity, Vec2::ZERO);
        assert_eq!(board.frames(), 10);
    }

    #[test]
    fn test_release_clears_board() {
        let mut board = GameBoard::from_initial_room_state(room_state());
        board.set_local_car(Some(10));

        board.release();

        assert!(board.local_car().is_none());
        assert_eq!(board.registry().player_count(), 0);
        assert!(board.registry().objects().is_empty());
    }
}
