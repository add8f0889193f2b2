//! Applies authoritative room broadcasts to the client's local state
//!
//! Every inbound packet is first decoded into [`RemoteEvent`]s and then
//! dispatched to the attached [`RoomListeners`]. Snapshot records for the
//! locally driven car are dropped during decoding: the client trusts its own
//! simulation for that car and never lets the server overwrite it.

use log::{debug, warn};
use shared::snapshot::decode_frame;
use shared::{CarSyncInfo, MapObject, ObjectId, Packet, PlayerInfo};

/// One room change carried by an inbound packet
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteEvent {
    Joined { player: PlayerInfo, car: MapObject },
    Left { player: PlayerInfo },
    Synced(CarSyncInfo),
}

/// Receivers of room changes, usually the game board
pub trait RoomListeners {
    fn on_sync_object(&mut self, info: &CarSyncInfo);
    fn on_leave_player(&mut self, player: &PlayerInfo);
    fn on_join_player(&mut self, player: PlayerInfo, car: MapObject);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Car driven by this client. Snapshot records for it are ignored.
    pub local_car: Option<ObjectId>,
}

pub struct RemoteStateReconciler<L> {
    config: ReconcilerConfig,
    listeners: Option<L>,
}

impl<L: RoomListeners> RemoteStateReconciler<L> {
    pub fn new(config: ReconcilerConfig, listeners: L) -> Self {
        Self {
            config,
            listeners: Some(listeners),
        }
    }

    pub fn config(&self) -> ReconcilerConfig {
        self.config
    }

    /// Tags the car this client drives, once the server has assigned it.
    pub fn set_local_car(&mut self, car_id: Option<ObjectId>) {
        self.config.local_car = car_id;
    }

    /// Turns a packet into room events.
    ///
    /// A corrupt race-state frame is logged and yields no events. Packets
    /// that do not describe room changes yield nothing.
    pub fn decode(&self, packet: &Packet) -> Vec<RemoteEvent> {
        match packet {
            Packet::RaceState { frame } => match decode_frame(frame) {
                Ok(records) => records
                    .into_iter()
                    .filter(|info| Some(info.id) != self.config.local_car)
                    .map(RemoteEvent::Synced)
                    .collect(),
                Err(e) => {
                    warn!("Discarding corrupt race state frame: {}", e);
                    Vec::new()
                }
            },
            Packet::PlayerJoined { player, car } => vec![RemoteEvent::Joined {
                player: player.clone(),
                car: car.clone(),
            }],
            Packet::PlayerLeft { player } => vec![RemoteEvent::Left {
                player: player.clone(),
            }],
            _ => Vec::new(),
        }
    }

    /// Hands one event to the listeners. Does nothing once they are released.
    pub fn dispatch(&mut self, event: RemoteEvent) {
        let Some(listeners) = self.listeners.as_mut() else {
            debug!("Listeners released, dropping {:?}", event);
            return;
        };

        match event {
            RemoteEvent::Synced(info) => listeners.on_sync_object(&info),
            RemoteEvent::Left { player } => listeners.on_leave_player(&player),
            RemoteEvent::Joined { player, car } => listeners.on_join_player(player, car),
        }
    }

    /// Decodes and dispatches a packet, returning how many events it carried.
    pub fn handle_packet(&mut self, packet: &Packet) -> usize {
        if self.listeners.is_none() {
            return 0;
        }

        let events = self.decode(packet);
        let count = events.len();
        for event in events {
            self.dispatch(event);
        }
        count
    }

    pub fn is_attached(&self) -> bool {
        self.listeners.is_some()
    }

    pub fn listeners(&self) -> Option<&L> {
        self.listeners.as_ref()
    }

    pub fn listeners_mut(&mut self) -> Option<&mut L> {
        self.listeners.as_mut()
    }

    /// Detaches the listeners and gives them back.
    ///
    /// Returns `None` on every call after the first.
    pub fn release_listeners(&mut self) -> Option<L> {
        self.listeners.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::snapshot::encode_frame;
    use shared::{ObjectType, Vec2};

    #[derive(Default)]
    struct Recorder {
        synced: Vec<ObjectId>,
        left: Vec<u32>,
        joined: Vec<(u32, ObjectId)>,
    }

    impl RoomListeners for Recorder {
        fn on_sync_object(&mut self, info: &CarSyncInfo) {
            self.synced.push(info.id);
        }

        fn on_leave_player(&mut self, player: &PlayerInfo) {
            self.left.push(player.id);
        }

        fn on_join_player(&mut self, player: PlayerInfo, car: MapObject) {
            self.joined.push((player.id, car.id));
        }
    }

    fn record(id: ObjectId, x: f32) -> CarSyncInfo {
        CarSyncInfo {
            id,
            pos: Vec2::new(x, 1.0),
            ..CarSyncInfo::default()
        }
    }

    fn race_state(records: &[CarSyncInfo]) -> Packet {
        Packet::RaceState {
            frame: encode_frame(records).unwrap(),
        }
    }

    fn player(id: u32, car_id: ObjectId) -> PlayerInfo {
        PlayerInfo {
            id,
            nick: format!("p{}", id),
            car_id,
        }
    }

    #[test]
    fn test_decode_skips_local_car() {
        let reconciler = RemoteStateReconciler::new(
            ReconcilerConfig { local_car: Some(7) },
            Recorder::default(),
        );

        let events = reconciler.decode(&race_state(&[record(7, 1.0), record(8, 2.0)]));
        assert_eq!(events, vec![RemoteEvent::Synced(record(8, 2.0))]);
    }

    #[test]
    fn test_without_local_car_every_record_is_synced() {
        let mut reconciler =
            RemoteStateReconciler::new(ReconcilerConfig::default(), Recorder::default());

        let count = reconciler.handle_packet(&race_state(&[record(7, 1.0), record(8, 2.0)]));
        assert_eq!(count, 2);
        assert_eq!(reconciler.listeners().unwrap().synced, vec![7, 8]);
    }

    #[test]
    fn test_join_and_leave_are_dispatched() {
        let mut reconciler =
            RemoteStateReconciler::new(ReconcilerConfig::default(), Recorder::default());

        reconciler.handle_packet(&Packet::PlayerJoined {
            player: player(2, 5),
            car: MapObject::fixture(5, ObjectType::Player),
        });
        reconciler.handle_packet(&Packet::PlayerLeft {
            player: player(2, 5),
        });

        let recorder = reconciler.listeners().unwrap();
        assert_eq!(recorder.joined, vec![(2, 5)]);
        assert_eq!(recorder.left, vec![2]);
    }

    #[test]
    fn test_corrupt_frame_is_ignored() {
        let mut reconciler =
            RemoteStateReconciler::new(ReconcilerConfig::default(), Recorder::default());

        let mut frame = encode_frame(&[record(1, 0.0)]).unwrap();
        frame.pop();

        assert_eq!(reconciler.handle_packet(&Packet::RaceState { frame }), 0);
        assert_eq!(
            reconciler.handle_packet(&Packet::RaceState { frame: Vec::new() }),
            0
        );
        assert!(reconciler.listeners().unwrap().synced.is_empty());
    }

    #[test]
    fn test_control_packets_yield_no_events() {
        let reconciler =
            RemoteStateReconciler::new(ReconcilerConfig::default(), Recorder::default());

        assert!(reconciler.decode(&Packet::Disconnect).is_empty());
        assert!(reconciler
            .decode(&Packet::Connected {
                player_id: 1,
                car_id: 1
            })
            .is_empty());
    }

    #[test]
    fn test_release_listeners_is_idempotent() {
        let mut reconciler =
            RemoteStateReconciler::new(ReconcilerConfig::default(), Recorder::default());

        assert!(reconciler.release_listeners().is_some());
        assert!(reconciler.release_listeners().is_none());
        assert!(reconciler.release_listeners().is_none());
        assert!(!reconciler.is_attached());

        assert_eq!(reconciler.handle_packet(&race_state(&[record(1, 0.0)])), 0);
    }

    #[test]
    fn test_local_car_can_be_assigned_later() {
        let mut reconciler =
            RemoteStateReconciler::new(ReconcilerConfig::default(), Recorder::default());
        reconciler.set_local_car(Some(3));

        reconciler.handle_packet(&race_state(&[record(3, 0.0), record(4, 0.0)]));
        assert_eq!(reconciler.listeners().unwrap().synced, vec![4]);
        assert_eq!(reconciler.config().local_car, Some(3));
    }
}
