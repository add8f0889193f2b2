//! Authoritative room state: player slots, their input queues and car bodies
//!
//! A [`Room`] exclusively owns every car body in it. Network handlers only
//! append key maps to a slot's queue; the simulation tick drains those queues,
//! advances every car and packs the result into one snapshot frame.

use crate::config::{RoomConfig, RoomConfigError};
use log::{debug, info};
use shared::registry::{InitialRoomState, MapObject, ObjectType, PlayerInfo, RoomObjectRegistry};
use shared::snapshot::{self, CarSyncInfo, FrameError};
use shared::{
    car_keyboard_driver, CarConfig, CarConfigError, CarPhysicsBody, KeyMap, ObjectId, PlayerId,
    Vec2,
};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("room is full ({0} players)")]
    RoomFull(usize),
    #[error("player {0} is not in the room")]
    UnknownPlayer(PlayerId),
    #[error("player {0} already joined the room")]
    AlreadyJoined(PlayerId),
    #[error("racing is already active")]
    RacingAlreadyActive,
    #[error("invalid room config: {0}")]
    InvalidConfig(#[from] RoomConfigError),
    #[error(transparent)]
    Car(#[from] CarConfigError),
}

/// One player's seat in the room
#[derive(Debug)]
pub struct PlayerSlot {
    pub info: PlayerInfo,
    pub car: CarPhysicsBody,
    /// Key maps received since the last tick, in arrival order.
    inputs: Vec<KeyMap>,
}

impl PlayerSlot {
    pub fn pending_inputs(&self) -> usize {
        self.inputs.len()
    }
}

pub struct Room {
    config: RoomConfig,
    car_config: CarConfig,
    /// Iteration order of the slots. Each id appears at most once.
    order: Vec<PlayerId>,
    slots: HashMap<PlayerId, PlayerSlot>,
    registry: RoomObjectRegistry,
    next_object_id: ObjectId,
    spawned: u32,
    tick: u64,
}

impl Room {
    /// Creates an empty room on a map holding `fixtures`.
    ///
    /// The car configuration is validated here so that no NaN can reach the
    /// simulation later.
    pub fn new(
        config: RoomConfig,
        car_config: CarConfig,
        fixtures: Vec<MapObject>,
    ) -> Result<Self, RoomError> {
        config.validate()?;
        car_config.validate()?;

        let next_object_id = fixtures.iter().map(|o| o.id + 1).max().unwrap_or(1);

        let mut registry = RoomObjectRegistry::indexed();
        registry.append_objects(Vec::new(), fixtures);

        Ok(Self {
            config,
            car_config,
            order: Vec::new(),
            slots: HashMap::new(),
            registry,
            next_object_id,
            spawned: 0,
            tick: 0,
        })
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Seats a new player and spawns its car.
    ///
    /// Returns the player description and its car object for the join broadcast.
    pub fn add_player(
        &mut self,
        id: PlayerId,
        nick: String,
    ) -> Result<(PlayerInfo, MapObject), RoomError> {
        if self.slots.contains_key(&id) {
            return Err(RoomError::AlreadyJoined(id));
        }
        if self.slots.len() >= self.config.players_limit {
            return Err(RoomError::RoomFull(self.config.players_limit));
        }

        let car_id = self.next_object_id;
        let spawn = Vec2::new(self.spawned as f32 * self.config.spawn_spacing, 0.0);
        let car = CarPhysicsBody::new(self.car_config.clone(), spawn, self.config.spawn_angle)?;

        self.next_object_id += 1;
        self.spawned += 1;

        let info = PlayerInfo { id, nick, car_id };
        self.registry.append_objects(
            vec![info.clone()],
            vec![MapObject::fixture(car_id, ObjectType::Player)],
        );

        let car_object = MapObject::car(car_id, car.clone());
        if !self.order.contains(&id) {
            self.order.push(id);
        }
        self.slots.insert(
            id,
            PlayerSlot {
                info: info.clone(),
                car,
                inputs: Vec::new(),
            },
        );

        info!(
            "Player {} joined with car {} at ({:.1}, {:.1})",
            id, car_id, spawn.x, spawn.y
        );
        Ok((info, car_object))
    }

    /// Removes a player and its car. Unknown ids are a no-op returning `None`.
    pub fn remove_player(&mut self, id: PlayerId) -> Option<PlayerInfo> {
        let slot = self.slots.remove(&id)?;
        self.order.retain(|other| *other != id);
        self.registry.remove_player_car(id);

        info!("Player {} left, car {} removed", id, slot.info.car_id);
        Some(slot.info)
    }

    /// Queues a key map for the player's next tick.
    pub fn enqueue_input(&mut self, id: PlayerId, key_map: KeyMap) -> Result<(), RoomError> {
        let slot = self
            .slots
            .get_mut(&id)
            .ok_or(RoomError::UnknownPlayer(id))?;
        slot.inputs.push(key_map);
        Ok(())
    }

    /// Advances the room by one tick and returns the snapshot frame to broadcast.
    ///
    /// Each slot's queued key maps are applied in arrival order before its car
    /// is stepped; the queue is empty afterwards. Ids without a slot are
    /// skipped.
    pub fn tick(&mut self) -> Result<Vec<u8>, FrameError> {
        let dt = self.config.tick_interval.as_secs_f32();
        let mut records = Vec::with_capacity(self.order.len());

        for id in &self.order {
            let Some(slot) = self.slots.get_mut(id) else {
                debug!("Skipping slot of departed player {}", id);
                continue;
            };

            for key_map in slot.inputs.drain(..) {
                car_keyboard_driver(&key_map, &mut slot.car);
            }

            slot.car.update(dt);
            records.push(CarSyncInfo::from_body(slot.info.car_id, &slot.car));
        }

        let slots = &self.slots;
        self.order.retain(|id| slots.contains_key(id));
        self.tick += 1;

        snapshot::encode_frame(&records)
    }

    /// Full room contents with the current car bodies, for a joining client.
    pub fn initial_room_state(&self) -> InitialRoomState {
        let mut state = self.registry.to_initial_room_state();

        for object in &mut state.objects {
            if let Some(slot) = self
                .order
                .iter()
                .filter_map(|id| self.slots.get(id))
                .find(|slot| slot.info.car_id == object.id)
            {
                object.body = Some(slot.car.clone());
            }
        }

        state
    }

    /// Drops every player and resets the tick counter, keeping the map fixtures.
    pub fn release(&mut self) {
        let fixtures: Vec<_> = self
            .registry
            .objects()
            .iter()
            .filter(|object| object.kind != ObjectType::Player)
            .cloned()
            .collect();

        self.order.clear();
        self.slots.clear();
        self.registry.release();
        self.registry.append_objects(Vec::new(), fixtures);
        self.spawned = 0;
        self.tick = 0;
    }

    pub fn slot(&self, id: PlayerId) -> Option<&PlayerSlot> {
        self.slots.get(&id)
    }

    pub fn car(&self, id: PlayerId) -> Option<&CarPhysicsBody> {
        self.slots.get(&id).map(|slot| &slot.car)
    }

    pub fn registry(&self) -> &RoomObjectRegistry {
        &self.registry
    }

    pub fn player_count(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }
}
