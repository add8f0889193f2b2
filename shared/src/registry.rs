//! Id-indexed store of the players and map objects present in a room
//!
//! The same registry backs both peers. On the server it mirrors which cars and
//! static objects exist; on a client it additionally holds the car bodies that
//! incoming snapshots overwrite.
//!
//! Objects may be held in either of two shapes. A bulk load keeps the ordered
//! sequence it was given, while an indexed registry keys objects by id. Later
//! merges keep whichever shape the registry already has.

use crate::car::CarPhysicsBody;
use crate::snapshot::CarSyncInfo;
use crate::{ObjectId, PlayerId};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind of object placed on the room map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    Primitive = 0,
    Road = 1,
    Terrain = 2,
    Player = 3,
    Mesh = 4,
}

/// One entity on the room map. Player cars carry a physics body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapObject {
    pub id: ObjectId,
    pub kind: ObjectType,
    pub body: Option<CarPhysicsBody>,
}

impl MapObject {
    pub fn car(id: ObjectId, body: CarPhysicsBody) -> Self {
        Self {
            id,
            kind: ObjectType::Player,
            body: Some(body),
        }
    }

    pub fn fixture(id: ObjectId, kind: ObjectType) -> Self {
        Self {
            id,
            kind,
            body: None,
        }
    }
}

/// Public description of a room member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: PlayerId,
    pub nick: String,
    /// Id of the car object this player drives.
    pub car_id: ObjectId,
}

/// Full room contents handed to a peer when it joins
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InitialRoomState {
    pub players: Vec<PlayerInfo>,
    pub objects: Vec<MapObject>,
}

/// Object storage in one of its two shapes
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectCollection {
    Bulk(Vec<MapObject>),
    Incremental(HashMap<ObjectId, MapObject>),
}

impl Default for ObjectCollection {
    fn default() -> Self {
        ObjectCollection::Bulk(Vec::new())
    }
}

impl ObjectCollection {
    /// Merges `incoming` into `self`, keeping `self`'s shape.
    pub fn merge(&mut self, incoming: ObjectCollection) {
        match (self, incoming) {
            (ObjectCollection::Bulk(current), ObjectCollection::Bulk(objects)) => {
                current.extend(objects);
            }
            (ObjectCollection::Bulk(current), ObjectCollection::Incremental(objects)) => {
                let mut objects: Vec<_> = objects.into_values().collect();
                objects.sort_by_key(|object| object.id);
                current.extend(objects);
            }
            (ObjectCollection::Incremental(current), ObjectCollection::Bulk(objects)) => {
                current.extend(objects.into_iter().map(|object| (object.id, object)));
            }
            (ObjectCollection::Incremental(current), ObjectCollection::Incremental(objects)) => {
                current.extend(objects);
            }
        }
    }

    pub fn get(&self, id: ObjectId) -> Option<&MapObject> {
        match self {
            ObjectCollection::Bulk(objects) => objects.iter().rev().find(|o| o.id == id),
            ObjectCollection::Incremental(objects) => objects.get(&id),
        }
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut MapObject> {
        match self {
            ObjectCollection::Bulk(objects) => objects.iter_mut().rev().find(|o| o.id == id),
            ObjectCollection::Incremental(objects) => objects.get_mut(&id),
        }
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.get(id).is_some()
    }

    /// Removes every object with `id`, returning whether any was present.
    pub fn remove(&mut self, id: ObjectId) -> bool {
        match self {
            ObjectCollection::Bulk(objects) => {
                let before = objects.len();
                objects.retain(|o| o.id != id);
                objects.len() != before
            }
            ObjectCollection::Incremental(objects) => objects.remove(&id).is_some(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ObjectCollection::Bulk(objects) => objects.len(),
            ObjectCollection::Incremental(objects) => objects.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates objects. Bulk collections yield in insertion order.
    pub fn iter(&self) -> Box<dyn Iterator<Item = &MapObject> + '_> {
        match self {
            ObjectCollection::Bulk(objects) => Box::new(objects.iter()),
            ObjectCollection::Incremental(objects) => Box::new(objects.values()),
        }
    }
}

/// Outcome of applying one snapshot record to the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Applied,
    UnknownObject,
    NotACar,
}

/// Players and objects currently present on one peer
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RoomObjectRegistry {
    players: HashMap<PlayerId, PlayerInfo>,
    objects: ObjectCollection,
    road_elements: Vec<ObjectId>,
}

impl RoomObjectRegistry {
    /// Creates an empty registry that keeps objects as an ordered sequence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry that keys objects by id.
    pub fn indexed() -> Self {
        Self {
            objects: ObjectCollection::Incremental(HashMap::new()),
            ..Self::default()
        }
    }

    pub fn from_initial_room_state(state: InitialRoomState) -> Self {
        let mut registry = Self::new();
        registry.load_initial_room_state(state);
        registry
    }

    /// Replaces the registry contents with a full room state.
    ///
    /// Road objects are indexed once here for downstream lookups.
    pub fn load_initial_room_state(&mut self, state: InitialRoomState) {
        let InitialRoomState { players, objects } = state;

        self.road_elements = objects
            .iter()
            .filter(|object| object.kind == ObjectType::Road)
            .map(|object| object.id)
            .collect();
        self.objects = ObjectCollection::Bulk(objects);
        self.players = HashMap::new();

        for player in players {
            self.insert_player(player);
        }

        debug!(
            "Loaded room state: {} players, {} objects, {} road elements",
            self.players.len(),
            self.objects.len(),
            self.road_elements.len()
        );
    }

    /// Merges new players and objects into the registry.
    ///
    /// Players whose car is not among the known or incoming objects are
    /// skipped.
    pub fn append_objects(&mut self, players: Vec<PlayerInfo>, objects: Vec<MapObject>) {
        self.objects.merge(ObjectCollection::Bulk(objects));

        for player in players {
            self.insert_player(player);
        }
    }

    /// Merges another registry into this one, keeping this registry's shape.
    pub fn merge(&mut self, other: RoomObjectRegistry) {
        self.objects.merge(other.objects);
        for player in other.players.into_values() {
            self.insert_player(player);
        }
    }

    fn insert_player(&mut self, player: PlayerInfo) {
        if !self.objects.contains(player.car_id) {
            warn!(
                "Skipping player {} without car object {}",
                player.id, player.car_id
            );
            return;
        }

        self.players.insert(player.id, player);
    }

    /// Removes a player together with its car object.
    ///
    /// Returns false and leaves the registry untouched if the player is unknown.
    pub fn remove_player_car(&mut self, player_id: PlayerId) -> bool {
        match self.players.remove(&player_id) {
            Some(player) => {
                self.objects.remove(player.car_id);
                true
            }
            None => false,
        }
    }

    /// Resets the registry to empty, keeping its object shape.
    pub fn release(&mut self) {
        self.players.clear();
        self.road_elements.clear();
        self.objects = match self.objects {
            ObjectCollection::Bulk(_) => ObjectCollection::Bulk(Vec::new()),
            ObjectCollection::Incremental(_) => ObjectCollection::Incremental(HashMap::new()),
        };
    }

    /// Overwrites the synchronized fields of the car named by `info`.
    pub fn sync_object(&mut self, info: &CarSyncInfo) -> SyncOutcome {
        match self.objects.get_mut(info.id) {
            Some(MapObject {
                body: Some(body), ..
            }) => {
                info.apply_to(body);
                SyncOutcome::Applied
            }
            Some(_) => SyncOutcome::NotACar,
            None => SyncOutcome::UnknownObject,
        }
    }

    /// Exports the registry as a room state for a newly joining peer.
    pub fn to_initial_room_state(&self) -> InitialRoomState {
        let mut players: Vec<_> = self.players.values().cloned().collect();
        players.sort_by_key(|player| player.id);

        InitialRoomState {
            players,
            objects: self.objects.iter().cloned().collect(),
        }
    }

    pub fn player(&self, id: PlayerId) -> Option<&PlayerInfo> {
        self.players.get(&id)
    }

    pub fn players(&self) -> impl Iterator<Item = &PlayerInfo> {
        self.players.values()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn object(&self, id: ObjectId) -> Option<&MapObject> {
        self.objects.get(id)
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut MapObject> {
        self.objects.get_mut(id)
    }

    pub fn objects(&self) -> &ObjectCollection {
        &self.objects
    }

    pub fn road_elements(&self) -> &[ObjectId] {
        &self.road_elements
    }
}
