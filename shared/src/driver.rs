//! Keyboard-state driver translating pressed keys into car controls
//!
//! Both peers run the same driver: the server for every queued key map and
//! the client for its own car, so identical key maps steer identically.

use crate::car::CarPhysicsBody;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Browser-style key codes understood by the driver
pub mod key_codes {
    pub const ARROW_LEFT: u32 = 37;
    pub const ARROW_UP: u32 = 38;
    pub const ARROW_RIGHT: u32 = 39;
    pub const ARROW_DOWN: u32 = 40;
    pub const A: u32 = 65;
    pub const D: u32 = 68;
    pub const S: u32 = 83;
    pub const W: u32 = 87;
}

/// Steering change applied per driven key map while a turn key is held (2°).
pub const STEER_STEP: f32 = 0.034_906_585;

/// Snapshot of which keys a player is holding
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMap {
    keys: HashMap<u32, bool>,
}

impl KeyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, code: u32) {
        self.keys.insert(code, true);
    }

    pub fn release(&mut self, code: u32) {
        self.keys.remove(&code);
    }

    pub fn set(&mut self, code: u32, pressed: bool) {
        if pressed {
            self.press(code);
        } else {
            self.release(code);
        }
    }

    pub fn is_pressed(&self, code: u32) -> bool {
        self.keys.get(&code).copied().unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        !self.keys.values().any(|pressed| *pressed)
    }

    fn any_pressed(&self, codes: &[u32]) -> bool {
        codes.iter().any(|code| self.is_pressed(*code))
    }
}

impl FromIterator<u32> for KeyMap {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        let mut key_map = KeyMap::new();
        for code in iter {
            key_map.press(code);
        }
        key_map
    }
}

/// Applies one key map to the car's controls.
///
/// Throttle and brake are overwritten. Steering is incremental, so applying
/// several key maps in one tick turns further than applying one.
pub fn car_keyboard_driver(key_map: &KeyMap, car: &mut CarPhysicsBody) {
    use key_codes::*;

    car.throttle = if key_map.any_pressed(&[ARROW_UP, W]) {
        1.0
    } else {
        0.0
    };
    car.brake = if key_map.any_pressed(&[ARROW_DOWN, S]) {
        1.0
    } else {
        0.0
    };

    let left = key_map.any_pressed(&[ARROW_LEFT, A]);
    let right = key_map.any_pressed(&[ARROW_RIGHT, D]);

    match (left, right) {
        (true, false) => car.turn(-STEER_STEP),
        (false, true) => car.turn(STEER_STEP),
        _ => car.center_steering(STEER_STEP),
    }
}
