//! Headless key-map source with change detection

use clap::ValueEnum;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::driver::key_codes;
use shared::KeyMap;
use std::time::{Duration, Instant};

/// Resend the current key map at least this often so the server keeps us alive.
const KEEP_ALIVE: Duration = Duration::from_millis(1000);

/// How the headless client drives its car
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DrivingMode {
    /// No keys held.
    Idle,
    /// Full throttle, wheel centered.
    Straight,
    /// Full throttle with randomly changing steering.
    Wander,
}

/// Produces the key map for each frame and decides when it must be sent
pub struct InputManager {
    mode: DrivingMode,
    rng: StdRng,
    current: KeyMap,
    last_sent: Option<Instant>,
    steer: Option<u32>,
    steer_frames_left: u32,
}

impl InputManager {
    pub fn new(mode: DrivingMode) -> Self {
        Self::with_rng(mode, StdRng::from_entropy())
    }

    pub fn with_rng(mode: DrivingMode, rng: StdRng) -> Self {
        Self {
            mode,
            rng,
            current: KeyMap::new(),
            last_sent: None,
            steer: None,
            steer_frames_left: 0,
        }
    }

    pub fn mode(&self) -> DrivingMode {
        self.mode
    }

    pub fn current(&self) -> &KeyMap {
        &self.current
    }

    /// Samples this frame's keys.
    ///
    /// Returns the key map to send when it changed or the keep-alive elapsed.
    pub fn update(&mut self) -> Option<KeyMap> {
        let next = self.sample();
        let changed = next != self.current;
        self.current = next;

        let keep_alive_due = self
            .last_sent
            .map(|sent| sent.elapsed() >= KEEP_ALIVE)
            .unwrap_or(true);

        if changed || keep_alive_due {
            self.last_sent = Some(Instant::now());
            Some(self.current.clone())
        } else {
            None
        }
    }

    fn sample(&mut self) -> KeyMap {
        match self.mode {
            DrivingMode::Idle => KeyMap::new(),
            DrivingMode::Straight => [key_codes::ARROW_UP].into_iter().collect(),
            DrivingMode::Wander => {
                if self.steer_frames_left == 0 {
                    self.steer = match self.rng.gen_range(0..3) {
                        0 => Some(key_codes::ARROW_LEFT),
                        1 => Some(key_codes::ARROW_RIGHT),
                        _ => None,
                    };
                    self.steer_frames_left = self.rng.gen_range(10..60);
                }
                self.steer_frames_left -= 1;

                let mut key_map: KeyMap = [key_codes::ARROW_UP].into_iter().collect();
                if let Some(code) = self.steer {
                    key_map.press(code);
                }
                key_map
            }
        }
    }
}
