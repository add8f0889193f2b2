//! Fixed-interval simulation loop driving one room
//!
//! The loop runs as a single tokio task per room, so two ticks of the same
//! room can never overlap. When a tick overruns the interval the missed ticks
//! are skipped rather than replayed back to back, and physics always advances
//! by the fixed car timestep regardless of timer jitter.

use crate::room::{Room, RoomError};
use log::{debug, info, warn};
use shared::{Packet, PlayerId};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

pub type SharedRoom = Arc<Mutex<Room>>;

/// Outbound side of a room: fire-and-forget delivery to every member
pub trait RoomBroadcaster: Send + Sync + 'static {
    /// Queues `packet` for every room member except `exclude`.
    ///
    /// Implementations must not block; a packet that cannot be queued is dropped.
    fn send_broadcast_action(&self, exclude: Option<PlayerId>, packet: Packet);
}

pub struct RoomSimulationLoop {
    room: SharedRoom,
    broadcaster: Arc<dyn RoomBroadcaster>,
    shutdown: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
}

impl RoomSimulationLoop {
    pub fn new(room: SharedRoom, broadcaster: Arc<dyn RoomBroadcaster>) -> Self {
        Self {
            room,
            broadcaster,
            shutdown: None,
            handle: None,
        }
    }

    pub fn room(&self) -> &SharedRoom {
        &self.room
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Starts ticking on the current tokio runtime.
    pub async fn start(&mut self) -> Result<(), RoomError> {
        if self.is_running() {
            return Err(RoomError::RacingAlreadyActive);
        }

        let (tick_interval, countdown) = {
            let room = self.room.lock().await;
            (room.config().tick_interval, room.config().countdown)
        };

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let room = Arc::clone(&self.room);
        let broadcaster = Arc::clone(&self.broadcaster);

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + countdown, tick_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            info!(
                "Room simulation started ({}ms ticks)",
                tick_interval.as_millis()
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        run_tick(&room, broadcaster.as_ref()).await;
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Room simulation stopped");
        });

        self.shutdown = Some(shutdown_tx);
        self.handle = Some(handle);
        Ok(())
    }

    /// Stops the loop without waiting. The task is aborted at its next await
    /// point, so no further tick starts once this returns.
    ///
    /// Safe to call repeatedly or when the loop never started.
    pub fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Stops the loop and waits for the task to finish.
    pub async fn shutdown(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("Room simulation task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for RoomSimulationLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Runs one tick: advance the room, then broadcast its snapshot to everyone.
pub async fn run_tick(room: &SharedRoom, broadcaster: &dyn RoomBroadcaster) {
    let (frame, tick) = {
        let mut room = room.lock().await;
        let frame = room.tick();
        (frame, room.tick_count())
    };

    match frame {
        Ok(frame) => {
            if tick % 60 == 0 {
                debug!("Tick {}: broadcasting {} byte frame", tick, frame.len());
            }
            broadcaster.send_broadcast_action(None, Packet::RaceState { frame });
        }
        Err(e) => warn!("Tick {}: failed to build snapshot frame: {}", tick, e),
    }
}
