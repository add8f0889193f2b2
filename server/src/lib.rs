//! # Racing Room Server
//!
//! Authoritative side of the racing sync engine. The server owns every car
//! body in a room, applies the key maps players send, steps the physics on a
//! fixed interval and broadcasts the resulting snapshot frame to all members.
//!
//! ## Flow of one tick
//!
//! 1. Network handlers append inbound key maps to the sender's slot queue.
//! 2. The simulation loop drains each queue through the keyboard driver.
//! 3. Every car advances by one fixed physics step.
//! 4. All cars are packed into a single binary frame and broadcast.
//!
//! Clients never send positions. Whatever they predict locally is overwritten
//! by the next frame.
//!
//! ## Module Organization
//!
//! ### Client Manager (`client_manager`)
//! Maps socket addresses to player ids, enforces the room's player limit and
//! detects idle clients.
//!
//! ### Config (`config`)
//! Room tunables: tick interval, countdown, player limit, idle time and spawn
//! placement.
//!
//! ### Room (`room`)
//! Player slots with their input queues and car bodies, plus the server-side
//! object registry handed to joining clients.
//!
//! ### Simulation (`simulation`)
//! The per-room tick task and the [`simulation::RoomBroadcaster`] seam it
//! publishes frames through.
//!
//! ### Network (`network`)
//! UDP transport, connect/disconnect handling and the bounded outbound queue.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::RoomConfig;
//! use server::network::Server;
//! use shared::CarConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new(
//!         "127.0.0.1:8080",
//!         RoomConfig::default(),
//!         CarConfig::default(),
//!         Vec::new(),
//!     )
//!     .await?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod config;
pub mod network;
pub mod room;
pub mod simulation;
