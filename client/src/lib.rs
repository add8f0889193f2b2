//! # Racing Client Library
//!
//! Receiving side of the racing sync engine. A client drives its own car
//! locally every frame and sends each key-map change to the server. Every
//! other car in the room is a passive replica that the server's snapshot
//! frames overwrite wholesale.
//!
//! ## Module Organization
//!
//! ### Reconciler (`reconciler`)
//! Decodes inbound packets into [`reconciler::RemoteEvent`]s and dispatches
//! them to a [`reconciler::RoomListeners`] implementation. Records for the
//! locally driven car are dropped here.
//!
//! ### Game (`game`)
//! [`game::GameBoard`] owns the client's room registry, listens to the
//! reconciler and simulates the local car.
//!
//! ### Input (`input`)
//! Headless key-map source with change detection and keep-alive resends.
//!
//! ### Network (`network`)
//! UDP session with the server: connect, key-map upload and the receive loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::input::DrivingMode;
//! use client::network::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::new("127.0.0.1:8080", "racer".to_string(), DrivingMode::Wander).await?;
//!     client.run(None).await?;
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod input;
pub mod network;
pub mod reconciler;
