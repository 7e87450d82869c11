//! # Tower Defender Server
//!
//! Authoritative simulation for the two-player VR tower defense game.
//! Players on opposite towers shoot arrows at waves of castle crashers
//! marching on the shared castle; this crate owns the only true copy of
//! that world.
//!
//! ## Architecture
//!
//! A dedicated simulation thread runs the fixed-rate tick pipeline over
//! the canonical [`shared::GameData`]:
//!
//! 1. merge pending player input (roster sync + arrow state machine)
//! 2. reposition arrows in flight from their launch triples
//! 3. age out score-multiplier popups
//! 4. resolve arrow hits, score kills, spawn and drive castle crashers
//! 5. round lifecycle: ready-up, start/end transitions, streak expiry
//! 6. cosmetic idle behavior between rounds
//!
//! Transport workers never touch that state directly. They stage input in
//! a pending map and read full copies of the latest committed snapshot;
//! the two locks are independent and only ever held for the duration of a
//! copy, so a reader always observes a complete tick boundary.
//!
//! ## Module Organization
//!
//! - [`engine`]: canonical state ownership, tick loop, public operations
//! - [`archery`]: input merge and the arrow state machine
//! - [`crashers`]: enemy combat resolution, spawning and locomotion
//! - [`rounds`]: round lifecycle, combo bookkeeping, idle behavior
//! - [`session`]: player registry, capacity and liveness
//! - [`network`]: UDP request/response front end
//!
//! ## Usage
//!
//! ```rust,no_run
//! use server::engine::{EngineConfig, GameEngine};
//! use server::network::Server;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = GameEngine::start(EngineConfig::default())?;
//!     let mut server = Server::new("0.0.0.0:8080", 2, Arc::clone(&engine)).await?;
//!     server.run().await?;
//!     engine.shutdown();
//!     Ok(())
//! }
//! ```

pub mod archery;
pub mod crashers;
pub mod engine;
pub mod network;
pub mod rounds;
pub mod session;
pub mod utils;
