//! Desktop client for a shared 2D world.
//!
//! Players come from the server over a WebSocket; villagers are simulated
//! locally. [`WorldviewApp`] is the eframe entry point.

#![warn(clippy::all, rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod images;
pub mod input;
pub mod net;
pub mod npc;
pub mod protocol;
pub mod reconcile;
pub mod render;
pub mod session;
pub mod sprites;
pub mod timer;
pub mod viewport;
pub mod world;

mod app;
pub use app::WorldviewApp;
pub use config::ClientConfig;
pub use error::{ClientError, Result};
