// crates/cineloop-core/src/lib.rs
//
// Pure player logic. Nothing here links egui or ffmpeg.
// cineloop-media implements the engine traits; cineloop-ui drives `Player`.

pub mod codec;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod helpers;
pub mod log_service;
pub mod media_types;
pub mod observer;
pub mod player;
pub mod state;
pub mod sync;

pub use config::PlayerConfig;
pub use engine::{MediaEngine, MediaSession};
pub use error::{EngineError, ParseError, SyncError};
pub use player::Player;
pub use sync::PositionSync;
