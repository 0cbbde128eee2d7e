// crates/cineloop-media/src/lib.rs
//
// FFmpeg + rodio implementation of the cineloop-core engine traits.
// No egui dependency: the UI pulls frames with `FfmpegSession::take_frame`.

mod audio;
mod clock;
mod decode;
mod helpers;
mod probe;
mod worker;

pub mod engine;
pub mod session;

pub use decode::VideoFrame;
pub use engine::FfmpegEngine;
pub use session::FfmpegSession;
