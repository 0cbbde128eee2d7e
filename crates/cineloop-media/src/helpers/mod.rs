// crates/cineloop-media/src/helpers/mod.rs
//
// Internal helper modules for cineloop-media. Not re-exported from lib.rs.

pub mod seek;
