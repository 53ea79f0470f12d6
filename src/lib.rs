/// Unicorn Run simulation core.
///
/// `domain` holds the rules of a single tick (tiles, collision, gates,
/// portals, movement, AI). `sim` owns the session: levels, state and the
/// step pipeline. The terminal host lives in the binary.

pub mod config;
pub mod domain;
pub mod error;
pub mod sim;
