pub mod ai;
pub mod entity;
pub mod gate;
pub mod grid;
pub mod movement;
pub mod particle;
pub mod physics;
pub mod portal;
pub mod profile;
pub mod rng;
pub mod tile;
