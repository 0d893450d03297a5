//! Wire models for the DoorBird BHA HTTP API

pub mod models;

pub use models::*;
