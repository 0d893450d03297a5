//! Device HTTP API

pub mod api;
pub mod client;
pub mod device;
pub mod favorites;
pub mod schedule;
