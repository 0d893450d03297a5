//! Background workers

pub mod commands;
pub mod heartbeat;
