//! Callback listener

pub mod events;
pub mod handlers;
pub mod serve;
pub mod state;
