//! Doorbridge Library
//!
//! Keeps a DoorBird device's callback favorites and schedule in line with
//! the bridge and republishes ring and motion events as state values.

pub mod app;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod models;
pub mod scanner;
pub mod server;
pub mod storage;
pub mod store;
pub mod sync;
pub mod utils;
pub mod workers;
