//! Device discovery on the local network

pub mod wizard;
