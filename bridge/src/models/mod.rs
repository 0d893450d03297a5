//! Domain models

pub mod favorite;
pub mod info;
pub mod schedule;
pub mod trigger;
