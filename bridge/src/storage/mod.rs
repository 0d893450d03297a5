//! Local configuration and files

pub mod layout;
pub mod secret;
pub mod settings;
