//! Remote-state reconciliation

pub mod favorites;
pub mod fsm;
pub mod schedules;
pub mod syncer;
