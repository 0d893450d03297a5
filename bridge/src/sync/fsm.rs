//! State machine for one convergence cycle

use serde::Serialize;

/// Cycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    /// Waiting for the next heartbeat
    Idle,

    /// Health probe in flight
    Probing,

    FetchingFavorites,

    ReconcilingFavorites,

    FetchingSchedules,

    ReconcilingSchedules,
}

/// Cycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleEvent {
    /// Heartbeat, startup or on-demand request
    Start,

    ProbeSucceeded,

    ProbeFailed,

    FavoritesFetched,

    /// A pass changed the device; fetch again
    FavoritesCorrected,

    /// A pass changed nothing
    FavoritesStable,

    SchedulesFetched,

    SchedulesReconciled,

    /// Cycle gave up; retried on the next heartbeat
    Abort,
}

/// Cycle FSM
#[derive(Debug, Clone)]
pub struct CycleFsm {
    state: CycleState,
    favorite_rounds: u32,
}

impl CycleFsm {
    /// Create a new FSM in idle state
    pub fn new() -> Self {
        Self {
            state: CycleState::Idle,
            favorite_rounds: 0,
        }
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    /// Favorites passes started in this cycle
    pub fn favorite_rounds(&self) -> u32 {
        self.favorite_rounds
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: CycleEvent) -> Result<CycleState, String> {
        let new_state = match (self.state, event) {
            (CycleState::Idle, CycleEvent::Start) => {
                self.favorite_rounds = 0;
                CycleState::Probing
            }

            (CycleState::Probing, CycleEvent::ProbeSucceeded) => CycleState::FetchingFavorites,
            (CycleState::Probing, CycleEvent::ProbeFailed) => CycleState::Idle,

            (CycleState::FetchingFavorites, CycleEvent::FavoritesFetched) => {
                self.favorite_rounds += 1;
                CycleState::ReconcilingFavorites
            }

            (CycleState::ReconcilingFavorites, CycleEvent::FavoritesCorrected) => {
                CycleState::FetchingFavorites
            }
            (CycleState::ReconcilingFavorites, CycleEvent::FavoritesStable) => {
                CycleState::FetchingSchedules
            }

            (CycleState::FetchingSchedules, CycleEvent::SchedulesFetched) => {
                CycleState::ReconcilingSchedules
            }
            (CycleState::ReconcilingSchedules, CycleEvent::SchedulesReconciled) => {
                CycleState::Idle
            }

            (state, CycleEvent::Abort) if state != CycleState::Idle => CycleState::Idle,

            // Invalid transitions
            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(new_state)
    }
}

impl Default for CycleFsm {
    fn default() -> Self {
        Self::new()
    }
}
