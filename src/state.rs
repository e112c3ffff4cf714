use crate::broadcast::SessionGroups;
use crate::engine::Pacing;
use crate::session::SessionCoordinator;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub coordinator: SessionCoordinator,
    /// Club connections grouped by session id
    pub groups: SessionGroups,
    pub pacing: Pacing,
}

impl AppState {
    pub fn new(coordinator: SessionCoordinator, pacing: Pacing) -> Self {
        Self {
            coordinator,
            groups: SessionGroups::new(),
            pacing,
        }
    }

    /// In-process tiers and no step pacing
    pub fn in_memory() -> Self {
        Self::new(SessionCoordinator::in_memory(), Pacing::none())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::in_memory()
    }
}
