use crate::session::CoachSession;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The coaching session engine driven by this API
    pub session: Arc<CoachSession>,
}

impl AppState {
    pub fn new(session: Arc<CoachSession>) -> Self {
        Self { session }
    }
}
