use tokio::sync::mpsc;

use crate::engine::events::InboundEvent;

/// Shared state for the ingest routes.
pub struct AppState {
    /// Queue into the reconciler.
    pub events: mpsc::Sender<InboundEvent>,
    /// Expected bearer secret. Empty disables the check.
    pub ingest_secret: String,
}
