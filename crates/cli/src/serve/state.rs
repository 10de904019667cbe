//! Application state shared by the admin handlers.

use std::sync::Arc;

use stockwatch_pipeline::AlertBook;
use stockwatch_storage::MemoryStore;

use super::auth::AdminGate;

pub(crate) struct AppState {
    /// Product catalog, alert records, and recipient registry.
    pub(crate) store: Arc<MemoryStore>,
    /// Alert operations over `store`.
    pub(crate) alerts: AlertBook<MemoryStore>,
    pub(crate) gate: Arc<dyn AdminGate>,
    /// Secret expected in `x-setup-secret`. None disables `/admin/grant`.
    pub(crate) setup_secret: Option<String>,
}
