use std::sync::Arc;

use shared::services::auth_service::AuthService;
use shared::services::Services;

#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub services: Services,
    /// Pair ranked players inside the join request. Set when no stream
    /// processor runs behind the queue table.
    pub pair_inline: bool,
}
