// Route exports
pub mod callback;
pub mod users;

use actix_web::web;
use std::sync::Arc;

use crate::config::CallbackSettings;
use crate::core::Dispatcher;
use crate::services::PersistenceStore;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub store: Arc<dyn PersistenceStore>,
    pub callback: CallbackSettings,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .configure(callback::configure)
            .configure(users::configure),
    );
}
