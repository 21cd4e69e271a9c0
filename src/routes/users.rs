use actix_web::{web, HttpResponse, Responder};

use crate::models::{ErrorResponse, HealthResponse};
use crate::routes::AppState;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/users/{id}/stats", web::get().to(user_stats));
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let healthy = match state.store.health_check().await {
        Ok(healthy) => healthy,
        Err(e) => {
            tracing::warn!("Store health check failed: {}", e);
            false
        }
    };

    let status = if healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Search statistics of one viewer
///
/// GET /api/v1/users/{id}/stats
async fn user_stats(state: web::Data<AppState>, path: web::Path<i64>) -> impl Responder {
    let viewer_id = path.into_inner();

    match state.dispatcher.machine().engine().stats(viewer_id).await {
        Ok(stats) => HttpResponse::Ok().json(stats),
        Err(e) => {
            tracing::error!("Failed to compute stats for user {}: {}", viewer_id, e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to compute stats".to_string(),
                message: e.to_string(),
                status_code: 500,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CallbackSettings;
    use crate::core::discovery::{CandidateDiscoveryEngine, DiscoverySettings};
    use crate::core::{ConversationStateMachine, Dispatcher, RateLimiter, RetryExecutor};
    use crate::models::{RatingKind, SearchStats};
    use crate::services::{MemoryStore, PersistenceStore};
    use crate::testing::{RecordingTransport, ScriptedDirectory};
    use actix_web::{test, App};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn state(store: Arc<MemoryStore>) -> AppState {
        let engine = Arc::new(CandidateDiscoveryEngine::new(
            Arc::new(ScriptedDirectory::new()),
            store.clone(),
            Arc::new(RateLimiter::new(3, Duration::from_secs(1)).unwrap()),
            RetryExecutor::default(),
            DiscoverySettings::default(),
        ));
        let machine = Arc::new(ConversationStateMachine::new(
            engine,
            store.clone(),
            Arc::new(RecordingTransport::new()),
        ));

        AppState {
            dispatcher: Arc::new(Dispatcher::new(machine, CancellationToken::new())),
            store,
            callback: CallbackSettings::default(),
        }
    }

    #[actix_web::test]
    async fn test_health() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(Arc::new(MemoryStore::new()))))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let health: HealthResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(health.status, "healthy");
    }

    #[actix_web::test]
    async fn test_stats() {
        let store = Arc::new(MemoryStore::new());
        for candidate in [10, 11, 12, 13] {
            store.record_viewed(1, candidate).await.unwrap();
        }
        store.record_rating(1, 10, RatingKind::Liked).await.unwrap();
        store.record_rating(1, 11, RatingKind::Disliked).await.unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(store)))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/users/1/stats").to_request();
        let stats: SearchStats = test::call_and_read_body_json(&app, req).await;
        assert_eq!(stats.viewer_id, 1);
        assert_eq!(stats.viewed, 4);
        assert_eq!(stats.liked, 1);
        assert_eq!(stats.disliked, 1);
        assert_eq!(stats.favorites, 0);
        assert_eq!(stats.success_rate, 0.0);
    }
}
