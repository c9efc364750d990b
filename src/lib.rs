pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod store;
pub mod utils;
pub mod workflow;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_cookies::CookieManagerLayer;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use config::Config;
use database::PgStore;
use store::{MemoryStore, Store, StoreResult};
use workflow::WorkflowEngine;

/// Token signing settings shared with the auth extractor.
pub struct AuthSettings {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<WorkflowEngine>,
    pub auth: Arc<AuthSettings>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: &Config) -> Self {
        Self {
            engine: Arc::new(WorkflowEngine::new(store, config.allow_future_expense_dates)),
            auth: Arc::new(AuthSettings {
                jwt_secret: config.jwt_secret.clone(),
                token_ttl_hours: config.token_ttl_hours,
            }),
        }
    }
}

/// Opens PostgreSQL when `DATABASE_URL` is set, otherwise an in-memory store
/// (optionally seeded with demo data).
pub async fn open_store(config: &Config) -> StoreResult<Arc<dyn Store>> {
    match &config.database_url {
        Some(url) => {
            let store = PgStore::connect(url, config.database_max_connections).await?;
            Ok(Arc::new(store))
        }
        None => {
            log::warn!("DATABASE_URL not set; using in-memory store");
            let memory = MemoryStore::new();
            if config.seed_demo_data {
                store::seed_demo_data(&memory).await?;
            }
            Ok(Arc::new(memory))
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))

        // Public routes (no authentication required)
        .route("/signup", post(handlers::auth::signup))
        .route("/login", post(handlers::auth::login))
        .route("/logout", post(handlers::auth::logout))

        // Protected routes (authentication required)
        .route("/me", get(handlers::auth::me))
        .route("/dashboard", get(handlers::dashboard))

        // Expense routes
        .route("/expenses", get(handlers::expenses::expenses_list))
        .route("/expenses", post(handlers::expenses::create_expense))
        .route("/expenses/:id", get(handlers::expenses::expense_detail))
        .route("/expenses/:id/approve", post(handlers::expenses::approve_expense))
        .route("/expenses/:id/reject", post(handlers::expenses::reject_expense))

        // Team management routes
        .route("/team/users", get(handlers::team::users_list))
        .route("/team/users", post(handlers::team::create_user))
        .route("/team/users/:id", put(handlers::team::update_user))
        .route("/team/users/:id", delete(handlers::team::delete_user))

        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CookieManagerLayer::new())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB
        )
        .with_state(state)
}
