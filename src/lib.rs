pub mod announcements;
pub mod auth;
pub mod chatbot;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod friends;
pub mod messages;
pub mod projects;
pub mod quizzes;
pub mod res;
pub mod rooms;
pub mod session;
pub mod site;
pub mod tasks;
pub mod uploads;
pub mod users;
pub mod workflow;

use std::sync::Arc;

use axum::{extract::{DefaultBodyLimit, FromRef}, http::HeaderValue, routing::{get, post}, Json, Router};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};
use tracing_subscriber::EnvFilter;

pub use config::Config;
pub use error::{AppError, AppResult};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub config: Arc<Config>,
    pub keys: auth::Keys,
    pub hub: rooms::Hub,
    pub faq: Arc<chatbot::Faq>,
}

impl AppState {
    pub fn new(db_pool: SqlitePool, config: Config) -> anyhow::Result<Self> {
        let keys = auth::Keys::new(&config.jwt_secret, config.token_ttl);
        Ok(AppState {
            db_pool,
            keys,
            hub: rooms::Hub::default(),
            faq: Arc::new(chatbot::Faq::embedded()?),
            config: Arc::new(config),
        })
    }
}

/// Implements `as_str` and `Display` for a fieldless enum from a label table.
#[macro_export]
macro_rules! labelled {
    ($ty:ty { $($variant:ident => $label:literal),* $(,)? }) => {
        impl $ty {
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)*
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,tower_http=info"));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

pub fn app(state: AppState) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(state.config.session_idle));

    let cors = match state.config.cors_origin.as_deref().map(HeaderValue::from_str) {
        Some(Ok(origin)) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any),
        _ => CorsLayer::permissive(),
    };

    let api = Router::new()
        .route("/health", get(health))
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .nest("/friends", friends::router())
        .nest("/messages", messages::router().merge(rooms::router()))
        .nest("/projects", projects::router())
        .nest("/events", events::router())
        .nest("/quizzes", quizzes::router())
        .nest("/tasks", tasks::router())
        .nest("/announcements", announcements::router())
        .nest("/report-formats", site::reports::router())
        .route("/config", get(site::get_config).put(site::update_config))
        .route("/chatbot", post(chatbot::reply))
        .route("/socket", get(rooms::socket));

    Router::new()
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .with_state(state)
        .layer(session_layer)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
