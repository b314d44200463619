use askboard_core::cache::{read_popular_tags, read_top_users, CacheStore};
use askboard_core::config::Settings;
use askboard_core::jobs::{PopularTagsJob, TopUsersJob};
use askboard_core::scheduler::Scheduler;
use askboard_core::store::PrimaryStore;
use askboard_core::{Profile, TagCount};
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// `cached` is false when the ranking expired or was never computed; the list is then empty.
#[derive(Serialize)]
pub struct PopularTagsResponse {
    pub cached: bool,
    pub tags: Vec<TagCount>,
}

#[derive(Serialize)]
pub struct TopUsersResponse {
    pub cached: bool,
    pub users: Vec<Profile>,
}

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<dyn CacheStore>,
}

/// Registers both ranking jobs on their configured schedules.
pub fn build_scheduler(settings: &Settings, store: Arc<dyn PrimaryStore>, cache: Arc<dyn CacheStore>) -> Scheduler {
    let popular_tags = PopularTagsJob::new(store.clone(), cache.clone()).with_ttl(settings.popular_tags_ttl);
    let top_users = TopUsersJob::new(store, cache).with_ttl(settings.top_users_ttl);
    Scheduler::new()
        .with_job(settings.popular_tags_schedule.clone(), Arc::new(popular_tags))
        .with_job(settings.top_users_schedule.clone(), Arc::new(top_users))
}

pub fn build_app(cache: Arc<dyn CacheStore>) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/popular-tags", get(popular_tags_handler))
        .route("/top-users", get(top_users_handler))
        .with_state(AppState { cache })
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn popular_tags_handler(State(state): State<AppState>) -> Json<PopularTagsResponse> {
    let tags = read_popular_tags(state.cache.as_ref());
    Json(PopularTagsResponse { cached: tags.is_some(), tags: tags.unwrap_or_default() })
}

pub async fn top_users_handler(State(state): State<AppState>) -> Json<TopUsersResponse> {
    let users = read_top_users(state.cache.as_ref());
    Json(TopUsersResponse { cached: users.is_some(), users: users.unwrap_or_default() })
}
