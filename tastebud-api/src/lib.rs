pub mod config;
pub mod models;
pub mod realtime;
pub mod routes;
pub mod schema;
pub mod services;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post, put};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use socketioxide::SocketIo;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use tastebud_shared::clients::db::DbPool;
use tastebud_shared::clients::redis::RedisClient;
use tastebud_shared::clients::storage::ObjectStore;
use tastebud_shared::middleware::metrics_middleware;

use config::AppConfig;

pub struct AppState {
    pub db: DbPool,
    pub config: AppConfig,
    pub redis: RedisClient,
    pub storage: ObjectStore,
    /// Emits realtime deltas from REST handlers.
    pub io: SocketIo,
    pub metrics_handle: PrometheusHandle,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        // Auth
        .route("/auth/signup", post(routes::auth::signup))
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/refresh", post(routes::auth::refresh))
        .route("/auth/logout", post(routes::auth::logout))
        .route("/auth/session", get(routes::auth::session))
        // Profiles
        .route("/profiles/me", get(routes::profiles::get_own_profile).patch(routes::profiles::update_profile))
        .route("/profiles/me/avatar", post(routes::profiles::upload_avatar).layer(upload_limit.clone()))
        .route("/profiles/check-username", get(routes::profiles::check_username))
        .route("/profiles/search", get(routes::profiles::search_profiles))
        .route("/profiles/:id", get(routes::profiles::get_profile))
        .route("/profiles/:id/stats", get(routes::profiles::profile_stats))
        .route("/profiles/:id/reviews", get(routes::reviews::list_profile_reviews))
        // Restaurants and reviews
        .route("/restaurants", get(routes::restaurants::list_restaurants))
        .route("/restaurants/cuisines", get(routes::restaurants::list_cuisines))
        .route("/restaurants/:id", get(routes::restaurants::get_restaurant))
        .route(
            "/restaurants/:id/reviews",
            get(routes::reviews::list_reviews)
                .post(routes::reviews::submit_review)
                .layer(upload_limit.clone()),
        )
        .route("/restaurants/:id/like", post(routes::likes::toggle_restaurant_like))
        .route(
            "/restaurants/:id/menu",
            get(routes::menu::list_menu)
                .post(routes::menu::create_menu_item)
                .layer(upload_limit.clone()),
        )
        .route(
            "/restaurants/:id/menu/:item_id",
            put(routes::menu::update_menu_item).layer(upload_limit.clone()),
        )
        .route("/reviews/:id", delete(routes::reviews::delete_review))
        .route("/reviews/:id/like", post(routes::likes::toggle_review_like))
        .route("/feed", get(routes::reviews::feed))
        // Friends
        .route("/friends", get(routes::friends::list_friends))
        .route("/friends/:id", delete(routes::friends::remove_friend))
        .route("/friends/requests", post(routes::friends::send_request))
        .route("/friends/requests/incoming", get(routes::friends::list_incoming))
        .route("/friends/requests/outgoing", get(routes::friends::list_outgoing))
        .route("/friends/requests/:id", put(routes::friends::respond_request))
        // Messages
        .route("/messages/contacts", get(routes::messages::list_contacts))
        .route(
            "/messages/:partner_id",
            get(routes::messages::get_conversation).post(routes::messages::send_message),
        )
        // Posts
        .route(
            "/posts",
            get(routes::posts::list_posts)
                .post(routes::posts::create_post)
                .layer(upload_limit),
        )
        .route("/posts/:id", delete(routes::posts::delete_post))
        .layer(axum::middleware::from_fn(metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
