// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, analytics, auth, links, metadata, profile, redirect},
    state::AppState,
    utils::session::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Public: auth, public profiles, link redirects.
/// * Session required: links, metadata, analytics.
/// * Session + admin role: admin.
/// * Global middleware: Trace, CORS.
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    let auth_layer = middleware::from_fn_with_state(state.clone(), auth_middleware);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/phone-login", post(auth::phone_login))
        .route("/set-pin", post(auth::set_pin))
        .route("/context", post(auth::context))
        .route("/logout", post(auth::logout));

    let link_routes = Router::new()
        .route("/", get(links::list_links).post(links::create_link))
        .route("/stats", get(links::link_stats))
        .route("/reorder", post(links::reorder_links))
        .route(
            "/{id}",
            get(links::get_link)
                .put(links::update_link)
                .delete(links::delete_link),
        )
        .layer(auth_layer.clone());

    let metadata_routes = Router::new()
        .route("/fetch", post(metadata::fetch_metadata))
        .layer(auth_layer.clone());

    let analytics_routes = Router::new()
        .route("/summary", get(analytics::summary))
        .route("/clicks/{link_id}", get(analytics::link_clicks))
        .route("/views", get(analytics::profile_views))
        .layer(auth_layer.clone());

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users))
        .route("/users/{id}", put(admin::update_user))
        .route("/users/{id}/unlock", post(admin::unlock_user))
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(auth_layer);

    Router::new()
        .nest("/api/auth", auth_routes)
        .route("/api/user/me", get(auth::me))
        .nest("/api/links", link_routes)
        .nest("/api/metadata", metadata_routes)
        .nest("/api/analytics", analytics_routes)
        .nest("/api/admin", admin_routes)
        .route("/api/go/{id}", get(redirect::follow_link))
        .route("/api/profile/{username}", get(profile::get_public_profile))
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
