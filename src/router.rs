use std::sync::Arc;

use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
};
use tower::ServiceBuilder;

use crate::{
    AppState,
    middleware::{RateLimiter, auth_middleware, log_errors, rate_limit},
    routes,
};

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/login", post(routes::auth::login))
        .route(
            "/auth/verify-email/{user_id}/{token}",
            get(routes::auth::verify_email),
        )
}

fn session_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/users/me",
            get(routes::user::get_me).put(routes::user::update_me),
        )
        .route(
            "/users/me/profile-picture",
            put(routes::user::set_profile_picture),
        )
        .route("/users/me/password", put(routes::user::change_password))
        .route(
            "/users",
            get(routes::user::list_users).post(routes::user::create_user),
        )
        .route(
            "/users/{id}",
            get(routes::user::get_user)
                .put(routes::user::update_user)
                .delete(routes::user::delete_user),
        )
        .route("/users/{id}/role", put(routes::user::change_role))
        .route("/users/{id}/unlock", post(routes::user::unlock_user))
        .layer(from_fn_with_state(state.clone(), auth_middleware))
}

/// Build the application router. Routes live under `config.api_base_uri`;
/// the rate limiter is only installed when one is supplied.
pub fn create_router(state: AppState, rate_limiter: Option<Arc<RateLimiter>>) -> Router {
    let api = Router::new()
        .merge(public_routes())
        .merge(session_routes(&state));

    let base = state.config.api_base_uri.trim_matches('/');
    let router = if base.is_empty() {
        api
    } else {
        Router::new().nest(&format!("/{}", base), api)
    };

    let router = match rate_limiter {
        Some(limiter) => router.layer(from_fn_with_state(limiter, rate_limit)),
        None => router,
    };
    let router = router.layer(ServiceBuilder::new().layer(from_fn(log_errors)));

    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(tower_http::cors::CorsLayer::permissive())
    };

    router.with_state(state)
}
