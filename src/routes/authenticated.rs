use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, patch, post},
};

/// Authenticated Router Module
///
/// Routes for any signed-in user. The router is wrapped in the session gate, and
/// each handler receives the resolved `User` through `AuthUser` for the
/// owner-only checks in the content store.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /auth/me
        .route("/auth/me", get(handlers::get_me))
        // POST /api/blogs
        // Author is always the session user, never taken from the payload.
        .route("/api/blogs", post(handlers::create_blog))
        // DELETE /api/blogs/{id}
        // Owner-only.
        .route("/api/blogs/{id}", delete(handlers::delete_blog))
        // PATCH /api/blogs/{id}/status?new_status=draft|published
        // Owner-only.
        .route("/api/blogs/{id}/status", patch(handlers::change_blog_status))
}
