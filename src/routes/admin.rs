use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, put},
};

/// Admin Router Module
///
/// Moderation and role management. Nested under `/admin` and gated on an
/// elevated role (ids 2 and 3); anyone else gets 403, anonymous callers 401.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET/POST /admin/roles
        .route("/roles", get(handlers::list_roles).post(handlers::create_role))
        // DELETE /admin/roles/{id}
        // Refused while users still hold the role.
        .route("/roles/{id}", delete(handlers::delete_role))
        // PUT /admin/users/{id}/role
        .route("/users/{id}/role", put(handlers::set_user_role))
        // DELETE /admin/blogs/{id}
        // Force delete, no ownership check.
        .route("/blogs/{id}", delete(handlers::delete_blog_admin))
}
