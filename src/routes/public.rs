use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session: health, the sign-up and sign-in flow,
/// and read access to published posts.
///
/// `GET /api/blogs/{id}` still looks at the session when one is present, through
/// the optional `MaybeUser` extractor, so that authors can read their own drafts.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /auth/register
        .route("/auth/register", post(handlers::register_user))
        // POST /auth/login
        // Issues the session token (body + HttpOnly cookie).
        .route("/auth/login", post(handlers::login))
        // POST /auth/logout
        .route("/auth/logout", post(handlers::logout))
        // GET /api/blogs?author_id=&tag=&page=&page_size=
        // Published posts only, newest first.
        .route("/api/blogs", get(handlers::list_blogs))
        // GET /api/blogs/{id}
        .route("/api/blogs/{id}", get(handlers::get_blog))
}
