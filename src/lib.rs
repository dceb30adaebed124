use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod credentials;
pub mod error;
pub mod handlers;
pub mod listing;
pub mod models;
pub mod repository;
pub mod tags;

// Routing segregated by access tier (public, authenticated, admin).
pub mod routes;
use auth::{AdminUser, AuthUser};
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use credentials::{TokenService, TokenState};
pub use error::{AppError, AuthError, StoreError};
pub use repository::{PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document aggregated from the `#[utoipa::path]` handlers and the
/// `ToSchema` models. Served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register_user, handlers::login, handlers::logout, handlers::get_me,
        handlers::list_blogs, handlers::get_blog, handlers::create_blog,
        handlers::delete_blog, handlers::change_blog_status,
        handlers::list_roles, handlers::create_role, handlers::delete_role,
        handlers::set_user_role, handlers::delete_blog_admin
    ),
    components(
        schemas(
            models::Role, models::BlogStatus, models::RegisterUserRequest,
            models::LoginRequest, models::CreateBlogRequest, models::CreateRoleRequest,
            models::UpdateUserRoleRequest, models::UserInfo, models::AuthorInfo,
            models::TagInfo, models::BlogFull, models::BlogSummary, models::BlogPage,
            models::StatusChangeResponse, models::TokenResponse, models::MessageResponse,
            models::ErrorResponse,
        )
    ),
    tags(
        (name = "blog-portal", description = "Blog Portal API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The single shared container of services handed to every request. Cloning is
/// cheap: the repository and token service sit behind `Arc`s.
#[derive(Clone)]
pub struct AppState {
    /// Persistence layer (content store, users, roles).
    pub repo: RepositoryState,
    /// Session token signing and verification.
    pub tokens: TokenState,
    /// The loaded, immutable environment configuration (cookie policy).
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Let extractors and handlers pull individual components out of AppState.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for TokenState {
    fn from_ref(app_state: &AppState) -> TokenState {
        app_state.tokens.clone()
    }
}

/// auth_middleware
///
/// Session gate for `authenticated_routes`. A failed `AuthUser` extraction
/// rejects the request with 401 before the handler runs; otherwise the resolved
/// user is stored in the request extensions for the handler's extractor.
async fn auth_middleware(AuthUser(user): AuthUser, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(user);
    next.run(request).await
}

/// admin_middleware
///
/// Elevated-role gate for `admin_routes`: 401 without a valid session, 403 for
/// a session whose role is not elevated.
async fn admin_middleware(AdminUser(user): AdminUser, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(user);
    next.run(request).await
}

/// create_router
///
/// Assembles the route groups with their gates, the docs, and the observability
/// layers, and binds the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name for request correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .nest(
            "/admin",
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                admin_middleware,
            )),
        )
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Generates a UUID x-request-id for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Wraps each request in a span carrying the request id.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Echoes x-request-id back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: method, uri and the `x-request-id` set above,
/// so every log line of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
