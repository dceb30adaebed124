use crate::{
    AppState,
    auth::{ACCESS_TOKEN_COOKIE, AdminUser, AuthUser, MaybeUser},
    credentials::{hash_password, verify_password},
    error::{AppError, AuthError, StoreError},
    listing::{ListFilter, ListQuery},
    models::{
        BlogFull, BlogPage, BlogStatus, CreateBlogRequest, CreateRoleRequest, LoginRequest,
        MessageResponse, NewUser, RegisterUserRequest, Role, StatusChangeResponse, StatusQuery,
        TokenResponse, UpdateUserRoleRequest, UserInfo,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use cookie::{Cookie, SameSite, time::Duration as CookieDuration};

// --- Session Cookie Helpers ---

fn build_session_cookie(value: &str, max_age: CookieDuration, secure: bool) -> String {
    Cookie::build((ACCESS_TOKEN_COOKIE, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(max_age)
        .build()
        .to_string()
}

/// Set-Cookie value carrying a freshly issued token.
pub fn session_cookie(token: &str, max_age_secs: i64, secure: bool) -> String {
    build_session_cookie(token, CookieDuration::seconds(max_age_secs), secure)
}

/// Set-Cookie value that makes the browser drop the session cookie.
pub fn cleared_session_cookie(secure: bool) -> String {
    build_session_cookie("", CookieDuration::ZERO, secure)
}

// --- Auth Handlers ---

/// register_user
///
/// [Public Route] Creates an account with the default role. The password is
/// stored as an Argon2 hash only.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "Registered", body = MessageResponse),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "User already exists")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::Validation)?;

    // Fast path; the unique constraints still catch a concurrent registration.
    if state.repo.find_user_by_email(&payload.email).await?.is_some() {
        return Err(StoreError::UserExists.into());
    }

    let password_hash = hash_password(&payload.password)?;
    state
        .repo
        .create_user(NewUser {
            phone_number: payload.phone_number.trim().to_string(),
            first_name: payload.first_name.trim().to_string(),
            last_name: payload.last_name.trim().to_string(),
            email: payload.email.trim().to_string(),
            password_hash,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "User registered successfully".to_string(),
        }),
    ))
}

/// login
///
/// [Public Route] Exchanges email and password for a session token. The token is
/// returned in the body and set as an HttpOnly cookie.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = TokenResponse),
        (status = 401, description = "Invalid email or password")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .repo
        .find_user_by_email(payload.email.trim())
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    if !verify_password(&payload.password, &user.password_hash) {
        tracing::warn!(user_id = user.id, "login rejected: wrong password");
        return Err(AuthError::InvalidCredentials.into());
    }

    let token = state.tokens.issue_token(&user)?;
    let cookie = session_cookie(
        &token,
        state.tokens.lifetime().num_seconds(),
        state.config.secure_cookies(),
    );
    tracing::info!(user_id = user.id, "user logged in");

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(TokenResponse {
            access_token: token,
            token_type: "bearer".to_string(),
        }),
    ))
}

/// logout
///
/// [Public Route] Clears the session cookie. Tokens are stateless, so nothing is
/// revoked server-side.
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 200, description = "Logged out", body = MessageResponse))
)]
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::SET_COOKIE, cleared_session_cookie(state.config.secure_cookies()))],
        Json(MessageResponse {
            message: "Logged out".to_string(),
        }),
    )
}

/// get_me
///
/// [Authenticated Route] Profile of the current session's user.
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Profile", body = UserInfo),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn get_me(AuthUser(user): AuthUser) -> Json<UserInfo> {
    Json(UserInfo::from(&user))
}

// --- Blog Handlers ---

/// list_blogs
///
/// [Public Route] One page of published posts, newest first.
#[utoipa::path(
    get,
    path = "/api/blogs",
    params(ListQuery),
    responses((status = 200, description = "Page of published blogs", body = BlogPage))
)]
pub async fn list_blogs(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<BlogPage>, AppError> {
    let page = state.repo.list_published(ListFilter::from(query)).await?;
    Ok(Json(page))
}

/// get_blog
///
/// [Public Route, optional session] A single post with author and tags. A draft is
/// only returned to its author; everyone else gets the same 404 as for a missing post.
#[utoipa::path(
    get,
    path = "/api/blogs/{id}",
    params(("id" = i64, Path, description = "Blog ID")),
    responses(
        (status = 200, description = "Found", body = BlogFull),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_blog(
    MaybeUser(user): MaybeUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<BlogFull>, AppError> {
    let requester = user.as_ref().map(|u| u.id);
    match state.repo.get_blog(id, requester).await {
        Ok(blog) => Ok(Json(blog)),
        Err(StoreError::Forbidden) => Err(StoreError::NotFound.into()),
        Err(e) => Err(e.into()),
    }
}

/// create_blog
///
/// [Authenticated Route] Publishes (or drafts) a post authored by the session user.
/// Tags are created on first use.
#[utoipa::path(
    post,
    path = "/api/blogs",
    request_body = CreateBlogRequest,
    responses(
        (status = 201, description = "Created", body = BlogFull),
        (status = 400, description = "Duplicate title or invalid payload"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn create_blog(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateBlogRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::Validation)?;

    let tags = payload.cleaned_tags();
    let blog = state
        .repo
        .create_blog(payload.into_new_blog(user.id), tags)
        .await?;

    Ok((StatusCode::CREATED, Json(blog)))
}

/// delete_blog
///
/// [Authenticated Route] Owner-only deletion.
#[utoipa::path(
    delete,
    path = "/api/blogs/{id}",
    params(("id" = i64, Path, description = "Blog ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_blog(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.repo.delete_blog(id, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// change_blog_status
///
/// [Authenticated Route] Owner-only switch between `draft` and `published`.
/// Requesting the current status is not an error: the response reports `changed: false`.
#[utoipa::path(
    patch,
    path = "/api/blogs/{id}/status",
    params(("id" = i64, Path, description = "Blog ID"), StatusQuery),
    responses(
        (status = 200, description = "Status applied", body = StatusChangeResponse),
        (status = 400, description = "Unknown status"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Not found")
    )
)]
pub async fn change_blog_status(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<StatusChangeResponse>, AppError> {
    let target: BlogStatus = query.new_status.parse()?;

    match state.repo.change_blog_status(id, target, user.id).await {
        Ok(blog) => Ok(Json(StatusChangeResponse {
            id: blog.id,
            status: blog.status,
            changed: true,
        })),
        Err(StoreError::NoOp) => Ok(Json(StatusChangeResponse {
            id,
            status: target,
            changed: false,
        })),
        Err(e) => Err(e.into()),
    }
}

// --- Admin Handlers ---

/// list_roles
///
/// [Admin Route] All permission tiers.
#[utoipa::path(
    get,
    path = "/admin/roles",
    responses(
        (status = 200, description = "Roles", body = [Role]),
        (status = 403, description = "Elevated role required")
    )
)]
pub async fn list_roles(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Role>>, AppError> {
    Ok(Json(state.repo.list_roles().await?))
}

/// create_role
#[utoipa::path(
    post,
    path = "/admin/roles",
    request_body = CreateRoleRequest,
    responses(
        (status = 201, description = "Created", body = Role),
        (status = 409, description = "Role name taken")
    )
)]
pub async fn create_role(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Role name must not be empty".to_string()));
    }

    let role = state.repo.create_role(name).await?;
    tracing::info!(admin_id = admin.id, role_id = role.id, "role created");
    Ok((StatusCode::CREATED, Json(role)))
}

/// delete_role
///
/// [Admin Route] Rejected with 409 while any user still holds the role.
#[utoipa::path(
    delete,
    path = "/admin/roles/{id}",
    params(("id" = i64, Path, description = "Role ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Role still assigned")
    )
)]
pub async fn delete_role(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.repo.delete_role(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// set_user_role
#[utoipa::path(
    put,
    path = "/admin/users/{id}/role",
    params(("id" = i64, Path, description = "User ID")),
    request_body = UpdateUserRoleRequest,
    responses(
        (status = 200, description = "Updated", body = UserInfo),
        (status = 404, description = "Unknown user or role")
    )
)]
pub async fn set_user_role(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(payload): Json<UpdateUserRoleRequest>,
) -> Result<Json<UserInfo>, AppError> {
    let user = state.repo.set_user_role(user_id, payload.role_id).await?;
    Ok(Json(UserInfo::from(&user)))
}

/// delete_blog_admin
///
/// [Admin Route] Moderation override: deletes any post regardless of author.
#[utoipa::path(
    delete,
    path = "/admin/blogs/{id}",
    params(("id" = i64, Path, description = "Blog ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_blog_admin(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.repo.delete_blog_admin(id).await?;
    tracing::info!(admin_id = admin.id, blog_id = id, "blog removed by admin");
    Ok(StatusCode::NO_CONTENT)
}
