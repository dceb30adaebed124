use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use cookie::Cookie;
use std::convert::Infallible;

use crate::{
    credentials::TokenState,
    error::AuthError,
    models::User,
    repository::{Repository, RepositoryState},
};

/// Name of the cookie carrying the session token.
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// token_from_parts
///
/// Pulls the bearer credential out of a request: the `access_token` cookie first,
/// then an `Authorization: Bearer` header (sent by the browser client's fetch calls).
pub fn token_from_parts(parts: &Parts) -> Option<String> {
    let from_cookie = parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == ACCESS_TOKEN_COOKIE)
        .map(|cookie| cookie.value_trimmed().to_string())
        .filter(|value| !value.is_empty());

    from_cookie.or_else(|| {
        parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
    })
}

/// resolve_required
///
/// Mandatory actor resolution: no token is `Unauthenticated`, a token that does not
/// decode or whose subject no longer exists is `InvalidToken`. Always yields the
/// full user record.
pub async fn resolve_required(
    repo: &dyn Repository,
    tokens: &TokenState,
    token: Option<&str>,
) -> Result<User, AuthError> {
    let token = token.ok_or(AuthError::Unauthenticated)?;
    let claims = tokens.decode_token(token)?;
    let user_id = claims.subject_id()?;

    // The user may have been deleted after the token was issued.
    repo.get_user(user_id).await?.ok_or_else(|| {
        tracing::warn!(user_id, "token subject does not exist");
        AuthError::InvalidToken
    })
}

/// resolve_optional
///
/// Optional actor resolution. Never fails: anything short of a valid token for an
/// existing user yields `None`.
pub async fn resolve_optional(
    repo: &dyn Repository,
    tokens: &TokenState,
    token: Option<&str>,
) -> Option<User> {
    token?;
    match resolve_required(repo, tokens, token).await {
        Ok(user) => Some(user),
        Err(AuthError::Store(e)) => {
            tracing::error!("optional actor lookup failed: {:?}", e);
            None
        }
        Err(_) => None,
    }
}

/// require_elevated
///
/// Passes the user through only when its role id is in the elevated set.
pub fn require_elevated(user: User) -> Result<User, AuthError> {
    if user.is_elevated() {
        Ok(user)
    } else {
        tracing::warn!(user_id = user.id, role_id = user.role_id, "elevated role required");
        Err(AuthError::Forbidden)
    }
}

/// AuthUser
///
/// Extractor for routes that need an authenticated actor. Rejects with 401.
/// Behind the session gate it reuses the user the gate stored in the request
/// extensions instead of decoding the token again.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

/// MaybeUser
///
/// Extractor for routes that behave differently for signed-in readers but are
/// open to everyone. Never rejects.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

/// AdminUser
///
/// Extractor for administrative routes: authenticated (401) and elevated (403).
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    TokenState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<User>() {
            return Ok(AuthUser(user.clone()));
        }

        let repo = RepositoryState::from_ref(state);
        let tokens = TokenState::from_ref(state);
        let token = token_from_parts(parts);

        resolve_required(repo.as_ref(), &tokens, token.as_deref())
            .await
            .map(AuthUser)
    }
}

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    TokenState: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<User>() {
            return Ok(MaybeUser(Some(user.clone())));
        }

        let repo = RepositoryState::from_ref(state);
        let tokens = TokenState::from_ref(state);
        let token = token_from_parts(parts);

        Ok(MaybeUser(
            resolve_optional(repo.as_ref(), &tokens, token.as_deref()).await,
        ))
    }
}

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    TokenState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        require_elevated(user).map(AdminUser)
    }
}
