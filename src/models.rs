use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::{error::StoreError, tags::normalize_tag};

/// Role id assigned to every newly registered user.
pub const DEFAULT_ROLE_ID: i64 = 1;

/// Role ids granting administrative operations.
pub const ELEVATED_ROLE_IDS: [i64; 2] = [2, 3];

// --- Core Application Schemas (Mapped to Database) ---

/// Role
///
/// A named permission tier from the `roles` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Role {
    pub id: i64,
    pub name: String,
}

/// User
///
/// The actor's identity record from the `users` table. The password hash never
/// leaves the server; responses use `UserInfo`.
#[derive(Debug, Clone, FromRow, Default)]
pub struct User {
    pub id: i64,
    pub phone_number: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub role_id: i64,
}

impl User {
    pub fn is_elevated(&self) -> bool {
        ELEVATED_ROLE_IDS.contains(&self.role_id)
    }
}

/// Values required to insert a user. The role always starts at `DEFAULT_ROLE_ID`.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub phone_number: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
}

/// BlogStatus
///
/// Two-state publication lifecycle. Stored as lower-case text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum BlogStatus {
    Draft,
    #[default]
    Published,
}

impl BlogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlogStatus::Draft => "draft",
            BlogStatus::Published => "published",
        }
    }

    /// Validates a transition to `target`. Moving to the current status is a `NoOp`.
    pub fn transition_to(self, target: BlogStatus) -> Result<BlogStatus, StoreError> {
        if self == target {
            return Err(StoreError::NoOp);
        }
        Ok(target)
    }
}

impl fmt::Display for BlogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlogStatus {
    type Err = StoreError;

    /// Exact match only: "Draft" or " draft" are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(BlogStatus::Draft),
            "published" => Ok(BlogStatus::Published),
            _ => Err(StoreError::InvalidStatus),
        }
    }
}

/// Blog
///
/// A post row from the `blogs` table, without its joined author or tags.
#[derive(Debug, Clone, Default)]
pub struct Blog {
    pub id: i64,
    pub title: String,
    pub author: i64,
    pub content: String,
    pub short_description: String,
    pub status: BlogStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Blog {
    /// Drafts are readable by their author only; anonymous readers never see them.
    pub fn ensure_visible_to(&self, requester: Option<i64>) -> Result<(), StoreError> {
        match self.status {
            BlogStatus::Published => Ok(()),
            BlogStatus::Draft if requester == Some(self.author) => Ok(()),
            BlogStatus::Draft => Err(StoreError::Forbidden),
        }
    }

    pub fn ensure_owned_by(&self, requester: i64) -> Result<(), StoreError> {
        if self.author == requester {
            Ok(())
        } else {
            Err(StoreError::Forbidden)
        }
    }
}

/// Values required to insert a post.
#[derive(Debug, Clone)]
pub struct NewBlog {
    pub title: String,
    pub content: String,
    pub short_description: String,
    pub status: BlogStatus,
    pub author: i64,
}

// --- Request Payloads (Input Schemas) ---

/// RegisterUserRequest
///
/// Input payload for `POST /auth/register`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterUserRequest {
    #[schema(example = "+79990001122")]
    pub phone_number: String,
    pub first_name: String,
    pub last_name: String,
    #[schema(example = "reader@example.com")]
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

pub const MIN_PASSWORD_LEN: usize = 5;
pub const MAX_PASSWORD_LEN: usize = 50;

impl RegisterUserRequest {
    /// Field-level checks performed before any storage access.
    pub fn validate(&self) -> Result<(), String> {
        if self.phone_number.trim().is_empty() {
            return Err("Phone number is required".to_string());
        }
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err("First and last name are required".to_string());
        }
        if !self.email.contains('@') {
            return Err("Email address is not valid".to_string());
        }
        let len = self.password.chars().count();
        if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
            return Err(format!(
                "Password must be between {} and {} characters",
                MIN_PASSWORD_LEN, MAX_PASSWORD_LEN
            ));
        }
        if self.password != self.confirm_password {
            return Err("Passwords do not match".to_string());
        }
        Ok(())
    }
}

/// LoginRequest
///
/// Input payload for `POST /auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Longest tag name the `tags.name` column accepts, counted after lower-casing.
pub const MAX_TAG_LEN: usize = 50;

/// CreateBlogRequest
///
/// Input payload for `POST /api/blogs`. The author is taken from the session.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateBlogRequest {
    pub title: String,
    pub content: String,
    pub short_description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub status: BlogStatus,
}

impl CreateBlogRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Title must not be empty".to_string());
        }
        if let Some(tag) = self
            .tags
            .iter()
            .find(|t| normalize_tag(t.trim()).chars().count() > MAX_TAG_LEN)
        {
            return Err(format!("Tag '{}' exceeds {} characters", tag, MAX_TAG_LEN));
        }
        Ok(())
    }

    /// Tag labels with surrounding whitespace removed and blank entries dropped.
    /// Case is left alone; the tag resolver lower-cases.
    pub fn cleaned_tags(&self) -> Vec<String> {
        self.tags
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn into_new_blog(self, author: i64) -> NewBlog {
        NewBlog {
            title: self.title.trim().to_string(),
            content: self.content,
            short_description: self.short_description,
            status: self.status,
            author,
        }
    }
}

/// StatusQuery
///
/// Query string of `PATCH /api/blogs/{id}/status`. Kept as raw text so that an
/// unknown value surfaces as `InvalidStatus` rather than a deserialization error.
#[derive(Debug, Clone, Deserialize, utoipa::IntoParams)]
pub struct StatusQuery {
    /// Either `draft` or `published`.
    pub new_status: String,
}

/// CreateRoleRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateRoleRequest {
    pub name: String,
}

/// UpdateUserRoleRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateUserRoleRequest {
    pub role_id: i64,
}

// --- Output Schemas ---

/// UserInfo
///
/// Public projection of a `User` (GET /auth/me).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserInfo {
    pub id: i64,
    pub email: String,
    pub phone_number: String,
    pub first_name: String,
    pub last_name: String,
    pub role_id: i64,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            phone_number: user.phone_number.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role_id: user.role_id,
        }
    }
}

/// AuthorInfo
///
/// The author fields embedded in post responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AuthorInfo {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
}

/// TagInfo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct TagInfo {
    pub id: i64,
    pub name: String,
}

/// BlogFull
///
/// A post with its author and tags loaded eagerly (GET /api/blogs/{id}).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct BlogFull {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub short_description: String,
    pub status: BlogStatus,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
    pub author: AuthorInfo,
    pub tags: Vec<TagInfo>,
}

/// BlogSummary
///
/// One item of a listing page. Carries the short description instead of the body.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct BlogSummary {
    pub id: i64,
    pub title: String,
    pub short_description: String,
    pub status: BlogStatus,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    pub author: AuthorInfo,
    pub tags: Vec<TagInfo>,
}

/// BlogPage
///
/// Paginated listing of published posts (GET /api/blogs).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct BlogPage {
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    pub total_count: i64,
    pub items: Vec<BlogSummary>,
}

/// StatusChangeResponse
///
/// `changed` is false when the post already had the requested status.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct StatusChangeResponse {
    pub id: i64,
    pub status: BlogStatus,
    pub changed: bool,
}

/// TokenResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

/// MessageResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

/// ErrorResponse
///
/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ErrorResponse {
    pub detail: String,
}
