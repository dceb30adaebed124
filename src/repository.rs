use crate::{
    error::StoreError,
    listing::{self, ListFilter},
    models::{
        AuthorInfo, Blog, BlogFull, BlogPage, BlogStatus, NewBlog, NewUser, Role, TagInfo, User,
    },
    tags::{self, BlogTagPair},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool};
use std::sync::Arc;

/// Repository Trait
///
/// The persistence contract behind every handler. Each method is one logical
/// operation in one transaction. Expected business outcomes come back as
/// `StoreError` variants; `StoreError::Storage` means the transaction was rolled back.
///
/// **Send + Sync + async_trait** make `Arc<dyn Repository>` shareable across
/// axum's task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: i64) -> Result<Option<User>, StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    // Fails with `UserExists` when the email or phone number is taken.
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;
    // Elevated action: `NotFound` for an unknown user or role.
    async fn set_user_role(&self, user_id: i64, role_id: i64) -> Result<User, StoreError>;

    // --- Roles ---
    async fn list_roles(&self) -> Result<Vec<Role>, StoreError>;
    async fn create_role(&self, name: &str) -> Result<Role, StoreError>;
    // `Conflict` while any user still holds the role.
    async fn delete_role(&self, id: i64) -> Result<(), StoreError>;

    // --- Blogs ---
    // Inserts the post, resolves its tags and links them. `DuplicateTitle` on a taken title.
    async fn create_blog(&self, blog: NewBlog, tags: Vec<String>) -> Result<BlogFull, StoreError>;
    // `Forbidden` for a draft read by anyone but its author.
    async fn get_blog(&self, id: i64, requester: Option<i64>) -> Result<BlogFull, StoreError>;
    // Owner-only.
    async fn delete_blog(&self, id: i64, requester: i64) -> Result<(), StoreError>;
    // Admin override: no ownership check.
    async fn delete_blog_admin(&self, id: i64) -> Result<(), StoreError>;
    // Owner-only. `NoOp` when the post already has `status`.
    async fn change_blog_status(
        &self,
        id: i64,
        status: BlogStatus,
        requester: i64,
    ) -> Result<Blog, StoreError>;
    async fn list_published(&self, filter: ListFilter) -> Result<BlogPage, StoreError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

const USER_COLUMNS: &str =
    "id, phone_number, first_name, last_name, email, password_hash, role_id";

const BLOG_COLUMNS: &str =
    "id, title, author, content, short_description, status, created_at, updated_at";

/// Raw `blogs` row. `status` is decoded as text and validated on conversion.
#[derive(Debug, FromRow)]
struct BlogRow {
    id: i64,
    title: String,
    author: i64,
    content: String,
    short_description: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BlogRow {
    fn into_blog(self) -> Result<Blog, StoreError> {
        let status = parse_stored_status(&self.status)?;
        Ok(Blog {
            id: self.id,
            title: self.title,
            author: self.author,
            content: self.content,
            short_description: self.short_description,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// A post joined with its author's name.
#[derive(Debug, FromRow)]
struct BlogWithAuthorRow {
    id: i64,
    title: String,
    author: i64,
    content: String,
    short_description: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    author_first_name: String,
    author_last_name: String,
}

impl BlogWithAuthorRow {
    fn into_parts(self) -> Result<(Blog, AuthorInfo), StoreError> {
        let author = AuthorInfo {
            id: self.author,
            first_name: self.author_first_name,
            last_name: self.author_last_name,
        };
        let blog = BlogRow {
            id: self.id,
            title: self.title,
            author: self.author,
            content: self.content,
            short_description: self.short_description,
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_blog()?;
        Ok((blog, author))
    }
}

// The CHECK constraint keeps other values out; anything else is a corrupt row.
fn parse_stored_status(value: &str) -> Result<BlogStatus, StoreError> {
    value.parse().map_err(|_| {
        StoreError::Storage(sqlx::Error::Decode(
            format!("unexpected blog status '{}'", value).into(),
        ))
    })
}

fn full_blog(blog: Blog, author: AuthorInfo, tags: Vec<TagInfo>) -> BlogFull {
    BlogFull {
        id: blog.id,
        title: blog.title,
        content: blog.content,
        short_description: blog.short_description,
        status: blog.status,
        created_at: blog.created_at,
        updated_at: blog.updated_at,
        author,
        tags,
    }
}

/// Loads a post with its author and tags through explicit joins.
async fn fetch_blog_full(
    conn: &mut PgConnection,
    id: i64,
) -> Result<Option<(Blog, AuthorInfo, Vec<TagInfo>)>, StoreError> {
    let row = sqlx::query_as::<_, BlogWithAuthorRow>(
        r#"
        SELECT
            b.id, b.title, b.author, b.content, b.short_description, b.status,
            b.created_at, b.updated_at,
            u.first_name AS author_first_name, u.last_name AS author_last_name
        FROM blogs b
        JOIN users u ON u.id = b.author
        WHERE b.id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let (blog, author) = row.into_parts()?;

    let tags = sqlx::query_as::<_, TagInfo>(
        r#"
        SELECT t.id, t.name
        FROM tags t
        JOIN blog_tags bt ON bt.tag_id = t.id
        WHERE bt.blog_id = $1
        ORDER BY t.name
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Some((blog, author, tags)))
}

/// Locks and returns a post row for a mutation in the current transaction.
async fn lock_blog(conn: &mut PgConnection, id: i64) -> Result<Option<Blog>, StoreError> {
    let row = sqlx::query_as::<_, BlogRow>(&format!(
        "SELECT {} FROM blogs WHERE id = $1 FOR UPDATE",
        BLOG_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(BlogRow::into_blog).transpose()
}

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: i64) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        tracing::debug!(email, "looking up user by email");
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// create_user
    ///
    /// Inserts a user with the default role. Unique violations on email or phone
    /// become `UserExists`.
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let created = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (phone_number, first_name, last_name, email, password_hash) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(&user.phone_number)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if StoreError::is_unique_violation(&e, "uq_user_email")
                || StoreError::is_unique_violation(&e, "uq_user_phone")
            {
                StoreError::UserExists
            } else {
                tracing::error!("create_user error: {:?}", e);
                StoreError::Storage(e)
            }
        })?;

        tracing::info!(user_id = created.id, "user registered");
        Ok(created)
    }

    async fn set_user_role(&self, user_id: i64, role_id: i64) -> Result<User, StoreError> {
        let mut tx = self.pool.begin().await?;

        let role_exists: Option<i64> = sqlx::query_scalar("SELECT id FROM roles WHERE id = $1")
            .bind(role_id)
            .fetch_optional(&mut *tx)
            .await?;
        if role_exists.is_none() {
            return Err(StoreError::NotFound);
        }

        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET role_id = $1, updated_at = NOW() WHERE id = $2 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(role_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound)?;

        tx.commit().await?;
        tracing::info!(user_id, role_id, "user role changed");
        Ok(user)
    }

    async fn list_roles(&self) -> Result<Vec<Role>, StoreError> {
        let roles = sqlx::query_as::<_, Role>("SELECT id, name FROM roles ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(roles)
    }

    async fn create_role(&self, name: &str) -> Result<Role, StoreError> {
        sqlx::query_as::<_, Role>("INSERT INTO roles (name) VALUES ($1) RETURNING id, name")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if StoreError::is_unique_violation(&e, "uq_role_name") {
                    StoreError::Conflict(format!("Role '{}' already exists", name))
                } else {
                    StoreError::Storage(e)
                }
            })
    }

    /// delete_role
    ///
    /// Refuses to delete a role that users still reference; reassign them first.
    async fn delete_role(&self, id: i64) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<i64> =
            sqlx::query_scalar("SELECT id FROM roles WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        if existing.is_none() {
            return Err(StoreError::NotFound);
        }

        let holders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role_id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if holders > 0 {
            tracing::warn!(role_id = id, holders, "refusing to delete a role in use");
            return Err(StoreError::Conflict(format!(
                "Role {} is still assigned to {} user(s)",
                id, holders
            )));
        }

        sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                // A user assigned between the count and the delete.
                let referenced = matches!(
                    &e,
                    sqlx::Error::Database(db) if db.is_foreign_key_violation()
                );
                if referenced {
                    StoreError::Conflict(format!("Role {} is still assigned to users", id))
                } else {
                    StoreError::Storage(e)
                }
            })?;

        tx.commit().await?;
        tracing::info!(role_id = id, "role deleted");
        Ok(())
    }

    /// create_blog
    ///
    /// Post, tags and associations are written in one transaction: tag ids are
    /// resolved (and flushed) before the association rows that reference them.
    async fn create_blog(&self, blog: NewBlog, tags: Vec<String>) -> Result<BlogFull, StoreError> {
        tracing::info!(title = %blog.title, author = blog.author, "adding blog");
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, BlogRow>(&format!(
            "INSERT INTO blogs (title, author, content, short_description, status) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            BLOG_COLUMNS
        ))
        .bind(&blog.title)
        .bind(blog.author)
        .bind(&blog.content)
        .bind(&blog.short_description)
        .bind(blog.status.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if StoreError::is_unique_violation(&e, "uq_blog_title") {
                tracing::warn!(title = %blog.title, "duplicate blog title");
                StoreError::DuplicateTitle
            } else {
                tracing::error!("create_blog error: {:?}", e);
                StoreError::Storage(e)
            }
        })?;
        let blog_id = row.id;

        if !tags.is_empty() {
            let tag_ids = tags::resolve_tags(&mut *tx, &tags).await?;
            let pairs: Vec<BlogTagPair> = tag_ids
                .into_iter()
                .map(|tag_id| BlogTagPair::new(blog_id, tag_id))
                .collect();
            tags::add_blog_tags(&mut *tx, &pairs).await?;
        }

        let (blog, author, tags) = fetch_blog_full(&mut *tx, blog_id)
            .await?
            .ok_or(StoreError::NotFound)?;

        tx.commit().await?;
        tracing::info!(blog_id, "blog added");
        Ok(full_blog(blog, author, tags))
    }

    /// get_blog
    ///
    /// Absent posts are `NotFound`; drafts seen by anyone but their author are `Forbidden`.
    async fn get_blog(&self, id: i64, requester: Option<i64>) -> Result<BlogFull, StoreError> {
        let mut tx = self.pool.begin().await?;
        let found = fetch_blog_full(&mut *tx, id).await?;
        tx.commit().await?;

        let (blog, author, tags) = found.ok_or(StoreError::NotFound)?;
        blog.ensure_visible_to(requester)?;
        Ok(full_blog(blog, author, tags))
    }

    async fn delete_blog(&self, id: i64, requester: i64) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let blog = lock_blog(&mut *tx, id).await?.ok_or(StoreError::NotFound)?;
        blog.ensure_owned_by(requester)?;

        sqlx::query("DELETE FROM blogs WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(blog_id = id, requester, "blog deleted");
        Ok(())
    }

    async fn delete_blog_admin(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM blogs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        tracing::info!(blog_id = id, "blog force-deleted");
        Ok(())
    }

    async fn change_blog_status(
        &self,
        id: i64,
        status: BlogStatus,
        requester: i64,
    ) -> Result<Blog, StoreError> {
        let mut tx = self.pool.begin().await?;

        let blog = lock_blog(&mut *tx, id).await?.ok_or(StoreError::NotFound)?;
        blog.ensure_owned_by(requester)?;
        let target = blog.status.transition_to(status)?;

        let updated = sqlx::query_as::<_, BlogRow>(&format!(
            "UPDATE blogs SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING {}",
            BLOG_COLUMNS
        ))
        .bind(target.as_str())
        .bind(id)
        .fetch_one(&mut *tx)
        .await?
        .into_blog()?;

        tx.commit().await?;
        tracing::info!(blog_id = id, status = %target, "blog status changed");
        Ok(updated)
    }

    async fn list_published(&self, filter: ListFilter) -> Result<BlogPage, StoreError> {
        listing::list_published(&self.pool, &filter).await
    }
}
