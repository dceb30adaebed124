#![allow(dead_code)]

use async_trait::async_trait;
use blog_portal::{
    AppState,
    config::AppConfig,
    credentials::{TokenService, TokenState},
    error::StoreError,
    listing::ListFilter,
    models::{
        AuthorInfo, Blog, BlogFull, BlogPage, BlogStatus, NewBlog, NewUser, Role, TagInfo, User,
    },
    repository::{Repository, RepositoryState},
};
use chrono::{Duration, Utc};
use jsonwebtoken::Algorithm;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

pub const PRIVATE_PEM: &[u8] = include_bytes!("../fixtures/jwt_private.pem");
pub const PUBLIC_PEM: &[u8] = include_bytes!("../fixtures/jwt_public.pem");
pub const OTHER_PRIVATE_PEM: &[u8] = include_bytes!("../fixtures/other_private.pem");

pub const AUTHOR_ID: i64 = 10;
pub const READER_ID: i64 = 20;
pub const ADMIN_ID: i64 = 30;
pub const SUPERADMIN_ID: i64 = 40;

/// Canned failure a mock operation should return instead of succeeding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Failure {
    NotFound,
    Forbidden,
    NoOp,
    DuplicateTitle,
    UserExists,
    Conflict,
    Storage,
}

impl Failure {
    pub fn into_error(self) -> StoreError {
        match self {
            Failure::NotFound => StoreError::NotFound,
            Failure::Forbidden => StoreError::Forbidden,
            Failure::NoOp => StoreError::NoOp,
            Failure::DuplicateTitle => StoreError::DuplicateTitle,
            Failure::UserExists => StoreError::UserExists,
            Failure::Conflict => StoreError::Conflict("Role 2 is still assigned to 1 user(s)".into()),
            Failure::Storage => StoreError::Storage(sqlx::Error::PoolTimedOut),
        }
    }
}

// --- MOCK REPOSITORY IMPLEMENTATION ---

/// In-memory stand-in for the content store. Users and the single stored post
/// behave like the real store; everything else returns canned results.
#[derive(Default)]
pub struct MockRepo {
    pub users: Vec<User>,
    pub roles: Vec<Role>,
    pub blog: Option<BlogFull>,
    pub page: BlogPage,
    // Returned by every mutating blog/role/user operation when set.
    pub fail_with: Option<Failure>,
    // Makes `get_user` fail as if the database were unreachable.
    pub user_lookup_fails: bool,

    // Recorded inputs.
    pub user_lookups: AtomicUsize,
    pub created_blogs: Mutex<Vec<(NewBlog, Vec<String>)>>,
    pub created_users: Mutex<Vec<NewUser>>,
    pub list_filters: Mutex<Vec<ListFilter>>,
    pub deleted_blogs: Mutex<Vec<(i64, Option<i64>)>>,
}

impl MockRepo {
    pub fn with_default_users() -> Self {
        Self {
            users: default_users(),
            roles: default_roles(),
            ..Self::default()
        }
    }

    fn failure(&self) -> Result<(), StoreError> {
        match self.fail_with {
            Some(failure) => Err(failure.into_error()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Repository for MockRepo {
    async fn get_user(&self, id: i64) -> Result<Option<User>, StoreError> {
        self.user_lookups.fetch_add(1, Ordering::SeqCst);
        if self.user_lookup_fails {
            return Err(StoreError::Storage(sqlx::Error::PoolTimedOut));
        }
        Ok(self.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.iter().find(|u| u.email == email).cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        self.failure()?;
        self.created_users.lock().unwrap().push(user.clone());
        Ok(User {
            id: 100,
            phone_number: user.phone_number,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            password_hash: user.password_hash,
            role_id: 1,
        })
    }

    async fn set_user_role(&self, user_id: i64, role_id: i64) -> Result<User, StoreError> {
        self.failure()?;
        let mut user = self
            .users
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
            .ok_or(StoreError::NotFound)?;
        if !self.roles.iter().any(|r| r.id == role_id) {
            return Err(StoreError::NotFound);
        }
        user.role_id = role_id;
        Ok(user)
    }

    async fn list_roles(&self) -> Result<Vec<Role>, StoreError> {
        Ok(self.roles.clone())
    }

    async fn create_role(&self, name: &str) -> Result<Role, StoreError> {
        self.failure()?;
        Ok(Role {
            id: self.roles.len() as i64 + 1,
            name: name.to_string(),
        })
    }

    async fn delete_role(&self, id: i64) -> Result<(), StoreError> {
        self.failure()?;
        if self.roles.iter().any(|r| r.id == id) {
            Ok(())
        } else {
            Err(StoreError::NotFound)
        }
    }

    async fn create_blog(&self, blog: NewBlog, tags: Vec<String>) -> Result<BlogFull, StoreError> {
        self.failure()?;
        self.created_blogs
            .lock()
            .unwrap()
            .push((blog.clone(), tags.clone()));
        Ok(BlogFull {
            id: 1,
            title: blog.title,
            content: blog.content,
            short_description: blog.short_description,
            status: blog.status,
            author: AuthorInfo {
                id: blog.author,
                ..AuthorInfo::default()
            },
            tags: tags
                .iter()
                .enumerate()
                .map(|(i, name)| TagInfo {
                    id: i as i64 + 1,
                    name: name.to_lowercase(),
                })
                .collect(),
            ..BlogFull::default()
        })
    }

    async fn get_blog(&self, id: i64, requester: Option<i64>) -> Result<BlogFull, StoreError> {
        let blog = self
            .blog
            .clone()
            .filter(|b| b.id == id)
            .ok_or(StoreError::NotFound)?;
        as_row(&blog).ensure_visible_to(requester)?;
        Ok(blog)
    }

    async fn delete_blog(&self, id: i64, requester: i64) -> Result<(), StoreError> {
        self.failure()?;
        let blog = self
            .blog
            .clone()
            .filter(|b| b.id == id)
            .ok_or(StoreError::NotFound)?;
        as_row(&blog).ensure_owned_by(requester)?;
        self.deleted_blogs.lock().unwrap().push((id, Some(requester)));
        Ok(())
    }

    async fn delete_blog_admin(&self, id: i64) -> Result<(), StoreError> {
        self.failure()?;
        self.deleted_blogs.lock().unwrap().push((id, None));
        Ok(())
    }

    async fn change_blog_status(
        &self,
        id: i64,
        status: BlogStatus,
        requester: i64,
    ) -> Result<Blog, StoreError> {
        self.failure()?;
        let blog = self
            .blog
            .clone()
            .filter(|b| b.id == id)
            .ok_or(StoreError::NotFound)?;
        let mut row = as_row(&blog);
        row.ensure_owned_by(requester)?;
        row.status = row.status.transition_to(status)?;
        Ok(row)
    }

    async fn list_published(&self, filter: ListFilter) -> Result<BlogPage, StoreError> {
        self.list_filters.lock().unwrap().push(filter);
        Ok(self.page.clone())
    }
}

fn as_row(blog: &BlogFull) -> Blog {
    Blog {
        id: blog.id,
        title: blog.title.clone(),
        author: blog.author.id,
        content: blog.content.clone(),
        short_description: blog.short_description.clone(),
        status: blog.status,
        created_at: blog.created_at,
        updated_at: blog.updated_at,
    }
}

// --- TEST DATA ---

pub fn user(id: i64, role_id: i64) -> User {
    User {
        id,
        phone_number: format!("+7999000{:04}", id),
        first_name: format!("First{}", id),
        last_name: format!("Last{}", id),
        email: format!("user{}@example.com", id),
        password_hash: String::new(),
        role_id,
    }
}

pub fn default_users() -> Vec<User> {
    vec![
        user(AUTHOR_ID, 1),
        user(READER_ID, 1),
        user(ADMIN_ID, 2),
        user(SUPERADMIN_ID, 3),
    ]
}

pub fn default_roles() -> Vec<Role> {
    ["user", "admin", "superadmin"]
        .iter()
        .enumerate()
        .map(|(i, name)| Role {
            id: i as i64 + 1,
            name: name.to_string(),
        })
        .collect()
}

pub fn blog(id: i64, author: i64, status: BlogStatus) -> BlogFull {
    BlogFull {
        id,
        title: format!("Post {}", id),
        content: "Body".to_string(),
        short_description: "Short".to_string(),
        status,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        author: AuthorInfo {
            id: author,
            first_name: format!("First{}", author),
            last_name: format!("Last{}", author),
        },
        tags: vec![],
    }
}

// --- STATE BUILDERS ---

pub fn token_service() -> TokenService {
    TokenService::from_pem(PRIVATE_PEM, PUBLIC_PEM, Algorithm::RS256, Duration::days(30))
        .expect("fixture keys must load")
}

/// Signs with a key pair whose private half does not match `PUBLIC_PEM`.
pub fn foreign_token_service() -> TokenService {
    TokenService::from_pem(OTHER_PRIVATE_PEM, PUBLIC_PEM, Algorithm::RS256, Duration::days(30))
        .expect("fixture keys must load")
}

pub fn test_state(repo: MockRepo) -> AppState {
    shared_state(Arc::new(repo))
}

/// Keeps a handle on the mock so a test can inspect recorded inputs afterwards.
pub fn shared_state(repo: Arc<MockRepo>) -> AppState {
    AppState {
        repo: repo as RepositoryState,
        tokens: Arc::new(token_service()) as TokenState,
        config: AppConfig::default(),
    }
}

pub fn token_for(state: &AppState, user: &User) -> String {
    state.tokens.issue_token(user).expect("token must sign")
}
