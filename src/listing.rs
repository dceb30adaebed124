use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use std::collections::{HashMap, HashSet};

use crate::{
    error::StoreError,
    models::{AuthorInfo, BlogPage, BlogStatus, BlogSummary, TagInfo},
};

pub const MIN_PAGE_SIZE: i64 = 3;
pub const MAX_PAGE_SIZE: i64 = 100;
pub const DEFAULT_PAGE_SIZE: i64 = MIN_PAGE_SIZE;

/// ListQuery
///
/// Query parameters of `GET /api/blogs`. Out-of-range values are clamped, never rejected.
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
pub struct ListQuery {
    /// Only posts written by this user.
    pub author_id: Option<i64>,
    /// Case-insensitive substring matched against tag names.
    pub tag: Option<String>,
    /// 1-based page number.
    pub page: Option<i64>,
    /// Items per page, clamped to [3, 100].
    pub page_size: Option<i64>,
}

/// The filters and window of one listing request after normalisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListFilter {
    pub author_id: Option<i64>,
    /// Lower-cased needle; `None` when absent or blank.
    pub tag: Option<String>,
    pub page: i64,
    pub page_size: i64,
}

impl From<ListQuery> for ListFilter {
    fn from(query: ListQuery) -> Self {
        Self {
            author_id: query.author_id,
            tag: query
                .tag
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty()),
            page: clamp_page(query.page.unwrap_or(1)),
            page_size: clamp_page_size(query.page_size.unwrap_or(DEFAULT_PAGE_SIZE)),
        }
    }
}

impl ListFilter {
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

pub fn clamp_page(page: i64) -> i64 {
    page.max(1)
}

pub fn clamp_page_size(page_size: i64) -> i64 {
    page_size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE)
}

/// ceil(total_count / page_size); zero items means zero pages.
pub fn total_pages(total_count: i64, page_size: i64) -> i64 {
    if total_count <= 0 {
        return 0;
    }
    (total_count + page_size - 1) / page_size
}

/// Escapes LIKE wildcards so the needle matches literally, then wraps it in `%`.
pub fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Keeps the first occurrence of every id, preserving order.
pub fn dedup_by_id<T, F>(rows: Vec<T>, id_of: F) -> Vec<T>
where
    F: Fn(&T) -> i64,
{
    let mut seen = HashSet::with_capacity(rows.len());
    rows.into_iter().filter(|row| seen.insert(id_of(row))).collect()
}

/// push_filters
///
/// Appends the WHERE clause shared by the count and the page query, so both always
/// describe the same set. The tag filter is an EXISTS sub-query: a post matching
/// several tags is still a single row.
pub fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &ListFilter) {
    builder.push(" WHERE b.status = ");
    builder.push_bind(BlogStatus::Published.as_str());

    if let Some(author_id) = filter.author_id {
        builder.push(" AND b.author = ");
        builder.push_bind(author_id);
    }

    if let Some(tag) = &filter.tag {
        builder.push(
            " AND EXISTS (SELECT 1 FROM blog_tags bt JOIN tags t ON t.id = bt.tag_id \
             WHERE bt.blog_id = b.id AND t.name LIKE ",
        );
        builder.push_bind(like_pattern(tag));
        builder.push(" ESCAPE '\\')");
    }
}

#[derive(Debug, FromRow)]
struct SummaryRow {
    id: i64,
    title: String,
    short_description: String,
    created_at: DateTime<Utc>,
    author_id: i64,
    author_first_name: String,
    author_last_name: String,
}

#[derive(Debug, FromRow)]
struct PageTagRow {
    blog_id: i64,
    id: i64,
    name: String,
}

/// list_published
///
/// One page of published posts, optionally filtered by author and tag substring.
pub async fn list_published(pool: &PgPool, filter: &ListFilter) -> Result<BlogPage, StoreError> {
    let mut count_query: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT COUNT(*) FROM blogs b");
    push_filters(&mut count_query, filter);

    let total_count: i64 = count_query
        .build_query_scalar()
        .fetch_one(pool)
        .await?;

    if total_count == 0 {
        return Ok(BlogPage {
            page: filter.page,
            page_size: filter.page_size,
            total_pages: 0,
            total_count: 0,
            items: vec![],
        });
    }

    let mut page_query: QueryBuilder<Postgres> = QueryBuilder::new(
        r#"
        SELECT
            b.id, b.title, b.short_description, b.created_at,
            u.id AS author_id, u.first_name AS author_first_name, u.last_name AS author_last_name
        FROM blogs b
        JOIN users u ON u.id = b.author
        "#,
    );
    push_filters(&mut page_query, filter);
    page_query.push(" ORDER BY b.created_at DESC, b.id DESC LIMIT ");
    page_query.push_bind(filter.page_size);
    page_query.push(" OFFSET ");
    page_query.push_bind(filter.offset());

    let rows: Vec<SummaryRow> = page_query.build_query_as().fetch_all(pool).await?;
    let rows = dedup_by_id(rows, |row| row.id);

    let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
    let mut tags_by_blog = load_tags_for(pool, &ids).await?;

    let items = rows
        .into_iter()
        .map(|row| BlogSummary {
            id: row.id,
            title: row.title,
            short_description: row.short_description,
            status: BlogStatus::Published,
            created_at: row.created_at,
            author: AuthorInfo {
                id: row.author_id,
                first_name: row.author_first_name,
                last_name: row.author_last_name,
            },
            tags: tags_by_blog.remove(&row.id).unwrap_or_default(),
        })
        .collect();

    Ok(BlogPage {
        page: filter.page,
        page_size: filter.page_size,
        total_pages: total_pages(total_count, filter.page_size),
        total_count,
        items,
    })
}

async fn load_tags_for(
    pool: &PgPool,
    blog_ids: &[i64],
) -> Result<HashMap<i64, Vec<TagInfo>>, sqlx::Error> {
    if blog_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = sqlx::query_as::<_, PageTagRow>(
        r#"
        SELECT bt.blog_id, t.id, t.name
        FROM blog_tags bt
        JOIN tags t ON t.id = bt.tag_id
        WHERE bt.blog_id = ANY($1)
        ORDER BY t.name
        "#,
    )
    .bind(blog_ids)
    .fetch_all(pool)
    .await?;

    let mut grouped: HashMap<i64, Vec<TagInfo>> = HashMap::new();
    for row in rows {
        grouped.entry(row.blog_id).or_default().push(TagInfo {
            id: row.id,
            name: row.name,
        });
    }
    Ok(grouped)
}
