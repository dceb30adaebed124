use async_trait::async_trait;
use sqlx::{PgConnection, QueryBuilder};

/// TagStore
///
/// The persistence operations the tag resolver needs, executed inside the caller's
/// open transaction. Implemented for a Postgres connection; tests plug in an
/// in-memory store.
#[async_trait]
pub trait TagStore: Send {
    /// Id of the tag with exactly this (already normalised) name.
    async fn find_tag(&mut self, name: &str) -> Result<Option<i64>, sqlx::Error>;

    /// Inserts a tag and returns its id. The id must be usable before commit.
    async fn insert_tag(&mut self, name: &str) -> Result<i64, sqlx::Error>;

    /// Bulk insert of association rows. Already-existing pairs are ignored.
    async fn insert_blog_tags(&mut self, pairs: &[(i64, i64)]) -> Result<u64, sqlx::Error>;
}

/// A requested association. Either side may be missing when an upstream step
/// produced no id; such pairs are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlogTagPair {
    pub blog_id: Option<i64>,
    pub tag_id: Option<i64>,
}

impl BlogTagPair {
    pub fn new(blog_id: i64, tag_id: i64) -> Self {
        Self {
            blog_id: Some(blog_id),
            tag_id: Some(tag_id),
        }
    }
}

/// Tags are stored lower-cased so "Rust" and "rust" are one tag.
pub fn normalize_tag(name: &str) -> String {
    name.to_lowercase()
}

/// resolve_tags
///
/// Maps each label to a tag id, creating missing tags. The output has one id per
/// input label in input order; repeated labels repeat the same id.
///
/// On a persistence error nothing is undone here: the error propagates and the
/// caller drops its transaction, discarding every tag created in it.
pub async fn resolve_tags<S>(store: &mut S, names: &[String]) -> Result<Vec<i64>, sqlx::Error>
where
    S: TagStore + ?Sized,
{
    let mut tag_ids = Vec::with_capacity(names.len());

    for raw in names {
        let name = normalize_tag(raw);

        if let Some(id) = store.find_tag(&name).await? {
            tag_ids.push(id);
            continue;
        }

        match store.insert_tag(&name).await {
            Ok(id) => {
                tracing::info!(tag = %name, tag_id = id, "tag created");
                tag_ids.push(id);
            }
            Err(e) => {
                tracing::error!(tag = %name, "failed to create tag: {:?}", e);
                return Err(e);
            }
        }
    }

    Ok(tag_ids)
}

/// add_blog_tags
///
/// Inserts the association rows for every complete pair. Incomplete pairs are
/// logged and skipped; they never fail the batch. Returns the number of rows written.
pub async fn add_blog_tags<S>(store: &mut S, pairs: &[BlogTagPair]) -> Result<u64, sqlx::Error>
where
    S: TagStore + ?Sized,
{
    let valid: Vec<(i64, i64)> = pairs
        .iter()
        .filter_map(|pair| match (pair.blog_id, pair.tag_id) {
            (Some(blog_id), Some(tag_id)) => Some((blog_id, tag_id)),
            _ => {
                tracing::warn!(?pair, "skipping incomplete blog/tag pair");
                None
            }
        })
        .collect();

    if valid.is_empty() {
        tracing::warn!("no valid blog/tag pairs to insert");
        return Ok(0);
    }

    match store.insert_blog_tags(&valid).await {
        Ok(written) => {
            tracing::info!(written, "blog/tag associations added");
            Ok(written)
        }
        Err(e) => {
            tracing::error!("failed to add blog/tag associations: {:?}", e);
            Err(e)
        }
    }
}

#[async_trait]
impl TagStore for PgConnection {
    async fn find_tag(&mut self, name: &str) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT id FROM tags WHERE name = $1")
            .bind(name)
            .fetch_optional(&mut *self)
            .await
    }

    async fn insert_tag(&mut self, name: &str) -> Result<i64, sqlx::Error> {
        // A concurrent request may have created the same tag since the lookup;
        // the no-op update makes RETURNING yield the existing id in that case.
        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO tags (name) VALUES ($1)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            "#,
        )
        .bind(name)
        .fetch_one(&mut *self)
        .await
    }

    async fn insert_blog_tags(&mut self, pairs: &[(i64, i64)]) -> Result<u64, sqlx::Error> {
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new("INSERT INTO blog_tags (blog_id, tag_id) ");
        builder.push_values(pairs, |mut row, (blog_id, tag_id)| {
            row.push_bind(*blog_id).push_bind(*tag_id);
        });
        builder.push(" ON CONFLICT (blog_id, tag_id) DO NOTHING");

        let result = builder.build().execute(&mut *self).await?;
        Ok(result.rows_affected())
    }
}
