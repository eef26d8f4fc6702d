//! Article persistence for NewsMint: the `ArticleStore` contract, a Postgres
//! implementation, and an in-memory implementation for tests and dry runs.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mint_core::StoredArticle;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

pub const CRATE_NAME: &str = "mint-store";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Read/write contract for the article collection.
///
/// `insert_if_absent` must be atomic for a given origin URL: concurrent
/// writers for the same URL produce exactly one row. The Postgres
/// implementation gets this from a unique index; duplicate inserts are a
/// benign no-op, never an overwrite.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    async fn find_by_origin(&self, origin_url: &str) -> Result<Option<StoredArticle>, StoreError>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<StoredArticle>, StoreError>;

    /// Most recent articles first, by creation time.
    async fn list_recent(&self, limit: i64) -> Result<Vec<StoredArticle>, StoreError>;

    /// Returns true when a new row was written, false when the origin URL was
    /// already present.
    async fn insert_if_absent(&self, article: &StoredArticle) -> Result<bool, StoreError>;

    /// Dedup check. A read error here must surface to the caller; absence is
    /// never assumed on failure.
    async fn exists(&self, origin_url: &str) -> Result<bool, StoreError> {
        Ok(self.find_by_origin(origin_url).await?.is_some())
    }
}

const ARTICLE_COLUMNS: &str = "origin_url, title, source, raw_body, generated_title, content, \
     word_count, seo_keywords, meta_description, images, slug, created_at";

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS articles (
  id               BIGSERIAL PRIMARY KEY,
  origin_url       TEXT NOT NULL,
  title            TEXT NOT NULL,
  source           TEXT NOT NULL,
  raw_body         TEXT NOT NULL,
  generated_title  TEXT NOT NULL,
  content          TEXT NOT NULL,
  word_count       INT NOT NULL,
  seo_keywords     TEXT[] NOT NULL,
  meta_description TEXT NOT NULL,
  images           TEXT[] NOT NULL,
  slug             TEXT NOT NULL,
  created_at       TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE UNIQUE INDEX IF NOT EXISTS uq_articles_origin_url ON articles (origin_url);
CREATE INDEX IF NOT EXISTS idx_articles_slug ON articles (slug);
CREATE INDEX IF NOT EXISTS idx_articles_created_at ON articles (created_at DESC);
"#;

/// Postgres-backed store. The unique index on `origin_url` is the storage-level
/// idempotency guarantee; `insert_if_absent` relies on `ON CONFLICT DO NOTHING`.
#[derive(Debug, Clone)]
pub struct PgArticleStore {
    pool: PgPool,
}

impl PgArticleStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Idempotent schema bootstrap, safe to run on every boot.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        info!("article schema ensured");
        Ok(())
    }
}

fn article_from_row(row: &PgRow) -> Result<StoredArticle, sqlx::Error> {
    let word_count: i32 = row.try_get("word_count")?;
    Ok(StoredArticle {
        origin_url: row.try_get("origin_url")?,
        title: row.try_get("title")?,
        source: row.try_get("source")?,
        raw_body: row.try_get("raw_body")?,
        generated_title: row.try_get("generated_title")?,
        content: row.try_get("content")?,
        word_count: word_count.max(0) as usize,
        seo_keywords: row.try_get("seo_keywords")?,
        meta_description: row.try_get("meta_description")?,
        images: row.try_get("images")?,
        slug: row.try_get("slug")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

#[async_trait]
impl ArticleStore for PgArticleStore {
    async fn find_by_origin(&self, origin_url: &str) -> Result<Option<StoredArticle>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE origin_url = $1"
        ))
        .bind(origin_url)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(article_from_row).transpose().map_err(Into::into)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<StoredArticle>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE slug = $1 ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(article_from_row).transpose().map_err(Into::into)
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<StoredArticle>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles ORDER BY created_at DESC LIMIT $1"
        ))
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(article_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    async fn insert_if_absent(&self, article: &StoredArticle) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO articles
              (origin_url, title, source, raw_body, generated_title, content,
               word_count, seo_keywords, meta_description, images, slug, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (origin_url) DO NOTHING
            "#,
        )
        .bind(&article.origin_url)
        .bind(&article.title)
        .bind(&article.source)
        .bind(&article.raw_body)
        .bind(&article.generated_title)
        .bind(&article.content)
        .bind(article.word_count as i32)
        .bind(&article.seo_keywords)
        .bind(&article.meta_description)
        .bind(&article.images)
        .bind(&article.slug)
        .bind(article.created_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn exists(&self, origin_url: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM articles WHERE origin_url = $1)")
            .bind(origin_url)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<bool, _>(0)?)
    }
}

/// In-memory store keyed by origin URL. Mirrors the Postgres contract,
/// including insert-if-absent semantics.
#[derive(Debug, Default)]
pub struct MemoryArticleStore {
    articles: Mutex<HashMap<String, StoredArticle>>,
}

impl MemoryArticleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArticleStore for MemoryArticleStore {
    async fn find_by_origin(&self, origin_url: &str) -> Result<Option<StoredArticle>, StoreError> {
        Ok(self.articles.lock().await.get(origin_url).cloned())
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<StoredArticle>, StoreError> {
        Ok(self
            .articles
            .lock()
            .await
            .values()
            .find(|a| a.slug == slug)
            .cloned())
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<StoredArticle>, StoreError> {
        let mut all: Vec<StoredArticle> = self.articles.lock().await.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all.truncate(limit.max(0) as usize);
        Ok(all)
    }

    async fn insert_if_absent(&self, article: &StoredArticle) -> Result<bool, StoreError> {
        let mut articles = self.articles.lock().await;
        if articles.contains_key(&article.origin_url) {
            return Ok(false);
        }
        articles.insert(article.origin_url.clone(), article.clone());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn article(origin_url: &str, slug: &str, created_at: DateTime<Utc>) -> StoredArticle {
        StoredArticle {
            origin_url: origin_url.to_string(),
            title: "Original".into(),
            source: "Example".into(),
            raw_body: "raw".into(),
            generated_title: "Generated".into(),
            content: "<p>content</p>".into(),
            word_count: 600,
            seo_keywords: vec!["news".into()],
            meta_description: "desc".into(),
            images: vec![],
            slug: slug.to_string(),
            created_at,
        }
    }

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0).single().unwrap()
    }

    #[tokio::test]
    async fn insert_if_absent_is_idempotent() {
        let store = MemoryArticleStore::new();
        let first = article("https://example.com/a", "a", ts(1));
        assert!(store.insert_if_absent(&first).await.unwrap());

        let mut overwrite = first.clone();
        overwrite.generated_title = "Different".into();
        assert!(!store.insert_if_absent(&overwrite).await.unwrap());

        let kept = store
            .find_by_origin("https://example.com/a")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(kept.generated_title, "Generated");
    }

    #[tokio::test]
    async fn exists_reflects_inserts() {
        let store = MemoryArticleStore::new();
        assert!(!store.exists("https://example.com/a").await.unwrap());
        store
            .insert_if_absent(&article("https://example.com/a", "a", ts(1)))
            .await
            .unwrap();
        assert!(store.exists("https://example.com/a").await.unwrap());
    }

    #[tokio::test]
    async fn list_recent_orders_newest_first_and_limits() {
        let store = MemoryArticleStore::new();
        for (i, hour) in [3u32, 1, 2].into_iter().enumerate() {
            store
                .insert_if_absent(&article(
                    &format!("https://example.com/{i}"),
                    &format!("slug-{i}"),
                    ts(hour),
                ))
                .await
                .unwrap();
        }

        let recent = store.list_recent(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].created_at, ts(3));
        assert_eq!(recent[1].created_at, ts(2));
    }

    #[tokio::test]
    async fn find_by_slug_hits_and_misses() {
        let store = MemoryArticleStore::new();
        store
            .insert_if_absent(&article("https://example.com/a", "the-slug", ts(1)))
            .await
            .unwrap();
        assert!(store.find_by_slug("the-slug").await.unwrap().is_some());
        assert!(store.find_by_slug("missing").await.unwrap().is_none());
    }
}
