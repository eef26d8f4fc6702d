//! Core domain model and artifact validation for NewsMint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CRATE_NAME: &str = "mint-core";

/// Accepted word-count range for a rewritten article body.
pub const WORD_COUNT_MIN: usize = 500;
pub const WORD_COUNT_MAX: usize = 850;

/// Hard cap on the stored keyword set, post-merge.
pub const KEYWORD_CAP: usize = 30;

/// Candidate item discovered on a listing page.
///
/// Ephemeral: consumed once per run, never persisted directly. The origin URL
/// is the dedup and idempotency key for everything downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceItem {
    pub origin_url: String,
    pub title: String,
    pub source: String,
}

/// Extracted article content as fetched from the origin page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawContent {
    pub body: String,
    pub images: Vec<String>,
}

/// Structured output of the rewrite step, post-processed and ready for
/// validation. `word_count` is computed locally over `content`, never taken
/// from the generation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewrittenArtifact {
    pub generated_title: String,
    pub content: String,
    pub seo_keywords: Vec<String>,
    pub meta_description: String,
    pub slug: String,
    pub images: Vec<String>,
    pub word_count: usize,
}

/// Persisted article record: source item + raw body + rewritten artifact.
///
/// Exactly one record exists per distinct origin URL; records are created
/// once and never mutated by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredArticle {
    pub origin_url: String,
    pub title: String,
    pub source: String,
    pub raw_body: String,
    pub generated_title: String,
    pub content: String,
    pub word_count: usize,
    pub seo_keywords: Vec<String>,
    pub meta_description: String,
    pub images: Vec<String>,
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

impl StoredArticle {
    pub fn assemble(
        item: SourceItem,
        raw_body: String,
        artifact: RewrittenArtifact,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            origin_url: item.origin_url,
            title: item.title,
            source: item.source,
            raw_body,
            generated_title: artifact.generated_title,
            content: artifact.content,
            word_count: artifact.word_count,
            seo_keywords: artifact.seo_keywords,
            meta_description: artifact.meta_description,
            images: artifact.images,
            slug: artifact.slug,
            created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("required field `{0}` is empty")]
    EmptyField(&'static str),
    #[error("keyword count {0} outside 1..={KEYWORD_CAP}")]
    KeywordCount(usize),
    #[error("slug `{0}` is empty or not url-safe")]
    Slug(String),
    #[error("word count {0} outside {WORD_COUNT_MIN}..={WORD_COUNT_MAX}")]
    WordCount(usize),
}

/// Structural and length gate applied before an artifact is accepted.
///
/// Pure function, no I/O. Any violation rejects the whole artifact; there is
/// no partial acceptance.
pub fn validate_artifact(artifact: &RewrittenArtifact) -> Result<(), ValidationError> {
    if artifact.generated_title.trim().is_empty() {
        return Err(ValidationError::EmptyField("generated_title"));
    }
    if artifact.content.trim().is_empty() {
        return Err(ValidationError::EmptyField("content"));
    }
    if artifact.meta_description.trim().is_empty() {
        return Err(ValidationError::EmptyField("meta_description"));
    }
    if !is_url_safe_slug(&artifact.slug) {
        return Err(ValidationError::Slug(artifact.slug.clone()));
    }
    let keywords = artifact.seo_keywords.len();
    if keywords == 0 || keywords > KEYWORD_CAP {
        return Err(ValidationError::KeywordCount(keywords));
    }
    if artifact.word_count < WORD_COUNT_MIN || artifact.word_count > WORD_COUNT_MAX {
        return Err(ValidationError::WordCount(artifact.word_count));
    }
    Ok(())
}

fn is_url_safe_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact() -> RewrittenArtifact {
        RewrittenArtifact {
            generated_title: "A Fresh Take on the Story".into(),
            content: "<h1>A Fresh Take</h1><p>body</p>".into(),
            seo_keywords: vec!["news".into(), "updates".into()],
            meta_description: "A short description.".into(),
            slug: "a-fresh-take-on-the-story".into(),
            images: vec![],
            word_count: 700,
        }
    }

    #[test]
    fn valid_artifact_passes() {
        assert_eq!(validate_artifact(&artifact()), Ok(()));
    }

    #[test]
    fn word_count_gate_is_inclusive() {
        let mut a = artifact();
        a.word_count = 499;
        assert_eq!(validate_artifact(&a), Err(ValidationError::WordCount(499)));
        a.word_count = 500;
        assert_eq!(validate_artifact(&a), Ok(()));
        a.word_count = 850;
        assert_eq!(validate_artifact(&a), Ok(()));
        a.word_count = 851;
        assert_eq!(validate_artifact(&a), Err(ValidationError::WordCount(851)));
    }

    #[test]
    fn empty_fields_reject() {
        let mut a = artifact();
        a.generated_title = "  ".into();
        assert_eq!(
            validate_artifact(&a),
            Err(ValidationError::EmptyField("generated_title"))
        );

        let mut a = artifact();
        a.meta_description = String::new();
        assert_eq!(
            validate_artifact(&a),
            Err(ValidationError::EmptyField("meta_description"))
        );
    }

    #[test]
    fn slug_must_be_url_safe() {
        let mut a = artifact();
        a.slug = "has spaces".into();
        assert!(matches!(validate_artifact(&a), Err(ValidationError::Slug(_))));
        a.slug = String::new();
        assert!(matches!(validate_artifact(&a), Err(ValidationError::Slug(_))));
        a.slug = "ok-slug_123".into();
        assert_eq!(validate_artifact(&a), Ok(()));
    }

    #[test]
    fn keyword_set_bounds() {
        let mut a = artifact();
        a.seo_keywords.clear();
        assert_eq!(validate_artifact(&a), Err(ValidationError::KeywordCount(0)));
        a.seo_keywords = (0..KEYWORD_CAP + 1).map(|i| format!("k{i}")).collect();
        assert_eq!(
            validate_artifact(&a),
            Err(ValidationError::KeywordCount(KEYWORD_CAP + 1))
        );
        a.seo_keywords.truncate(KEYWORD_CAP);
        assert_eq!(validate_artifact(&a), Ok(()));
    }

    #[test]
    fn assemble_carries_all_fields() {
        let item = SourceItem {
            origin_url: "https://example.com/story".into(),
            title: "Original Title".into(),
            source: "Example".into(),
        };
        let stored = StoredArticle::assemble(
            item,
            "raw body".into(),
            artifact(),
            chrono::Utc::now(),
        );
        assert_eq!(stored.origin_url, "https://example.com/story");
        assert_eq!(stored.title, "Original Title");
        assert_eq!(stored.raw_body, "raw body");
        assert_eq!(stored.slug, "a-fresh-take-on-the-story");
        assert_eq!(stored.word_count, 700);
    }
}
