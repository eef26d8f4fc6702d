//! JSON API surface: pipeline trigger, recent-articles listing, and
//! detail-by-slug. Raw fetched bodies never leave the store through here.

use std::sync::Arc;

use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use mint_core::StoredArticle;
use mint_store::ArticleStore;
use mint_sync::{Pipeline, RunOutcome};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::error;

pub const CRATE_NAME: &str = "mint-web";

const DEFAULT_LIST_LIMIT: i64 = 20;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ArticleStore>,
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(store: Arc<dyn ArticleStore>, pipeline: Arc<Pipeline>) -> Self {
        Self { store, pipeline }
    }
}

/// Caller-facing article shape: everything except the raw fetched body.
#[derive(Debug, Clone, Serialize)]
pub struct ArticleView {
    pub origin_url: String,
    pub title: String,
    pub source: String,
    pub generated_title: String,
    pub content: String,
    pub word_count: usize,
    pub seo_keywords: Vec<String>,
    pub meta_description: String,
    pub images: Vec<String>,
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

impl From<StoredArticle> for ArticleView {
    fn from(article: StoredArticle) -> Self {
        Self {
            origin_url: article.origin_url,
            title: article.title,
            source: article.source,
            generated_title: article.generated_title,
            content: article.content,
            word_count: article.word_count,
            seo_keywords: article.seo_keywords,
            meta_description: article.meta_description,
            images: article.images,
            slug: article.slug,
            created_at: article.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct ProcessResponse {
    message: String,
    stored: usize,
    skipped_existing: usize,
    failed: usize,
}

#[derive(Debug, Deserialize, Default)]
struct ListQuery {
    limit: Option<i64>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/process-articles", get(process_articles_handler))
        .route("/api/articles", get(list_articles_handler))
        .route("/api/articles/{slug}", get(article_detail_handler))
        .with_state(Arc::new(state))
}

pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn process_articles_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.pipeline.try_run().await {
        RunOutcome::Completed(summary) => Json(ProcessResponse {
            message: format!("Processed {} new articles", summary.stored),
            stored: summary.stored,
            skipped_existing: summary.skipped_existing,
            failed: summary.failed,
        })
        .into_response(),
        RunOutcome::AlreadyRunning => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({ "error": "pipeline run already in progress" })),
        )
            .into_response(),
    }
}

async fn list_articles_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, 100);
    match state.store.list_recent(limit).await {
        Ok(articles) => {
            let views: Vec<ArticleView> = articles.into_iter().map(Into::into).collect();
            Json(views).into_response()
        }
        Err(err) => server_error(err),
    }
}

async fn article_detail_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(slug): AxumPath<String>,
) -> Response {
    match state.store.find_by_slug(&slug).await {
        Ok(Some(article)) => Json(ArticleView::from(article)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "Article not found" })),
        )
            .into_response(),
        Err(err) => server_error(err),
    }
}

fn server_error(err: impl std::fmt::Display) -> Response {
    error!(error = %err, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": "server error" })),
    )
        .into_response()
}
