//! Article rewriting through an OpenRouter-style chat-completions endpoint:
//! prompt construction, credential rotation, response decoding, and the
//! post-processing that turns a raw generation into a validated artifact.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mint_core::{validate_artifact, RawContent, RewrittenArtifact, ValidationError, KEYWORD_CAP};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

pub const CRATE_NAME: &str = "mint-rewrite";

/// Per-call timeout for the generation endpoint.
pub const GENERATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Pause between credentials after a failed attempt.
pub const ROTATE_PAUSE: Duration = Duration::from_secs(1);

pub const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "deepseek/deepseek-chat-v3-0324:free";

/// Fallback keyword set merged into every artifact so the stored keyword set
/// is never empty, whatever the service returns.
pub const DEFAULT_SEO_KEYWORDS: &[&str] = &[
    "breaking news",
    "latest news updates",
    "news headlines",
    "top stories",
    "daily news digest",
    "trending stories",
    "news analysis",
    "in depth reporting",
    "current events",
    "world news",
    "entertainment news",
    "celebrity updates",
    "movie news",
    "film industry updates",
    "box office updates",
    "upcoming releases",
    "exclusive interviews",
    "behind the scenes",
    "news roundup",
    "media coverage",
    "press highlights",
    "industry buzz",
    "latest announcements",
    "event coverage",
    "weekend highlights",
    "editor picks",
    "viral stories",
    "news recap",
];

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("generation endpoint error: {0}")]
    Api(String),
    #[error("failed to decode generation response: {0}")]
    Decode(String),
    #[error("artifact rejected: {0}")]
    Rejected(#[from] ValidationError),
    #[error("all {0} credentials failed")]
    AllCredentialsFailed(usize),
}

/// Seam between the rotator and the wire. One call, one credential.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(&self, credential: &str, prompt: &str) -> Result<String, RewriteError>;
}

/// What the pipeline consumes: raw content in, validated artifact out.
#[async_trait]
pub trait ArticleRewriter: Send + Sync {
    async fn rewrite(
        &self,
        original_title: &str,
        raw: &RawContent,
    ) -> Result<RewrittenArtifact, RewriteError>;
}

#[derive(Debug, Clone)]
pub struct RewriteClientConfig {
    pub endpoint: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for RewriteClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: GENERATION_TIMEOUT,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Chat-completions client. Credentials are passed per call so one client
/// serves the whole pool.
pub struct OpenRouterBackend {
    http: reqwest::Client,
    config: RewriteClientConfig,
}

impl OpenRouterBackend {
    pub fn new(config: RewriteClientConfig) -> Result<Self, RewriteError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl GenerationBackend for OpenRouterBackend {
    async fn generate(&self, credential: &str, prompt: &str) -> Result<String, RewriteError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };
        let resp = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(credential)
            .json(&request)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(RewriteError::Api(format!("status {status}")));
        }
        let parsed: ChatResponse = resp.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| RewriteError::Api("no choices in response".to_string()))
    }
}

/// Build the single-message generation request: rewrite instruction, the
/// original material, and the JSON output contract the decoder expects.
pub fn build_prompt(original_title: &str, raw: &RawContent) -> String {
    let images_json =
        serde_json::to_string(&raw.images).unwrap_or_else(|_| "[]".to_string());
    format!(
        r#"Rewrite this article in a professional HTML format.
Write a detailed and engaging article of 600 to 800 words on the given topic. Use an active voice throughout, keep the content original and well-structured, open with a captivating introduction, organize the body into clear paragraphs, and close with a strong summary. The tone should be informative yet engaging, without repetition, reading naturally as if written by a human.

Original Content:
"""{body}"""

Generate an article of 800+ words based on the original title: "{title}". Return the full content as valid HTML with proper tags, including a new, creative <h1> title at the top. Include these images if relevant: {images_json}.

Return as JSON:
{{
  "content": "HTML content here with <img> tags where appropriate",
  "generatedTitle": "Creative new title",
  "seoKeywords": ["keyword1", "keyword2", ...],
  "metaDescription": "A short meta description here",
  "slug": "url-friendly-slug",
  "images": ["image-url-1", "image-url-2"]
}}
Return 20-30 seoKeywords."#,
        body = raw.body,
        title = original_title,
        images_json = images_json,
    )
}

/// Strip a fenced code block wrapper, if any, before structural decoding.
pub fn strip_code_fences(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedPayload {
    content: String,
    generated_title: String,
    #[serde(default)]
    seo_keywords: Vec<String>,
    #[serde(default)]
    meta_description: String,
    #[serde(default)]
    slug: String,
    #[serde(default)]
    images: Vec<String>,
}

fn decode_payload(text: &str) -> Result<GeneratedPayload, RewriteError> {
    serde_json::from_str(strip_code_fences(text)).map_err(|e| RewriteError::Decode(e.to_string()))
}

/// Merge service keywords with the default set: order-preserving,
/// case-insensitive dedup, capped at [`KEYWORD_CAP`].
pub fn merge_keywords(returned: Vec<String>, defaults: &[&str]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for keyword in returned
        .into_iter()
        .chain(defaults.iter().map(|s| s.to_string()))
    {
        let keyword = keyword.trim().to_string();
        if keyword.is_empty() || !seen.insert(keyword.to_ascii_lowercase()) {
            continue;
        }
        merged.push(keyword);
        if merged.len() == KEYWORD_CAP {
            break;
        }
    }
    merged
}

/// Word count over the rendered text of an HTML body.
pub fn count_words(html: &str) -> usize {
    let fragment = scraper::Html::parse_fragment(html);
    fragment
        .root_element()
        .text()
        .flat_map(str::split_whitespace)
        .count()
}

fn finalize(payload: GeneratedPayload, supplied_images: &[String]) -> RewrittenArtifact {
    // Originally supplied media wins; service-returned media is a fallback.
    let images = if supplied_images.is_empty() {
        payload.images
    } else {
        supplied_images.to_vec()
    };
    let word_count = count_words(&payload.content);
    RewrittenArtifact {
        generated_title: payload.generated_title,
        seo_keywords: merge_keywords(payload.seo_keywords, DEFAULT_SEO_KEYWORDS),
        meta_description: payload.meta_description,
        slug: payload.slug,
        images,
        word_count,
        content: payload.content,
    }
}

/// Iterates the credential pool in order, at most one call per credential per
/// invocation. Any failure in the call, decode, or validation advances to the
/// next credential after a short pause; exhaustion is terminal for the item.
pub struct CredentialRotator {
    backend: Arc<dyn GenerationBackend>,
    credentials: Vec<String>,
    rotate_pause: Duration,
}

impl CredentialRotator {
    pub fn new(backend: Arc<dyn GenerationBackend>, credentials: Vec<String>) -> Self {
        Self {
            backend,
            credentials,
            rotate_pause: ROTATE_PAUSE,
        }
    }

    pub fn with_rotate_pause(mut self, pause: Duration) -> Self {
        self.rotate_pause = pause;
        self
    }

    async fn attempt(
        &self,
        credential: &str,
        prompt: &str,
        supplied_images: &[String],
    ) -> Result<RewrittenArtifact, RewriteError> {
        let response = self.backend.generate(credential, prompt).await?;
        let payload = decode_payload(&response)?;
        let artifact = finalize(payload, supplied_images);
        validate_artifact(&artifact)?;
        Ok(artifact)
    }
}

#[async_trait]
impl ArticleRewriter for CredentialRotator {
    async fn rewrite(
        &self,
        original_title: &str,
        raw: &RawContent,
    ) -> Result<RewrittenArtifact, RewriteError> {
        let prompt = build_prompt(original_title, raw);
        let total = self.credentials.len();
        for (index, credential) in self.credentials.iter().enumerate() {
            info!(credential = index + 1, total, "attempting rewrite");
            match self.attempt(credential, &prompt, &raw.images).await {
                Ok(artifact) => {
                    info!(
                        title = %artifact.generated_title,
                        word_count = artifact.word_count,
                        "rewrite accepted"
                    );
                    return Ok(artifact);
                }
                Err(err) => {
                    warn!(credential = index + 1, error = %err, "rewrite attempt failed");
                    if index + 1 < total {
                        tokio::time::sleep(self.rotate_pause).await;
                    }
                }
            }
        }
        Err(RewriteError::AllCredentialsFailed(total))
    }
}
