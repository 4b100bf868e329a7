//! WordPress REST API client.
//!
//! Everything the wizards need from the remote site sits behind the
//! [`PublishingGateway`] trait so the workflows can be exercised against a
//! mock. [`WpClient`] is the real implementation, authenticating every call
//! with a Basic header built from an application password.

/// Time-boxed category list cache
pub mod categories;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Settings;

/// Errors from the WordPress REST API
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Connection / protocol / decode failure
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// Non-success HTTP status; the response body is kept as detail for the
    /// log, never shown to chat users
    #[error("WordPress returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body text
        body: String,
    },
}

/// One WordPress category
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Category {
    /// Term ID
    pub id: u64,
    /// Human-readable name
    pub name: String,
    /// URL slug
    pub slug: String,
}

/// Pre-edit snapshot of a post, held immutably while an edit is in flight
#[derive(Debug, Clone)]
pub struct PostSnapshot {
    /// Post ID
    pub id: u64,
    /// Rendered title
    pub title: String,
    /// Rendered content
    pub content: String,
    /// Current status (publish/draft/…)
    pub status: String,
    /// Permalink
    pub link: String,
}

/// Result of creating a post
#[derive(Debug, Clone)]
pub struct CreatedPost {
    /// New post ID
    pub id: u64,
    /// Permalink
    pub link: String,
}

/// One row of the recent-posts listing
#[derive(Debug, Clone)]
pub struct PostSummary {
    /// Post ID
    pub id: u64,
    /// Rendered title
    pub title: String,
    /// Current status
    pub status: String,
    /// Permalink
    pub link: String,
}

/// Fields to change on an existing post; `None` leaves the field alone
#[derive(Debug, Clone, Default, Serialize)]
pub struct PostUpdate {
    /// Replacement title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Replacement content (already sanitized HTML)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Replacement status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Interface to the remote content system
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PublishingGateway: Send + Sync {
    /// Create a post and return its ID and permalink
    async fn create_post(
        &self,
        title: &str,
        content: &str,
        media_id: Option<u64>,
        category_id: u64,
    ) -> Result<CreatedPost, GatewayError>;
    /// Fetch a single post by ID
    async fn post_by_id(&self, post_id: u64) -> Result<PostSnapshot, GatewayError>;
    /// Apply a partial update to an existing post
    async fn update_post(&self, post_id: u64, update: PostUpdate) -> Result<(), GatewayError>;
    /// Upload media bytes, returning the attachment ID
    async fn upload_media(&self, bytes: Vec<u8>, caption: &str) -> Result<u64, GatewayError>;
    /// Fetch all categories, oldest first
    async fn categories(&self) -> Result<Vec<Category>, GatewayError>;
    /// Fetch the newest posts in any workable status
    async fn recent_posts(&self, limit: usize) -> Result<Vec<PostSummary>, GatewayError>;
}

#[derive(Deserialize)]
struct RenderedField {
    rendered: String,
}

#[derive(Deserialize)]
struct WpPost {
    id: u64,
    title: RenderedField,
    content: RenderedField,
    status: String,
    link: String,
}

#[derive(Deserialize)]
struct WpListedPost {
    id: u64,
    title: RenderedField,
    status: String,
    link: String,
}

#[derive(Deserialize)]
struct WpCreated {
    id: u64,
    link: String,
}

#[derive(Deserialize)]
struct WpMedia {
    id: u64,
}

#[derive(Serialize)]
struct CreatePayload<'a> {
    title: &'a str,
    content: &'a str,
    status: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    featured_media: Option<u64>,
    categories: [u64; 1],
}

#[derive(Serialize)]
struct MediaMeta<'a> {
    alt_text: &'a str,
    caption: &'a str,
}

fn basic_auth_header(username: &str, app_password: &str) -> String {
    let credentials = format!("{username}:{app_password}");
    format!("Basic {}", BASE64.encode(credentials))
}

/// Live WordPress client
pub struct WpClient {
    http: reqwest::Client,
    base_url: String,
    auth_header: String,
    post_status: String,
}

impl WpClient {
    /// Build a client from the loaded settings.
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: settings.wp_base_url().to_string(),
            auth_header: basic_auth_header(&settings.wp_username, &settings.wp_app_password),
            post_status: settings.wp_post_status.clone(),
        }
    }

    fn api(&self, path: &str) -> String {
        format!("{}/wp-json/wp/v2/{path}", self.base_url)
    }

    async fn ensure_success(res: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }
        let body = res.text().await.unwrap_or_default();
        Err(GatewayError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl PublishingGateway for WpClient {
    async fn create_post(
        &self,
        title: &str,
        content: &str,
        media_id: Option<u64>,
        category_id: u64,
    ) -> Result<CreatedPost, GatewayError> {
        let payload = CreatePayload {
            title,
            content,
            status: &self.post_status,
            featured_media: media_id,
            categories: [category_id],
        };

        let res = self
            .http
            .post(self.api("posts"))
            .header(reqwest::header::AUTHORIZATION, &self.auth_header)
            .json(&payload)
            .send()
            .await?;
        let created: WpCreated = Self::ensure_success(res).await?.json().await?;

        info!("Created post {} ({})", created.id, created.link);
        Ok(CreatedPost {
            id: created.id,
            link: created.link,
        })
    }

    async fn post_by_id(&self, post_id: u64) -> Result<PostSnapshot, GatewayError> {
        let res = self
            .http
            .get(self.api(&format!("posts/{post_id}")))
            .header(reqwest::header::AUTHORIZATION, &self.auth_header)
            .send()
            .await?;
        let post: WpPost = Self::ensure_success(res).await?.json().await?;

        Ok(PostSnapshot {
            id: post.id,
            title: post.title.rendered,
            content: post.content.rendered,
            status: post.status,
            link: post.link,
        })
    }

    async fn update_post(&self, post_id: u64, update: PostUpdate) -> Result<(), GatewayError> {
        // The WordPress REST API updates via POST, not PUT
        let res = self
            .http
            .post(self.api(&format!("posts/{post_id}")))
            .header(reqwest::header::AUTHORIZATION, &self.auth_header)
            .json(&update)
            .send()
            .await?;
        Self::ensure_success(res).await?;

        info!("Updated post {post_id}");
        Ok(())
    }

    async fn upload_media(&self, bytes: Vec<u8>, caption: &str) -> Result<u64, GatewayError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name("featured.jpg")
            .mime_str("image/jpeg")?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let res = self
            .http
            .post(self.api("media"))
            .header(reqwest::header::AUTHORIZATION, &self.auth_header)
            .multipart(form)
            .send()
            .await?;
        let media: WpMedia = Self::ensure_success(res).await?.json().await?;

        if !caption.is_empty() {
            let meta = MediaMeta {
                alt_text: caption,
                caption,
            };
            let res = self
                .http
                .post(self.api(&format!("media/{}", media.id)))
                .header(reqwest::header::AUTHORIZATION, &self.auth_header)
                .json(&meta)
                .send()
                .await?;
            Self::ensure_success(res).await?;
        }

        info!("Uploaded media {}", media.id);
        Ok(media.id)
    }

    async fn categories(&self) -> Result<Vec<Category>, GatewayError> {
        debug!("Fetching categories from WordPress");
        let res = self
            .http
            .get(self.api("categories?per_page=100&orderby=id&order=asc"))
            .header(reqwest::header::AUTHORIZATION, &self.auth_header)
            .send()
            .await?;
        let categories: Vec<Category> = Self::ensure_success(res).await?.json().await?;
        Ok(categories)
    }

    async fn recent_posts(&self, limit: usize) -> Result<Vec<PostSummary>, GatewayError> {
        let query = format!(
            "posts?per_page={limit}&order=desc&orderby=date\
             &status=publish,draft,pending&_fields=id,title.rendered,link,status"
        );
        let res = self
            .http
            .get(self.api(&query))
            .header(reqwest::header::AUTHORIZATION, &self.auth_header)
            .send()
            .await?;
        let posts: Vec<WpListedPost> = Self::ensure_success(res).await?.json().await?;

        Ok(posts
            .into_iter()
            .map(|p| PostSummary {
                id: p.id,
                title: p.title.rendered,
                status: p.status,
                link: p.link,
            })
            .collect())
    }
}
