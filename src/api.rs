//! REST client for the Unicorns backend.
//!
//! This module provides:
//!
//! - `ApiClient`: reqwest wrapper that attaches the user agent and, while the
//!   stored access token is still valid, the bearer header
//! - product paging/lookup, the dashboard feeds (current broadcast,
//!   investments, future products, news) and login
//!
//! Responses are decoded straight into the domain records in `models`.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ApiConfig;
use crate::jwt;
use crate::models::{Broadcast, Category, Investment, NewsPost, Product};

/// User agent for API requests
const USER_AGENT: &str = concat!("Unicorns/", env!("CARGO_PKG_VERSION"));

/// Errors returned by backend calls
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid credentials")]
    Unauthorized,
}

/// Sort order for product listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sorting {
    #[default]
    Newest,
    Oldest,
}

/// Filters for a product listing
#[derive(Debug, Clone, Default)]
pub struct ProductListParams {
    pub sorting: Sorting,
    pub categories: Vec<Category>,
    /// Substring match on the company name
    pub query: Option<String>,
}

/// Tokens returned by a successful login
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationData {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    identifier: &'a str,
    password: &'a str,
}

/// Backend API client
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    hostname: String,
    access_token: Option<String>,
}

impl ApiClient {
    /// Create a new API client from the `[api]` settings
    pub fn new(config: &ApiConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            hostname: config.hostname.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
        })
    }

    /// Whether the stored access token exists and has not expired
    pub fn has_valid_session(&self) -> bool {
        self.bearer().is_some()
    }

    fn bearer(&self) -> Option<&str> {
        let token = self.access_token.as_deref()?;
        match jwt::parse(token) {
            Ok(decoded) if decoded.is_valid() => Some(token),
            Ok(_) => {
                tracing::debug!("Stored access token has expired");
                None
            }
            Err(e) => {
                tracing::warn!("Ignoring unreadable access token: {}", e);
                None
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.get_json_with(path, &[]).await
    }

    /// GET `path` with `query` pairs, encoded by reqwest
    async fn get_json_with<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.hostname, path);
        let mut request = self
            .client
            .get(&url)
            .query(query)
            .header("Accept", "application/json");
        if let Some(token) = self.bearer() {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, body });
        }

        Ok(response.json().await?)
    }

    /// Exchange credentials for a token pair
    pub async fn login(&self, identifier: &str, password: &str) -> Result<AuthorizationData, ApiError> {
        let response = self
            .client
            .post(format!("{}/auth/local", self.hostname))
            .json(&LoginRequest { identifier, password })
            .send()
            .await?;

        match response.status().as_u16() {
            400 | 401 | 403 => Err(ApiError::Unauthorized),
            status if !(200..300).contains(&status) => {
                let body = response.text().await.unwrap_or_default();
                Err(ApiError::Status { status, body })
            }
            _ => {
                let data: AuthorizationData = response.json().await?;
                tracing::info!("Logged in as {}", identifier);
                Ok(data)
            }
        }
    }

    pub async fn find_product(&self, id: i64) -> Result<Product, ApiError> {
        self.get_json(&format!("/products/{id}")).await
    }

    /// Fetch one page of products
    pub async fn products(
        &self,
        offset: usize,
        count: usize,
        params: Option<&ProductListParams>,
    ) -> Result<Vec<Product>, ApiError> {
        let start = std::time::Instant::now();
        let query = product_list_query(offset, count, params);
        let products: Vec<Product> = self.get_json_with("/products", &query).await?;
        tracing::info!(
            "Fetched {} products in {:.1}s",
            products.len(),
            start.elapsed().as_secs_f32()
        );
        Ok(products)
    }

    pub async fn product_count(&self) -> Result<usize, ApiError> {
        self.get_json("/products/count").await
    }

    pub async fn current_broadcast(&self) -> Result<Broadcast, ApiError> {
        self.get_json("/broadcasts/current").await
    }

    pub async fn investments(&self) -> Result<Vec<Investment>, ApiError> {
        self.get_json("/investments").await
    }

    pub async fn future_products(&self) -> Result<Vec<Product>, ApiError> {
        self.get_json("/products/future").await
    }

    pub async fn news(&self) -> Result<Vec<NewsPost>, ApiError> {
        self.get_json_with("/news-posts", &[("_sort", "published_at:desc".to_string())])
            .await
    }
}

/// Query pairs for a product listing.
///
/// Sorting defaults to newest first; every category becomes its own
/// `category` pair.
pub fn product_list_query(
    offset: usize,
    count: usize,
    params: Option<&ProductListParams>,
) -> Vec<(&'static str, String)> {
    let sorting = params.map(|p| p.sorting).unwrap_or_default();
    let sort = match sorting {
        Sorting::Newest => "created_at:desc",
        Sorting::Oldest => "created_at:asc",
    };
    let mut pairs = vec![
        ("_start", offset.to_string()),
        ("_limit", count.to_string()),
        ("_sort", sort.to_string()),
    ];

    if let Some(params) = params {
        pairs.extend(params.categories.iter().map(|c| ("category", c.key().to_string())));
        if let Some(query) = params.query.as_deref().filter(|q| !q.is_empty()) {
            pairs.push(("company_contains", query.to_string()));
        }
    }

    pairs
}
