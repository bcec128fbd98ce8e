use async_trait::async_trait;
use reqwest::{
    Client,
    header::{ACCEPT, AUTHORIZATION},
};
use url::Url;

use crate::{
    error::CatalogError,
    models::{Movie, MovieList},
};

/// Remote source of movie records.
#[async_trait]
pub trait MovieCatalog: Send + Sync {
    /// Searches movies by title. An empty query lists popular movies instead.
    async fn search(&self, query: &str) -> Result<Vec<Movie>, CatalogError>;
}

#[derive(Clone)]
pub struct TmdbClient {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl TmdbClient {
    #[must_use]
    pub fn new(base_url: Url, api_key: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
        }
    }

    /// Builds the request URL for a query.
    ///
    /// # Errors
    ///
    /// Fails only when the configured base URL cannot be extended with a path.
    pub fn search_url(&self, query: &str) -> Result<Url, CatalogError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let url = if query.is_empty() {
            Url::parse_with_params(
                &format!("{base}/discover/movie"),
                &[("sort_by", "popularity.desc")],
            )?
        } else {
            Url::parse_with_params(&format!("{base}/search/movie"), &[("query", query)])?
        };

        Ok(url)
    }
}

#[async_trait]
impl MovieCatalog for TmdbClient {
    #[tracing::instrument(skip(self))]
    async fn search(&self, query: &str) -> Result<Vec<Movie>, CatalogError> {
        let url = self.search_url(query)?;
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Status { status, body });
        }

        let list = response.json::<MovieList>().await?;
        tracing::debug!(
            page = list.page,
            total_pages = list.total_pages,
            total_results = list.total_results,
            "catalog page received"
        );

        Ok(list.results)
    }
}
