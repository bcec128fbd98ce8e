use std::{sync::Arc, time::Duration};

use crate::{
    catalog::MovieCatalog,
    error::CatalogError,
    models::{MovieCard, SearchResponse},
    trending::{SearchRecorder, SharedStore},
};

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn MovieCatalog>,
    pub store: SharedStore,
    pub recorder: SearchRecorder,
    pub debounce: Duration,
    pub trending_limit: i64,
}

impl AppState {
    /// Runs a catalog search and queues the first match for the trending
    /// counters. The counter write happens in the background.
    pub async fn search(&self, query: &str) -> Result<SearchResponse, CatalogError> {
        let query = query.trim();
        let movies = self.catalog.search(query).await?;
        self.recorder.record(query, &movies);

        Ok(SearchResponse {
            query: query.to_string(),
            movies: movies.iter().map(MovieCard::from).collect(),
        })
    }
}
