use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use redis::{AsyncCommands, aio::MultiplexedConnection as RedisConnection};
use tokio::{sync::mpsc, time::interval};

use crate::{
    error::StoreError,
    models::{Movie, SearchCount, TrendingMovie},
};

pub const TRENDING_CACHE_KEY: &str = "trending";
const REFRESH_PERIOD: Duration = Duration::from_secs(60);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Incremented,
}

/// Persistent per-search-term counters.
#[async_trait]
pub trait TrendingStore: Send + Sync {
    /// Counts one more search for `search_term`, remembering `movie` as its
    /// latest match. Creates the counter with a count of one when missing.
    async fn record(&self, search_term: &str, movie: &Movie) -> Result<UpsertOutcome, StoreError>;

    /// Counters with the highest counts first.
    async fn top(&self, limit: i64) -> Result<Vec<SearchCount>, StoreError>;
}

pub type SharedStore = Arc<dyn TrendingStore>;

pub async fn record_search(store: &dyn TrendingStore, search_term: &str, movie: &Movie) {
    match store.record(search_term, movie).await {
        Ok(outcome) => tracing::debug!(search_term, ?outcome, "search recorded"),
        Err(err) => tracing::error!(err = ?err, search_term),
    }
}

pub async fn fetch_trending(store: &dyn TrendingStore, limit: i64) -> Vec<TrendingMovie> {
    match store.top(limit).await {
        Ok(counts) => counts.into_iter().map(TrendingMovie::from).collect(),
        Err(err) => {
            tracing::error!(err = ?err);
            Vec::new()
        }
    }
}

/// Last computed trending list, shared between instances.
#[async_trait]
pub trait TrendingCache: Send {
    async fn load(&mut self) -> Option<Vec<TrendingMovie>>;

    async fn save(&mut self, trending: &[TrendingMovie]);
}

#[async_trait]
impl TrendingCache for RedisConnection {
    async fn load(&mut self) -> Option<Vec<TrendingMovie>> {
        match self.get::<'_, _, Option<Vec<u8>>>(TRENDING_CACHE_KEY).await {
            Ok(Some(cached)) => serde_json::from_slice::<Vec<TrendingMovie>>(&cached).ok(),
            Ok(None) => None,
            Err(err) => {
                tracing::error!(err = ?err);
                None
            }
        }
    }

    async fn save(&mut self, trending: &[TrendingMovie]) {
        let payload = match serde_json::to_vec(trending) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!(err = ?err);
                return;
            }
        };
        if let Err(err) = self
            .set::<'_, _, _, ()>(TRENDING_CACHE_KEY, payload)
            .await
        {
            tracing::error!(err = ?err);
        }
    }
}

/// Trending movies from the cache when present, falling back to the store.
/// Only a successful store read is written back to the cache.
pub async fn cached_trending(
    store: &dyn TrendingStore,
    cache: Option<&mut dyn TrendingCache>,
    limit: i64,
) -> Vec<TrendingMovie> {
    let Some(cache) = cache else {
        return fetch_trending(store, limit).await;
    };
    if let Some(trending) = cache.load().await {
        return trending;
    }

    match store.top(limit).await {
        Ok(counts) => {
            let trending = counts
                .into_iter()
                .map(TrendingMovie::from)
                .collect::<Vec<_>>();
            cache.save(&trending).await;
            trending
        }
        Err(err) => {
            tracing::error!(err = ?err);
            Vec::new()
        }
    }
}

#[tracing::instrument(skip_all)]
pub async fn refresh_trending(store: SharedStore, mut cache: impl TrendingCache, limit: i64) {
    let mut interval = interval(REFRESH_PERIOD);
    loop {
        interval.tick().await;
        tracing::debug!("refreshing trending");
        match store.top(limit).await {
            Ok(counts) => {
                let trending = counts
                    .into_iter()
                    .map(TrendingMovie::from)
                    .collect::<Vec<_>>();
                cache.save(&trending).await;
            }
            Err(err) => {
                tracing::error!(err = ?err);
            }
        }
    }
}

#[derive(Debug)]
pub struct SearchHit {
    pub search_term: String,
    pub movie: Movie,
}

/// Hands successful searches to the background queue without waiting on the store.
#[derive(Clone)]
pub struct SearchRecorder {
    tx: mpsc::UnboundedSender<SearchHit>,
}

impl SearchRecorder {
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SearchHit>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queues the first match of a non-empty search. Returns whether a hit was queued.
    pub fn record(&self, search_term: &str, movies: &[Movie]) -> bool {
        let search_term = search_term.trim();
        if search_term.is_empty() {
            return false;
        }
        let Some(movie) = movies.first() else {
            return false;
        };

        let hit = SearchHit {
            search_term: search_term.to_string(),
            movie: movie.clone(),
        };
        if let Err(err) = self.tx.send(hit) {
            tracing::error!(err = ?err, "search queue closed");
            return false;
        }
        true
    }
}

#[tracing::instrument(skip_all)]
pub async fn search_queue(mut rx: mpsc::UnboundedReceiver<SearchHit>, store: SharedStore) {
    while let Some(hit) = rx.recv().await {
        record_search(store.as_ref(), &hit.search_term, &hit.movie).await;
    }
}
