#![deny(clippy::all, clippy::pedantic)]

mod catalog;
mod config;
mod database;
mod debounce;
mod error;
mod live;
mod models;
mod state;
mod trending;

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Query, WebSocketUpgrade},
    response::Response,
    routing::get,
};
use catalog::TmdbClient;
use config::Config;
use database::Database;
use error::{AppError, StartupError};
use models::{SearchResponse, TrendingMovie};
use redis::{Client as RedisClient, aio::MultiplexedConnection as RedisConnection};
use serde::Deserialize;
use state::AppState;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use trending::{
    SearchRecorder, SharedStore, TrendingCache, cached_trending, refresh_trending, search_queue,
};

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    pub query: String,
}

async fn search_route(
    state: Extension<AppState>,
    params: Query<SearchParams>,
) -> Result<Json<SearchResponse>, AppError> {
    let response = state.search(&params.query).await?;

    Ok(Json(response))
}

async fn trending_route(
    state: Extension<AppState>,
    mut redis: Extension<Option<RedisConnection>>,
) -> Json<Vec<TrendingMovie>> {
    let cache = redis.0.as_mut().map(|conn| conn as &mut dyn TrendingCache);
    let trending = cached_trending(state.store.as_ref(), cache, state.trending_limit).await;

    Json(trending)
}

async fn live_search_route(ws: WebSocketUpgrade, state: Extension<AppState>) -> Response {
    let state = state.0;
    ws.on_upgrade(move |socket| live::live_search(socket, state))
}

pub fn router(state: AppState, redis: Option<RedisConnection>) -> Router {
    Router::new()
        .route("/movies", get(search_route))
        .route("/movies/live", get(live_search_route))
        .route("/trending", get(trending_route))
        .layer(Extension(state))
        .layer(Extension(redis))
        .layer(TraceLayer::new_for_http())
}

/// Connects the database, catalog and cache, and starts the background tasks.
///
/// # Errors
///
/// Fails when the database or the configured Redis server cannot be reached.
pub async fn setup(config: &Config) -> Result<Router, StartupError> {
    let database = Database::new(
        &config.mongodb_url,
        &config.mongodb_database,
        &config.mongodb_collection,
    )
    .await?;
    let store: SharedStore = Arc::new(database);

    let redis = match &config.redis_url {
        Some(url) => {
            let client = RedisClient::open(url.as_str())?;
            Some(client.get_multiplexed_async_connection().await?)
        }
        None => {
            tracing::info!("REDIS_URL not set, trending cache disabled");
            None
        }
    };

    let (recorder, hits) = SearchRecorder::new();
    let state = AppState {
        catalog: Arc::new(TmdbClient::new(
            config.tmdb_base_url.clone(),
            config.tmdb_api_key.clone(),
        )),
        store: store.clone(),
        recorder,
        debounce: config.debounce,
        trending_limit: config.trending_limit,
    };

    tokio::spawn(search_queue(hits, store.clone()));
    if let Some(connection) = redis.clone() {
        tokio::spawn(refresh_trending(store, connection, config.trending_limit));
    }

    Ok(router(state, redis))
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    let app = setup(&config).await?;

    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, "listening");

    axum::serve(listener, app).await?;

    Ok(())
}
