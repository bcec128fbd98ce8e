use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

pub const FETCH_FAILED_MESSAGE: &str = "Failed to fetch movies. Please try again later.";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("catalog responded with {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("invalid catalog url: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("expected {0} as an environment variable")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

pub enum AppError {
    Catalog(CatalogError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::Catalog(err) => {
                tracing::error!(err = ?err);
                (
                    StatusCode::BAD_GATEWAY,
                    Json(serde_json::json!({ "message": FETCH_FAILED_MESSAGE })),
                )
                    .into_response()
            }
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        Self::Catalog(err)
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
