use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const POSTER_BASE_URL: &str = "https://image.tmdb.org/t/p/w500";
pub const POSTER_PLACEHOLDER: &str = "/no-movie.png";
const NOT_AVAILABLE: &str = "N/A";

/// A film as returned by the catalog's search and discover endpoints.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Movie {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub vote_average: Option<f64>,
    #[serde(default)]
    pub original_language: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub adult: bool,
    #[serde(default)]
    pub popularity: Option<f64>,
    #[serde(default)]
    pub vote_count: Option<u32>,
}

impl Movie {
    /// Full poster URL, or `None` when the catalog has no poster for the movie.
    #[must_use]
    pub fn poster_url(&self) -> Option<String> {
        self.poster_path
            .as_deref()
            .filter(|path| !path.is_empty())
            .map(|path| format!("{POSTER_BASE_URL}{path}"))
    }
}

#[derive(Debug, Deserialize)]
pub struct MovieList {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub results: Vec<Movie>,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_results: u32,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct MovieCard {
    pub id: i64,
    pub title: String,
    pub poster_url: String,
    pub rating: String,
    pub language: String,
    pub year: String,
}

impl From<&Movie> for MovieCard {
    fn from(movie: &Movie) -> Self {
        let rating = match movie.vote_average {
            Some(vote) if vote.abs() > f64::EPSILON => format!("{vote:.1}"),
            _ => NOT_AVAILABLE.to_string(),
        };
        let year = movie
            .release_date
            .as_deref()
            .and_then(|date| date.split('-').next())
            .filter(|year| !year.is_empty())
            .unwrap_or(NOT_AVAILABLE);

        Self {
            id: movie.id,
            title: movie.title.clone(),
            poster_url: movie
                .poster_url()
                .unwrap_or_else(|| POSTER_PLACEHOLDER.to_string()),
            rating,
            language: movie
                .original_language
                .clone()
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            year: year.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub movies: Vec<MovieCard>,
}

/// Counter document kept per distinct search term.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SearchCount {
    #[allow(clippy::used_underscore_binding)]
    pub _id: String,
    pub search_term: String,
    pub count: i64,
    pub movie_id: i64,
    pub poster_url: String,
    pub title: String,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct TrendingMovie {
    pub id: String,
    pub count: i64,
    pub poster_url: String,
    pub search_term: String,
    pub title: String,
}

impl From<SearchCount> for TrendingMovie {
    fn from(doc: SearchCount) -> Self {
        Self {
            id: doc._id,
            count: doc.count,
            poster_url: doc.poster_url,
            search_term: doc.search_term,
            title: doc.title,
        }
    }
}
