use async_trait::async_trait;
use bson::{Bson, Document, doc};
use futures_util::TryStreamExt;
use mongodb::{
    Client, Collection,
    options::{ClientOptions, ServerApi, ServerApiVersion},
};
use uuid::Uuid;

use crate::{
    error::StoreError,
    models::{Movie, POSTER_PLACEHOLDER, SearchCount},
    trending::{TrendingStore, UpsertOutcome},
};

#[derive(Clone)]
pub struct Database {
    counts: Collection<SearchCount>,
}

impl Database {
    pub async fn new(
        connection_string: &str,
        database: &str,
        collection: &str,
    ) -> Result<Self, StoreError> {
        let mut client_options = ClientOptions::parse(connection_string).await?;
        let server_api = ServerApi::builder().version(ServerApiVersion::V1).build();
        client_options.server_api = Some(server_api);

        let client = Client::with_options(client_options)?;
        let counts = client.database(database).collection::<SearchCount>(collection);

        Ok(Self { counts })
    }
}

#[async_trait]
impl TrendingStore for Database {
    async fn record(&self, search_term: &str, movie: &Movie) -> Result<UpsertOutcome, StoreError> {
        let (filter, update) = record_update(search_term, movie);
        let result = self.counts.update_one(filter, update).upsert(true).await?;

        Ok(upsert_outcome(result.upserted_id.as_ref()))
    }

    async fn top(&self, limit: i64) -> Result<Vec<SearchCount>, StoreError> {
        let cursor = self
            .counts
            .find(doc! {})
            .sort(top_sort())
            .limit(limit)
            .await?;

        Ok(cursor.try_collect().await?)
    }
}

/// Filter and update for one more search of `search_term`. Run as an upsert,
/// the first search inserts `{ _id, search_term, count: 1, .. }` and later
/// searches bump `count` and replace the latest match.
#[must_use]
pub fn record_update(search_term: &str, movie: &Movie) -> (Document, Document) {
    let filter = doc! { "_id": search_term_id(search_term) };
    let update = doc! {
        "$inc": { "count": 1_i64 },
        "$set": {
            "movie_id": movie.id,
            "poster_url": movie
                .poster_url()
                .unwrap_or_else(|| POSTER_PLACEHOLDER.to_string()),
            "title": movie.title.as_str(),
            "updated_at": bson::DateTime::now(),
        },
        "$setOnInsert": { "search_term": search_term },
    };

    (filter, update)
}

fn upsert_outcome(upserted_id: Option<&Bson>) -> UpsertOutcome {
    if upserted_id.is_some() {
        UpsertOutcome::Created
    } else {
        UpsertOutcome::Incremented
    }
}

fn top_sort() -> Document {
    doc! { "count": -1 }
}

/// Document id for a search term. The same term always maps to the same id,
/// so concurrent first searches collapse into a single document.
#[must_use]
pub fn search_term_id(search_term: &str) -> String {
    let id = Uuid::new_v5(&Uuid::NAMESPACE_OID, search_term.as_bytes());
    base62::encode(id.as_u128())
}
