use axum::extract::ws::Message;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::{
    sync::mpsc,
    task::{JoinError, JoinHandle},
};

use crate::{
    debounce::debounce,
    error::{CatalogError, FETCH_FAILED_MESSAGE},
    models::SearchResponse,
    state::AppState,
};

type PendingSearch = JoinHandle<Result<SearchResponse, CatalogError>>;

/// Bridges a WebSocket to a search session. Each text frame is the current
/// value of the search box.
#[tracing::instrument(skip_all)]
pub async fn live_search<S>(mut socket: S, state: AppState)
where
    S: Stream<Item = Result<Message, axum::Error>> + Sink<Message> + Unpin,
{
    let (keystrokes, keystroke_rx) = mpsc::channel(16);
    let (reply_tx, mut replies) = mpsc::channel(4);
    let session = tokio::spawn(run_session(keystroke_rx, reply_tx, state));

    loop {
        tokio::select! {
            message = socket.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    if keystrokes.send(text.as_str().to_owned()).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    tracing::debug!(err = ?err);
                    break;
                }
            },
            Some(reply) = replies.recv() => {
                if socket.send(Message::Text(reply.into())).await.is_err() {
                    break;
                }
            }
        }
    }

    drop(keystrokes);
    drop(replies);
    if let Err(err) = session.await {
        tracing::error!(err = ?err);
    }
}

/// Debounces keystrokes into searches and sends one JSON reply per completed
/// search. A newer query aborts the search still in flight, so replies never
/// arrive out of order.
pub async fn run_session(
    keystrokes: mpsc::Receiver<String>,
    replies: mpsc::Sender<String>,
    state: AppState,
) {
    let mut queries = debounce(keystrokes, state.debounce);
    let mut in_flight: Option<PendingSearch> = None;

    loop {
        tokio::select! {
            query = queries.recv() => {
                let Some(query) = query else {
                    break;
                };
                if let Some(stale) = in_flight.take() {
                    stale.abort();
                }
                let state = state.clone();
                in_flight = Some(tokio::spawn(async move { state.search(&query).await }));
            }
            joined = join(&mut in_flight), if in_flight.is_some() => {
                in_flight = None;
                let Some(reply) = reply_text(joined) else {
                    continue;
                };
                if replies.send(reply).await.is_err() {
                    break;
                }
            }
        }
    }

    if let Some(search) = in_flight {
        search.abort();
    }
}

async fn join(
    search: &mut Option<PendingSearch>,
) -> Result<Result<SearchResponse, CatalogError>, JoinError> {
    match search {
        Some(search) => search.await,
        None => std::future::pending().await,
    }
}

fn reply_text(joined: Result<Result<SearchResponse, CatalogError>, JoinError>) -> Option<String> {
    let encoded = match joined {
        Ok(Ok(response)) => serde_json::to_string(&response),
        Ok(Err(err)) => {
            tracing::error!(err = ?err);
            serde_json::to_string(&serde_json::json!({ "error": FETCH_FAILED_MESSAGE }))
        }
        Err(err) => {
            tracing::error!(err = ?err);
            return None;
        }
    };

    encoded.map_err(|err| tracing::error!(err = ?err)).ok()
}

#[cfg(test)]
mod tests {
    use std::{
        pin::Pin,
        sync::Arc,
        task::{Context, Poll},
        time::Duration,
    };

    use serde_json::Value;

    use super::*;
    use crate::{
        catalog::{
            MovieCatalog,
            testing::{FailingCatalog, FakeCatalog},
        },
        trending::{SearchRecorder, testing::MemoryStore},
    };

    /// Client end of a socket: frames sent by the test arrive in `incoming`,
    /// frames written by the server land in `outgoing`.
    struct ChannelSocket {
        incoming: mpsc::UnboundedReceiver<Result<Message, axum::Error>>,
        outgoing: mpsc::UnboundedSender<Message>,
    }

    impl Stream for ChannelSocket {
        type Item = Result<Message, axum::Error>;

        fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
            self.incoming.poll_recv(cx)
        }
    }

    impl Sink<Message> for ChannelSocket {
        type Error = mpsc::error::SendError<Message>;

        fn poll_ready(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn start_send(self: Pin<&mut Self>, item: Message) -> Result<(), Self::Error> {
            self.outgoing.send(item)
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn poll_close(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }
    }

    fn socket() -> (
        ChannelSocket,
        mpsc::UnboundedSender<Result<Message, axum::Error>>,
        mpsc::UnboundedReceiver<Message>,
    ) {
        let (client_tx, incoming) = mpsc::unbounded_channel();
        let (outgoing, client_rx) = mpsc::unbounded_channel();

        (ChannelSocket { incoming, outgoing }, client_tx, client_rx)
    }

    fn text(message: Message) -> String {
        match message {
            Message::Text(text) => text.as_str().to_owned(),
            other => panic!("expected a text frame, got {other:?}"),
        }
    }

    fn state(catalog: Arc<dyn MovieCatalog>) -> AppState {
        let (recorder, _hits) = SearchRecorder::new();
        AppState {
            catalog,
            store: Arc::new(MemoryStore::default()),
            recorder,
            debounce: Duration::from_millis(500),
            trending_limit: 5,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn typing_burst_searches_once() {
        let catalog = Arc::new(FakeCatalog::default());
        let (keystrokes, keystroke_rx) = mpsc::channel(16);
        let (reply_tx, mut replies) = mpsc::channel(4);
        tokio::spawn(run_session(keystroke_rx, reply_tx, state(catalog.clone())));

        for text in ["m", "ma", "mat"] {
            keystrokes.send(text.to_string()).await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let reply = serde_json::from_str::<SearchResponse>(&replies.recv().await.unwrap()).unwrap();
        assert_eq!(reply.query, "mat");
        assert_eq!(reply.movies[0].rating, "N/A");
        assert_eq!(catalog.queries(), ["mat"]);
    }

    #[tokio::test(start_paused = true)]
    async fn newer_query_supersedes_slow_search() {
        let catalog = Arc::new(FakeCatalog::default());
        let (keystrokes, keystroke_rx) = mpsc::channel(16);
        let (reply_tx, mut replies) = mpsc::channel(4);
        tokio::spawn(run_session(keystroke_rx, reply_tx, state(catalog.clone())));

        keystrokes.send("slow query".to_string()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;
        keystrokes.send("fast".to_string()).await.unwrap();

        let reply = serde_json::from_str::<SearchResponse>(&replies.recv().await.unwrap()).unwrap();
        assert_eq!(reply.query, "fast");

        drop(keystrokes);
        assert_eq!(replies.recv().await, None);
        assert_eq!(catalog.queries(), ["slow query", "fast"]);
    }

    #[tokio::test(start_paused = true)]
    async fn catalog_failure_replies_with_error() {
        let (keystrokes, keystroke_rx) = mpsc::channel(16);
        let (reply_tx, mut replies) = mpsc::channel(4);
        tokio::spawn(run_session(keystroke_rx, reply_tx, state(Arc::new(FailingCatalog))));

        keystrokes.send("anything".to_string()).await.unwrap();

        let reply = serde_json::from_str::<Value>(&replies.recv().await.unwrap()).unwrap();
        assert_eq!(reply["error"], FETCH_FAILED_MESSAGE);
    }

    #[tokio::test(start_paused = true)]
    async fn socket_text_frames_get_json_replies() {
        let catalog = Arc::new(FakeCatalog::default());
        let (server_side, client, mut frames) = socket();
        let bridge = tokio::spawn(live_search(server_side, state(catalog.clone())));

        client.send(Ok(Message::Binary(vec![1, 2, 3].into()))).unwrap();
        client.send(Ok(Message::Text("du".into()))).unwrap();
        client.send(Ok(Message::Text("dune".into()))).unwrap();

        let reply = serde_json::from_str::<SearchResponse>(&text(frames.recv().await.unwrap()))
            .unwrap();
        assert_eq!(reply.query, "dune");
        assert_eq!(reply.movies[0].title, "dune");
        assert_eq!(catalog.queries(), ["dune"]);

        client.send(Ok(Message::Close(None))).unwrap();
        bridge.await.unwrap();
        assert!(frames.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn socket_disconnect_ends_session() {
        let catalog = Arc::new(FakeCatalog::default());
        let (server_side, client, mut frames) = socket();
        let bridge = tokio::spawn(live_search(server_side, state(catalog.clone())));

        client.send(Ok(Message::Text("slow start".into()))).unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;
        drop(client);

        bridge.await.unwrap();
        assert!(frames.recv().await.is_none());
        assert_eq!(catalog.queries(), ["slow start"]);
    }
}
