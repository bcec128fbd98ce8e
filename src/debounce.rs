use std::time::Duration;

use tokio::{sync::mpsc, time::sleep};

/// Forwards a value from `input` only once no newer value has arrived for
/// `delay`. A value still waiting when `input` closes is dropped.
pub fn debounce<T: Send + 'static>(
    mut input: mpsc::Receiver<T>,
    delay: Duration,
) -> mpsc::Receiver<T> {
    let (tx, rx) = mpsc::channel(1);

    tokio::spawn(async move {
        while let Some(mut pending) = input.recv().await {
            loop {
                tokio::select! {
                    next = input.recv() => match next {
                        Some(value) => pending = value,
                        None => return,
                    },
                    () = sleep(delay) => {
                        if tx.send(pending).await.is_err() {
                            return;
                        }
                        break;
                    }
                }
            }
        }
    });

    rx
}
