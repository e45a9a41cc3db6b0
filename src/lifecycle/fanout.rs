use crate::error::ResourceError;
use futures::stream::{self, StreamExt};
use std::future::Future;

/// Runs `task` for every item on its own tokio task, at most `parallelism` at
/// a time, and collects the outcome per key in completion order.
///
/// A panicking task is reported as [`ResourceError::Panicked`] for its key and
/// does not affect the others.
pub(crate) async fn fan_out<K, T, F, Fut>(
    items: Vec<(K, T)>,
    parallelism: usize,
    task: F,
) -> Vec<(K, Result<Fut::Output, ResourceError>)>
where
    F: Fn(T) -> Fut,
    Fut: Future + Send + 'static,
    Fut::Output: Send + 'static,
{
    stream::iter(items)
        .map(|(key, item)| {
            let handle = tokio::spawn(task(item));
            async move {
                let outcome = handle
                    .await
                    .map_err(|e| ResourceError::Panicked(e.to_string()));
                (key, outcome)
            }
        })
        .buffer_unordered(parallelism.max(1))
        .collect()
        .await
}
