use std::future::Future;
use tokio::select;
use tokio_util::sync::CancellationToken;

/// Drives `future` until it completes or `token` is cancelled, whichever
/// happens first. Returns `None` on cancellation, the future is dropped.
pub async fn cancellable<F: Future>(token: &CancellationToken, future: F) -> Option<F::Output> {
    select! {
        biased;
        _ = token.cancelled() => None,
        output = future => Some(output),
    }
}

#[cfg(test)]
mod test {
    use super::cancellable;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn completes() {
        let token = CancellationToken::new();
        assert_eq!(cancellable(&token, async { 7 }).await, Some(7));
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(cancellable(&token, async { 7 }).await, None);
    }

    #[tokio::test]
    async fn cancelled_while_pending() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });
        let pending = std::future::pending::<u32>();
        assert_eq!(cancellable(&token, pending).await, None);
    }
}
