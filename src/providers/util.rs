use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Runs `operation` once, then up to `retries` more times while it fails with
/// a transport error. The delay starts at `delay_ms` and doubles per attempt.
///
/// Responses with an error status are successes here; callers inspect them.
pub async fn with_retry<F, Fut, T>(
    mut operation: F,
    retries: usize,
    delay_ms: u64,
) -> Result<T, reqwest::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, reqwest::Error>>,
{
    let mut attempt = 1;
    let mut delay = Duration::from_millis(delay_ms);
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(err) => {
                if attempt > retries {
                    return Err(err);
                }
                debug!(
                    "Attempt {}/{} failed: {}. Retrying in {:?}",
                    attempt,
                    retries + 1,
                    err,
                    delay
                );
                attempt += 1;
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test_log::test(tokio::test)]
    async fn test_transport_errors_are_retried() {
        let attempts = AtomicUsize::new(0);
        let client = reqwest::Client::new();

        let result = with_retry(
            || {
                attempts.fetch_add(1, Ordering::SeqCst);
                client.get("http://127.0.0.1:1/unreachable").send()
            },
            2,
            1,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test_log::test(tokio::test)]
    async fn test_error_status_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;
        let client = reqwest::Client::new();

        let response = with_retry(|| client.get(server.uri()).send(), 3, 1)
            .await
            .unwrap();
        assert_eq!(response.status(), 503);
    }
}
