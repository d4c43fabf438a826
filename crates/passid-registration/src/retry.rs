//! Backoff for relayer and RPC HTTP calls, by request kind.
//!
//! A [`RequestKind::Read`] (`eth_call`, `eth_getTransactionReceipt`) is
//! idempotent and is resent on any transport failure. A
//! [`RequestKind::Write`] hands a transaction to the relayer: it is resent
//! only when the connection was never established, since after that the
//! relayer may already have broadcast it. A timed-out write is returned to
//! the caller, which settles the outcome by reading the chain.
//!
//! Non-2xx answers and malformed bodies are never retried here.

use std::time::Duration;

/// Maximum number of retry attempts after the initial request.
const MAX_RETRIES: u32 = 3;

/// Base delay between retries (doubles each attempt: 200ms, 400ms, 800ms).
const BASE_DELAY_MS: u64 = 200;

/// Whether a request changes remote state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RequestKind {
    Read,
    Write,
}

/// How a transport failure relates to what the server may have seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Failure {
    /// No connection; the request was not sent.
    Connect,
    /// Sent, but no complete answer before the client deadline.
    Timeout,
    /// Anything else after the connection was up.
    Other,
}

impl Failure {
    pub(crate) fn classify(err: &reqwest::Error) -> Self {
        // A connect timeout is both; nothing was sent, so it counts as connect.
        if err.is_connect() {
            Self::Connect
        } else if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Other
        }
    }
}

impl RequestKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }

    fn retries(self, failure: Failure) -> bool {
        match self {
            Self::Read => true,
            Self::Write => failure == Failure::Connect,
        }
    }
}

/// Send an HTTP request, retrying transport failures the `kind` allows.
///
/// The closure `f` is called at most `MAX_RETRIES + 1` times. The caller
/// inspects the response status.
pub(crate) async fn send_with_retry<F, Fut>(
    kind: RequestKind,
    endpoint: &str,
    f: F,
) -> Result<reqwest::Response, reqwest::Error>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(resp) => return Ok(resp),
            Err(e) => {
                let failure = Failure::classify(&e);
                if attempt >= MAX_RETRIES || !kind.retries(failure) {
                    return Err(e);
                }
                let delay = Duration::from_millis(BASE_DELAY_MS * 2u64.pow(attempt));
                attempt += 1;
                tracing::warn!(
                    endpoint,
                    kind = kind.as_str(),
                    failure = ?failure,
                    attempt,
                    max_retries = MAX_RETRIES,
                    "HTTP request failed, retrying in {delay:?}: {e}"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn send_to_closed_port(kind: RequestKind) -> (Result<reqwest::Response, reqwest::Error>, u32) {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = call_count.clone();
        let result = send_with_retry(kind, "http://127.0.0.1:1/", || {
            let cc = cc.clone();
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                // Closed port: connection refused.
                reqwest::Client::builder()
                    .timeout(Duration::from_millis(50))
                    .build()
                    .unwrap()
                    .post("http://127.0.0.1:1/")
                    .send()
                    .await
            }
        })
        .await;
        (result, call_count.load(Ordering::SeqCst))
    }

    async fn slow_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(300)))
            .mount(&server)
            .await;
        server
    }

    fn short_timeout_client() -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn read_exhausts_all_attempts_on_connect_failure() {
        let (result, calls) = send_to_closed_port(RequestKind::Read).await;
        let err = result.unwrap_err();
        assert_eq!(Failure::classify(&err), Failure::Connect);
        assert_eq!(calls, MAX_RETRIES + 1);
    }

    #[tokio::test]
    async fn write_is_resent_when_connection_never_opened() {
        let (result, calls) = send_to_closed_port(RequestKind::Write).await;
        assert!(result.is_err());
        assert_eq!(calls, MAX_RETRIES + 1);
    }

    #[tokio::test]
    async fn write_is_sent_once_when_answer_times_out() {
        let server = slow_server().await;
        let client = short_timeout_client();
        let url = server.uri();

        let err = send_with_retry(RequestKind::Write, &url, || client.post(&url).send())
            .await
            .unwrap_err();

        assert_eq!(Failure::classify(&err), Failure::Timeout);
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn read_is_resent_when_answer_times_out() {
        let server = slow_server().await;
        let client = short_timeout_client();
        let url = server.uri();

        let err = send_with_retry(RequestKind::Read, &url, || client.post(&url).send())
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(
            server.received_requests().await.unwrap().len(),
            (MAX_RETRIES + 1) as usize
        );
    }

    #[tokio::test]
    async fn first_answer_is_returned_whatever_its_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let url = server.uri();
        let client = reqwest::Client::new();
        let resp = send_with_retry(RequestKind::Write, &url, || client.get(&url).send())
            .await
            .unwrap();
        // Status codes are the caller's concern.
        assert_eq!(resp.status().as_u16(), 503);
    }
}
