use crate::feed::parser::{parse_feed, FetchedFeed, ParseError};
use futures::StreamExt;
use reqwest::redirect::Policy;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB
const MAX_REDIRECTS: usize = 3;

// ============================================================================
// Error Types
// ============================================================================

/// Failures below HTTP semantics: building the request, moving bytes.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request could not be built (invalid URL, bad header)
    #[error("Invalid request: {0}")]
    Request(#[source] reqwest::Error),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[source] reqwest::Error),
    /// Body stream broke off mid-read
    #[error("Failed to read response body: {0}")]
    Body(#[source] reqwest::Error),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    TooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    Incomplete { expected: u64, received: usize },
}

/// Errors that can occur while fetching and decoding one feed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Anything other than `200 OK`
    #[error("HTTP error: status {0}")]
    Status(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// The caller's cancellation token fired first
    #[error("Request cancelled")]
    Cancelled,
    /// Body was not a usable RSS document
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

// ============================================================================
// Transport
// ============================================================================

/// Status and fully read body of one GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// The HTTP seam used by [`fetch_feed`].
///
/// Implemented for [`reqwest::Client`]; tests can supply canned responses.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn get(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<TransportResponse, TransportError>;
}

impl Transport for reqwest::Client {
    async fn get(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<TransportResponse, TransportError> {
        let mut builder = reqwest::Client::get(self, url);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder.build().map_err(TransportError::Request)?;

        let response = self
            .execute(request)
            .await
            .map_err(TransportError::Network)?;
        let status = response.status().as_u16();

        // Error pages are never parsed, so don't spend bandwidth on them
        let body = if response.status().is_success() {
            read_limited_bytes(response, MAX_FEED_SIZE).await?
        } else {
            Vec::new()
        };

        Ok(TransportResponse { status, body })
    }
}

/// Build the shared HTTP client.
///
/// Redirects are capped at 3 hops and loops are rejected. The per-request
/// timeout is applied by [`fetch_feed`], not here.
pub fn build_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .redirect(redirect_policy())
        .pool_max_idle_per_host(2)
        .pool_idle_timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
}

fn redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("Too many redirects (max 3)");
        }

        let url = attempt.url();
        if attempt.previous().iter().any(|prev| prev.as_str() == url.as_str()) {
            return attempt.error("Redirect loop detected");
        }

        tracing::debug!(
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );
        attempt.follow()
    })
}

/// Read a response body, refusing anything over `limit` bytes.
async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, TransportError> {
    let expected_length = response.content_length();

    // Fast path: trust an oversized Content-Length without reading
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(TransportError::TooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(TransportError::Body)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(TransportError::TooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(TransportError::Incomplete {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}

// ============================================================================
// Fetching
// ============================================================================

/// Per-request knobs, normally derived from `Config`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            user_agent: "gator".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Download and decode the RSS document at `url`.
///
/// One attempt, no retries. Titles and descriptions come back with HTML
/// entities decoded; links and dates are only trimmed.
pub async fn fetch_feed<T: Transport>(
    transport: &T,
    url: &str,
    options: &FetchOptions,
    cancel: &CancellationToken,
) -> Result<FetchedFeed, FetchError> {
    let headers = [("User-Agent", options.user_agent.as_str())];

    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(FetchError::Cancelled),
        result = tokio::time::timeout(options.timeout, transport.get(url, &headers)) => {
            result.map_err(|_| FetchError::Timeout)??
        }
    };

    if response.status != 200 {
        return Err(FetchError::Status(response.status));
    }

    let mut feed = parse_feed(&response.body)?;
    feed.unescape_html();

    tracing::debug!(
        url = %url,
        bytes = response.body.len(),
        items = feed.items.len(),
        "Fetched feed"
    );

    Ok(feed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALID_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>Ben &amp;amp; Jerry's</title>
    <link>https://example.com</link>
    <description>Ice &lt;b&gt;cream&lt;/b&gt;</description>
    <item>
        <title>Fish &amp;amp; Chips</title>
        <link>https://example.com/fish?a=1&amp;b=2</link>
        <description>&lt;p&gt;Crispy&lt;/p&gt;</description>
        <pubDate>Mon, 02 Jan 2006 15:04:05 -0700</pubDate>
    </item>
</channel></rss>"#;

    fn client() -> reqwest::Client {
        build_client().unwrap()
    }

    #[tokio::test]
    async fn test_fetch_success_unescapes_html() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_RSS))
            .mount(&server)
            .await;

        let url = format!("{}/feed.xml", server.uri());
        let feed = fetch_feed(
            &client(),
            &url,
            &FetchOptions::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(feed.title, "Ben & Jerry's");
        assert_eq!(feed.description, "Ice <b>cream</b>");
        assert_eq!(feed.items.len(), 1);
        let item = &feed.items[0];
        assert_eq!(item.title, "Fish & Chips");
        assert_eq!(item.description, "<p>Crispy</p>");
        // Links get XML decoding only
        assert_eq!(item.link, "https://example.com/fish?a=1&b=2");
        assert_eq!(item.pub_date, "Mon, 02 Jan 2006 15:04:05 -0700");
    }

    #[tokio::test]
    async fn test_fetch_sends_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("User-Agent", "gator"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_RSS))
            .expect(1)
            .mount(&server)
            .await;

        let result = fetch_feed(
            &client(),
            &server.uri(),
            &FetchOptions::default(),
            &CancellationToken::new(),
        )
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_fetch_404_is_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = fetch_feed(
            &client(),
            &server.uri(),
            &FetchOptions::default(),
            &CancellationToken::new(),
        )
        .await;
        assert!(matches!(result, Err(FetchError::Status(404))));
    }

    #[tokio::test]
    async fn test_fetch_non_200_success_is_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let result = fetch_feed(
            &client(),
            &server.uri(),
            &FetchOptions::default(),
            &CancellationToken::new(),
        )
        .await;
        assert!(matches!(result, Err(FetchError::Status(204))));
    }

    #[tokio::test]
    async fn test_fetch_malformed_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<rss><channel><item>"))
            .mount(&server)
            .await;

        let result = fetch_feed(
            &client(),
            &server.uri(),
            &FetchOptions::default(),
            &CancellationToken::new(),
        )
        .await;
        assert!(matches!(result, Err(FetchError::Parse(_))));
    }

    #[tokio::test]
    async fn test_fetch_zero_items() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<rss version=\"2.0\"><channel><title>Quiet</title></channel></rss>",
            ))
            .mount(&server)
            .await;

        let feed = fetch_feed(
            &client(),
            &server.uri(),
            &FetchOptions::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(feed.title, "Quiet");
        assert!(feed.items.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_invalid_url() {
        let result = fetch_feed(
            &client(),
            "not a url",
            &FetchOptions::default(),
            &CancellationToken::new(),
        )
        .await;
        assert!(matches!(
            result,
            Err(FetchError::Transport(TransportError::Request(_)))
        ));
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let options = FetchOptions {
            timeout: Duration::from_millis(100),
            ..FetchOptions::default()
        };
        let result = fetch_feed(&client(), &server.uri(), &options, &CancellationToken::new()).await;
        assert!(matches!(result, Err(FetchError::Timeout)));
    }

    #[tokio::test]
    async fn test_fetch_cancelled() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let result = fetch_feed(&client(), &server.uri(), &FetchOptions::default(), &cancel).await;
        assert!(matches!(result, Err(FetchError::Cancelled)));
    }

    #[tokio::test]
    async fn test_fetch_too_large() {
        let server = MockServer::start().await;
        let body = vec![b' '; MAX_FEED_SIZE + 1];
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(&server)
            .await;

        let result = fetch_feed(
            &client(),
            &server.uri(),
            &FetchOptions::default(),
            &CancellationToken::new(),
        )
        .await;
        assert!(matches!(
            result,
            Err(FetchError::Transport(TransportError::TooLarge))
        ));
    }

    #[tokio::test]
    async fn test_fetch_with_canned_transport() {
        struct Canned(u16, &'static str);

        impl Transport for Canned {
            async fn get(
                &self,
                _url: &str,
                headers: &[(&str, &str)],
            ) -> Result<TransportResponse, TransportError> {
                assert_eq!(headers, &[("User-Agent", "custom-agent")]);
                Ok(TransportResponse {
                    status: self.0,
                    body: self.1.as_bytes().to_vec(),
                })
            }
        }

        let options = FetchOptions {
            user_agent: "custom-agent".to_string(),
            ..FetchOptions::default()
        };
        let feed = fetch_feed(
            &Canned(200, VALID_RSS),
            "https://example.com/rss",
            &options,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(feed.items.len(), 1);
    }
}
