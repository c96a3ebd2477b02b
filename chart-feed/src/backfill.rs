/// Historical candle backfill over REST
///
/// Fills the chart before the live stream has produced enough candles for
/// indicators to warm up. The endpoint takes `symbol`, `interval` and `limit`
/// as query parameters and answers with a JSON array of candles.
use crate::error::FeedError;
use crate::types::Candle;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackfillRequest {
    pub symbol: String,
    /// Candle width, e.g. `1m` or `5m`
    pub interval: String,
    pub limit: usize,
}

impl BackfillRequest {
    pub fn new(symbol: impl Into<String>, interval_secs: i64, limit: usize) -> Self {
        Self {
            symbol: symbol.into(),
            interval: interval_label(interval_secs),
            limit,
        }
    }
}

/// Exchange style interval label for a bucket width in seconds
pub fn interval_label(interval_secs: i64) -> String {
    match interval_secs {
        secs if secs > 0 && secs % 86_400 == 0 => format!("{}d", secs / 86_400),
        secs if secs > 0 && secs % 3_600 == 0 => format!("{}h", secs / 3_600),
        secs if secs > 0 && secs % 60 == 0 => format!("{}m", secs / 60),
        secs => format!("{secs}s"),
    }
}

#[derive(Debug, Clone)]
pub struct BackfillClient {
    client: reqwest::Client,
    base_url: url::Url,
}

impl BackfillClient {
    pub fn new(base_url: &str) -> Result<Self, FeedError> {
        let base_url = url::Url::parse(base_url)
            .map_err(|error| FeedError::Backfill(format!("invalid url {base_url}: {error}")))?;
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: url::Url) -> Self {
        Self { client, base_url }
    }

    pub fn build_request(&self, request: &BackfillRequest) -> Result<reqwest::Request, FeedError> {
        Ok(self
            .client
            .get(self.base_url.clone())
            .query(request)
            .build()?)
    }

    /// Fetch historical candles; order and duplicates are left to the store
    pub async fn fetch(&self, request: &BackfillRequest) -> Result<Vec<Candle>, FeedError> {
        let http_request = self.build_request(request)?;
        debug!(url = %http_request.url(), "Requesting candle backfill");

        let response = self.client.execute(http_request).await?;
        if !response.status().is_success() {
            return Err(FeedError::Backfill(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let candles: Vec<Candle> = response.json().await?;
        debug!(count = candles.len(), symbol = %request.symbol, "Received candle backfill");
        Ok(candles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response and hand back the request head
    async fn serve_once(status: &str, body: &str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&head).into_owned()
        });

        (format!("http://{addr}/api/candles"), server)
    }

    fn local_client(url: &str) -> BackfillClient {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        BackfillClient::with_client(client, url::Url::parse(url).unwrap())
    }

    #[test]
    fn test_interval_label() {
        assert_eq!(interval_label(60), "1m");
        assert_eq!(interval_label(300), "5m");
        assert_eq!(interval_label(3_600), "1h");
        assert_eq!(interval_label(86_400), "1d");
        assert_eq!(interval_label(45), "45s");
    }

    #[test]
    fn test_build_request_query() {
        let client = BackfillClient::new("https://api.example.com/v1/candles").unwrap();
        let request = client
            .build_request(&BackfillRequest::new("BTCUSDT", 300, 500))
            .unwrap();

        assert_eq!(
            request.url().as_str(),
            "https://api.example.com/v1/candles?symbol=BTCUSDT&interval=5m&limit=500"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            BackfillClient::new("not a url"),
            Err(FeedError::Backfill(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_candles() {
        let body = r#"[{"time":120,"open":2.0,"high":3.0,"low":1.5,"close":2.5},{"time":60,"open":1.0,"high":2.0,"low":0.5,"close":1.5}]"#;
        let (url, server) = serve_once("200 OK", body).await;

        let client = local_client(&url);
        let candles = client
            .fetch(&BackfillRequest::new("ETHUSDT", 60, 2))
            .await
            .unwrap();

        assert_eq!(
            candles,
            vec![
                Candle::new(120, 2.0, 3.0, 1.5, 2.5),
                Candle::new(60, 1.0, 2.0, 0.5, 1.5),
            ]
        );

        let head = server.await.unwrap();
        assert!(head.starts_with("GET /api/candles?symbol=ETHUSDT&interval=1m&limit=2 "));
    }

    #[tokio::test]
    async fn test_fetch_error_status() {
        let (url, _server) = serve_once("503 Service Unavailable", "{}").await;

        let client = local_client(&url);
        let result = client.fetch(&BackfillRequest::new("ETHUSDT", 60, 2)).await;

        assert!(matches!(result, Err(FeedError::Backfill(reason)) if reason.contains("503")));
    }

    #[tokio::test]
    async fn test_fetch_undecodable_body() {
        let (url, _server) = serve_once("200 OK", r#"{"error":"nope"}"#).await;

        let client = local_client(&url);
        let result = client.fetch(&BackfillRequest::new("ETHUSDT", 60, 2)).await;

        assert!(matches!(result, Err(FeedError::Backfill(_))));
    }
}
