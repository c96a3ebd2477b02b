/// Network transport behind the stream connector
///
/// The connector only needs "open a connection, give me its frames". Keeping
/// that behind a trait lets tests script connections and failures.
use crate::error::FeedError;
use async_trait::async_trait;
use futures::{future, stream::BoxStream, SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, Message},
};
use tracing::debug;

/// Transport level frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Close,
}

/// Frames of one open connection; the connection lives as long as the stream
pub type FrameStream = BoxStream<'static, Result<Frame, FeedError>>;

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open a connection and return its inbound frames
    async fn open(&self, url: &str) -> Result<FrameStream, FeedError>;
}

/// WebSocket transport with keepalive pings
#[derive(Debug, Clone)]
pub struct WsTransport {
    ping_interval: Duration,
}

impl WsTransport {
    pub fn new(ping_interval: Duration) -> Self {
        Self { ping_interval }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn open(&self, url: &str) -> Result<FrameStream, FeedError> {
        let (ws_stream, _) = connect_async(url).await.map_err(|error| FeedError::Connect {
            url: url.to_string(),
            reason: error.to_string(),
        })?;

        let (mut write, read) = ws_stream.split();

        // Ping task lives until the frame stream is dropped or a send fails
        let ping_interval = self.ping_interval;
        let (ping_shutdown_tx, mut ping_shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(ping_interval);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if write.send(Message::Ping(Vec::new().into())).await.is_err() {
                            debug!("Failed to send ping, connection likely dead");
                            break;
                        }
                    }
                    _ = &mut ping_shutdown_rx => {
                        debug!("Ping task shutting down");
                        let _ = write.close().await;
                        break;
                    }
                }
            }
        });

        let frames = read.filter_map(move |msg| {
            let _ping_shutdown = &ping_shutdown_tx;
            future::ready(frame_from_message(msg))
        });

        Ok(frames.boxed())
    }
}

/// Map a websocket message to a frame; control messages yield nothing
fn frame_from_message(msg: Result<Message, tungstenite::Error>) -> Option<Result<Frame, FeedError>> {
    match msg {
        Ok(Message::Text(text)) => Some(Ok(Frame::Text(text.as_str().to_owned()))),
        Ok(Message::Binary(bytes)) => Some(
            String::from_utf8(bytes.to_vec())
                .map(Frame::Text)
                .map_err(|error| FeedError::Malformed(format!("binary frame is not UTF-8: {error}"))),
        ),
        Ok(Message::Close(_)) => Some(Ok(Frame::Close)),
        // Heartbeat messages - tungstenite answers pings automatically
        Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => None,
        Err(error) => Some(Err(FeedError::Socket(error.to_string()))),
    }
}
