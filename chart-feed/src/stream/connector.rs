/// Reconnecting stream connector
///
/// Owns one duplex connection to a market data endpoint, parses every inbound
/// frame into a [`StreamMessage`] and hands it to the subscriber. Drops are
/// retried after the configured delay until the [`ConnectionHandle`] is closed.
use crate::config::ConnectorConfig;
use crate::error::FeedError;
use crate::stream::timeout::TimeoutStream;
use crate::stream::transport::{Frame, Transport, WsTransport};
use crate::types::StreamMessage;
use futures::StreamExt;
use parking_lot::ReentrantMutex;
use serde::Serialize;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Connection lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StreamPhase {
    Connecting,
    Open,
    Closed,
}

/// Connection status reported to the subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreamState {
    pub phase: StreamPhase,
    /// Consecutive reconnect attempts since the connection was last open
    pub retry_count: u32,
}

impl StreamState {
    fn connecting(retry_count: u32) -> Self {
        Self {
            phase: StreamPhase::Connecting,
            retry_count,
        }
    }
}

/// Stream connector for one endpoint
#[derive(Debug)]
pub struct StreamConnector<T = WsTransport> {
    config: ConnectorConfig,
    transport: Arc<T>,
}

impl StreamConnector<WsTransport> {
    /// Create a websocket connector, validating the endpoint URL
    pub fn new(config: ConnectorConfig) -> Result<Self, FeedError> {
        let transport = WsTransport::new(config.ping_interval);
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> StreamConnector<T> {
    pub fn with_transport(config: ConnectorConfig, transport: T) -> Result<Self, FeedError> {
        validate_url(&config.url)?;
        Ok(Self {
            config,
            transport: Arc::new(transport),
        })
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    /// Start the connection loop
    ///
    /// Must be called from within a Tokio runtime. `on_message` receives every
    /// well formed data message in delivery order, `on_status` every phase
    /// change. Neither is called again once [`ConnectionHandle::close`] returns.
    pub fn connect<M, S>(&self, on_message: M, on_status: S) -> ConnectionHandle
    where
        M: FnMut(StreamMessage) + Send + 'static,
        S: FnMut(StreamState) + Send + 'static,
    {
        let gate = Arc::new(CallbackGate::default());
        let task = tokio::spawn(run_connection_loop(
            self.config.clone(),
            Arc::clone(&self.transport),
            Arc::clone(&gate),
            on_message,
            on_status,
        ));

        ConnectionHandle {
            url: self.config.url.clone(),
            gate,
            task,
        }
    }
}

/// Handle to a running connection; closing or dropping it tears the
/// connection down
#[derive(Debug)]
pub struct ConnectionHandle {
    url: String,
    gate: Arc<CallbackGate>,
    task: JoinHandle<()>,
}

impl ConnectionHandle {
    /// Close the socket and cancel any pending reconnect
    ///
    /// Idempotent. Waits for a callback running on another thread to finish,
    /// and may be called from inside a callback.
    pub fn close(&self) {
        if self.gate.close() {
            info!(url = %self.url, "Stream connection closed");
        }
        self.task.abort();
    }

    pub fn is_closed(&self) -> bool {
        self.gate.is_closed()
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// Serialises callback invocations against teardown
#[derive(Debug, Default)]
struct CallbackGate {
    closed: AtomicBool,
    in_flight: ReentrantMutex<()>,
}

impl CallbackGate {
    /// Run `callback` unless closed; returns false once closed
    fn invoke(&self, callback: impl FnOnce()) -> bool {
        let _in_flight = self.in_flight.lock();
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        callback();
        true
    }

    /// Returns true on the first call
    fn close(&self) -> bool {
        let first = !self.closed.swap(true, Ordering::AcqRel);
        // Wait out a callback running elsewhere
        drop(self.in_flight.lock());
        first
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

fn validate_url(raw: &str) -> Result<(), FeedError> {
    let url = url::Url::parse(raw).map_err(|error| FeedError::InvalidUrl {
        url: raw.to_string(),
        reason: error.to_string(),
    })?;

    match url.scheme() {
        "ws" | "wss" => Ok(()),
        scheme => Err(FeedError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{scheme}', expected ws or wss"),
        }),
    }
}

fn preview(text: &str) -> String {
    text.chars().take(100).collect()
}

/// Main connection loop with auto-reconnect
async fn run_connection_loop<T, M, S>(
    config: ConnectorConfig,
    transport: Arc<T>,
    gate: Arc<CallbackGate>,
    mut on_message: M,
    mut on_status: S,
) where
    T: Transport,
    M: FnMut(StreamMessage) + Send + 'static,
    S: FnMut(StreamState) + Send + 'static,
{
    info!(url = %config.url, "Starting stream connector");
    let mut state = StreamState::connecting(0);

    loop {
        if !gate.invoke(|| on_status(state)) {
            return;
        }

        match transport.open(&config.url).await {
            Ok(frames) => {
                info!(url = %config.url, retry_count = state.retry_count, "Connected to stream endpoint");
                state = StreamState {
                    phase: StreamPhase::Open,
                    retry_count: 0,
                };
                if !gate.invoke(|| on_status(state)) {
                    return;
                }

                let mut frames = TimeoutStream::new(frames, config.read_timeout);
                while let Some(frame) = frames.next().await {
                    match frame {
                        Ok(Frame::Text(text)) => match StreamMessage::parse(&text) {
                            Ok(message) if message.is_control() => {
                                debug!("Received control message");
                            }
                            Ok(message) => {
                                if !gate.invoke(|| on_message(message)) {
                                    return;
                                }
                            }
                            Err(error) => {
                                warn!(%error, payload = %preview(&text), "Dropping malformed stream payload");
                            }
                        },
                        Ok(Frame::Close) => {
                            info!(url = %config.url, "Server closed connection");
                            break;
                        }
                        Err(error) if error.is_transport() => {
                            error!(url = %config.url, %error, "Stream error");
                            break;
                        }
                        Err(error) => {
                            warn!(%error, "Dropping undecodable frame");
                        }
                    }
                }
            }
            Err(error) => {
                error!(url = %config.url, %error, "Failed to open stream connection");
            }
        }

        state.phase = StreamPhase::Closed;
        if !gate.invoke(|| on_status(state)) {
            return;
        }

        debug!(
            "Waiting {:?} before reconnecting...",
            config.reconnect_delay
        );
        tokio::time::sleep(config.reconnect_delay).await;
        state = StreamState::connecting(state.retry_count + 1);
    }
}
