//! Market data stream: transport, idle timeout and the reconnecting connector.

pub mod connector;
pub mod timeout;
pub mod transport;

pub use connector::{ConnectionHandle, StreamConnector, StreamPhase, StreamState};
pub use timeout::TimeoutStream;
pub use transport::{Frame, FrameStream, Transport, WsTransport};
