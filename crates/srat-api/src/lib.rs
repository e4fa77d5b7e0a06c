// srat-api: Event-stream transport for the SRAT backend (WebSocket `/ws` + SSE `/sse`)
//
// Frames arrive in SSE line format over either transport, are reassembled by
// `frame::FrameParser`, and are fanned out to listeners registered on a
// `listener::ListenerRegistry`. `stream::EventStream` owns the connection and
// the reconnect loop.

pub mod error;
pub mod frame;
pub mod listener;
pub mod stream;
pub mod transport;

pub use error::Error;
pub use frame::{Frame, FrameParser, LineBuffer};
pub use listener::{ListenerError, ListenerHandle, ListenerRegistry};
pub use stream::{ConnectionState, EventStream, ReconnectPolicy, StreamConfig, StreamTransport};
