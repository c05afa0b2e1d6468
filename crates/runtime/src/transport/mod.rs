//! Transport seam between the session core and the wire.
//!
//! A [`Transport`] opens one bidirectional frame channel per connection. It
//! owns the delivery task: every inbound frame is handed to the registered
//! [`FrameListener`] on that task, in arrival order. Outbound frames go
//! through a [`TransportSender`], whose `send` only enqueues and never waits
//! for the network.
//!
//! # Implementations
//!
//! - [`WebSocketTransport`] - JSON text frames over `tokio-tungstenite`
//! - [`LoopbackTransport`](crate::loopback::LoopbackTransport) - in-process,
//!   against a [`LoopbackHub`](crate::loopback::LoopbackHub)

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{Error, Result};

mod websocket;

pub use websocket::WebSocketTransport;

/// Boxed future returned by [`Transport::open`].
pub type OpenFuture<'a> =
	Pin<Box<dyn Future<Output = Result<Box<dyn TransportSender>>> + Send + 'a>>;

/// Handshake header carrying the display name (`PlayerName`; header names
/// are case-insensitive and stored lowercase).
pub const PLAYER_NAME_HEADER: &str = "playername";

/// Handshake header carrying the shared secret (`SecretToken`).
pub const SECRET_TOKEN_HEADER: &str = "secrettoken";

/// Parameters for opening a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRequest {
	pub endpoint: String,
	pub player_name: String,
	pub secret: Option<String>,
}

/// Why a channel stopped delivering frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
	/// [`TransportSender::close`] was called.
	Local,
	/// The peer closed the channel, optionally with a reason.
	Remote(Option<String>),
	/// The channel failed.
	Failed(String),
}

/// Receives everything a channel delivers.
///
/// Called from the transport's delivery task. Implementations must not block.
pub trait FrameListener: Send + Sync {
	fn on_frame(&self, frame: Value);

	/// A frame arrived that could not be parsed as JSON.
	fn on_transport_error(&self, error: Error);

	/// Called once, after the last frame.
	fn on_closed(&self, reason: CloseReason);
}

/// Outbound half of an open channel.
pub trait TransportSender: Send + Sync {
	/// Enqueues a frame for sending.
	fn send(&self, frame: Value) -> Result<()>;

	/// Closes the channel. Frames already enqueued may still be flushed.
	fn close(&self);
}

/// Opens channels to a session server.
pub trait Transport: Send + Sync {
	/// Opens a channel and registers `listener` as its only frame consumer.
	///
	/// Resolves once the server accepted the connection.
	fn open(&self, request: OpenRequest, listener: Arc<dyn FrameListener>) -> OpenFuture<'_>;
}

#[cfg(test)]
mod tests;
