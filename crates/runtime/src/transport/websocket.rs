//! WebSocket transport.
//!
//! Frames are JSON documents sent as text messages. The display name and the
//! optional secret travel as handshake headers. After the handshake two tasks
//! are spawned: a writer draining the outbound queue into the socket, and a
//! reader that parses each inbound message and hands it to the listener.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tracing::{debug, warn};

use super::{
	CloseReason, FrameListener, OpenFuture, OpenRequest, PLAYER_NAME_HEADER, SECRET_TOKEN_HEADER,
	Transport, TransportSender,
};
use crate::error::{Error, Result};

enum Outbound {
	Frame(String),
	Close,
}

/// Connects to a session server over `ws://` or `wss://`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketTransport;

impl WebSocketTransport {
	pub fn new() -> Self {
		Self
	}
}

impl Transport for WebSocketTransport {
	fn open(&self, request: OpenRequest, listener: Arc<dyn FrameListener>) -> OpenFuture<'_> {
		Box::pin(async move {
			let mut ws_request = request.endpoint.as_str().into_client_request().map_err(|e| {
				Error::ConnectionFailed(format!("invalid endpoint '{}': {e}", request.endpoint))
			})?;

			let headers = ws_request.headers_mut();
			headers.insert(PLAYER_NAME_HEADER, header_value(&request.player_name)?);
			if let Some(secret) = &request.secret {
				headers.insert(SECRET_TOKEN_HEADER, header_value(secret)?);
			}

			let (stream, _response) = connect_async(ws_request)
				.await
				.map_err(|e| Error::ConnectionFailed(e.to_string()))?;

			debug!(
				endpoint = %request.endpoint,
				player = %request.player_name,
				"WebSocket handshake complete"
			);

			let (mut sink, mut stream) = stream.split();
			let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Outbound>();
			let closing = Arc::new(AtomicBool::new(false));

			tokio::spawn(async move {
				while let Some(outbound) = outbound_rx.recv().await {
					match outbound {
						Outbound::Frame(text) => {
							if let Err(e) = sink.send(Message::Text(text)).await {
								warn!(error = %e, "WebSocket write error");
								break;
							}
						}
						Outbound::Close => {
							let _ = sink.send(Message::Close(None)).await;
							break;
						}
					}
				}
				let _ = sink.close().await;
			});

			let reader_closing = Arc::clone(&closing);
			tokio::spawn(async move {
				let reason = loop {
					match stream.next().await {
						Some(Ok(Message::Text(text))) => {
							deliver(listener.as_ref(), text.as_bytes())
						}
						Some(Ok(Message::Binary(bytes))) => deliver(listener.as_ref(), &bytes),
						Some(Ok(Message::Close(frame))) => {
							let reason = frame
								.map(|f| f.reason.to_string())
								.filter(|reason| !reason.is_empty());
							break CloseReason::Remote(reason);
						}
						// Ping/pong are answered by tungstenite itself.
						Some(Ok(_)) => {}
						Some(Err(e)) => break CloseReason::Failed(e.to_string()),
						None => break CloseReason::Remote(None),
					}
				};

				let reason = if reader_closing.load(Ordering::SeqCst) {
					CloseReason::Local
				} else {
					reason
				};
				debug!(?reason, "WebSocket reader finished");
				listener.on_closed(reason);
			});

			Ok(Box::new(WebSocketSender {
				outbound_tx,
				closing,
			}) as Box<dyn TransportSender>)
		})
	}
}

struct WebSocketSender {
	outbound_tx: mpsc::UnboundedSender<Outbound>,
	closing: Arc<AtomicBool>,
}

impl TransportSender for WebSocketSender {
	fn send(&self, frame: Value) -> Result<()> {
		if self.closing.load(Ordering::SeqCst) {
			return Err(Error::ChannelClosed);
		}
		self.outbound_tx
			.send(Outbound::Frame(frame.to_string()))
			.map_err(|_| Error::ChannelClosed)
	}

	fn close(&self) {
		if !self.closing.swap(true, Ordering::SeqCst) {
			let _ = self.outbound_tx.send(Outbound::Close);
		}
	}
}

fn deliver(listener: &dyn FrameListener, bytes: &[u8]) {
	match serde_json::from_slice::<Value>(bytes) {
		Ok(frame) => listener.on_frame(frame),
		Err(e) => {
			listener.on_transport_error(Error::ProtocolError(format!("malformed frame: {e}")))
		}
	}
}

fn header_value(value: &str) -> Result<HeaderValue> {
	HeaderValue::from_str(value).map_err(|e| {
		Error::ConnectionFailed(format!("invalid handshake header value '{value}': {e}"))
	})
}
