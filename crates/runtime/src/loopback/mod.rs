//! In-process transport and session coordinator.
//!
//! [`LoopbackHub`] implements the coordinator side of the protocol in memory.
//! [`LoopbackTransport`] connects clients to a hub without touching the
//! network, which makes it suitable for local play and for tests. Frames are
//! still JSON values, so everything above the transport behaves exactly as it
//! does over a socket.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::transport::{
	CloseReason, FrameListener, OpenFuture, OpenRequest, Transport, TransportSender,
};

mod hub;

pub use hub::{LoopbackHub, PeerHandle};

/// Transport that attaches to a [`LoopbackHub`].
///
/// The request's endpoint is ignored; the player name and secret are checked
/// by the hub.
#[derive(Debug, Clone, Default)]
pub struct LoopbackTransport {
	hub: LoopbackHub,
}

impl LoopbackTransport {
	pub fn new(hub: LoopbackHub) -> Self {
		Self { hub }
	}

	pub fn hub(&self) -> &LoopbackHub {
		&self.hub
	}
}

impl Transport for LoopbackTransport {
	fn open(&self, request: OpenRequest, listener: Arc<dyn FrameListener>) -> OpenFuture<'_> {
		Box::pin(async move {
			let (handle, mut frames) = self
				.hub
				.attach(&request.player_name, request.secret.as_deref())?;
			let peer = handle.id();
			let closing = Arc::new(AtomicBool::new(false));

			let task_closing = Arc::clone(&closing);
			tokio::spawn(async move {
				while let Some(frame) = frames.recv().await {
					listener.on_frame(frame);
				}
				let reason = if task_closing.load(Ordering::SeqCst) {
					CloseReason::Local
				} else {
					CloseReason::Remote(None)
				};
				debug!(peer, ?reason, "loopback delivery finished");
				listener.on_closed(reason);
			});

			Ok(Box::new(LoopbackSender { handle, closing }) as Box<dyn TransportSender>)
		})
	}
}

struct LoopbackSender {
	handle: PeerHandle,
	closing: Arc<AtomicBool>,
}

impl TransportSender for LoopbackSender {
	fn send(&self, frame: Value) -> Result<()> {
		if self.closing.load(Ordering::SeqCst) {
			return Err(Error::ChannelClosed);
		}
		self.handle.submit(frame)
	}

	fn close(&self) {
		if !self.closing.swap(true, Ordering::SeqCst) {
			self.handle.detach();
		}
	}
}
