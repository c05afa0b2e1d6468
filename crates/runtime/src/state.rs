//! Connection lifecycle and request correlation bookkeeping.
//!
//! The protocol carries no request ids. Responses are matched to requests by
//! kind, which is sound as long as at most one request of each kind is
//! outstanding per connection; [`ConnectionState::begin`] enforces that.

use std::collections::BTreeMap;
use std::fmt;

use tracing::warn;

use crate::error::{Error, Result};

/// Externally visible lifecycle of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
	Disconnected,
	/// Connected, not in a session, nothing outstanding.
	Connected,
	/// A create or join request is waiting for its response.
	SessionPending,
	/// The coordinator confirmed a create or join.
	SessionEstablished,
}

impl fmt::Display for LifecycleState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			LifecycleState::Disconnected => "disconnected",
			LifecycleState::Connected => "connected",
			LifecycleState::SessionPending => "waiting for a session",
			LifecycleState::SessionEstablished => "in a session",
		})
	}
}

/// Session requests that expect a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RequestKind {
	Create,
	Join,
	Leave,
}

impl fmt::Display for RequestKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			RequestKind::Create => "create",
			RequestKind::Join => "join",
			RequestKind::Leave => "leave",
		})
	}
}

/// Outstanding request; remembers the session id it referenced, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingRequest {
	session_id: Option<String>,
}

#[derive(Debug, Default)]
pub(crate) struct ConnectionState {
	connected: bool,
	pending: BTreeMap<RequestKind, PendingRequest>,
	session_id: Option<String>,
}

impl ConnectionState {
	pub fn lifecycle(&self) -> LifecycleState {
		if !self.connected {
			LifecycleState::Disconnected
		} else if self.session_id.is_some() {
			LifecycleState::SessionEstablished
		} else if self.pending.contains_key(&RequestKind::Create)
			|| self.pending.contains_key(&RequestKind::Join)
		{
			LifecycleState::SessionPending
		} else {
			LifecycleState::Connected
		}
	}

	pub fn session_id(&self) -> Option<&str> {
		self.session_id.as_deref()
	}

	pub fn is_pending(&self, kind: RequestKind) -> bool {
		self.pending.contains_key(&kind)
	}

	pub fn mark_connected(&mut self) {
		*self = Self {
			connected: true,
			..Self::default()
		};
	}

	/// Drops all pending requests and the session reference.
	pub fn mark_disconnected(&mut self) {
		*self = Self::default();
	}

	pub fn ensure_connected(&self, operation: &'static str) -> Result<()> {
		if self.connected {
			Ok(())
		} else {
			Err(Error::InvalidState {
				operation,
				state: self.lifecycle(),
			})
		}
	}

	/// Records an outgoing request, rejecting a second one of the same kind.
	pub fn begin(&mut self, kind: RequestKind, session_id: Option<&str>) -> Result<()> {
		if self.pending.contains_key(&kind) {
			return Err(Error::RequestPending(kind));
		}
		self.pending.insert(
			kind,
			PendingRequest {
				session_id: session_id.map(str::to_string),
			},
		);
		Ok(())
	}

	/// Forgets a request whose frame never left the client.
	pub fn abandon(&mut self, kind: RequestKind) {
		self.pending.remove(&kind);
	}

	/// Correlates a response with its request.
	///
	/// On success the session reference is updated: create and join establish
	/// the session (preferring the id the server reports), leave clears it.
	pub fn complete(&mut self, kind: RequestKind, success: bool, reported_session: Option<&str>) {
		let Some(request) = self.pending.remove(&kind) else {
			warn!(%kind, "response without an outstanding request");
			if success && kind == RequestKind::Leave {
				self.session_id = None;
			}
			return;
		};

		if !success {
			return;
		}

		match kind {
			RequestKind::Create | RequestKind::Join => {
				self.session_id = reported_session.map(str::to_string).or(request.session_id);
			}
			RequestKind::Leave => self.session_id = None,
		}
	}
}
