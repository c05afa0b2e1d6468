//! Error types for the session runtime.

use indigo_protocol::CodecError;
use thiserror::Error;

use crate::state::{LifecycleState, RequestKind};

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the session runtime.
#[derive(Debug, Error)]
pub enum Error {
	/// Operation not allowed in the current lifecycle state.
	#[error("Invalid state: cannot {operation} while {state}")]
	InvalidState {
		operation: &'static str,
		state: LifecycleState,
	},

	/// A request of the same kind is still waiting for its response.
	#[error("A {0} request is already outstanding")]
	RequestPending(RequestKind),

	/// Failed to establish the transport connection.
	#[error("Failed to connect to session server: {0}")]
	ConnectionFailed(String),

	/// Frame did not match the wire protocol.
	#[error("Protocol error: {0}")]
	ProtocolError(String),

	/// Game action could not be encoded or decoded.
	#[error(transparent)]
	Codec(#[from] CodecError),

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	/// Channel closed unexpectedly.
	#[error("Channel closed unexpectedly")]
	ChannelClosed,
}

impl Error {
	/// Returns true if this is a local state violation.
	pub fn is_invalid_state(&self) -> bool {
		matches!(self, Error::InvalidState { .. } | Error::RequestPending(_))
	}

	/// Returns true if the error came from the connection itself rather than
	/// from a frame's contents.
	pub fn is_transport(&self) -> bool {
		matches!(self, Error::ConnectionFailed(_) | Error::ChannelClosed)
	}
}
