//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:8080/connect";

/// Default bound on [`SessionClient::connect`](crate::SessionClient::connect).
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;

/// Settings for a [`SessionClient`](crate::SessionClient).
///
/// Deserializes with every field optional, so callers can load it from any
/// serde format and only override what they need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
	/// Server endpoint handed to the transport (a `ws://` or `wss://` URL for
	/// the WebSocket transport).
	pub endpoint: String,
	/// Shared secret presented during the handshake.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub secret: Option<String>,
	pub connect_timeout_ms: u64,
	/// Catch panics raised by handler callbacks instead of letting them
	/// unwind through the delivery task.
	pub capture_callback_failures: bool,
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			endpoint: DEFAULT_ENDPOINT.to_string(),
			secret: None,
			connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
			capture_callback_failures: false,
		}
	}
}

impl ClientConfig {
	pub fn new(endpoint: impl Into<String>) -> Self {
		Self {
			endpoint: endpoint.into(),
			..Self::default()
		}
	}

	#[must_use]
	pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
		self.secret = Some(secret.into());
		self
	}

	#[must_use]
	pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
		self.connect_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
		self
	}

	#[must_use]
	pub fn with_capture_callback_failures(mut self, capture: bool) -> Self {
		self.capture_callback_failures = capture;
		self
	}

	pub fn connect_timeout(&self) -> Duration {
		Duration::from_millis(self.connect_timeout_ms)
	}
}
