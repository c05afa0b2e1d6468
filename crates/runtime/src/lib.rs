//! Asynchronous client core for the Indigo session protocol.
//!
//! A [`SessionClient`] connects to a session coordinator, issues session
//! requests and game actions, and delivers everything the coordinator sends
//! to a [`SessionHandler`].
//!
//! # Architecture
//!
//! - [`transport`] - the frame channel seam, with a WebSocket implementation
//! - [`loopback`] - in-process coordinator and transport
//! - [`client`] - connection lifecycle, correlation and dispatch
//! - [`handler`] - callback trait with no-op defaults
//! - [`isolation`] - optional containment of handler panics
//!
//! ```ignore
//! let client = SessionClient::new(Arc::new(Host), "Alice", ClientConfig::default());
//! if client.connect().await {
//!     client.create_session("Indigo", None, "Hello World")?;
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod isolation;
pub mod loopback;
pub mod state;
pub mod transport;

pub use client::{SessionClient, SessionClientBuilder};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use handler::SessionHandler;
pub use indigo_protocol as protocol;
pub use isolation::{CallbackGuard, CaptureFailures, Propagate};
pub use loopback::{LoopbackHub, LoopbackTransport};
pub use state::{LifecycleState, RequestKind};
pub use transport::{CloseReason, Transport, WebSocketTransport};
