//! Session client core.
//!
//! [`SessionClient`] owns one connection to a session coordinator. Requests
//! are serialized and handed to the transport without waiting for an answer;
//! their outcome arrives later through the [`SessionHandler`].
//!
//! # Message Flow
//!
//! 1. Caller invokes `create_session()` (or join/leave/send)
//! 2. Client checks the lifecycle, records the request kind as outstanding and
//!    enqueues the frame on the transport
//! 3. The transport's delivery task hands each inbound frame to the client
//! 4. The frame is classified; a response clears its outstanding request and
//!    updates the session reference
//! 5. The matching handler callback runs, wrapped by the configured
//!    [`CallbackGuard`]
//!
//! The bookkeeping lock is released before any callback runs, so handlers
//! may call back into the client.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indigo_protocol::{
	ActionRegistry, ClientMessage, CreateGameMessage, GameAction, GameActionNotification,
	JoinGameMessage, LeaveGameMessage, ServerMessage, TilePlaced,
};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::handler::SessionHandler;
use crate::isolation::{self, CallbackGuard};
use crate::state::{ConnectionState, LifecycleState, RequestKind};
use crate::transport::{
	CloseReason, FrameListener, OpenRequest, Transport, TransportSender, WebSocketTransport,
};

/// Client side of one player's connection to a session coordinator.
///
/// Cheap to clone; clones share the connection. The connection is closed when
/// the last clone is dropped.
#[derive(Clone)]
pub struct SessionClient {
	inner: Arc<ClientInner>,
}

struct ClientInner {
	player_name: String,
	config: ClientConfig,
	handler: Arc<dyn SessionHandler>,
	guard: Box<dyn CallbackGuard>,
	registry: ActionRegistry,
	transport: Arc<dyn Transport>,
	link: Mutex<Link>,
	/// Incremented for every connect and disconnect. Listeners carry the value
	/// current when their channel was opened.
	epoch: AtomicU64,
	/// Held while a channel is being opened.
	opening: tokio::sync::Mutex<()>,
	/// Finished open attempts.
	attempts: AtomicU64,
}

#[derive(Default)]
struct Link {
	state: ConnectionState,
	sender: Option<Box<dyn TransportSender>>,
}

impl Drop for ClientInner {
	fn drop(&mut self) {
		if let Some(sender) = self.link.get_mut().sender.take() {
			sender.close();
		}
	}
}

impl SessionClient {
	/// Creates a client using the WebSocket transport and the default registry.
	pub fn new(
		handler: Arc<dyn SessionHandler>,
		player_name: impl Into<String>,
		config: ClientConfig,
	) -> Self {
		Self::builder(handler, player_name).config(config).build()
	}

	pub fn builder(
		handler: Arc<dyn SessionHandler>,
		player_name: impl Into<String>,
	) -> SessionClientBuilder {
		SessionClientBuilder {
			handler,
			player_name: player_name.into(),
			config: ClientConfig::default(),
			transport: None,
			registry: ActionRegistry::default(),
		}
	}

	pub fn player_name(&self) -> &str {
		&self.inner.player_name
	}

	pub fn config(&self) -> &ClientConfig {
		&self.inner.config
	}

	/// Registry used to encode outgoing and decode incoming game actions.
	pub fn registry(&self) -> &ActionRegistry {
		&self.inner.registry
	}

	pub fn state(&self) -> LifecycleState {
		self.inner.link.lock().state.lifecycle()
	}

	pub fn is_connected(&self) -> bool {
		self.state() != LifecycleState::Disconnected
	}

	/// Id of the session this client is in, once the coordinator confirmed it.
	pub fn session_id(&self) -> Option<String> {
		self.inner.link.lock().state.session_id().map(str::to_string)
	}

	/// Whether a request of `kind` is waiting for its response.
	pub fn has_pending(&self, kind: RequestKind) -> bool {
		self.inner.link.lock().state.is_pending(kind)
	}

	/// Number of handler panics absorbed so far. Always zero unless
	/// `capture_callback_failures` is enabled.
	pub fn captured_failures(&self) -> u64 {
		self.inner.guard.captured_failures()
	}

	/// Opens the connection.
	///
	/// Suspends until the transport reports the outcome or the configured
	/// connect timeout elapses. Failures are logged and reported as `false`.
	/// Returns `true` immediately if already connected. Overlapping calls
	/// share a single attempt and all report its outcome.
	pub async fn connect(&self) -> bool {
		let observed = self.inner.attempts.load(Ordering::SeqCst);
		if self.is_connected() {
			return true;
		}

		let _opening = self.inner.opening.lock().await;
		if self.is_connected() || self.inner.attempts.load(Ordering::SeqCst) != observed {
			return self.is_connected();
		}

		let connected = self.open_channel().await;
		self.inner.attempts.fetch_add(1, Ordering::SeqCst);
		connected
	}

	async fn open_channel(&self) -> bool {
		let epoch = self.inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;
		let listener = Arc::new(Listener {
			client: Arc::downgrade(&self.inner),
			epoch,
			closed: AtomicBool::new(false),
		});
		let request = OpenRequest {
			endpoint: self.inner.config.endpoint.clone(),
			player_name: self.inner.player_name.clone(),
			secret: self.inner.config.secret.clone(),
		};

		let timeout = self.inner.config.connect_timeout();
		let open = self
			.inner
			.transport
			.open(request, Arc::clone(&listener) as Arc<dyn FrameListener>);

		let sender = match tokio::time::timeout(timeout, open).await {
			Ok(Ok(sender)) => sender,
			Ok(Err(e)) => {
				warn!(
					player = %self.inner.player_name,
					endpoint = %self.inner.config.endpoint,
					error = %e,
					"connect failed"
				);
				return false;
			}
			Err(_) => {
				warn!(
					player = %self.inner.player_name,
					endpoint = %self.inner.config.endpoint,
					timeout_ms = self.inner.config.connect_timeout_ms,
					"connect timed out"
				);
				return false;
			}
		};

		let mut link = self.inner.link.lock();
		let stale = self.inner.epoch.load(Ordering::SeqCst) != epoch;
		if stale || listener.closed.load(Ordering::SeqCst) {
			drop(link);
			sender.close();
			warn!(player = %self.inner.player_name, "connection closed before it could be used");
			return false;
		}
		link.state.mark_connected();
		link.sender = Some(sender);
		drop(link);

		info!(
			player = %self.inner.player_name,
			endpoint = %self.inner.config.endpoint,
			"connected"
		);
		true
	}

	/// Closes the connection and forgets any session and outstanding requests.
	///
	/// The handler is not notified; late frames from the old channel are
	/// dropped.
	pub fn disconnect(&self) {
		let sender = {
			let mut link = self.inner.link.lock();
			self.inner.epoch.fetch_add(1, Ordering::SeqCst);
			link.state.mark_disconnected();
			link.sender.take()
		};

		if let Some(sender) = sender {
			sender.close();
			info!(player = %self.inner.player_name, "disconnected");
		}
	}

	/// Asks the coordinator to open a session of `session_name`.
	///
	/// Without `session_id` the coordinator assigns one. The outcome arrives
	/// through [`SessionHandler::on_create_game`].
	pub fn create_session(
		&self,
		session_name: &str,
		session_id: Option<&str>,
		greeting: &str,
	) -> Result<()> {
		let message = ClientMessage::CreateGame(CreateGameMessage {
			game_id: session_name.to_string(),
			session_id: session_id.map(str::to_string),
			greeting: greeting.to_string(),
		});
		self.submit("create a session", Some((RequestKind::Create, session_id)), &message)
	}

	/// Asks to enter an existing session. The outcome arrives through
	/// [`SessionHandler::on_join_game`].
	pub fn join_session(&self, session_id: &str, greeting: &str) -> Result<()> {
		let message = ClientMessage::JoinGame(JoinGameMessage {
			session_id: session_id.to_string(),
			greeting: greeting.to_string(),
		});
		self.submit("join a session", Some((RequestKind::Join, Some(session_id))), &message)
	}

	pub fn leave_session(&self, goodbye: &str) -> Result<()> {
		let message = ClientMessage::LeaveGame(LeaveGameMessage {
			goodbye: goodbye.to_string(),
		});
		self.submit("leave a session", Some((RequestKind::Leave, None)), &message)
	}

	/// Sends a game action to the other members of the session.
	///
	/// Only the connection is checked; whether the player is in a session is
	/// for the coordinator to decide, and it answers with a
	/// [`GameActionResponse`](indigo_protocol::GameActionResponse).
	pub fn send_game_action<T: GameAction>(&self, action: &T) -> Result<()> {
		let encoded = self.inner.registry.encode(action)?;
		self.submit("send a game action", None, &ClientMessage::GameAction(encoded))
	}

	fn submit(
		&self,
		operation: &'static str,
		request: Option<(RequestKind, Option<&str>)>,
		message: &ClientMessage,
	) -> Result<()> {
		let frame = serde_json::to_value(message)?;

		let mut guard = self.inner.link.lock();
		let link = &mut *guard;
		link.state.ensure_connected(operation)?;
		if let Some((kind, session_id)) = request {
			link.state.begin(kind, session_id)?;
		}

		let sent = match link.sender.as_ref() {
			Some(sender) => sender.send(frame),
			None => Err(Error::ChannelClosed),
		};
		if let Err(e) = sent {
			if let Some((kind, _)) = request {
				link.state.abandon(kind);
			}
			warn!(
				player = %self.inner.player_name,
				operation,
				error = %e,
				"failed to enqueue frame"
			);
			return Err(e);
		}

		debug!(player = %self.inner.player_name, operation, "frame enqueued");
		Ok(())
	}

	/// Runs one handler callback under the configured guard.
	fn notify(&self, name: &'static str, callback: impl Fn(&dyn SessionHandler, &SessionClient)) {
		let handler = self.inner.handler.as_ref();
		self.inner.guard.invoke(name, &mut || callback(handler, self));
	}

	fn complete(&self, kind: RequestKind, success: bool, session_id: Option<&str>) {
		self.inner.link.lock().state.complete(kind, success, session_id);
	}

	fn dispatch(&self, frame: Value) {
		let message = match serde_json::from_value::<ServerMessage>(frame) {
			Ok(message) => message,
			Err(e) => {
				warn!(player = %self.inner.player_name, error = %e, "unrecognized frame");
				let error = Error::ProtocolError(format!("unrecognized frame: {e}"));
				self.notify("on_error", |handler, client| handler.on_error(client, &error));
				return;
			}
		};

		debug!(player = %self.inner.player_name, kind = message.kind(), "dispatching frame");

		match message {
			ServerMessage::CreateGameResponse(response) => {
				self.complete(
					RequestKind::Create,
					response.status.is_success(),
					response.session_id.as_deref(),
				);
				self.notify("on_create_game", |handler, client| {
					handler.on_create_game(client, &response)
				});
			}
			ServerMessage::JoinGameResponse(response) => {
				self.complete(
					RequestKind::Join,
					response.status.is_success(),
					response.session_id.as_deref(),
				);
				self.notify("on_join_game", |handler, client| {
					handler.on_join_game(client, &response)
				});
			}
			ServerMessage::LeaveGameResponse(response) => {
				self.complete(RequestKind::Leave, response.status.is_success(), None);
				self.notify("on_leave_game", |handler, client| {
					handler.on_leave_game(client, &response)
				});
			}
			ServerMessage::GameActionResponse(response) => {
				if !response.status.is_success() {
					debug!(
						status = %response.status,
						errors = ?response.errors,
						"game action rejected"
					);
				}
				self.notify("on_game_action_response", |handler, client| {
					handler.on_game_action_response(client, &response)
				});
			}
			ServerMessage::PlayerJoined(notification) => {
				self.notify("on_player_joined", |handler, client| {
					handler.on_player_joined(client, &notification)
				});
			}
			ServerMessage::PlayerLeft(notification) => {
				self.notify("on_player_left", |handler, client| {
					handler.on_player_left(client, &notification)
				});
			}
			ServerMessage::GameAction(notification) => self.dispatch_game_action(notification),
		}
	}

	fn dispatch_game_action(&self, notification: GameActionNotification) {
		let GameActionNotification {
			action_type,
			payload,
			sender,
		} = notification;

		let decoded = match self.inner.registry.decode(&action_type, payload) {
			Ok(decoded) => decoded,
			Err(e) => {
				warn!(
					player = %self.inner.player_name,
					%action_type,
					%sender,
					error = %e,
					"dropping game action"
				);
				let error = Error::Codec(e);
				self.notify("on_error", |handler, client| handler.on_error(client, &error));
				return;
			}
		};

		if let Some(tile) = decoded.downcast_ref::<TilePlaced>() {
			self.notify("on_tile_placed", |handler, client| {
				handler.on_tile_placed(client, tile, &sender)
			});
		} else {
			self.notify("on_game_action", |handler, client| {
				handler.on_game_action(client, &decoded, &sender)
			});
		}
	}
}

impl fmt::Debug for SessionClient {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SessionClient")
			.field("player_name", &self.inner.player_name)
			.field("endpoint", &self.inner.config.endpoint)
			.field("state", &self.state())
			.finish_non_exhaustive()
	}
}

/// Builder for [`SessionClient`].
pub struct SessionClientBuilder {
	handler: Arc<dyn SessionHandler>,
	player_name: String,
	config: ClientConfig,
	transport: Option<Arc<dyn Transport>>,
	registry: ActionRegistry,
}

impl SessionClientBuilder {
	#[must_use]
	pub fn config(mut self, config: ClientConfig) -> Self {
		self.config = config;
		self
	}

	/// Replaces the default WebSocket transport.
	#[must_use]
	pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
		self.transport = Some(transport);
		self
	}

	/// Replaces the default registry, e.g. to add caller-defined actions.
	#[must_use]
	pub fn registry(mut self, registry: ActionRegistry) -> Self {
		self.registry = registry;
		self
	}

	pub fn build(self) -> SessionClient {
		let guard = isolation::guard_for(self.config.capture_callback_failures);
		let transport = self
			.transport
			.unwrap_or_else(|| Arc::new(WebSocketTransport::new()));

		SessionClient {
			inner: Arc::new(ClientInner {
				player_name: self.player_name,
				config: self.config,
				handler: self.handler,
				guard,
				registry: self.registry,
				transport,
				link: Mutex::new(Link::default()),
				epoch: AtomicU64::new(0),
				opening: tokio::sync::Mutex::new(()),
				attempts: AtomicU64::new(0),
			}),
		}
	}
}

/// Frame consumer registered with the transport for one channel.
///
/// Holds the client weakly so an open channel does not keep a dropped client
/// alive.
struct Listener {
	client: Weak<ClientInner>,
	epoch: u64,
	closed: AtomicBool,
}

impl Listener {
	/// The client, unless it was dropped or has moved on to another channel.
	fn client(&self) -> Option<SessionClient> {
		let inner = self.client.upgrade()?;
		if inner.epoch.load(Ordering::SeqCst) != self.epoch {
			debug!(epoch = self.epoch, "ignoring event from a previous connection");
			return None;
		}
		Some(SessionClient { inner })
	}
}

impl FrameListener for Listener {
	fn on_frame(&self, frame: Value) {
		if let Some(client) = self.client() {
			client.dispatch(frame);
		}
	}

	fn on_transport_error(&self, error: Error) {
		if let Some(client) = self.client() {
			warn!(player = %client.inner.player_name, error = %error, "transport error");
			client.notify("on_error", |handler, client| handler.on_error(client, &error));
		}
	}

	fn on_closed(&self, reason: CloseReason) {
		self.closed.store(true, Ordering::SeqCst);
		let Some(inner) = self.client.upgrade() else {
			return;
		};

		let was_connected = {
			let mut link = inner.link.lock();
			if inner.epoch.load(Ordering::SeqCst) != self.epoch {
				return;
			}
			let was_connected = link.state.lifecycle() != LifecycleState::Disconnected;
			link.state.mark_disconnected();
			link.sender = None;
			was_connected
		};

		let client = SessionClient { inner };
		match &reason {
			CloseReason::Local => {
				debug!(player = %client.inner.player_name, "channel closed locally");
				return;
			}
			CloseReason::Remote(detail) => {
				info!(
					player = %client.inner.player_name,
					reason = ?detail,
					"server closed the connection"
				);
			}
			CloseReason::Failed(detail) => {
				warn!(player = %client.inner.player_name, reason = %detail, "connection failed");
			}
		}

		if was_connected {
			client.notify("on_disconnected", |handler, client| handler.on_disconnected(client));
		}
	}
}
