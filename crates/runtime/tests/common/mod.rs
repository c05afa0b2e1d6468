// Shared helpers for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use indigo_runtime::protocol::{
	CreateGameResponse, DecodedAction, GameActionResponse, JoinGameResponse, LeaveGameResponse,
	PlayerJoinedNotification, PlayerLeftNotification, TilePlaced,
};
use indigo_runtime::{
	ClientConfig, Error, LoopbackHub, LoopbackTransport, SessionClient, SessionHandler,
};
use tokio::sync::mpsc;

pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Installs a test-writer subscriber honouring `RUST_LOG`. Safe to call from
/// every test.
pub fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
		)
		.with_test_writer()
		.try_init();
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
	CreateGame(CreateGameResponse),
	JoinGame(JoinGameResponse),
	LeaveGame(LeaveGameResponse),
	GameActionResponse(GameActionResponse),
	PlayerJoined(PlayerJoinedNotification),
	PlayerLeft(PlayerLeftNotification),
	TilePlaced { action: TilePlaced, sender: String },
	GameAction { action_type: String, sender: String },
	Error(String),
	Disconnected,
}

/// Forwards every callback to a channel the test reads from.
pub struct ChannelHandler {
	events: mpsc::UnboundedSender<Event>,
	panic_on_create: bool,
}

impl ChannelHandler {
	fn emit(&self, event: Event) {
		let _ = self.events.send(event);
	}
}

impl SessionHandler for ChannelHandler {
	fn on_create_game(&self, _client: &SessionClient, response: &CreateGameResponse) {
		self.emit(Event::CreateGame(response.clone()));
		if self.panic_on_create {
			panic!("create handler failed");
		}
	}

	fn on_join_game(&self, _client: &SessionClient, response: &JoinGameResponse) {
		self.emit(Event::JoinGame(response.clone()));
	}

	fn on_leave_game(&self, _client: &SessionClient, response: &LeaveGameResponse) {
		self.emit(Event::LeaveGame(response.clone()));
	}

	fn on_player_joined(&self, _client: &SessionClient, notification: &PlayerJoinedNotification) {
		self.emit(Event::PlayerJoined(notification.clone()));
	}

	fn on_player_left(&self, _client: &SessionClient, notification: &PlayerLeftNotification) {
		self.emit(Event::PlayerLeft(notification.clone()));
	}

	fn on_game_action_response(&self, _client: &SessionClient, response: &GameActionResponse) {
		self.emit(Event::GameActionResponse(response.clone()));
	}

	fn on_tile_placed(&self, _client: &SessionClient, action: &TilePlaced, sender: &str) {
		self.emit(Event::TilePlaced {
			action: *action,
			sender: sender.to_string(),
		});
	}

	fn on_game_action(&self, _client: &SessionClient, action: &DecodedAction, sender: &str) {
		self.emit(Event::GameAction {
			action_type: action.action_type().to_string(),
			sender: sender.to_string(),
		});
	}

	fn on_error(&self, _client: &SessionClient, error: &Error) {
		self.emit(Event::Error(error.to_string()));
	}

	fn on_disconnected(&self, _client: &SessionClient) {
		self.emit(Event::Disconnected);
	}
}

pub struct Events {
	rx: mpsc::UnboundedReceiver<Event>,
}

impl Events {
	pub async fn next(&mut self) -> Event {
		tokio::time::timeout(EVENT_TIMEOUT, self.rx.recv())
			.await
			.expect("timed out waiting for a handler callback")
			.expect("handler dropped")
	}

	/// Asserts that no callback arrives within `window`.
	pub async fn assert_quiet(&mut self, window: Duration) {
		if let Ok(Some(event)) = tokio::time::timeout(window, self.rx.recv()).await {
			panic!("unexpected callback: {event:?}");
		}
	}
}

pub fn handler() -> (Arc<ChannelHandler>, Events) {
	build_handler(false)
}

/// Handler whose `on_create_game` panics after recording the event.
pub fn panicking_handler() -> (Arc<ChannelHandler>, Events) {
	build_handler(true)
}

fn build_handler(panic_on_create: bool) -> (Arc<ChannelHandler>, Events) {
	let (tx, rx) = mpsc::unbounded_channel();
	(
		Arc::new(ChannelHandler {
			events: tx,
			panic_on_create,
		}),
		Events { rx },
	)
}

/// Client attached to `hub`, with its event stream.
pub fn loopback_client(
	hub: &LoopbackHub,
	name: &str,
	config: ClientConfig,
) -> (SessionClient, Events) {
	let (handler, events) = handler();
	let client = SessionClient::builder(handler, name)
		.config(config)
		.transport(Arc::new(LoopbackTransport::new(hub.clone())))
		.build();
	(client, events)
}
