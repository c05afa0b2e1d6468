//! Callback interface for server-originated events.
//!
//! Every method has an empty default body, so a handler overrides only the
//! events it cares about:
//!
//! ```ignore
//! struct Host;
//!
//! impl SessionHandler for Host {
//!     fn on_player_joined(&self, _client: &SessionClient, player: &PlayerJoinedNotification) {
//!         tracing::info!(player = %player.sender, "opponent arrived");
//!     }
//! }
//! ```
//!
//! # Threading
//!
//! Callbacks run on the transport's delivery task, not on the thread that
//! issued the request, and may overlap with calls the application makes on
//! the same [`SessionClient`]. Handlers that touch application state must
//! synchronize it themselves. Callbacks for one connection never overlap each
//! other and arrive in the order the frames were received.
//!
//! A callback that panics takes the delivery task down with it unless the
//! client was configured with `capture_callback_failures`.

use indigo_protocol::{
	CreateGameResponse, DecodedAction, GameActionResponse, JoinGameResponse, LeaveGameResponse,
	PlayerJoinedNotification, PlayerLeftNotification, TilePlaced,
};

use crate::client::SessionClient;
use crate::error::Error;

/// Event callbacks registered with a [`SessionClient`].
#[allow(unused_variables)]
pub trait SessionHandler: Send + Sync {
	/// Response to [`SessionClient::create_session`], successful or not.
	fn on_create_game(&self, client: &SessionClient, response: &CreateGameResponse) {}

	/// Response to [`SessionClient::join_session`], successful or not.
	fn on_join_game(&self, client: &SessionClient, response: &JoinGameResponse) {}

	/// Response to [`SessionClient::leave_session`].
	fn on_leave_game(&self, client: &SessionClient, response: &LeaveGameResponse) {}

	fn on_player_joined(&self, client: &SessionClient, notification: &PlayerJoinedNotification) {}

	fn on_player_left(&self, client: &SessionClient, notification: &PlayerLeftNotification) {}

	/// Server acknowledgement of an action sent with
	/// [`SessionClient::send_game_action`].
	fn on_game_action_response(&self, client: &SessionClient, response: &GameActionResponse) {}

	/// Another member placed a tile.
	fn on_tile_placed(&self, client: &SessionClient, action: &TilePlaced, sender: &str) {}

	/// Another member sent an action of a caller-registered type.
	///
	/// Recover the payload with [`DecodedAction::downcast_ref`].
	fn on_game_action(&self, client: &SessionClient, action: &DecodedAction, sender: &str) {}

	/// A frame could not be understood. Dispatch continues with the next frame.
	fn on_error(&self, client: &SessionClient, error: &Error) {}

	/// The server closed the connection or the transport failed.
	///
	/// Not invoked for [`SessionClient::disconnect`].
	fn on_disconnected(&self, client: &SessionClient) {}
}
