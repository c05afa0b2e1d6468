//! Frames exchanged with the session coordinator.
//!
//! Every frame is a JSON object tagged by `type`:
//!
//! 1. Client sends [`ClientMessage::CreateGame`] or [`ClientMessage::JoinGame`]
//! 2. Server answers with the matching response; other members of the session
//!    receive [`ServerMessage::PlayerJoined`]
//! 3. Members exchange [`ClientMessage::GameAction`] frames, which the server
//!    relays as [`ServerMessage::GameAction`] with the sender filled in
//! 4. [`ClientMessage::LeaveGame`] (or a disconnect) produces
//!    [`ServerMessage::PlayerLeft`] for the remaining members

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::status::{
	CreateGameResponseStatus, GameActionResponseStatus, JoinGameResponseStatus,
	LeaveGameResponseStatus,
};

/// Frame sent from a client to the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
	CreateGame(CreateGameMessage),
	JoinGame(JoinGameMessage),
	LeaveGame(LeaveGameMessage),
	GameAction(GameActionMessage),
}

/// Request to open a new session of a hosted game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateGameMessage {
	/// Game the session belongs to (e.g. `"Indigo"`).
	pub game_id: String,
	/// Requested session id; the coordinator assigns one when absent.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
	pub greeting: String,
}

/// Request to enter an existing session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinGameMessage {
	pub session_id: String,
	pub greeting: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveGameMessage {
	pub goodbye: String,
}

/// Encoded game action on its way to the other session members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameActionMessage {
	/// Registry tag identifying the payload type.
	pub action_type: String,
	pub payload: Value,
}

/// Frame sent from the coordinator to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
	CreateGameResponse(CreateGameResponse),
	JoinGameResponse(JoinGameResponse),
	LeaveGameResponse(LeaveGameResponse),
	GameActionResponse(GameActionResponse),
	PlayerJoined(PlayerJoinedNotification),
	PlayerLeft(PlayerLeftNotification),
	GameAction(GameActionNotification),
}

impl ServerMessage {
	/// Wire tag of this frame, for diagnostics.
	pub fn kind(&self) -> &'static str {
		match self {
			Self::CreateGameResponse(_) => "create_game_response",
			Self::JoinGameResponse(_) => "join_game_response",
			Self::LeaveGameResponse(_) => "leave_game_response",
			Self::GameActionResponse(_) => "game_action_response",
			Self::PlayerJoined(_) => "player_joined",
			Self::PlayerLeft(_) => "player_left",
			Self::GameAction(_) => "game_action",
		}
	}
}

/// Answer to [`CreateGameMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateGameResponse {
	pub status: CreateGameResponseStatus,
	/// Id of the created session, present on success.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
}

/// Answer to [`JoinGameMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinGameResponse {
	pub status: JoinGameResponseStatus,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
	/// Display names of the members already in the session.
	#[serde(default)]
	pub opponents: Vec<String>,
	/// Greeting the joiner sent, echoed back.
	#[serde(default)]
	pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveGameResponse {
	pub status: LeaveGameResponseStatus,
}

/// Acknowledgement of a relayed game action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameActionResponse {
	pub status: GameActionResponseStatus,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub errors: Vec<String>,
}

/// Another player entered the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerJoinedNotification {
	/// Greeting supplied by the joining player.
	pub message: String,
	/// Display name of the joining player.
	pub sender: String,
}

/// Another player left the session or disconnected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerLeftNotification {
	pub message: String,
	pub sender: String,
}

/// Game action relayed from another member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameActionNotification {
	pub action_type: String,
	pub payload: Value,
	/// Display name of the member that sent the action.
	pub sender: String,
}
