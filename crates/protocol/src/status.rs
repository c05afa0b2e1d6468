//! Status codes carried by server responses.
//!
//! A non-success status is an ordinary answer from the coordinator, not a
//! transport failure. Handlers receive the full response and decide.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of a `create_game` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreateGameResponseStatus {
	/// Session created; the response carries its id.
	Success,
	/// The player is already a member of a session.
	AlreadyInGame,
	/// The requested session id is taken.
	SessionWithIdAlreadyExists,
	/// The coordinator does not host the requested game.
	GameIdDoesNotExist,
	/// Unexpected failure on the coordinator.
	ServerError,
}

/// Outcome of a `join_game` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JoinGameResponseStatus {
	Success,
	AlreadyInGame,
	/// No session with that id exists.
	InvalidSessionId,
	/// Another member of the session already uses this display name.
	PlayerNameAlreadyTaken,
	ServerError,
}

/// Outcome of a `leave_game` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaveGameResponseStatus {
	Success,
	/// The player was not a member of any session.
	NoAssociatedGame,
	ServerError,
}

/// Acknowledgement for a `game_action` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameActionResponseStatus {
	Success,
	/// Actions are only relayed between members of a session.
	PlayerNotInGame,
	/// The payload was rejected by the coordinator.
	InvalidJson,
	ServerError,
}

macro_rules! impl_status {
	($($ty:ty),* $(,)?) => {
		$(
			impl $ty {
				/// Returns `true` for the `SUCCESS` variant.
				pub fn is_success(self) -> bool {
					matches!(self, Self::Success)
				}
			}

			impl fmt::Display for $ty {
				fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
					// Serialization of a unit variant cannot fail.
					match serde_json::to_value(self) {
						Ok(serde_json::Value::String(s)) => f.write_str(&s),
						_ => write!(f, "{self:?}"),
					}
				}
			}
		)*
	};
}

impl_status!(
	CreateGameResponseStatus,
	JoinGameResponseStatus,
	LeaveGameResponseStatus,
	GameActionResponseStatus,
);
