//! In-process session coordinator.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use indigo_protocol::{
	ClientMessage, CreateGameMessage, CreateGameResponse, CreateGameResponseStatus,
	GameActionMessage, GameActionNotification, GameActionResponse, GameActionResponseStatus,
	JoinGameMessage, JoinGameResponse, JoinGameResponseStatus, LeaveGameResponse,
	LeaveGameResponseStatus, PlayerJoinedNotification, PlayerLeftNotification, ServerMessage,
};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};

type PeerId = u64;

/// Coordinates sessions between peers attached in the same process.
///
/// Cloning yields another handle to the same hub.
#[derive(Debug, Clone, Default)]
pub struct LoopbackHub {
	state: Arc<Mutex<HubState>>,
}

#[derive(Debug, Default)]
struct HubState {
	secret: Option<String>,
	game_ids: Option<BTreeSet<String>>,
	next_peer: PeerId,
	peers: HashMap<PeerId, Peer>,
	sessions: HashMap<String, Session>,
}

#[derive(Debug)]
struct Peer {
	name: String,
	outbound: mpsc::UnboundedSender<Value>,
	session: Option<String>,
}

#[derive(Debug)]
struct Session {
	game_id: String,
	/// In join order.
	members: Vec<PeerId>,
}

impl LoopbackHub {
	pub fn new() -> Self {
		Self::default()
	}

	/// Requires peers to present `secret` when attaching.
	#[must_use]
	pub fn with_secret(self, secret: impl Into<String>) -> Self {
		self.state.lock().secret = Some(secret.into());
		self
	}

	/// Restricts sessions to the given game ids. Any id is accepted otherwise.
	#[must_use]
	pub fn with_game_ids<I, S>(self, game_ids: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.state.lock().game_ids = Some(game_ids.into_iter().map(Into::into).collect());
		self
	}

	/// Registers a peer. Frames addressed to it arrive on the returned receiver.
	pub fn attach(
		&self,
		player_name: &str,
		secret: Option<&str>,
	) -> Result<(PeerHandle, mpsc::UnboundedReceiver<Value>)> {
		if player_name.is_empty() {
			return Err(Error::ConnectionFailed("player name must not be empty".to_string()));
		}

		let mut state = self.state.lock();
		if state.secret.as_deref().is_some_and(|expected| secret != Some(expected)) {
			warn!(player = player_name, "rejecting peer with invalid secret");
			return Err(Error::ConnectionFailed("invalid secret token".to_string()));
		}

		state.next_peer += 1;
		let id = state.next_peer;
		let (outbound, frames) = mpsc::unbounded_channel();
		state.peers.insert(
			id,
			Peer {
				name: player_name.to_string(),
				outbound,
				session: None,
			},
		);
		drop(state);

		info!(peer = id, player = player_name, "peer attached");
		Ok((
			PeerHandle {
				id,
				hub: self.clone(),
				detached: AtomicBool::new(false),
			},
			frames,
		))
	}

	/// Detaches every peer named `player_name`, as if the server dropped them.
	///
	/// Returns whether any peer was attached under that name.
	pub fn disconnect_player(&self, player_name: &str) -> bool {
		let mut state = self.state.lock();
		let ids: Vec<PeerId> = state
			.peers
			.iter()
			.filter(|(_, peer)| peer.name == player_name)
			.map(|(id, _)| *id)
			.collect();
		for id in &ids {
			state.detach(*id);
		}
		!ids.is_empty()
	}

	/// Display names of the members of `session_id`, in join order.
	pub fn members(&self, session_id: &str) -> Option<Vec<String>> {
		let state = self.state.lock();
		let session = state.sessions.get(session_id)?;
		Some(state.names(&session.members))
	}

	/// Game id `session_id` was created for.
	pub fn game_id(&self, session_id: &str) -> Option<String> {
		self.state.lock().sessions.get(session_id).map(|s| s.game_id.clone())
	}

	pub fn session_count(&self) -> usize {
		self.state.lock().sessions.len()
	}

	/// Returns false when `peer` is no longer registered.
	fn handle(&self, peer: PeerId, frame: Value) -> bool {
		let mut state = self.state.lock();
		if !state.peers.contains_key(&peer) {
			debug!(peer, "frame from detached peer");
			return false;
		}

		let message = match serde_json::from_value::<ClientMessage>(frame) {
			Ok(message) => message,
			Err(e) => {
				warn!(peer, error = %e, "dropping unparseable client frame");
				return true;
			}
		};

		match message {
			ClientMessage::CreateGame(request) => state.create(peer, request),
			ClientMessage::JoinGame(request) => state.join(peer, request),
			ClientMessage::LeaveGame(request) => {
				let status = if state.leave(peer, &request.goodbye) {
					LeaveGameResponseStatus::Success
				} else {
					LeaveGameResponseStatus::NoAssociatedGame
				};
				state.send(peer, &ServerMessage::LeaveGameResponse(LeaveGameResponse { status }));
			}
			ClientMessage::GameAction(action) => state.relay(peer, action),
		}
		true
	}
}

impl HubState {
	fn names(&self, ids: &[PeerId]) -> Vec<String> {
		ids.iter()
			.filter_map(|id| self.peers.get(id))
			.map(|peer| peer.name.clone())
			.collect()
	}

	fn send(&self, peer: PeerId, message: &ServerMessage) {
		let Some(target) = self.peers.get(&peer) else {
			return;
		};
		match serde_json::to_value(message) {
			Ok(frame) => {
				if target.outbound.send(frame).is_err() {
					debug!(peer, kind = message.kind(), "peer no longer receiving");
				}
			}
			Err(e) => warn!(peer, error = %e, "failed to encode server frame"),
		}
	}

	/// Sends `message` to every member of `session_id` except `except`.
	fn broadcast(&self, session_id: &str, except: PeerId, message: &ServerMessage) {
		if let Some(session) = self.sessions.get(session_id) {
			for member in session.members.iter().filter(|m| **m != except) {
				self.send(*member, message);
			}
		}
	}

	fn create(&mut self, peer: PeerId, request: CreateGameMessage) {
		let in_session = self.peers.get(&peer).is_some_and(|p| p.session.is_some());
		let allowed = self
			.game_ids
			.as_ref()
			.is_none_or(|ids| ids.contains(&request.game_id));

		let status = if in_session {
			CreateGameResponseStatus::AlreadyInGame
		} else if !allowed {
			CreateGameResponseStatus::GameIdDoesNotExist
		} else if request
			.session_id
			.as_ref()
			.is_some_and(|id| self.sessions.contains_key(id))
		{
			CreateGameResponseStatus::SessionWithIdAlreadyExists
		} else {
			CreateGameResponseStatus::Success
		};

		let session_id = status.is_success().then(|| {
			let session_id = request
				.session_id
				.unwrap_or_else(|| Uuid::new_v4().to_string());
			self.sessions.insert(
				session_id.clone(),
				Session {
					game_id: request.game_id.clone(),
					members: vec![peer],
				},
			);
			if let Some(p) = self.peers.get_mut(&peer) {
				p.session = Some(session_id.clone());
			}
			info!(peer, session = %session_id, game = %request.game_id, "session created");
			session_id
		});

		self.send(
			peer,
			&ServerMessage::CreateGameResponse(CreateGameResponse { status, session_id }),
		);
	}

	fn join(&mut self, peer: PeerId, request: JoinGameMessage) {
		let Some(name) = self.peers.get(&peer).map(|p| p.name.clone()) else {
			return;
		};
		let in_session = self.peers.get(&peer).is_some_and(|p| p.session.is_some());

		let status = match self.sessions.get(&request.session_id) {
			_ if in_session => JoinGameResponseStatus::AlreadyInGame,
			None => JoinGameResponseStatus::InvalidSessionId,
			Some(session) if self.names(&session.members).contains(&name) => {
				JoinGameResponseStatus::PlayerNameAlreadyTaken
			}
			Some(_) => JoinGameResponseStatus::Success,
		};

		if !status.is_success() {
			self.send(
				peer,
				&ServerMessage::JoinGameResponse(JoinGameResponse {
					status,
					session_id: None,
					opponents: Vec::new(),
					message: request.greeting,
				}),
			);
			return;
		}

		let mut opponents = Vec::new();
		if let Some(session) = self.sessions.get_mut(&request.session_id) {
			opponents = session.members.clone();
			session.members.push(peer);
		}
		let opponents = self.names(&opponents);
		if let Some(p) = self.peers.get_mut(&peer) {
			p.session = Some(request.session_id.clone());
		}
		info!(peer, player = %name, session = %request.session_id, "player joined session");

		self.send(
			peer,
			&ServerMessage::JoinGameResponse(JoinGameResponse {
				status,
				session_id: Some(request.session_id.clone()),
				opponents,
				message: request.greeting.clone(),
			}),
		);
		self.broadcast(
			&request.session_id,
			peer,
			&ServerMessage::PlayerJoined(PlayerJoinedNotification {
				message: request.greeting,
				sender: name,
			}),
		);
	}

	/// Removes `peer` from its session. Returns false if it was not in one.
	fn leave(&mut self, peer: PeerId, goodbye: &str) -> bool {
		let Some(p) = self.peers.get_mut(&peer) else {
			return false;
		};
		let Some(session_id) = p.session.take() else {
			return false;
		};
		let name = p.name.clone();

		self.broadcast(
			&session_id,
			peer,
			&ServerMessage::PlayerLeft(PlayerLeftNotification {
				message: goodbye.to_string(),
				sender: name.clone(),
			}),
		);

		let empty = match self.sessions.get_mut(&session_id) {
			Some(session) => {
				session.members.retain(|m| *m != peer);
				session.members.is_empty()
			}
			None => false,
		};
		if empty {
			self.sessions.remove(&session_id);
			debug!(session = %session_id, "removed empty session");
		}
		info!(peer, player = %name, session = %session_id, "player left session");
		true
	}

	fn relay(&self, peer: PeerId, action: GameActionMessage) {
		let Some(p) = self.peers.get(&peer) else {
			return;
		};
		let Some(session_id) = p.session.clone() else {
			self.send(
				peer,
				&ServerMessage::GameActionResponse(GameActionResponse {
					status: GameActionResponseStatus::PlayerNotInGame,
					errors: vec!["player is not in a session".to_string()],
				}),
			);
			return;
		};

		debug!(
			peer,
			session = %session_id,
			action_type = %action.action_type,
			"relaying game action"
		);
		self.broadcast(
			&session_id,
			peer,
			&ServerMessage::GameAction(GameActionNotification {
				action_type: action.action_type,
				payload: action.payload,
				sender: p.name.clone(),
			}),
		);
		self.send(
			peer,
			&ServerMessage::GameActionResponse(GameActionResponse {
				status: GameActionResponseStatus::Success,
				errors: Vec::new(),
			}),
		);
	}

	fn detach(&mut self, peer: PeerId) {
		self.leave(peer, "disconnected");
		if let Some(p) = self.peers.remove(&peer) {
			info!(peer, player = %p.name, "peer detached");
		}
	}
}

/// A peer's registration with a [`LoopbackHub`]. Detaches on drop.
#[derive(Debug)]
pub struct PeerHandle {
	id: PeerId,
	hub: LoopbackHub,
	detached: AtomicBool,
}

impl PeerHandle {
	pub fn id(&self) -> u64 {
		self.id
	}

	/// Hands a client frame to the hub, which answers synchronously. Fails
	/// with [`Error::ChannelClosed`] once the hub has dropped this peer.
	pub fn submit(&self, frame: Value) -> Result<()> {
		if self.detached.load(Ordering::SeqCst) {
			return Err(Error::ChannelClosed);
		}
		if !self.hub.handle(self.id, frame) {
			self.detached.store(true, Ordering::SeqCst);
			return Err(Error::ChannelClosed);
		}
		Ok(())
	}

	/// Leaves any session and unregisters the peer. Idempotent.
	pub fn detach(&self) {
		if !self.detached.swap(true, Ordering::SeqCst) {
			self.hub.state.lock().detach(self.id);
		}
	}
}

impl Drop for PeerHandle {
	fn drop(&mut self) {
		self.detach();
	}
}
