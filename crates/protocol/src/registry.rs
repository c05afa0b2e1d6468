//! Registry mapping action tags to typed payloads.
//!
//! Decoders are plain function pointers monomorphized per [`GameAction`]
//! type, so the registry is cheap to clone and needs no locking once built.

use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;

use crate::action::{ActionPayload, GameAction, TilePlaced};
use crate::messages::GameActionMessage;

type DecodeFn = fn(Value) -> serde_json::Result<Box<dyn ActionPayload>>;

fn decode_as<T: GameAction>(payload: Value) -> serde_json::Result<Box<dyn ActionPayload>> {
	let action: T = serde_json::from_value(payload)?;
	Ok(Box::new(action))
}

/// Errors raised while encoding or decoding game actions.
#[derive(Debug, Error)]
pub enum CodecError {
	/// No decoder is registered for the tag.
	#[error("Unregistered game action type: {0}")]
	Unregistered(String),

	#[error("Failed to encode '{action_type}' action: {source}")]
	Encode {
		action_type: String,
		#[source]
		source: serde_json::Error,
	},

	#[error("Failed to decode '{action_type}' action: {source}")]
	Decode {
		action_type: String,
		#[source]
		source: serde_json::Error,
	},
}

impl CodecError {
	/// Tag of the action the error refers to.
	pub fn action_type(&self) -> &str {
		match self {
			CodecError::Unregistered(action_type)
			| CodecError::Encode { action_type, .. }
			| CodecError::Decode { action_type, .. } => action_type,
		}
	}
}

/// Decoded game action with its concrete type erased.
#[derive(Debug)]
pub struct DecodedAction {
	action_type: String,
	payload: Box<dyn ActionPayload>,
}

impl DecodedAction {
	/// Tag the action arrived under.
	pub fn action_type(&self) -> &str {
		&self.action_type
	}

	/// Returns `true` if the payload is a `T`.
	pub fn is<T: GameAction>(&self) -> bool {
		self.payload.is::<T>()
	}

	pub fn downcast_ref<T: GameAction>(&self) -> Option<&T> {
		self.payload.downcast_ref::<T>()
	}

	/// Takes the payload out as a `T`, handing `self` back on mismatch.
	pub fn into_inner<T: GameAction>(self) -> Result<T, Self> {
		let action_type = self.action_type;
		match self.payload.downcast::<T>() {
			Ok(action) => Ok(*action),
			Err(payload) => Err(Self {
				action_type,
				payload,
			}),
		}
	}
}

/// Mapping from action tag to decoder.
///
/// [`Default`] registers the built-in [`TilePlaced`] action; [`empty`](Self::empty)
/// starts with nothing.
#[derive(Debug, Clone)]
pub struct ActionRegistry {
	decoders: HashMap<&'static str, DecodeFn>,
}

impl Default for ActionRegistry {
	fn default() -> Self {
		let mut registry = Self::empty();
		registry.register::<TilePlaced>();
		registry
	}
}

impl ActionRegistry {
	pub fn empty() -> Self {
		Self {
			decoders: HashMap::new(),
		}
	}

	/// Registers `T`, replacing any decoder previously bound to its tag.
	pub fn register<T: GameAction>(&mut self) -> &mut Self {
		self.decoders.insert(T::ACTION_TYPE, decode_as::<T>);
		self
	}

	/// Builder-style variant of [`register`](Self::register).
	#[must_use]
	pub fn with<T: GameAction>(mut self) -> Self {
		self.register::<T>();
		self
	}

	pub fn contains(&self, action_type: &str) -> bool {
		self.decoders.contains_key(action_type)
	}

	/// Registered tags, in no particular order.
	pub fn action_types(&self) -> impl Iterator<Item = &'static str> + '_ {
		self.decoders.keys().copied()
	}

	/// Encodes `action` into the frame body sent to the coordinator.
	pub fn encode<T: GameAction>(&self, action: &T) -> Result<GameActionMessage, CodecError> {
		if !self.contains(T::ACTION_TYPE) {
			return Err(CodecError::Unregistered(T::ACTION_TYPE.to_string()));
		}

		let payload = serde_json::to_value(action).map_err(|source| CodecError::Encode {
			action_type: T::ACTION_TYPE.to_string(),
			source,
		})?;

		Ok(GameActionMessage {
			action_type: T::ACTION_TYPE.to_string(),
			payload,
		})
	}

	/// Decodes a payload received under `action_type`.
	pub fn decode(&self, action_type: &str, payload: Value) -> Result<DecodedAction, CodecError> {
		let decode = self
			.decoders
			.get(action_type)
			.ok_or_else(|| CodecError::Unregistered(action_type.to_string()))?;

		let payload = decode(payload).map_err(|source| CodecError::Decode {
			action_type: action_type.to_string(),
			source,
		})?;

		Ok(DecodedAction {
			action_type: action_type.to_string(),
			payload,
		})
	}
}
