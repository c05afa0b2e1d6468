//! Typed game-action payloads.
//!
//! The session core never looks inside an action. It only needs to know the
//! tag an action travels under and how to turn it into JSON and back; both are
//! provided by implementing [`GameAction`].

use std::fmt;

use downcast_rs::{DowncastSync, impl_downcast};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Type-erased decoded action payload.
///
/// Implemented for every `Debug + Send + Sync + 'static` type; recover the
/// concrete type with `downcast_ref`.
pub trait ActionPayload: DowncastSync + fmt::Debug {}
impl_downcast!(sync ActionPayload);

impl<T: fmt::Debug + Send + Sync + 'static> ActionPayload for T {}

/// A game action that can travel through the session coordinator.
///
/// # Example
///
/// ```ignore
/// #[derive(Debug, Serialize, Deserialize)]
/// struct TurnPassed;
///
/// impl GameAction for TurnPassed {
///     const ACTION_TYPE: &'static str = "turn_passed";
/// }
/// ```
pub trait GameAction: ActionPayload + Serialize + DeserializeOwned {
	/// Wire tag, unique within a registry.
	const ACTION_TYPE: &'static str;
}

/// A tile was placed on the hex board.
///
/// Coordinates are axial (`q`, `r`); rotation counts clockwise steps of 60
/// degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TilePlaced {
	pub rotation: i32,
	pub q_coordinate: i32,
	pub r_coordinate: i32,
}

impl TilePlaced {
	pub fn new(rotation: i32, q_coordinate: i32, r_coordinate: i32) -> Self {
		Self {
			rotation,
			q_coordinate,
			r_coordinate,
		}
	}
}

impl GameAction for TilePlaced {
	const ACTION_TYPE: &'static str = "tile_placed";
}
