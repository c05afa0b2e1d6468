//! Wire types for the Indigo session protocol.
//!
//! This crate contains the serde-serializable shapes exchanged with the
//! session coordinator, plus the registry that maps game-action tags to typed
//! payloads. It has no runtime and performs no I/O.
//!
//! # Main Types
//!
//! - [`ClientMessage`] / [`ServerMessage`] - frames in each direction
//! - [`CreateGameResponseStatus`] and friends - server verdicts
//! - [`GameAction`] - trait implemented by typed action payloads
//! - [`ActionRegistry`] - tag to decoder mapping, open for extension
//! - [`TilePlaced`] - the built-in tile placement action

pub mod action;
pub mod messages;
pub mod registry;
pub mod status;

pub use action::*;
pub use messages::*;
pub use registry::*;
pub use status::*;
