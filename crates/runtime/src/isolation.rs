//! Failure isolation around handler callbacks.
//!
//! The client routes every callback through a [`CallbackGuard`]. The guard
//! is picked once at construction and is independent of the dispatch logic:
//!
//! - [`Propagate`] runs the callback as-is; a panic unwinds into the
//!   transport's delivery task.
//! - [`CaptureFailures`] runs it under [`catch_unwind`], logs and counts the
//!   panic, and returns normally so the next frame is still dispatched.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::error;

/// Wraps a single handler invocation.
pub trait CallbackGuard: Send + Sync {
	/// Runs `callback`, which is named `name` for diagnostics.
	fn invoke(&self, name: &'static str, callback: &mut dyn FnMut());

	/// Number of callback failures absorbed so far.
	fn captured_failures(&self) -> u64 {
		0
	}
}

/// Lets callback panics propagate.
#[derive(Debug, Default, Clone, Copy)]
pub struct Propagate;

impl CallbackGuard for Propagate {
	fn invoke(&self, _name: &'static str, callback: &mut dyn FnMut()) {
		callback();
	}
}

/// Converts callback panics into logged no-ops.
#[derive(Debug, Default)]
pub struct CaptureFailures {
	failures: AtomicU64,
}

impl CaptureFailures {
	pub fn new() -> Self {
		Self::default()
	}
}

impl CallbackGuard for CaptureFailures {
	fn invoke(&self, name: &'static str, callback: &mut dyn FnMut()) {
		if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback())) {
			let failures = self.failures.fetch_add(1, Ordering::SeqCst) + 1;
			error!(
				callback = name,
				failures,
				reason = %panic_message(payload.as_ref()),
				"handler callback panicked; event discarded"
			);
		}
	}

	fn captured_failures(&self) -> u64 {
		self.failures.load(Ordering::SeqCst)
	}
}

/// Builds the guard selected by `capture_callback_failures`.
pub(crate) fn guard_for(capture: bool) -> Box<dyn CallbackGuard> {
	if capture {
		Box::new(CaptureFailures::new())
	} else {
		Box::new(Propagate)
	}
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
	if let Some(message) = payload.downcast_ref::<&'static str>() {
		*message
	} else if let Some(message) = payload.downcast_ref::<String>() {
		message.as_str()
	} else {
		"<non-string panic payload>"
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::AtomicBool;

	use super::*;

	#[test]
	fn test_propagate_runs_callback() {
		let called = AtomicBool::new(false);
		Propagate.invoke("on_create_game", &mut || called.store(true, Ordering::SeqCst));
		assert!(called.load(Ordering::SeqCst));
	}

	#[test]
	fn test_propagate_lets_panic_escape() {
		let result = catch_unwind(|| {
			Propagate.invoke("on_create_game", &mut || panic!("boom"));
		});
		assert!(result.is_err());
	}

	#[test]
	fn test_capture_swallows_and_counts() {
		let guard = CaptureFailures::new();
		let calls = AtomicU64::new(0);

		guard.invoke("on_create_game", &mut || {
			calls.fetch_add(1, Ordering::SeqCst);
			panic!("should not escape");
		});
		guard.invoke("on_join_game", &mut || {
			calls.fetch_add(1, Ordering::SeqCst);
		});

		assert_eq!(calls.load(Ordering::SeqCst), 2);
		assert_eq!(guard.captured_failures(), 1);
	}

	#[test]
	fn test_panic_message_extraction() {
		let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
		assert_eq!(panic_message(payload.as_ref()), "owned");

		let payload: Box<dyn Any + Send> = Box::new("static");
		assert_eq!(panic_message(payload.as_ref()), "static");

		let payload: Box<dyn Any + Send> = Box::new(7_u8);
		assert_eq!(panic_message(payload.as_ref()), "<non-string panic payload>");
	}

	#[test]
	fn test_guard_selection() {
		assert_eq!(guard_for(false).captured_failures(), 0);

		let guard = guard_for(true);
		guard.invoke("on_error", &mut || panic!("x"));
		assert_eq!(guard.captured_failures(), 1);
	}
}
