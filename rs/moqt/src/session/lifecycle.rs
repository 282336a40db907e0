use std::sync::Arc;

use tokio::sync::watch;

use crate::{Error, Event};

/// Where the session is in its lifetime. Only moves forward; [SessionState::Stopped] is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
	Created,
	/// At least one command was received.
	Instantiated,
	/// The setup handshake completed; objects may flow.
	Running,
	Stopped,
}

/// The session state plus the event sender, shared with the background tasks.
#[derive(Clone)]
pub(crate) struct Lifecycle {
	state: Arc<watch::Sender<SessionState>>,
	events: async_channel::Sender<Event>,
}

impl Lifecycle {
	pub fn new(events: async_channel::Sender<Event>) -> Self {
		Self {
			state: Arc::new(watch::Sender::new(SessionState::Created)),
			events,
		}
	}

	pub fn get(&self) -> SessionState {
		*self.state.borrow()
	}

	pub fn is_running(&self) -> bool {
		self.get() == SessionState::Running
	}

	/// Note that a command arrived, failing if the session already stopped.
	pub fn begin(&self) -> Result<(), Error> {
		let mut res = Ok(());
		self.state.send_if_modified(|state| match state {
			SessionState::Created => {
				*state = SessionState::Instantiated;
				true
			}
			SessionState::Stopped => {
				res = Err(Error::Stopped);
				false
			}
			_ => false,
		});
		res
	}

	pub fn run(&self) -> Result<(), Error> {
		let mut res = Ok(());
		self.state.send_if_modified(|state| match state {
			SessionState::Stopped => {
				res = Err(Error::Stopped);
				false
			}
			SessionState::Running => false,
			_ => {
				*state = SessionState::Running;
				true
			}
		});
		res
	}

	/// Move to [SessionState::Stopped], returning true if this call did it.
	///
	/// Whoever gets true is responsible for emitting [Event::Closed].
	pub fn stop(&self) -> bool {
		self.state.send_if_modified(|state| {
			if *state == SessionState::Stopped {
				return false;
			}
			*state = SessionState::Stopped;
			true
		})
	}

	/// Stop the session because of a fatal error, reporting it unless already stopped.
	pub fn fail(&self, err: Error) {
		if self.stop() {
			tracing::warn!(%err, "session failed");
			self.emit(Event::error(err));
			self.emit(Event::Closed);
		} else {
			tracing::debug!(%err, "error after stop");
		}
	}

	pub fn emit(&self, event: Event) {
		// Unbounded, so this only fails once every receiver is gone.
		let _ = self.events.try_send(event);
	}
}
