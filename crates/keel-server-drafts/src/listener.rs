// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-process fan-out of protection changes.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use keel_drafts_core::{ProtectionEvent, ProtectionState, UserId};
use tracing::{debug, info, instrument, warn};

use crate::error::DraftError;
use crate::store::DraftStore;

#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
	#[error("listener failed: {0}")]
	Failed(String),

	#[error(transparent)]
	Draft(#[from] DraftError),
}

#[async_trait]
pub trait ProtectionListener: Send + Sync {
	fn name(&self) -> &str;

	async fn on_event(&self, event: &ProtectionEvent) -> Result<(), ListenerError>;
}

/// Synchronous publish/subscribe bus.
///
/// Listeners run one after another in subscription order on the publisher's
/// task. A failing listener is logged and skipped.
#[derive(Default)]
pub struct ListenerBus {
	listeners: RwLock<Vec<Arc<dyn ProtectionListener>>>,
}

impl ListenerBus {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn subscribe(&self, listener: Arc<dyn ProtectionListener>) {
		let mut listeners = self
			.listeners
			.write()
			.unwrap_or_else(|poisoned| poisoned.into_inner());
		debug!(listener = listener.name(), "listener subscribed");
		listeners.push(listener);
	}

	pub fn listener_count(&self) -> usize {
		self.snapshot().len()
	}

	/// Delivers `event` to every listener. Returns the number that failed.
	#[instrument(skip(self, event), fields(event_type = event.event_type()))]
	pub async fn publish(&self, event: &ProtectionEvent) -> usize {
		let mut failures = 0;
		for listener in self.snapshot() {
			if let Err(e) = listener.on_event(event).await {
				failures += 1;
				warn!(listener = listener.name(), error = %e, "protection listener failed");
			}
		}
		failures
	}

	fn snapshot(&self) -> Vec<Arc<dyn ProtectionListener>> {
		self.listeners
			.read()
			.unwrap_or_else(|poisoned| poisoned.into_inner())
			.clone()
	}
}

/// Discards Init drafts of an (app, env) when its protection is turned off.
pub struct DraftDiscardListener {
	store: Arc<dyn DraftStore>,
	system_user: UserId,
}

impl DraftDiscardListener {
	pub fn new(store: Arc<dyn DraftStore>, system_user: UserId) -> Self {
		Self { store, system_user }
	}
}

#[async_trait]
impl ProtectionListener for DraftDiscardListener {
	fn name(&self) -> &str {
		"draft-discard"
	}

	async fn on_event(&self, event: &ProtectionEvent) -> Result<(), ListenerError> {
		let ProtectionEvent::Changed(change) = event;
		if change.new_state != ProtectionState::Disabled {
			return Ok(());
		}
		let discarded = self
			.store
			.discard_pending(change.app_id, change.env_id, self.system_user)
			.await?;
		info!(
			app_id = %change.app_id,
			env_id = %change.env_id,
			discarded = discarded.len(),
			"protection disabled, pending drafts discarded"
		);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use keel_drafts_core::{AppId, EnvId, ProtectionChanged};
	use std::sync::Mutex;

	struct Recording {
		name: &'static str,
		log: Arc<Mutex<Vec<&'static str>>>,
		fail: bool,
	}

	#[async_trait]
	impl ProtectionListener for Recording {
		fn name(&self) -> &str {
			self.name
		}

		async fn on_event(&self, _event: &ProtectionEvent) -> Result<(), ListenerError> {
			self.log.lock().unwrap().push(self.name);
			if self.fail {
				Err(ListenerError::Failed("boom".to_string()))
			} else {
				Ok(())
			}
		}
	}

	fn event() -> ProtectionEvent {
		ProtectionEvent::Changed(ProtectionChanged {
			app_id: AppId(1),
			env_id: EnvId(2),
			new_state: ProtectionState::Disabled,
			user_id: UserId(3),
		})
	}

	#[tokio::test]
	async fn delivers_in_subscription_order_past_failures() {
		let log = Arc::new(Mutex::new(Vec::new()));
		let bus = ListenerBus::new();
		for (name, fail) in [("first", false), ("broken", true), ("last", false)] {
			bus.subscribe(Arc::new(Recording {
				name,
				log: Arc::clone(&log),
				fail,
			}));
		}

		let failures = bus.publish(&event()).await;
		assert_eq!(failures, 1);
		assert_eq!(*log.lock().unwrap(), vec!["first", "broken", "last"]);
	}

	#[tokio::test]
	async fn publish_with_no_listeners_is_noop() {
		let bus = ListenerBus::new();
		assert_eq!(bus.listener_count(), 0);
		assert_eq!(bus.publish(&event()).await, 0);
	}

	#[tokio::test]
	async fn subscribe_while_publishing_from_other_tasks() {
		let bus = Arc::new(ListenerBus::new());
		let log = Arc::new(Mutex::new(Vec::new()));
		let mut handles = Vec::new();
		for _ in 0..8 {
			let bus = Arc::clone(&bus);
			let log = Arc::clone(&log);
			handles.push(tokio::spawn(async move {
				bus.subscribe(Arc::new(Recording {
					name: "concurrent",
					log,
					fail: false,
				}));
				bus.publish(&event()).await
			}));
		}
		for handle in handles {
			assert_eq!(handle.await.unwrap(), 0);
		}
		assert_eq!(bus.listener_count(), 8);
	}
}
