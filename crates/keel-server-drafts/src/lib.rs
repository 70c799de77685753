// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Protected configuration drafts.
//!
//! When protection is enabled for an (app, env), configuration changes are
//! staged as drafts instead of being applied. A draft collects immutable
//! versions and comments, is submitted for review, and is applied through a
//! [`Publisher`] once somebody who did not contribute approves it.
//!
//! # Components
//!
//! - [`DraftStore`]: SQLite persistence of drafts, versions, comments and the
//!   state audit trail.
//! - [`ProtectionRegistry`]: protection state per (app, env); changes are fanned
//!   out over a [`ListenerBus`]. [`DraftDiscardListener`] discards pending
//!   drafts when protection is turned off.
//! - [`DraftService`]: the lifecycle operations, authorization and redaction.
//! - [`LockValidator`]: reports locked keys a draft would change, selecting
//!   rules with CEL expressions.

pub(crate) mod deadline;
pub mod error;
pub mod listener;
pub mod lock;
pub mod protection;
pub mod publisher;
mod rows;
pub mod service;
pub mod store;
pub mod validator;

pub use error::{DraftError, ErrorKind, Result};
pub use listener::{DraftDiscardListener, ListenerBus, ListenerError, ProtectionListener};
pub use lock::{
	LockRuleError, LockRuleSource, LockTarget, LockTargetSource, LockValidator, StaticLockRules,
	StaticLockTarget,
};
pub use protection::{ProtectionRegistry, ProtectionStore, SqliteProtectionRepository};
pub use publisher::{
	ConfigApplier, ConfigScope, KindRoutedPublisher, PublishError, PublishRequest, Publisher,
};
pub use service::{AddVersionRequest, CreateDraftRequest, DraftService};
pub use store::{DraftStore, SqliteDraftStore};
pub use validator::{ConfigValidator, JsonPayloadValidator, ValidatorError};
