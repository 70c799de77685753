// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for protected configuration drafts.
//!
//! This crate holds the pure, I/O-free part of the drafts subsystem: typed
//! identifiers, the numeric enumerations persisted at the boundary, draft and
//! protection records, the caller context consumed from the auth layer, and the
//! approval policy. It is shared by the server implementation
//! (`keel-server-drafts`) and the operator binary.
//!
//! # Example
//!
//! ```
//! use keel_drafts_core::{policy, Capabilities, DraftState};
//!
//! let caps = Capabilities {
//!     can_create: true,
//!     ..Default::default()
//! };
//! assert!(policy::can_create(&caps).allow);
//! assert!(DraftState::Init.allows_transition(DraftState::AwaitApproval));
//! assert!(!DraftState::Init.allows_transition(DraftState::Published));
//! ```

pub mod caller;
pub mod draft;
pub mod error;
pub mod ids;
pub mod lock;
pub mod policy;
pub mod protection;
pub mod types;

pub use caller::{
	AuthAction, AuthToken, Authorizer, CallerContext, Capabilities, ResourceClass, ResourceObject,
};
pub use draft::{
	AppendedVersion, CommentsByVersion, CreatedDraft, Draft, DraftComment, DraftDetail,
	DraftSummary, DraftVersion, DraftView, DraftVersionMetadata, NewComment, NewDraft, NewVersion,
	StateChange, VersionMetadata,
};
pub use error::{CoreError, Result};
pub use ids::{AppId, CommentId, DraftId, DraftVersionId, EnvId, UserId};
pub use lock::{LockRule, LockValidation};
pub use policy::{Decision, DecisionReason};
pub use protection::{ProtectionChanged, ProtectionEntry, ProtectionEvent, ProtectionHistoryEntry};
pub use types::{DraftAction, DraftState, ProtectionState, ResourceKind};
