// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections for keel-server.

pub mod cel;
pub mod database;
pub mod drafts;
pub mod logging;

pub use cel::{CelConfig, CelConfigLayer};
pub use database::{DatabaseConfig, DatabaseConfigLayer};
pub use drafts::{DraftsConfig, DraftsConfigLayer};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
