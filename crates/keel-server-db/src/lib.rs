// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Database plumbing for the keel server.
//!
//! Repositories live next to their domain logic; this crate owns the pool,
//! the schema, and the shared error type.

pub mod error;
pub mod migrations;
pub mod pool;
pub mod testing;

pub use error::{DbError, Result};
pub use migrations::run_migrations;
pub use pool::{begin_immediate, create_pool, create_pool_with, PoolSettings};
