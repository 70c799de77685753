// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::error::{DraftError, Result};

/// Runs `operation` until `deadline`, or `fallback` from now when the caller
/// gave none.
///
/// Expiry drops the future, which rolls back any open transaction.
pub(crate) async fn run_until<T, F>(
	deadline: Option<Instant>,
	fallback: Duration,
	name: &'static str,
	operation: F,
) -> Result<T>
where
	F: Future<Output = Result<T>>,
{
	let deadline = match deadline {
		Some(deadline) => tokio::time::Instant::from_std(deadline),
		None => tokio::time::Instant::now() + fallback,
	};
	match tokio::time::timeout_at(deadline, operation).await {
		Ok(result) => result,
		Err(_) => {
			warn!(operation = name, "deadline exceeded");
			Err(DraftError::Timeout)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn completes_before_deadline() {
		let value = run_until(None, Duration::from_secs(5), "test", async { Ok(7) })
			.await
			.unwrap();
		assert_eq!(value, 7);
	}

	#[tokio::test]
	async fn expired_deadline_is_timeout() {
		let result: Result<()> = run_until(None, Duration::from_millis(10), "test", async {
			tokio::time::sleep(Duration::from_secs(60)).await;
			Ok(())
		})
		.await;
		assert!(matches!(result, Err(DraftError::Timeout)));
	}

	#[tokio::test]
	async fn caller_deadline_in_the_past_times_out() {
		let past = Instant::now();
		let result: Result<()> = run_until(Some(past), Duration::from_secs(60), "test", async {
			tokio::time::sleep(Duration::from_millis(50)).await;
			Ok(())
		})
		.await;
		assert!(matches!(result, Err(DraftError::Timeout)));
	}
}
