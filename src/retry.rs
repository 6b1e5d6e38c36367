// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Bounded retry of optimistic-concurrency conflicts, with exponential backoff and jitter.

use crate::context::Context;
use crate::error::{ConvoyError, Result};
use crate::types::ObjectKey;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Total attempts including the first one; never less than 1
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn with_max_attempts(attempts: u32) -> Self {
        Self {
            max_attempts: attempts,
            ..Default::default()
        }
    }
}

/// Run `operation` until it succeeds, fails with something other than a
/// conflict, or has conflicted `max_attempts` times.
///
/// Sleeps between attempts go through `ctx`, so cancellation stops the loop.
pub async fn retry_on_conflict<F, Fut, T>(
    ctx: &Context,
    config: &RetryConfig,
    key: &ObjectKey,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0u32;
    let mut delay = config.initial_delay;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_conflict() => {
                if attempt >= max_attempts {
                    error!(object = %key, attempt, "Conflict retries exhausted");
                    return Err(ConvoyError::ConflictExceeded {
                        key: key.clone(),
                        attempts: attempt,
                    });
                }

                // 0.5x to 1.5x of the delay
                let jitter = rand::thread_rng().gen_range(0.5..1.5);
                let jittered = Duration::from_secs_f64(delay.as_secs_f64() * jitter);

                warn!(
                    object = %key,
                    attempt,
                    delay_ms = jittered.as_millis() as u64,
                    "Conflict while writing object, retrying"
                );

                ctx.sleep(jittered).await?;

                delay = Duration::from_secs_f64(
                    (delay.as_secs_f64() * config.backoff_multiplier)
                        .min(config.max_delay.as_secs_f64()),
                );
            }
            Err(e) => return Err(e),
        }
    }
}
