// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Cancellation and deadline handling for calls against a cluster API.

use crate::error::{ConvoyError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Bounds every API call made on behalf of one reconcile invocation.
///
/// Cloning shares the cancellation token; cancelling any clone aborts all
/// in-flight and future calls made through it.
#[derive(Clone, Debug, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled and has no deadline
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fail fast when the context is already done
    pub fn check(&self) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(ConvoyError::ContextCanceled);
        }
        if self.deadline.is_some_and(|d| d <= Instant::now()) {
            return Err(ConvoyError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Run one suspension point under this context.
    ///
    /// The future is dropped, and so aborted, as soon as the token is cancelled
    /// or the deadline passes.
    pub async fn run<F, T>(&self, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check()?;

        let guarded = async {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => Err(ConvoyError::ContextCanceled),
                result = operation => result,
            }
        };

        match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, guarded)
                .await
                .unwrap_or(Err(ConvoyError::DeadlineExceeded)),
            None => guarded.await,
        }
    }

    /// Sleep for `duration`, returning early with an error if the context ends
    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        self.run(async {
            tokio::time::sleep(duration).await;
            Ok(())
        })
        .await
    }
}
