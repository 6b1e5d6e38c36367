// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::context::Context;
use crate::error::Result;
use async_trait::async_trait;

/// A component that can be rolled out to, and removed from, its clusters.
///
/// Both operations are idempotent; callers retry them from their own
/// reconcile loop.
#[async_trait]
pub trait Deployer: Send + Sync {
    async fn deploy(&self, ctx: &Context) -> Result<()>;

    async fn destroy(&self, ctx: &Context) -> Result<()>;
}
