// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Declarative create / merge-update / delete of single objects against one cluster.

pub mod merge;

pub use merge::{merge_managed_resource, merge_service, merge_service_account};

use crate::context::Context;
use crate::error::Result;
use crate::kubernetes::{ObjectReader, ObjectWriter, PropagationPolicy};
use crate::registry::codec::strip_server_managed;
use crate::retry::{retry_on_conflict, RetryConfig};
use crate::types::{GroupKind, Gvk, ManagedResource, ManifestObject, ObjectKey};
use k8s_openapi::api::core::v1::{Service, ServiceAccount};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info, instrument};

/// Combines the desired object (first argument, mutated in place) with the
/// currently stored one
pub type MergeFunc = fn(&mut ManifestObject, &ManifestObject);

/// Per-call apply options; kinds without a merge function are replaced wholesale
#[derive(Clone, Default)]
pub struct ApplierOptions {
    merge_funcs: HashMap<GroupKind, MergeFunc>,
}

impl ApplierOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options with the merge functions for Service, ServiceAccount and ManagedResource
    pub fn with_default_merge_funcs() -> Self {
        Self::new()
            .with_merge_func(GroupKind::of::<Service>(), merge_service)
            .with_merge_func(GroupKind::of::<ServiceAccount>(), merge_service_account)
            .with_merge_func(GroupKind::of::<ManagedResource>(), merge_managed_resource)
    }

    pub fn with_merge_func(mut self, group_kind: GroupKind, merge: MergeFunc) -> Self {
        self.merge_funcs.insert(group_kind, merge);
        self
    }

    pub fn merge_func(&self, group_kind: &GroupKind) -> Option<MergeFunc> {
        self.merge_funcs.get(group_kind).copied()
    }
}

/// What `apply` did to the target cluster
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    Created,
    Updated,
    /// The stored object already matched; nothing was written
    Unchanged,
}

/// Reconciles desired objects against a cluster through narrow read/write capabilities
#[derive(Clone)]
pub struct Applier<C> {
    client: C,
    retry: RetryConfig,
}

impl<C> Applier<C>
where
    C: ObjectReader + ObjectWriter,
{
    pub fn new(client: C) -> Self {
        Self {
            client,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Create `desired` when absent, otherwise merge it over the stored object and update.
    ///
    /// The whole read-merge-update cycle restarts on a conflict, up to the
    /// configured number of attempts.
    #[instrument(skip(self, ctx, desired, opts), fields(object = %desired.key()))]
    pub async fn apply(
        &self,
        ctx: &Context,
        desired: &ManifestObject,
        opts: &ApplierOptions,
    ) -> Result<ApplyOutcome> {
        let key = desired.key();
        let this = self;

        let outcome = retry_on_conflict(ctx, &self.retry, &key, move || {
            this.apply_once(ctx, desired, opts)
        })
        .await?;

        match outcome {
            ApplyOutcome::Unchanged => debug!("{} is up to date", key),
            outcome => info!("{} {:?}", key, outcome),
        }
        Ok(outcome)
    }

    async fn apply_once(
        &self,
        ctx: &Context,
        desired: &ManifestObject,
        opts: &ApplierOptions,
    ) -> Result<ApplyOutcome> {
        let key = desired.key();

        let Some(current) = ctx.run(self.client.get(&key)).await? else {
            ctx.run(self.client.create(desired)).await?;
            return Ok(ApplyOutcome::Created);
        };

        let mut merged = desired.clone();
        if let Some(merge) = opts.merge_func(&key.gvk.group_kind()) {
            merge(&mut merged, &current);
        }
        merged.object_mut().metadata.resource_version = current.resource_version();

        if is_unchanged(&merged, &current)? {
            return Ok(ApplyOutcome::Unchanged);
        }

        ctx.run(self.client.update(&merged)).await?;
        Ok(ApplyOutcome::Updated)
    }

    /// Delete `object`; an object that is already gone counts as deleted
    pub async fn delete(
        &self,
        ctx: &Context,
        object: &ManifestObject,
        propagation: PropagationPolicy,
    ) -> Result<()> {
        self.delete_key(ctx, &object.key(), propagation).await
    }

    #[instrument(skip(self, ctx), fields(object = %key))]
    pub async fn delete_key(
        &self,
        ctx: &Context,
        key: &ObjectKey,
        propagation: PropagationPolicy,
    ) -> Result<()> {
        match ctx.run(self.client.delete(key, propagation)).await {
            Ok(()) => {
                info!("Deleted {} ({:?})", key, propagation);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug!("{} already absent", key);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Apply objects strictly in the given order, stopping at the first error.
    ///
    /// Objects applied before a failure stay applied.
    pub async fn apply_all(
        &self,
        ctx: &Context,
        objects: &[ManifestObject],
        opts: &ApplierOptions,
    ) -> Result<Vec<ApplyOutcome>> {
        let mut outcomes = Vec::with_capacity(objects.len());
        for object in objects {
            outcomes.push(self.apply(ctx, object, opts).await?);
        }
        Ok(outcomes)
    }

    /// Delete objects strictly in the given order, stopping at the first error
    pub async fn delete_all(
        &self,
        ctx: &Context,
        objects: &[ManifestObject],
        propagation: PropagationPolicy,
    ) -> Result<()> {
        for object in objects {
            self.delete(ctx, object, propagation).await?;
        }
        Ok(())
    }

    pub async fn get(&self, ctx: &Context, key: &ObjectKey) -> Result<Option<ManifestObject>> {
        ctx.run(self.client.get(key)).await
    }

    pub async fn list(
        &self,
        ctx: &Context,
        gvk: &Gvk,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<ManifestObject>> {
        ctx.run(self.client.list(gvk, namespace, label_selector)).await
    }
}

/// Whether submitting `merged` would leave `current` as it is.
///
/// Server-managed metadata is ignored, and so is the stored status when the
/// merged object carries none.
fn is_unchanged(merged: &ManifestObject, current: &ManifestObject) -> Result<bool> {
    let mut merged = merged.to_value()?;
    let mut current = current.to_value()?;
    strip_server_managed(&mut merged);
    strip_server_managed(&mut current);

    if merged.get("status").map_or(true, Value::is_null) {
        for value in [&mut merged, &mut current] {
            if let Some(map) = value.as_object_mut() {
                map.remove("status");
            }
        }
    }

    Ok(merged == current)
}
