// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Managed-resource bundles: objects handed off to a remote agent through a
//! `ManagedResource` record and the secrets carrying its payload.
//!
//! Writing a bundle only records intent. Convergence on the target cluster is
//! reported by the agent in the record's status, which this module never writes.

pub mod payload;
pub mod wait;

pub use payload::{serialize, split_chunks, BundlePayload};
pub use wait::wait_until_healthy;

use crate::applier::{merge_managed_resource, Applier, ApplierOptions};
use crate::constants::{bundle, labels};
use crate::context::Context;
use crate::error::{ConvoyError, Result};
use crate::kubernetes::{ObjectReader, ObjectWriter, PropagationPolicy};
use crate::types::managed_resource::SecretReference;
use crate::types::{GroupKind, Gvk, ManagedResource, ManagedResourceSpec, ManifestObject, ObjectKey};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use std::collections::{BTreeMap, HashSet};
use tracing::{info, instrument};

/// Name of the `index`-th payload secret of bundle `name` for the payload
/// with `digest`. Chunks of different payloads never share a name, so a
/// written chunk is never rewritten with other content.
pub fn chunk_secret_name(name: &str, digest: &str, index: usize) -> String {
    format!("{}{}-{}-{}", bundle::SECRET_NAME_PREFIX, name, digest, index)
}

/// Label selector matching every payload secret of bundle `name`
pub fn chunk_selector(name: &str) -> String {
    format!("{}={}", labels::MANAGED_RESOURCE_NAME, name)
}

pub fn record_key(namespace: &str, name: &str) -> ObjectKey {
    ObjectKey::namespaced::<ManagedResource>(namespace, name)
}

/// Bundle names end up as label values on the chunk secrets
fn validate_name(name: &str) -> Result<()> {
    let invalid = |message: &str| {
        Err(ConvoyError::InvalidBundleName {
            name: name.to_string(),
            message: message.to_string(),
        })
    };

    if name.is_empty() {
        return invalid("must not be empty");
    }
    if name.len() > bundle::MAX_NAME_LEN {
        return invalid("must be at most 63 characters");
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return invalid("may only contain alphanumerics, '-', '_' and '.'");
    }
    if !name.starts_with(|c: char| c.is_ascii_alphanumeric())
        || !name.ends_with(|c: char| c.is_ascii_alphanumeric())
    {
        return invalid("must start and end with an alphanumeric character");
    }
    Ok(())
}

/// Options for writing one bundle
#[derive(Clone, Debug)]
pub struct ManagedResourceBuilder {
    namespace: String,
    name: String,
    class: Option<String>,
    keep_objects: bool,
    force_overwrite: bool,
    origin: Option<String>,
    max_chunk_bytes: usize,
}

impl ManagedResourceBuilder {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            class: None,
            keep_objects: false,
            force_overwrite: false,
            origin: None,
            max_chunk_bytes: bundle::MAX_CHUNK_BYTES,
        }
    }

    pub fn class(mut self, class: Option<&str>) -> Self {
        self.class = class.map(str::to_string);
        self
    }

    pub fn keep_objects(mut self, keep_objects: bool) -> Self {
        self.keep_objects = keep_objects;
        self
    }

    pub fn force_overwrite(mut self, force_overwrite: bool) -> Self {
        self.force_overwrite = force_overwrite;
        self
    }

    pub fn origin(mut self, origin: &str) -> Self {
        self.origin = Some(origin.to_string());
        self
    }

    pub fn max_chunk_bytes(mut self, max_chunk_bytes: usize) -> Self {
        self.max_chunk_bytes = max_chunk_bytes;
        self
    }

    fn chunk_secrets(&self, payload: &BundlePayload) -> Result<Vec<ManifestObject>> {
        let digest = payload.digest();
        split_chunks(&payload.to_bytes(), self.max_chunk_bytes)
            .into_iter()
            .enumerate()
            .map(|(index, chunk)| {
                ManifestObject::from_resource(&Secret {
                    metadata: ObjectMeta {
                        name: Some(chunk_secret_name(&self.name, &digest, index)),
                        namespace: Some(self.namespace.clone()),
                        labels: Some(BTreeMap::from([(
                            labels::MANAGED_RESOURCE_NAME.to_string(),
                            self.name.clone(),
                        )])),
                        ..Default::default()
                    },
                    data: Some(BTreeMap::from([(bundle::DATA_KEY.to_string(), ByteString(chunk))])),
                    type_: Some("Opaque".to_string()),
                    ..Default::default()
                })
            })
            .collect()
    }

    fn record(&self, secrets: &[ManifestObject]) -> Result<ManifestObject> {
        let labels = self
            .origin
            .as_ref()
            .map(|origin| BTreeMap::from([(labels::ORIGIN.to_string(), origin.clone())]));

        ManifestObject::from_resource(&ManagedResource {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                namespace: Some(self.namespace.clone()),
                labels,
                ..Default::default()
            },
            spec: ManagedResourceSpec {
                class: self.class.clone(),
                secret_refs: secrets
                    .iter()
                    .map(|s| SecretReference { name: s.name() })
                    .collect(),
                keep_objects: Some(self.keep_objects),
                force_overwrite: self.force_overwrite.then_some(true),
            },
            status: None,
        })
    }

    /// Write the payload secrets, then switch the record over to them, then
    /// drop payload secrets the record no longer references.
    ///
    /// Until the record is written it keeps referencing the previous, untouched
    /// chunks, so a failure midway leaves the agent with the old payload.
    /// Returns once the record is written; convergence is up to the agent.
    #[instrument(skip(self, ctx, applier, payload), fields(bundle = %format!("{}/{}", self.namespace, self.name)))]
    pub async fn reconcile<C>(
        &self,
        ctx: &Context,
        applier: &Applier<C>,
        payload: &BundlePayload,
    ) -> Result<()>
    where
        C: ObjectReader + ObjectWriter,
    {
        validate_name(&self.name)?;
        ctx.check()?;

        let secrets = self.chunk_secrets(payload)?;
        applier.apply_all(ctx, &secrets, &ApplierOptions::new()).await?;

        let record_options = ApplierOptions::new()
            .with_merge_func(GroupKind::of::<ManagedResource>(), merge_managed_resource);
        applier.apply(ctx, &self.record(&secrets)?, &record_options).await?;

        let referenced: HashSet<String> = secrets.iter().map(ManifestObject::name).collect();
        let stale: Vec<ManifestObject> = applier
            .list(
                ctx,
                &Gvk::of::<Secret>(),
                Some(&self.namespace),
                Some(&chunk_selector(&self.name)),
            )
            .await?
            .into_iter()
            .filter(|s| !referenced.contains(&s.name()))
            .collect();
        if !stale.is_empty() {
            info!("Pruning {} stale payload secrets", stale.len());
            applier.delete_all(ctx, &stale, PropagationPolicy::default()).await?;
        }

        info!(
            "Bundle written with {} documents in {} secrets",
            payload.documents().len(),
            secrets.len()
        );
        Ok(())
    }
}

/// Write a bundle for an arbitrary agent class
pub async fn create_for_target<C>(
    ctx: &Context,
    applier: &Applier<C>,
    namespace: &str,
    name: &str,
    class: Option<&str>,
    keep_objects: bool,
    payload: &BundlePayload,
) -> Result<()>
where
    C: ObjectReader + ObjectWriter,
{
    ManagedResourceBuilder::new(namespace, name)
        .class(class)
        .keep_objects(keep_objects)
        .reconcile(ctx, applier, payload)
        .await
}

/// Write a bundle applied by the agent of the fleet member cluster
pub async fn create_for_fleet_member<C>(
    ctx: &Context,
    applier: &Applier<C>,
    namespace: &str,
    name: &str,
    keep_objects: bool,
    payload: &BundlePayload,
) -> Result<()>
where
    C: ObjectReader + ObjectWriter,
{
    ManagedResourceBuilder::new(namespace, name)
        .origin(bundle::ORIGIN)
        .keep_objects(keep_objects)
        .reconcile(ctx, applier, payload)
        .await
}

/// Write a bundle applied by the agent of the management cluster
pub async fn create_for_management<C>(
    ctx: &Context,
    applier: &Applier<C>,
    namespace: &str,
    name: &str,
    keep_objects: bool,
    payload: &BundlePayload,
) -> Result<()>
where
    C: ObjectReader + ObjectWriter,
{
    ManagedResourceBuilder::new(namespace, name)
        .class(Some(bundle::CLASS_MANAGEMENT))
        .keep_objects(keep_objects)
        .reconcile(ctx, applier, payload)
        .await
}

/// Delete the bundle record and its payload secrets.
///
/// The objects the bundle describes are left to the agent, which removes them
/// once the record is gone.
#[instrument(skip(ctx, applier))]
pub async fn delete_bundle<C>(
    ctx: &Context,
    applier: &Applier<C>,
    namespace: &str,
    name: &str,
) -> Result<()>
where
    C: ObjectReader + ObjectWriter,
{
    validate_name(name)?;
    applier
        .delete_key(ctx, &record_key(namespace, name), PropagationPolicy::default())
        .await?;

    let secrets = applier
        .list(ctx, &Gvk::of::<Secret>(), Some(namespace), Some(&chunk_selector(name)))
        .await?;
    applier
        .delete_all(ctx, &secrets, PropagationPolicy::default())
        .await
}
