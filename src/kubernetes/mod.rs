// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Cluster API access: narrow read/write capabilities and their kube-rs implementation.

pub mod crd;
pub mod target;

pub use crd::wait_for_managed_resource_crd;
pub use target::KubeTarget;

use crate::constants::grace;
use crate::error::Result;
use crate::types::{Gvk, ManifestObject, ObjectKey};
use async_trait::async_trait;
use kube::api::DeleteParams;

/// Read access to objects on one cluster
#[async_trait]
pub trait ObjectReader: Send + Sync {
    /// Fetch an object; `None` when it does not exist
    async fn get(&self, key: &ObjectKey) -> Result<Option<ManifestObject>>;

    /// List objects of one kind, optionally restricted to a namespace and a label selector
    async fn list(
        &self,
        gvk: &Gvk,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<ManifestObject>>;
}

/// Write access to objects on one cluster.
///
/// `update` must honour the object's resourceVersion and fail with
/// `ConvoyError::Conflict` when it is stale; `delete` fails with
/// `ConvoyError::NotFound` when the object is absent.
#[async_trait]
pub trait ObjectWriter: Send + Sync {
    async fn create(&self, object: &ManifestObject) -> Result<ManifestObject>;

    async fn update(&self, object: &ManifestObject) -> Result<ManifestObject>;

    async fn delete(&self, key: &ObjectKey, propagation: PropagationPolicy) -> Result<()>;
}

/// How dependents of a deleted object are cleaned up
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PropagationPolicy {
    /// Wait for dependents before the object disappears
    #[default]
    Foreground,
    /// Return once the deletion is accepted
    Background,
}

impl PropagationPolicy {
    pub fn grace_period_seconds(&self) -> u32 {
        match self {
            PropagationPolicy::Foreground => grace::FOREGROUND_SECS,
            PropagationPolicy::Background => grace::BACKGROUND_SECS,
        }
    }

    pub fn delete_params(&self) -> DeleteParams {
        let params = match self {
            PropagationPolicy::Foreground => DeleteParams::foreground(),
            PropagationPolicy::Background => DeleteParams::background(),
        };
        params.grace_period(self.grace_period_seconds())
    }
}
