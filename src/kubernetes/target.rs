// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! kube-rs backed cluster handle

use super::{ObjectReader, ObjectWriter, PropagationPolicy};
use crate::error::{ConvoyError, Result};
use crate::registry::{ClusterRole, TypeSet};
use crate::types::{Gvk, ManifestObject, ObjectKey};
use async_trait::async_trait;
use kube::api::{Api, DynamicObject, ListParams, PostParams};
use kube::Client;
use std::sync::Arc;
use tracing::{debug, instrument};

/// A cluster API client bound to the type set of the cluster's role.
///
/// Kinds outside the type set are rejected before any request is sent.
#[derive(Clone)]
pub struct KubeTarget {
    client: Client,
    types: Arc<TypeSet>,
}

impl KubeTarget {
    pub fn new(client: Client, types: Arc<TypeSet>) -> Self {
        Self { client, types }
    }

    pub fn role(&self) -> ClusterRole {
        self.types.role()
    }

    fn api(&self, gvk: &Gvk, namespace: Option<&str>) -> Result<Api<DynamicObject>> {
        let entry = self.types.lookup(gvk)?;
        let api = match (entry.namespaced, namespace) {
            (true, Some(ns)) => Api::namespaced_with(self.client.clone(), ns, &entry.resource),
            _ => Api::all_with(self.client.clone(), &entry.resource),
        };
        Ok(api)
    }

    fn api_for(&self, key: &ObjectKey) -> Result<Api<DynamicObject>> {
        let entry = self.types.lookup(&key.gvk)?;
        if entry.namespaced && key.namespace.is_none() {
            return Err(ConvoyError::MissingNamespace(key.clone()));
        }
        self.api(&key.gvk, key.namespace.as_deref())
    }
}

#[async_trait]
impl ObjectReader for KubeTarget {
    #[instrument(skip(self), fields(object = %key))]
    async fn get(&self, key: &ObjectKey) -> Result<Option<ManifestObject>> {
        let api = self.api_for(key)?;
        let object = api
            .get_opt(&key.name)
            .await
            .map_err(|e| ConvoyError::from_api(e, key))?;
        Ok(object.map(|o| ManifestObject::new(key.gvk.clone(), o)))
    }

    #[instrument(skip(self), fields(kind = %gvk))]
    async fn list(
        &self,
        gvk: &Gvk,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<ManifestObject>> {
        let api = self.api(gvk, namespace)?;
        let mut params = ListParams::default();
        if let Some(selector) = label_selector {
            params = params.labels(selector);
        }

        let list = api.list(&params).await?;
        debug!("Listed {} objects", list.items.len());

        Ok(list
            .items
            .into_iter()
            .map(|o| ManifestObject::new(gvk.clone(), o))
            .collect())
    }
}

#[async_trait]
impl ObjectWriter for KubeTarget {
    #[instrument(skip(self, object), fields(object = %object.key()))]
    async fn create(&self, object: &ManifestObject) -> Result<ManifestObject> {
        let key = object.key();
        let api = self.api_for(&key)?;
        let created = api
            .create(&PostParams::default(), object.object())
            .await
            .map_err(|e| ConvoyError::from_api(e, &key))?;
        Ok(ManifestObject::new(key.gvk, created))
    }

    #[instrument(skip(self, object), fields(object = %object.key()))]
    async fn update(&self, object: &ManifestObject) -> Result<ManifestObject> {
        let key = object.key();
        let api = self.api_for(&key)?;
        let updated = api
            .replace(&key.name, &PostParams::default(), object.object())
            .await
            .map_err(|e| ConvoyError::from_api(e, &key))?;
        Ok(ManifestObject::new(key.gvk, updated))
    }

    #[instrument(skip(self), fields(object = %key))]
    async fn delete(&self, key: &ObjectKey, propagation: PropagationPolicy) -> Result<()> {
        let api = self.api_for(key)?;
        api.delete(&key.name, &propagation.delete_params())
            .await
            .map_err(|e| ConvoyError::from_api(e, key))?;
        Ok(())
    }
}
