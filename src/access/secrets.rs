// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Lookup of secrets owned by the external secrets manager

use crate::context::Context;
use crate::error::Result;
use crate::kubernetes::ObjectReader;
use crate::types::ObjectKey;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
#[cfg(test)]
use mockall::automock;
use std::collections::HashMap;

/// Read access to well-known secrets such as the cluster CA
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SecretsManager: Send + Sync {
    /// The secret called `name`, or `None` when it does not exist
    async fn get(&self, ctx: &Context, name: &str) -> Result<Option<Secret>>;
}

/// Reads secrets from one namespace of a cluster
pub struct NamespaceSecretsManager<R> {
    reader: R,
    namespace: String,
}

impl<R: ObjectReader> NamespaceSecretsManager<R> {
    pub fn new(reader: R, namespace: &str) -> Self {
        Self {
            reader,
            namespace: namespace.to_string(),
        }
    }
}

#[async_trait]
impl<R: ObjectReader> SecretsManager for NamespaceSecretsManager<R> {
    async fn get(&self, ctx: &Context, name: &str) -> Result<Option<Secret>> {
        let key = ObjectKey::namespaced::<Secret>(&self.namespace, name);
        match ctx.run(self.reader.get(&key)).await? {
            Some(object) => Ok(Some(object.to_resource()?)),
            None => Ok(None),
        }
    }
}

/// Fixed in-memory secrets, keyed by name
#[derive(Clone, Debug, Default)]
pub struct StaticSecretsManager {
    secrets: HashMap<String, Secret>,
}

impl StaticSecretsManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(mut self, name: &str, secret: Secret) -> Self {
        self.secrets.insert(name.to_string(), secret);
        self
    }
}

#[async_trait]
impl SecretsManager for StaticSecretsManager {
    async fn get(&self, ctx: &Context, name: &str) -> Result<Option<Secret>> {
        ctx.check()?;
        Ok(self.secrets.get(name).cloned())
    }
}
