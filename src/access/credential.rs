// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Scoped access credential: a secret carrying a minimal kubeconfig whose
//! bearer token is filled in later by the token requestor.

use crate::constants::{access, annotations, labels};
use crate::error::{ConvoyError, Result};
use crate::types::ManifestObject;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
struct KubeconfigFile {
    #[serde(rename = "apiVersion")]
    api_version: String,
    kind: String,
    clusters: Vec<NamedCluster>,
    contexts: Vec<NamedContext>,
    #[serde(rename = "current-context")]
    current_context: String,
    users: Vec<NamedUser>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
struct NamedCluster {
    name: String,
    cluster: ClusterEntry,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
struct ClusterEntry {
    server: String,
    #[serde(rename = "certificate-authority-data")]
    certificate_authority_data: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
struct NamedContext {
    name: String,
    context: ContextEntry,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
struct ContextEntry {
    cluster: String,
    user: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
struct NamedUser {
    name: String,
    user: UserEntry,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
struct UserEntry {
    #[serde(default)]
    token: String,
}

impl KubeconfigFile {
    fn parse(bytes: &[u8]) -> Result<Self> {
        serde_yaml::from_slice(bytes)
            .map_err(|e| ConvoyError::KubeconfigError(format!("Failed to parse kubeconfig: {}", e)))
    }

    fn render(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| ConvoyError::KubeconfigError(format!("Failed to render kubeconfig: {}", e)))
    }

    fn token(&self) -> Option<&str> {
        self.users
            .first()
            .map(|u| u.user.token.as_str())
            .filter(|t| !t.is_empty())
    }
}

/// Access to one cluster for one service account, bound to the cluster CA
#[derive(Clone, Debug, PartialEq)]
pub struct ScopedAccessCredential {
    pub secret_name: String,
    /// Namespace of the secret on the management cluster
    pub namespace: String,
    pub service_account_name: String,
    pub service_account_namespace: String,
    pub server: String,
    pub ca_bundle: Vec<u8>,
    /// Empty until the token requestor issues one
    pub token: String,
}

impl ScopedAccessCredential {
    /// Credential for service account `name` in `kube-system`, stored as
    /// `shoot-access-<name>` in `namespace`
    pub fn new(name: &str, namespace: &str, server: &str, ca_bundle: Vec<u8>) -> Self {
        Self {
            secret_name: format!("{}{}", access::SECRET_NAME_PREFIX, name),
            namespace: namespace.to_string(),
            service_account_name: name.to_string(),
            service_account_namespace: access::SERVICE_ACCOUNT_NAMESPACE.to_string(),
            server: server.to_string(),
            ca_bundle,
            token: String::new(),
        }
    }

    /// Minimal kubeconfig with one cluster, one user and one context, all named
    /// after the secret's namespace
    pub fn kubeconfig(&self) -> Result<String> {
        let name = self.namespace.clone();
        KubeconfigFile {
            api_version: "v1".to_string(),
            kind: "Config".to_string(),
            clusters: vec![NamedCluster {
                name: name.clone(),
                cluster: ClusterEntry {
                    server: self.server.clone(),
                    certificate_authority_data: STANDARD.encode(&self.ca_bundle),
                },
            }],
            contexts: vec![NamedContext {
                name: name.clone(),
                context: ContextEntry {
                    cluster: name.clone(),
                    user: name.clone(),
                },
            }],
            current_context: name.clone(),
            users: vec![NamedUser {
                name,
                user: UserEntry {
                    token: self.token.clone(),
                },
            }],
        }
        .render()
    }

    pub fn to_secret(&self) -> Result<Secret> {
        Ok(Secret {
            metadata: ObjectMeta {
                name: Some(self.secret_name.clone()),
                namespace: Some(self.namespace.clone()),
                labels: Some(BTreeMap::from([(
                    labels::PURPOSE.to_string(),
                    labels::PURPOSE_TOKEN_REQUESTOR.to_string(),
                )])),
                annotations: Some(BTreeMap::from([
                    (
                        annotations::SERVICE_ACCOUNT_NAME.to_string(),
                        self.service_account_name.clone(),
                    ),
                    (
                        annotations::SERVICE_ACCOUNT_NAMESPACE.to_string(),
                        self.service_account_namespace.clone(),
                    ),
                ])),
                ..Default::default()
            },
            data: Some(BTreeMap::from([(
                access::DATA_KEY_KUBECONFIG.to_string(),
                ByteString(self.kubeconfig()?.into_bytes()),
            )])),
            type_: Some("Opaque".to_string()),
            ..Default::default()
        })
    }

    pub fn to_manifest(&self) -> Result<ManifestObject> {
        ManifestObject::from_resource(&self.to_secret()?)
    }
}

/// Keep the bearer token the token requestor wrote into a credential secret,
/// both under the `token` key and inside the kubeconfig.
///
/// A stored kubeconfig that cannot be read is left as it is.
pub fn merge_access_secret(desired: &mut ManifestObject, current: &ManifestObject) {
    if let Err(e) = preserve_token(desired, current) {
        warn!("Keeping stored credential data of {}: {}", current.key(), e);
        if let Err(e) = keep_stored_data(desired, current) {
            warn!("Failed to keep stored credential data of {}: {}", current.key(), e);
        }
    }
}

fn keep_stored_data(desired: &mut ManifestObject, current: &ManifestObject) -> Result<()> {
    let current_data = current.to_resource::<Secret>()?.data.unwrap_or_default();
    let mut secret = desired.to_resource::<Secret>()?;
    let data = secret.data.get_or_insert_with(BTreeMap::new);

    for key in [access::DATA_KEY_KUBECONFIG, access::DATA_KEY_TOKEN] {
        match current_data.get(key) {
            Some(value) => data.insert(key.to_string(), value.clone()),
            None => data.remove(key),
        };
    }

    *desired = ManifestObject::from_resource(&secret)?;
    Ok(())
}

fn preserve_token(desired: &mut ManifestObject, current: &ManifestObject) -> Result<()> {
    let current_data = current.to_resource::<Secret>()?.data.unwrap_or_default();
    let mut secret = desired.to_resource::<Secret>()?;
    let data = secret.data.get_or_insert_with(BTreeMap::new);

    if let Some(token) = current_data.get(access::DATA_KEY_TOKEN) {
        data.entry(access::DATA_KEY_TOKEN.to_string())
            .or_insert_with(|| token.clone());
    }

    let issued = match current_data.get(access::DATA_KEY_KUBECONFIG) {
        Some(kubeconfig) => KubeconfigFile::parse(&kubeconfig.0)?
            .token()
            .map(str::to_string),
        None => None,
    };

    if let (Some(token), Some(kubeconfig)) = (issued, data.get_mut(access::DATA_KEY_KUBECONFIG)) {
        let mut parsed = KubeconfigFile::parse(&kubeconfig.0)?;
        if parsed.token().is_none() {
            for user in &mut parsed.users {
                user.user.token = token.clone();
            }
            *kubeconfig = ByteString(parsed.render()?.into_bytes());
        }
    }

    *desired = ManifestObject::from_resource(&secret)?;
    Ok(())
}
