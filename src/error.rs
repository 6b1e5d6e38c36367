// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::registry::ClusterRole;
use crate::types::ObjectKey;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvoyError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("{0} not found")]
    NotFound(ObjectKey),

    #[error("{0} is namespaced but has no namespace")]
    MissingNamespace(ObjectKey),

    #[error("conflict while writing {0}")]
    Conflict(ObjectKey),

    #[error("giving up on {key} after {attempts} conflicting attempts")]
    ConflictExceeded { key: ObjectKey, attempts: u32 },

    #[error("no type set registered for cluster role {0}")]
    UnknownRole(ClusterRole),

    #[error("kind {kind} is not registered for cluster role {role}")]
    UnsupportedKind { kind: String, role: ClusterRole },

    #[error("failed to encode {object}: {message}")]
    Encoding { object: String, message: String },

    #[error("failed to decode object: {0}")]
    Decoding(String),

    #[error("CA secret {0:?} not found")]
    MissingCa(String),

    #[error("secret {0:?} not found")]
    MissingSecret(String),

    #[error("invalid RBAC grant: {0}")]
    InvalidGrant(String),

    #[error("invalid access values: {0}")]
    InvalidAccessValues(String),

    #[error("Failed to build kubeconfig: {0}")]
    KubeconfigError(String),

    #[error("invalid bundle name {name:?}: {message}")]
    InvalidBundleName { name: String, message: String },

    #[error("managed resource {name} is unhealthy: {message}")]
    BundleUnhealthy { name: String, message: String },

    #[error("operation canceled")]
    ContextCanceled,

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl ConvoyError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ConvoyError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ConvoyError::Conflict(_))
    }

    /// Map a kube API error for `key` onto the not-found / conflict taxonomy
    pub fn from_api(err: kube::Error, key: &ObjectKey) -> Self {
        match &err {
            kube::Error::Api(resp) if resp.code == 404 => ConvoyError::NotFound(key.clone()),
            kube::Error::Api(resp) if resp.code == 409 => ConvoyError::Conflict(key.clone()),
            _ => ConvoyError::KubeError(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConvoyError>;
