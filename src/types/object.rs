// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Object identity and the generic manifest object handled by the applier and the bundle codec.

use crate::error::{ConvoyError, Result};
use kube::api::DynamicObject;
use kube::core::TypeMeta;
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

/// Group, version and kind of an API type. The core group is the empty string.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Gvk {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl Gvk {
    pub fn new(group: &str, version: &str, kind: &str) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            kind: kind.to_string(),
        }
    }

    /// Parse an `apiVersion` string (`v1`, `rbac.authorization.k8s.io/v1`) together with a kind
    pub fn from_api_version(api_version: &str, kind: &str) -> Self {
        match api_version.split_once('/') {
            Some((group, version)) => Self::new(group, version, kind),
            None => Self::new("", api_version, kind),
        }
    }

    /// Gvk of a statically typed resource
    pub fn of<K: Resource<DynamicType = ()>>() -> Self {
        Self::new(&K::group(&()), &K::version(&()), &K::kind(&()))
    }

    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    pub fn group_kind(&self) -> GroupKind {
        GroupKind::new(&self.group, &self.kind)
    }
}

impl fmt::Display for Gvk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, Kind={}", self.api_version(), self.kind)
    }
}

/// Version-independent type key used to dispatch merge functions
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKind {
    pub group: String,
    pub kind: String,
}

impl GroupKind {
    pub fn new(group: &str, kind: &str) -> Self {
        Self {
            group: group.to_string(),
            kind: kind.to_string(),
        }
    }

    pub fn of<K: Resource<DynamicType = ()>>() -> Self {
        Self::new(&K::group(&()), &K::kind(&()))
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}.{}", self.kind, self.group)
        }
    }
}

/// Identity of an object on a target cluster
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub gvk: Gvk,
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn new(gvk: Gvk, namespace: Option<&str>, name: &str) -> Self {
        Self {
            gvk,
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
        }
    }

    /// Key of a namespaced, statically typed resource
    pub fn namespaced<K: Resource<DynamicType = ()>>(namespace: &str, name: &str) -> Self {
        Self::new(Gvk::of::<K>(), Some(namespace), name)
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}", self.gvk.group_kind(), ns, self.name),
            None => write!(f, "{} {}", self.gvk.group_kind(), self.name),
        }
    }
}

/// A desired or observed object together with its type
#[derive(Clone, Debug)]
pub struct ManifestObject {
    gvk: Gvk,
    object: DynamicObject,
}

impl ManifestObject {
    /// Wrap a dynamic object, stamping its type metadata from `gvk`
    pub fn new(gvk: Gvk, mut object: DynamicObject) -> Self {
        object.types = Some(TypeMeta {
            api_version: gvk.api_version(),
            kind: gvk.kind.clone(),
        });
        Self { gvk, object }
    }

    /// Convert any typed resource (k8s-openapi type or custom resource)
    pub fn from_resource<K>(resource: &K) -> Result<Self>
    where
        K: Resource<DynamicType = ()> + Serialize,
    {
        let gvk = Gvk::of::<K>();
        let describe = || {
            format!(
                "{} {}",
                gvk.group_kind(),
                resource.meta().name.as_deref().unwrap_or("<unnamed>")
            )
        };
        let value = serde_json::to_value(resource).map_err(|e| ConvoyError::Encoding {
            object: describe(),
            message: e.to_string(),
        })?;
        let object: DynamicObject =
            serde_json::from_value(value).map_err(|e| ConvoyError::Encoding {
                object: describe(),
                message: e.to_string(),
            })?;
        Ok(Self::new(gvk, object))
    }

    /// Adopt a dynamic object that already carries `apiVersion` and `kind`
    pub fn from_dynamic(object: DynamicObject) -> Result<Self> {
        let Some(types) = object.types.as_ref() else {
            return Err(ConvoyError::Decoding(format!(
                "object {} has no apiVersion/kind",
                object.name_any()
            )));
        };
        let gvk = Gvk::from_api_version(&types.api_version, &types.kind);
        Ok(Self::new(gvk, object))
    }

    /// Convert back into a typed resource
    pub fn to_resource<K: DeserializeOwned>(&self) -> Result<K> {
        let value = self.to_value()?;
        serde_json::from_value(value).map_err(|e| ConvoyError::Decoding(format!("{}: {}", self.key(), e)))
    }

    pub fn to_value(&self) -> Result<serde_json::Value> {
        serde_json::to_value(&self.object).map_err(|e| ConvoyError::Encoding {
            object: self.key().to_string(),
            message: e.to_string(),
        })
    }

    pub fn gvk(&self) -> &Gvk {
        &self.gvk
    }

    pub fn name(&self) -> String {
        self.object.name_any()
    }

    pub fn namespace(&self) -> Option<String> {
        self.object.namespace()
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey {
            gvk: self.gvk.clone(),
            namespace: self.namespace(),
            name: self.name(),
        }
    }

    pub fn resource_version(&self) -> Option<String> {
        self.object.resource_version()
    }

    pub fn object(&self) -> &DynamicObject {
        &self.object
    }

    pub fn object_mut(&mut self) -> &mut DynamicObject {
        &mut self.object
    }

    pub fn into_dynamic(self) -> DynamicObject {
        self.object
    }
}
