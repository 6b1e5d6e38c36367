// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! YAML codec for bundle payloads

use super::TypeSet;
use crate::error::{ConvoyError, Result};
use crate::types::ManifestObject;
use kube::api::DynamicObject;
use serde::Deserialize;
use serde_json::Value;

/// Metadata fields owned by the API server that must not travel in a bundle
const SERVER_MANAGED_METADATA: &[&str] = &[
    "resourceVersion",
    "uid",
    "creationTimestamp",
    "deletionTimestamp",
    "deletionGracePeriodSeconds",
    "managedFields",
    "generation",
    "selfLink",
];

/// Remove server-managed metadata from a serialized object
pub(crate) fn strip_server_managed(value: &mut Value) {
    if let Some(metadata) = value.get_mut("metadata").and_then(Value::as_object_mut) {
        for field in SERVER_MANAGED_METADATA {
            metadata.remove(*field);
        }
    }
}

/// Encodes objects of one type set to YAML documents and back
pub struct Codec<'a> {
    types: &'a TypeSet,
}

impl<'a> Codec<'a> {
    pub(super) fn new(types: &'a TypeSet) -> Self {
        Self { types }
    }

    /// Encode one object as a single YAML document.
    ///
    /// Keys are emitted in sorted order, so equal objects encode to equal bytes.
    pub fn encode(&self, object: &ManifestObject) -> Result<String> {
        if let Err(e) = self.types.lookup(object.gvk()) {
            return Err(ConvoyError::Encoding {
                object: object.key().to_string(),
                message: e.to_string(),
            });
        }

        let mut value = object.to_value()?;
        strip_server_managed(&mut value);
        if let Some(map) = value.as_object_mut() {
            map.remove("status");
        }

        serde_yaml::to_string(&value).map_err(|e| ConvoyError::Encoding {
            object: object.key().to_string(),
            message: e.to_string(),
        })
    }

    /// Decode a multi-document YAML payload, preserving document order
    pub fn decode(&self, payload: &[u8]) -> Result<Vec<ManifestObject>> {
        let mut objects = Vec::new();
        if payload.iter().all(u8::is_ascii_whitespace) {
            return Ok(objects);
        }

        for document in serde_yaml::Deserializer::from_slice(payload) {
            let value = Value::deserialize(document)
                .map_err(|e| ConvoyError::Decoding(e.to_string()))?;
            if value.is_null() {
                continue;
            }

            let dynamic: DynamicObject =
                serde_json::from_value(value).map_err(|e| ConvoyError::Decoding(e.to_string()))?;
            let object = ManifestObject::from_dynamic(dynamic)?;
            self.types.lookup(object.gvk())?;
            objects.push(object);
        }

        Ok(objects)
    }
}
