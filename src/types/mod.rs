// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Object identity, the generic manifest object and the bundle record type.

pub mod managed_resource;
pub mod object;

pub use managed_resource::{BundlePhase, ManagedResource, ManagedResourceSpec, ManagedResourceStatus};
pub use object::{GroupKind, Gvk, ManifestObject, ObjectKey};
