// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Cluster type registry: which API types are valid for which kind of cluster.
//!
//! A [`TypeRegistry`] is built once at startup and shared by reference. Each
//! [`TypeSet`] knows how to address its kinds on a cluster (plural and scope) and
//! supplies the [`Codec`] used to write bundle payloads.

pub mod codec;

pub use codec::Codec;

use crate::error::{ConvoyError, Result};
use crate::types::{Gvk, ManagedResource};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::coordination::v1::Lease;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret, Service, ServiceAccount};
use k8s_openapi::api::rbac::v1 as rbac;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use k8s_openapi::kube_aggregator::pkg::apis::apiregistration::v1::APIService;
use kube::discovery::ApiResource;
use kube::Resource;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// The logical role a cluster plays in the fleet
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClusterRole {
    /// Control-plane cluster hosting this process
    Management,
    /// Cluster where tenant workloads run
    FleetMember,
    /// Customer-facing API surface
    Tenant,
    Auxiliary,
}

impl fmt::Display for ClusterRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClusterRole::Management => "management",
            ClusterRole::FleetMember => "fleet-member",
            ClusterRole::Tenant => "tenant",
            ClusterRole::Auxiliary => "auxiliary",
        };
        f.write_str(name)
    }
}

/// How to address one kind on a cluster
#[derive(Clone, Debug)]
pub struct TypeEntry {
    pub resource: ApiResource,
    pub namespaced: bool,
}

/// The kinds valid for one cluster role
#[derive(Clone, Debug)]
pub struct TypeSet {
    role: ClusterRole,
    entries: BTreeMap<Gvk, TypeEntry>,
}

impl TypeSet {
    pub fn builder(role: ClusterRole) -> TypeSetBuilder {
        TypeSetBuilder {
            role,
            entries: BTreeMap::new(),
        }
    }

    pub fn role(&self) -> ClusterRole {
        self.role
    }

    pub fn lookup(&self, gvk: &Gvk) -> Result<&TypeEntry> {
        self.entries
            .get(gvk)
            .ok_or_else(|| ConvoyError::UnsupportedKind {
                kind: gvk.to_string(),
                role: self.role,
            })
    }

    pub fn contains(&self, gvk: &Gvk) -> bool {
        self.entries.contains_key(gvk)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &Gvk> {
        self.entries.keys()
    }

    pub fn codec(&self) -> Codec<'_> {
        Codec::new(self)
    }
}

pub struct TypeSetBuilder {
    role: ClusterRole,
    entries: BTreeMap<Gvk, TypeEntry>,
}

impl TypeSetBuilder {
    pub fn namespaced<K: Resource<DynamicType = ()>>(self) -> Self {
        self.insert::<K>(true)
    }

    pub fn cluster_scoped<K: Resource<DynamicType = ()>>(self) -> Self {
        self.insert::<K>(false)
    }

    fn insert<K: Resource<DynamicType = ()>>(mut self, namespaced: bool) -> Self {
        self.entries.insert(
            Gvk::of::<K>(),
            TypeEntry {
                resource: ApiResource::erase::<K>(&()),
                namespaced,
            },
        );
        self
    }

    pub fn build(self) -> TypeSet {
        TypeSet {
            role: self.role,
            entries: self.entries,
        }
    }
}

fn with_core(builder: TypeSetBuilder) -> TypeSetBuilder {
    builder
        .namespaced::<Secret>()
        .namespaced::<ConfigMap>()
        .namespaced::<Service>()
        .namespaced::<ServiceAccount>()
        .cluster_scoped::<Namespace>()
}

fn with_rbac(builder: TypeSetBuilder) -> TypeSetBuilder {
    builder
        .namespaced::<rbac::Role>()
        .namespaced::<rbac::RoleBinding>()
        .cluster_scoped::<rbac::ClusterRole>()
        .cluster_scoped::<rbac::ClusterRoleBinding>()
}

fn with_workloads(builder: TypeSetBuilder) -> TypeSetBuilder {
    builder
        .namespaced::<Deployment>()
        .namespaced::<StatefulSet>()
        .namespaced::<DaemonSet>()
        .namespaced::<Lease>()
}

/// Immutable mapping from cluster role to type set
#[derive(Clone, Debug, Default)]
pub struct TypeRegistry {
    sets: HashMap<ClusterRole, Arc<TypeSet>>,
}

impl TypeRegistry {
    pub fn builder() -> TypeRegistryBuilder {
        TypeRegistryBuilder::default()
    }

    /// The registry used by the control plane
    pub fn standard() -> Self {
        let management = with_workloads(with_rbac(with_core(TypeSet::builder(
            ClusterRole::Management,
        ))))
        .namespaced::<ManagedResource>()
        .build();

        let fleet_member = with_workloads(with_rbac(with_core(TypeSet::builder(
            ClusterRole::FleetMember,
        ))))
        .cluster_scoped::<CustomResourceDefinition>()
        .cluster_scoped::<APIService>()
        .build();

        let tenant = with_rbac(with_core(TypeSet::builder(ClusterRole::Tenant))).build();
        let auxiliary = with_core(TypeSet::builder(ClusterRole::Auxiliary)).build();

        Self::builder()
            .register(management)
            .register(fleet_member)
            .register(tenant)
            .register(auxiliary)
            .build()
    }

    pub fn resolve(&self, role: ClusterRole) -> Result<Arc<TypeSet>> {
        self.sets
            .get(&role)
            .cloned()
            .ok_or(ConvoyError::UnknownRole(role))
    }
}

#[derive(Default)]
pub struct TypeRegistryBuilder {
    sets: HashMap<ClusterRole, Arc<TypeSet>>,
}

impl TypeRegistryBuilder {
    /// Register a set under its own role, replacing an earlier registration
    pub fn register(mut self, set: TypeSet) -> Self {
        self.sets.insert(set.role(), Arc::new(set));
        self
    }

    pub fn build(self) -> TypeRegistry {
        TypeRegistry { sets: self.sets }
    }
}
