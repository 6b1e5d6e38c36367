// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Least-privilege role and binding pairs for a service account

use super::credential::ScopedAccessCredential;
use crate::error::{ConvoyError, Result};
use crate::types::ManifestObject;
use k8s_openapi::api::rbac::v1::{
    ClusterRole, ClusterRoleBinding, PolicyRule, Role, RoleBinding, RoleRef, Subject,
};
use kube::api::ObjectMeta;

const RBAC_GROUP: &str = "rbac.authorization.k8s.io";

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// A rule over `resources` of `api_group`, optionally limited to named objects
pub fn rule(api_group: &str, resources: &[&str], resource_names: &[&str], verbs: &[&str]) -> PolicyRule {
    PolicyRule {
        api_groups: Some(vec![api_group.to_string()]),
        resources: Some(strings(resources)),
        resource_names: (!resource_names.is_empty()).then(|| strings(resource_names)),
        verbs: strings(verbs),
        ..Default::default()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrantScope {
    /// Role and RoleBinding in one namespace
    Namespaced { namespace: String },
    /// ClusterRole and ClusterRoleBinding
    Cluster,
}

/// A role and the binding granting it to one service account
#[derive(Clone, Debug, PartialEq)]
pub struct RbacGrant {
    pub name: String,
    pub scope: GrantScope,
    pub rules: Vec<PolicyRule>,
    pub service_account_name: String,
    pub service_account_namespace: String,
}

impl RbacGrant {
    /// A grant bound to the service account behind `credential`
    pub fn for_credential(name: &str, scope: GrantScope, credential: &ScopedAccessCredential) -> Self {
        Self {
            name: name.to_string(),
            scope,
            rules: Vec::new(),
            service_account_name: credential.service_account_name.clone(),
            service_account_namespace: credential.service_account_namespace.clone(),
        }
    }

    pub fn with_rule(mut self, rule: PolicyRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Check the grant is bounded and bound to the service account of `credential`
    pub fn validate(&self, credential: &ScopedAccessCredential) -> Result<()> {
        if self.service_account_name != credential.service_account_name
            || self.service_account_namespace != credential.service_account_namespace
        {
            return Err(ConvoyError::InvalidGrant(format!(
                "{} binds {}/{} but the credential is for {}/{}",
                self.name,
                self.service_account_namespace,
                self.service_account_name,
                credential.service_account_namespace,
                credential.service_account_name
            )));
        }
        if self.rules.is_empty() {
            return Err(ConvoyError::InvalidGrant(format!("{} has no rules", self.name)));
        }
        for rule in &self.rules {
            let resources = rule.resources.as_deref().unwrap_or_default();
            if resources.is_empty() || rule.verbs.is_empty() {
                return Err(ConvoyError::InvalidGrant(format!(
                    "{} has a rule without resources or verbs",
                    self.name
                )));
            }
            if resources.iter().chain(&rule.verbs).any(|v| v == "*") {
                return Err(ConvoyError::InvalidGrant(format!(
                    "{} has a wildcard rule",
                    self.name
                )));
            }
        }
        Ok(())
    }

    fn metadata(&self) -> ObjectMeta {
        ObjectMeta {
            name: Some(self.name.clone()),
            namespace: match &self.scope {
                GrantScope::Namespaced { namespace } => Some(namespace.clone()),
                GrantScope::Cluster => None,
            },
            ..Default::default()
        }
    }

    fn subjects(&self) -> Option<Vec<Subject>> {
        Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: self.service_account_name.clone(),
            namespace: Some(self.service_account_namespace.clone()),
            ..Default::default()
        }])
    }

    /// The role followed by its binding
    pub fn to_objects(&self) -> Result<Vec<ManifestObject>> {
        let role_ref = |kind: &str| RoleRef {
            api_group: RBAC_GROUP.to_string(),
            kind: kind.to_string(),
            name: self.name.clone(),
        };

        match self.scope {
            GrantScope::Namespaced { .. } => Ok(vec![
                ManifestObject::from_resource(&Role {
                    metadata: self.metadata(),
                    rules: Some(self.rules.clone()),
                })?,
                ManifestObject::from_resource(&RoleBinding {
                    metadata: self.metadata(),
                    role_ref: role_ref("Role"),
                    subjects: self.subjects(),
                })?,
            ]),
            GrantScope::Cluster => Ok(vec![
                ManifestObject::from_resource(&ClusterRole {
                    metadata: self.metadata(),
                    rules: Some(self.rules.clone()),
                    ..Default::default()
                })?,
                ManifestObject::from_resource(&ClusterRoleBinding {
                    metadata: self.metadata(),
                    role_ref: role_ref("ClusterRole"),
                    subjects: self.subjects(),
                })?,
            ]),
        }
    }
}
