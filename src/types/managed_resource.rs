// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// Bundle record consumed by the remote resource agent.
///
/// The spec is written by this crate; the status block belongs to the agent and is
/// only ever read.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[kube(group = "resources.gardener.cloud", version = "v1alpha1", kind = "ManagedResource")]
#[kube(namespaced)]
#[kube(status = "ManagedResourceStatus")]
#[serde(rename_all = "camelCase")]
pub struct ManagedResourceSpec {
    /// Agent class responsible for this bundle; none means the fleet member agent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    /// Secrets carrying the payload, in concatenation order
    #[serde(default)]
    pub secret_refs: Vec<SecretReference>,
    /// Keep objects on the target when they disappear from the bundle
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_objects: Option<bool>,
    /// Overwrite changes made to the objects by other actors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_overwrite: Option<bool>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, schemars::JsonSchema)]
pub struct SecretReference {
    pub name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManagedResourceStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<Condition>>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Condition types written by the remote agent
pub mod conditions {
    pub const RESOURCES_APPLIED: &str = "ResourcesApplied";
    pub const RESOURCES_HEALTHY: &str = "ResourcesHealthy";
    pub const RESOURCES_PROGRESSING: &str = "ResourcesProgressing";
}

/// Convergence state of a bundle as reported by the remote agent
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BundlePhase {
    /// Written, not yet observed by the agent
    Pending,
    Progressing,
    Reconciled,
    Error(String),
}

impl ManagedResource {
    fn condition(&self, condition_type: &str) -> Option<&Condition> {
        self.status
            .as_ref()
            .and_then(|s| s.conditions.as_ref())
            .and_then(|conditions| {
                conditions
                    .iter()
                    .find(|c| c.condition_type == condition_type)
            })
    }

    /// Whether the agent has seen the current generation of the spec
    pub fn is_observed(&self) -> bool {
        let observed = self.status.as_ref().and_then(|s| s.observed_generation);
        match (observed, self.metadata.generation) {
            (Some(observed), Some(generation)) => observed >= generation,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    pub fn phase(&self) -> BundlePhase {
        if !self.is_observed() {
            return BundlePhase::Pending;
        }

        for condition_type in [conditions::RESOURCES_APPLIED, conditions::RESOURCES_HEALTHY] {
            if let Some(c) = self.condition(condition_type) {
                if c.status == "False" {
                    let message = c
                        .message
                        .clone()
                        .unwrap_or_else(|| format!("{} is False", condition_type));
                    return BundlePhase::Error(message);
                }
            }
        }

        if self
            .condition(conditions::RESOURCES_PROGRESSING)
            .is_some_and(|c| c.status == "True")
        {
            return BundlePhase::Progressing;
        }

        let is_true = |t: &str| self.condition(t).is_some_and(|c| c.status == "True");
        if is_true(conditions::RESOURCES_APPLIED) && is_true(conditions::RESOURCES_HEALTHY) {
            BundlePhase::Reconciled
        } else {
            BundlePhase::Progressing
        }
    }

    pub fn secret_names(&self) -> Vec<String> {
        self.spec.secret_refs.iter().map(|r| r.name.clone()).collect()
    }
}
