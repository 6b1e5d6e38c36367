// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Scoped access for the dependency watchdog probe.
//!
//! Deploy writes the probe's credential secret to the management cluster and
//! hands the lease RBAC it needs on the fleet member off to the remote agent
//! as a managed-resource bundle.

pub mod credential;
pub mod rbac;
pub mod secrets;

pub use credential::{merge_access_secret, ScopedAccessCredential};
pub use rbac::{rule, GrantScope, RbacGrant};
pub use secrets::{NamespaceSecretsManager, SecretsManager, StaticSecretsManager};

use crate::applier::{Applier, ApplierOptions};
use crate::component::Deployer;
use crate::constants::{access, defaults};
use crate::context::Context;
use crate::error::{ConvoyError, Result};
use crate::kubernetes::{ObjectReader, ObjectWriter, PropagationPolicy};
use crate::managedresources::{self, serialize};
use crate::registry::{ClusterRole, TypeRegistry};
use crate::types::{GroupKind, ObjectKey};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use std::time::Duration;
use tracing::{info, instrument};
use url::Url;

/// Inputs of the probe's access
#[derive(Clone, Debug, PartialEq)]
pub struct AccessValues {
    /// In-cluster address of the fleet member's API server, kept as given
    pub server: String,
    pub probe_interval: Duration,
    pub watch_duration: Duration,
    pub kcm_node_monitor_grace: Duration,
}

impl AccessValues {
    /// Values for `server`, which must be an absolute https URL with a host
    pub fn new(server: &str) -> Result<Self> {
        let url = Url::parse(server)
            .map_err(|e| ConvoyError::InvalidAccessValues(format!("server {:?}: {}", server, e)))?;
        if url.scheme() != "https" {
            return Err(ConvoyError::InvalidAccessValues(format!(
                "server {:?} must use https",
                server
            )));
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(ConvoyError::InvalidAccessValues(format!(
                "server {:?} has no host",
                server
            )));
        }

        Ok(Self {
            server: server.to_string(),
            probe_interval: Duration::from_secs(defaults::PROBE_INTERVAL_SECS),
            watch_duration: Duration::from_secs(defaults::WATCH_DURATION_SECS),
            kcm_node_monitor_grace: Duration::from_secs(defaults::KCM_NODE_MONITOR_GRACE_SECS),
        })
    }
}

/// Names the issuer depends on but does not own
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessSettings {
    pub ca_secret_name: String,
    pub lease_namespace: String,
    /// Name of the lease the probe locks
    pub lease_lock_name: String,
}

impl Default for AccessSettings {
    fn default() -> Self {
        Self {
            ca_secret_name: access::CA_SECRET_NAME.to_string(),
            lease_namespace: access::LEASE_NAMESPACE.to_string(),
            lease_lock_name: access::PROBE_NAME.to_string(),
        }
    }
}

/// Deployer of the dependency watchdog probe's access to a fleet member
pub struct DependencyWatchdogAccess<C, S> {
    applier: Applier<C>,
    secrets_manager: S,
    registry: TypeRegistry,
    namespace: String,
    values: AccessValues,
    settings: AccessSettings,
}

impl<C, S> DependencyWatchdogAccess<C, S>
where
    C: ObjectReader + ObjectWriter,
    S: SecretsManager,
{
    pub fn new(
        applier: Applier<C>,
        secrets_manager: S,
        registry: TypeRegistry,
        namespace: &str,
        values: AccessValues,
        settings: AccessSettings,
    ) -> Self {
        Self {
            applier,
            secrets_manager,
            registry,
            namespace: namespace.to_string(),
            values,
            settings,
        }
    }

    /// The credential for the given CA bundle; token left for the token requestor
    pub fn credential(&self, ca_bundle: Vec<u8>) -> ScopedAccessCredential {
        ScopedAccessCredential::new(access::PROBE_NAME, &self.namespace, &self.values.server, ca_bundle)
    }

    /// Lease access in the lease namespace: creating and listing leases, and
    /// reading and renewing only the probe's lock
    pub fn lease_grant(&self, credential: &ScopedAccessCredential) -> RbacGrant {
        let lock = self.settings.lease_lock_name.as_str();
        RbacGrant::for_credential(
            access::ROLE_NAME,
            GrantScope::Namespaced {
                namespace: self.settings.lease_namespace.clone(),
            },
            credential,
        )
        .with_rule(rule("coordination.k8s.io", &["leases"], &[], &["create", "list"]))
        .with_rule(rule("coordination.k8s.io", &["leases"], &[lock], &["get", "watch", "update"]))
    }

    async fn ca_bundle(&self, ctx: &Context) -> Result<Vec<u8>> {
        let name = &self.settings.ca_secret_name;
        self.secrets_manager
            .get(ctx, name)
            .await?
            .and_then(|secret| secret.data)
            .and_then(|mut data| data.remove(access::DATA_KEY_CERTIFICATE_BUNDLE))
            .map(|bundle| bundle.0)
            .ok_or_else(|| ConvoyError::MissingCa(name.clone()))
    }

    fn credential_key(&self) -> ObjectKey {
        ObjectKey::namespaced::<Secret>(
            &self.namespace,
            &format!("{}{}", access::SECRET_NAME_PREFIX, access::PROBE_NAME),
        )
    }
}

#[async_trait]
impl<C, S> Deployer for DependencyWatchdogAccess<C, S>
where
    C: ObjectReader + ObjectWriter,
    S: SecretsManager,
{
    #[instrument(skip(self, ctx), fields(namespace = %self.namespace))]
    async fn deploy(&self, ctx: &Context) -> Result<()> {
        let credential = self.credential(self.ca_bundle(ctx).await?);

        let secret_options = ApplierOptions::new()
            .with_merge_func(GroupKind::of::<Secret>(), merge_access_secret);
        self.applier
            .apply(ctx, &credential.to_manifest()?, &secret_options)
            .await?;

        let grant = self.lease_grant(&credential);
        grant.validate(&credential)?;

        let fleet_member = self.registry.resolve(ClusterRole::FleetMember)?;
        let payload = serialize(&fleet_member, &grant.to_objects()?)?;
        managedresources::create_for_fleet_member(
            ctx,
            &self.applier,
            &self.namespace,
            access::MANAGED_RESOURCE_NAME,
            false,
            &payload,
        )
        .await?;

        info!("Dependency watchdog probe access deployed");
        Ok(())
    }

    #[instrument(skip(self, ctx), fields(namespace = %self.namespace))]
    async fn destroy(&self, ctx: &Context) -> Result<()> {
        self.applier
            .delete_key(ctx, &self.credential_key(), PropagationPolicy::default())
            .await?;
        managedresources::delete_bundle(ctx, &self.applier, &self.namespace, access::MANAGED_RESOURCE_NAME)
            .await?;

        info!("Dependency watchdog probe access removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::managedresources::record_key;
    use crate::test_utils::FakeCluster;
    use crate::types::{Gvk, ManagedResource, ManifestObject};
    use k8s_openapi::api::rbac::v1::{Role, RoleBinding};
    use k8s_openapi::ByteString;
    use kube::api::ObjectMeta;
    use super::secrets::MockSecretsManager;
    use std::collections::BTreeMap;

    const NAMESPACE: &str = "shoot--foo--bar";
    const SERVER: &str = "https://10.0.0.1:443";
    const CA: &[u8] = b"-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n";

    fn ca_secret() -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some("ca".to_string()),
                namespace: Some(NAMESPACE.to_string()),
                ..Default::default()
            },
            data: Some(BTreeMap::from([("bundle.crt".to_string(), ByteString(CA.to_vec()))])),
            ..Default::default()
        }
    }

    fn management_cluster() -> FakeCluster {
        let types = TypeRegistry::standard().resolve(ClusterRole::Management).unwrap();
        FakeCluster::new().with_types(types)
    }

    fn access<S: SecretsManager>(
        cluster: &FakeCluster,
        secrets_manager: S,
    ) -> DependencyWatchdogAccess<FakeCluster, S> {
        DependencyWatchdogAccess::new(
            Applier::new(cluster.clone()),
            secrets_manager,
            TypeRegistry::standard(),
            NAMESPACE,
            AccessValues::new(SERVER).unwrap(),
            AccessSettings::default(),
        )
    }

    fn with_ca() -> StaticSecretsManager {
        StaticSecretsManager::new().with_secret("ca", ca_secret())
    }

    fn bundle_objects(cluster: &FakeCluster) -> Vec<ManifestObject> {
        let record: ManagedResource = cluster
            .get_object(&record_key(NAMESPACE, "shoot-core-dependency-watchdog"))
            .unwrap()
            .to_resource()
            .unwrap();
        let chunks = record.secret_names();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].starts_with("managedresource-shoot-core-dependency-watchdog-"));

        let secret: Secret = cluster
            .get_object(&ObjectKey::namespaced::<Secret>(NAMESPACE, &chunks[0]))
            .unwrap()
            .to_resource()
            .unwrap();
        let payload = &secret.data.unwrap()["objects.yaml"].0;

        let fleet_member = TypeRegistry::standard().resolve(ClusterRole::FleetMember).unwrap();
        fleet_member.codec().decode(payload).unwrap()
    }

    #[tokio::test]
    async fn test_deploy_issues_credential_and_lease_grant() {
        let cluster = management_cluster();

        access(&cluster, with_ca())
            .deploy(&Context::background())
            .await
            .unwrap();

        let secret: Secret = cluster
            .get_object(&ObjectKey::namespaced::<Secret>(
                NAMESPACE,
                "shoot-access-dependency-watchdog-probe",
            ))
            .unwrap()
            .to_resource()
            .unwrap();
        let kubeconfig = String::from_utf8(secret.data.unwrap()["kubeconfig"].0.clone()).unwrap();
        let kubeconfig: kube::config::Kubeconfig = serde_yaml::from_str(&kubeconfig).unwrap();
        let cluster_entry = kubeconfig.clusters[0].cluster.as_ref().unwrap();
        assert_eq!(cluster_entry.server.as_deref(), Some(SERVER));

        let objects = bundle_objects(&cluster);
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].gvk(), &Gvk::of::<Role>());
        assert_eq!(objects[1].gvk(), &Gvk::of::<RoleBinding>());

        let role: Role = objects[0].to_resource().unwrap();
        assert_eq!(role.metadata.name.as_deref(), Some("gardener.cloud:target:dependency-watchdog"));
        assert_eq!(role.metadata.namespace.as_deref(), Some("kube-node-lease"));
        let rules = role.rules.unwrap();
        let scoped = rules
            .iter()
            .find(|r| r.resource_names.is_some())
            .unwrap();
        assert_eq!(scoped.resources, Some(vec!["leases".to_string()]));
        assert_eq!(
            scoped.resource_names,
            Some(vec!["dependency-watchdog-probe".to_string()])
        );
        assert_eq!(scoped.verbs, vec!["get", "watch", "update"]);

        let binding: RoleBinding = objects[1].to_resource().unwrap();
        let subject = &binding.subjects.unwrap()[0];
        assert_eq!(subject.kind, "ServiceAccount");
        assert_eq!(subject.name, "dependency-watchdog-probe");
        assert_eq!(subject.namespace.as_deref(), Some("kube-system"));
    }

    #[tokio::test]
    async fn test_missing_ca_is_fatal_and_writes_nothing() {
        let cluster = management_cluster();
        let mut secrets_manager = MockSecretsManager::new();
        secrets_manager
            .expect_get()
            .withf(|_, name| name == "ca")
            .times(1)
            .returning(|_, _| Ok(None));

        let err = access(&cluster, secrets_manager)
            .deploy(&Context::background())
            .await
            .unwrap_err();

        assert!(matches!(err, ConvoyError::MissingCa(name) if name == "ca"));
        assert!(cluster.writes().is_empty());
    }

    #[tokio::test]
    async fn test_ca_without_bundle_key_is_missing() {
        let cluster = management_cluster();
        let mut secrets_manager = MockSecretsManager::new();
        secrets_manager.expect_get().returning(|_, _| {
            let mut secret = ca_secret();
            secret.data = Some(BTreeMap::new());
            Ok(Some(secret))
        });

        let err = access(&cluster, secrets_manager)
            .deploy(&Context::background())
            .await
            .unwrap_err();

        assert!(matches!(err, ConvoyError::MissingCa(_)));
    }

    #[tokio::test]
    async fn test_second_deploy_makes_no_writes() {
        let cluster = management_cluster();
        let access = access(&cluster, with_ca());
        let ctx = Context::background();

        access.deploy(&ctx).await.unwrap();
        cluster.clear_writes();
        access.deploy(&ctx).await.unwrap();

        assert!(cluster.writes().is_empty());
    }

    #[tokio::test]
    async fn test_redeploy_keeps_issued_token() {
        let cluster = management_cluster();
        let access = access(&cluster, with_ca());
        let ctx = Context::background();
        access.deploy(&ctx).await.unwrap();

        // token requestor fills in the token
        let mut issued = access.credential(CA.to_vec());
        issued.token = "issued-token".to_string();
        cluster.insert(issued.to_manifest().unwrap());
        cluster.clear_writes();

        access.deploy(&ctx).await.unwrap();

        assert!(cluster.writes().is_empty());
        let stored = cluster.get_object(&access.credential_key()).unwrap();
        assert_eq!(stored.object().data["data"], issued.to_manifest().unwrap().object().data["data"]);
    }

    #[tokio::test]
    async fn test_destroy_on_untouched_namespace() {
        let cluster = management_cluster();

        access(&cluster, with_ca())
            .destroy(&Context::background())
            .await
            .unwrap();

        assert!(cluster.keys().is_empty());
    }

    #[tokio::test]
    async fn test_destroy_removes_everything_deployed() {
        let cluster = management_cluster();
        let access = access(&cluster, with_ca());
        let ctx = Context::background();
        access.deploy(&ctx).await.unwrap();

        access.destroy(&ctx).await.unwrap();

        assert!(cluster.keys().is_empty());
    }

    #[tokio::test]
    async fn test_destroy_stops_at_first_error() {
        let cluster = management_cluster();
        let access = access(&cluster, with_ca());
        let ctx = Context::background();
        access.deploy(&ctx).await.unwrap();
        cluster.fail_writes_to(access.credential_key());

        assert!(access.destroy(&ctx).await.is_err());
        assert!(cluster
            .get_object(&record_key(NAMESPACE, "shoot-core-dependency-watchdog"))
            .is_some());
    }

    #[tokio::test]
    async fn test_cancelled_deploy_writes_nothing() {
        let cluster = management_cluster();
        let ctx = Context::background();
        ctx.cancel();

        let err = access(&cluster, with_ca()).deploy(&ctx).await.unwrap_err();

        assert!(matches!(err, ConvoyError::ContextCanceled));
        assert!(cluster.writes().is_empty());
    }

    #[test]
    fn test_access_values_validation() {
        let values = AccessValues::new(SERVER).unwrap();
        assert_eq!(values.server, SERVER);
        assert_eq!(values.probe_interval, Duration::from_secs(30));
        assert_eq!(values.watch_duration, Duration::from_secs(300));
        assert_eq!(values.kcm_node_monitor_grace, Duration::from_secs(40));

        assert!(AccessValues::new("10.0.0.1:443").is_err());
        assert!(AccessValues::new("http://10.0.0.1").is_err());
        assert!(AccessValues::new("").is_err());
    }
}
