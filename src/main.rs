// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::Result;
use kube::Client;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use convoy::access::{DependencyWatchdogAccess, NamespaceSecretsManager};
use convoy::applier::Applier;
use convoy::component::Deployer;
use convoy::config::{Action, Config};
use convoy::context::Context;
use convoy::kubernetes::{wait_for_managed_resource_crd, KubeTarget};
use convoy::registry::{ClusterRole, TypeRegistry};
use convoy::retry::RetryConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting convoy");

    let config = Config::from_env()?;
    info!(
        "Configuration loaded: namespace={}, action={:?}, server={}",
        config.namespace, config.action, config.values.server
    );

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    // Ctrl-C aborts both the CRD wait and the reconcile call
    let startup = Context::background();
    let ctx = Context::with_timeout(config.reconcile_timeout);
    {
        let (startup, ctx) = (startup.clone(), ctx.clone());
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling");
                startup.cancel();
                ctx.cancel();
            }
        });
    }

    info!("Waiting for ManagedResource CRD to become available...");
    wait_for_managed_resource_crd(&client, &startup).await?;

    let registry = TypeRegistry::standard();
    let target = KubeTarget::new(client, registry.resolve(ClusterRole::Management)?);
    info!("Reconciling against the {} cluster", target.role());
    let applier = Applier::new(target.clone())
        .with_retry(RetryConfig::with_max_attempts(config.apply_max_attempts));
    let access = DependencyWatchdogAccess::new(
        applier,
        NamespaceSecretsManager::new(target, &config.namespace),
        registry,
        &config.namespace,
        config.values.clone(),
        config.settings.clone(),
    );

    match config.action {
        Action::Deploy => access.deploy(&ctx).await?,
        Action::Destroy => access.destroy(&ctx).await?,
    }

    info!("Finished {:?} in namespace {}", config.action, config.namespace);
    Ok(())
}
