// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! CRD availability checking utilities

use crate::constants::crd::{POLL_INTERVAL_SECS, POLL_MAX_INTERVAL_SECS};
use crate::context::Context;
use crate::error::Result;
use crate::types::ManagedResource;
use kube::{discovery::Discovery, Client, Resource};
use std::time::Duration;
use tracing::{info, warn};

/// Wait for the ManagedResource CRD to become available in the cluster.
/// This uses exponential backoff starting at POLL_INTERVAL_SECS seconds and
/// gives up only when `ctx` ends.
pub async fn wait_for_managed_resource_crd(client: &Client, ctx: &Context) -> Result<()> {
    let api_version = ManagedResource::api_version(&());
    let mut interval = POLL_INTERVAL_SECS;

    loop {
        match ctx.run(managed_resource_crd_exists(client)).await {
            Ok(true) => {
                info!("ManagedResource CRD ({}) is available", api_version);
                return Ok(());
            }
            Ok(false) => {
                info!(
                    "ManagedResource CRD ({}) not yet available, waiting {} seconds...",
                    api_version, interval
                );
            }
            Err(e) if ctx.check().is_err() => return Err(e),
            Err(e) => {
                warn!(
                    "Error checking for ManagedResource CRD: {}, retrying in {} seconds...",
                    e, interval
                );
            }
        }

        ctx.sleep(Duration::from_secs(interval)).await?;

        interval = (interval * 2).min(POLL_MAX_INTERVAL_SECS);
    }
}

async fn managed_resource_crd_exists(client: &Client) -> Result<bool> {
    let group_name = ManagedResource::group(&());
    let discovery = Discovery::new(client.clone())
        .filter(&[group_name.as_ref()])
        .run()
        .await?;

    let found = discovery
        .groups()
        .filter(|group| group.name() == group_name)
        .flat_map(|group| group.recommended_resources())
        .any(|(ar, _)| {
            ar.kind == ManagedResource::kind(&()) && ar.version == ManagedResource::version(&())
        });

    Ok(found)
}
