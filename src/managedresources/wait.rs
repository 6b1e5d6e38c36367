// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

use super::record_key;
use crate::applier::Applier;
use crate::context::Context;
use crate::error::{ConvoyError, Result};
use crate::kubernetes::{ObjectReader, ObjectWriter};
use crate::types::{BundlePhase, ManagedResource};
use std::time::Duration;
use tracing::{debug, info};

/// Poll the bundle record until the agent reports it reconciled.
///
/// Fails with `BundleUnhealthy` as soon as the agent reports an error; a missing
/// record counts as pending. Only `ctx` bounds the wait.
pub async fn wait_until_healthy<C>(
    ctx: &Context,
    applier: &Applier<C>,
    namespace: &str,
    name: &str,
    interval: Duration,
) -> Result<()>
where
    C: ObjectReader + ObjectWriter,
{
    let key = record_key(namespace, name);

    loop {
        let phase = match applier.get(ctx, &key).await? {
            Some(object) => object.to_resource::<ManagedResource>()?.phase(),
            None => BundlePhase::Pending,
        };

        match phase {
            BundlePhase::Reconciled => {
                info!("Bundle {}/{} is healthy", namespace, name);
                return Ok(());
            }
            BundlePhase::Error(message) => {
                return Err(ConvoyError::BundleUnhealthy {
                    name: format!("{}/{}", namespace, name),
                    message,
                })
            }
            phase => debug!("Bundle {}/{} is {:?}", namespace, name, phase),
        }

        ctx.sleep(interval).await?;
    }
}
