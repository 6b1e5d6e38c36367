// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Label keys written on objects managed by convoy
pub mod labels {
    /// Marks the origin of a bundle record
    pub const ORIGIN: &str = "origin";
    /// Carries the bundle name on every chunk secret of that bundle
    pub const MANAGED_RESOURCE_NAME: &str = "resources.gardener.cloud/managed-resource";
    /// Tells the token requestor which secrets to populate
    pub const PURPOSE: &str = "resources.gardener.cloud/purpose";
    pub const PURPOSE_TOKEN_REQUESTOR: &str = "token-requestor";
}

/// Annotation keys read by the token requestor
pub mod annotations {
    pub const SERVICE_ACCOUNT_NAME: &str = "serviceaccount.resources.gardener.cloud/name";
    pub const SERVICE_ACCOUNT_NAMESPACE: &str = "serviceaccount.resources.gardener.cloud/namespace";
}

/// Deletion grace periods per propagation policy
pub mod grace {
    pub const FOREGROUND_SECS: u32 = 60;
    pub const BACKGROUND_SECS: u32 = 0;
}

/// CRD polling configuration
pub mod crd {
    /// Initial polling interval in seconds when waiting for CRD
    pub const POLL_INTERVAL_SECS: u64 = 10;
    /// Maximum polling interval in seconds (exponential backoff cap)
    pub const POLL_MAX_INTERVAL_SECS: u64 = 60;
}

/// Bundle payload storage
pub mod bundle {
    /// Chunk secrets are named `<prefix><bundle>-<payload digest>-<index>`
    pub const SECRET_NAME_PREFIX: &str = "managedresource-";
    /// Data key holding the YAML documents in each chunk secret
    pub const DATA_KEY: &str = "objects.yaml";
    /// Stays well below the 1 MiB object size limit of the API server
    pub const MAX_CHUNK_BYTES: usize = 512 * 1024;
    /// Class of bundles applied by the management cluster agent
    pub const CLASS_MANAGEMENT: &str = "seed";
    pub const ORIGIN: &str = "gardener";
    /// Bundle names double as label values
    pub const MAX_NAME_LEN: usize = 63;
}

/// Credential and RBAC names for the dependency watchdog probe
pub mod access {
    pub const SECRET_NAME_PREFIX: &str = "shoot-access-";
    pub const PROBE_NAME: &str = "dependency-watchdog-probe";
    /// Data key of the kubeconfig inside a credential secret
    pub const DATA_KEY_KUBECONFIG: &str = "kubeconfig";
    pub const DATA_KEY_TOKEN: &str = "token";
    pub const SERVICE_ACCOUNT_NAMESPACE: &str = "kube-system";
    pub const ROLE_NAME: &str = "gardener.cloud:target:dependency-watchdog";
    pub const MANAGED_RESOURCE_NAME: &str = "shoot-core-dependency-watchdog";
    pub const LEASE_NAMESPACE: &str = "kube-node-lease";
    pub const CA_SECRET_NAME: &str = "ca";
    /// Data key of the certificate bundle inside the CA secret
    pub const DATA_KEY_CERTIFICATE_BUNDLE: &str = "bundle.crt";
}

/// Pass-through defaults for the watchdog processes
pub mod defaults {
    pub const PROBE_INTERVAL_SECS: u64 = 30;
    pub const WATCH_DURATION_SECS: u64 = 300;
    pub const KCM_NODE_MONITOR_GRACE_SECS: u64 = 40;
    pub const RECONCILE_TIMEOUT_SECS: u64 = 120;
    pub const APPLY_MAX_ATTEMPTS: u32 = 5;
}
