// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Per-kind merge functions that keep fields owned by the server or by other actors.

use crate::types::ManifestObject;
use serde_json::{Map, Value};

/// Copy `field` from `current` into `desired` when desired does not set it
fn keep_if_unset(desired: &mut Map<String, Value>, current: &Value, field: &str) {
    if desired.get(field).map_or(true, Value::is_null) {
        if let Some(value) = current.get(field).filter(|v| !v.is_null()) {
            desired.insert(field.to_string(), value.clone());
        }
    }
}

fn same_port(a: &Value, b: &Value) -> bool {
    let protocol = |v: &Value| v.get("protocol").and_then(Value::as_str).unwrap_or("TCP").to_string();
    a.get("port") == b.get("port") && protocol(a) == protocol(b)
}

/// Keep the allocated cluster IPs, node ports and health check node port of a Service
pub fn merge_service(desired: &mut ManifestObject, current: &ManifestObject) {
    let current_spec = &current.object().data["spec"];
    let Some(spec) = desired
        .object_mut()
        .data
        .get_mut("spec")
        .and_then(Value::as_object_mut)
    else {
        return;
    };

    let service_type = spec
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("ClusterIP")
        .to_string();

    if service_type != "ExternalName" {
        keep_if_unset(spec, current_spec, "clusterIP");
        keep_if_unset(spec, current_spec, "clusterIPs");
    }

    if service_type == "NodePort" || service_type == "LoadBalancer" {
        let current_ports = current_spec.get("ports").and_then(Value::as_array);
        if let (Some(ports), Some(current_ports)) = (
            spec.get_mut("ports").and_then(Value::as_array_mut),
            current_ports,
        ) {
            for port in ports.iter_mut().filter(|p| p.get("nodePort").is_none()) {
                let allocated = current_ports
                    .iter()
                    .find(|c| same_port(port, c))
                    .and_then(|c| c.get("nodePort"))
                    .cloned();
                if let (Some(node_port), Some(port)) = (allocated, port.as_object_mut()) {
                    port.insert("nodePort".to_string(), node_port);
                }
            }
        }
    }

    if service_type == "LoadBalancer" {
        keep_if_unset(spec, current_spec, "healthCheckNodePort");
    }
}

/// Keep token and pull secrets that were attached to a ServiceAccount after creation
pub fn merge_service_account(desired: &mut ManifestObject, current: &ManifestObject) {
    let current_data = current.object().data.clone();
    if let Some(data) = desired.object_mut().data.as_object_mut() {
        keep_if_unset(data, &current_data, "secrets");
        keep_if_unset(data, &current_data, "imagePullSecrets");
    }
}

/// Keep the agent-owned status and finalizers of a bundle record
pub fn merge_managed_resource(desired: &mut ManifestObject, current: &ManifestObject) {
    let current_data = current.object().data.clone();
    if let Some(data) = desired.object_mut().data.as_object_mut() {
        data.remove("status");
        keep_if_unset(data, &current_data, "status");
    }

    let metadata = &mut desired.object_mut().metadata;
    if metadata.finalizers.is_none() {
        metadata.finalizers = current.object().metadata.finalizers.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Gvk, ManifestObject};
    use k8s_openapi::api::core::v1::{Service, ServiceAccount};
    use kube::api::DynamicObject;
    use serde_json::json;

    fn service(spec: Value) -> ManifestObject {
        let object: DynamicObject = serde_json::from_value(json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": {"name": "kube-apiserver", "namespace": "shoot--foo--bar"},
            "spec": spec,
        }))
        .unwrap();
        ManifestObject::new(Gvk::of::<Service>(), object)
    }

    #[test]
    fn test_service_keeps_allocated_addresses() {
        let mut desired = service(json!({
            "type": "LoadBalancer",
            "ports": [{"name": "https", "port": 443}, {"name": "dns", "port": 53, "protocol": "UDP"}],
        }));
        let current = service(json!({
            "type": "LoadBalancer",
            "clusterIP": "10.0.0.12",
            "clusterIPs": ["10.0.0.12"],
            "healthCheckNodePort": 31000,
            "ports": [
                {"name": "https", "port": 443, "protocol": "TCP", "nodePort": 30443},
                {"name": "dns", "port": 53, "protocol": "TCP", "nodePort": 30053},
            ],
        }));

        merge_service(&mut desired, &current);

        let spec = &desired.object().data["spec"];
        assert_eq!(spec["clusterIP"], "10.0.0.12");
        assert_eq!(spec["clusterIPs"], json!(["10.0.0.12"]));
        assert_eq!(spec["healthCheckNodePort"], 31000);
        assert_eq!(spec["ports"][0]["nodePort"], 30443);
        // protocol differs, so the port is not the same
        assert!(spec["ports"][1].get("nodePort").is_none());
    }

    #[test]
    fn test_service_explicit_node_port_wins() {
        let mut desired = service(json!({
            "type": "NodePort",
            "ports": [{"port": 443, "nodePort": 32000}],
        }));
        let current = service(json!({
            "type": "NodePort",
            "clusterIP": "10.0.0.12",
            "ports": [{"port": 443, "nodePort": 30443}],
        }));

        merge_service(&mut desired, &current);

        assert_eq!(desired.object().data["spec"]["ports"][0]["nodePort"], 32000);
    }

    #[test]
    fn test_cluster_ip_service_drops_node_ports() {
        let mut desired = service(json!({"ports": [{"port": 443}]}));
        let current = service(json!({
            "type": "NodePort",
            "clusterIP": "10.0.0.12",
            "ports": [{"port": 443, "nodePort": 30443}],
        }));

        merge_service(&mut desired, &current);

        let spec = &desired.object().data["spec"];
        assert_eq!(spec["clusterIP"], "10.0.0.12");
        assert!(spec["ports"][0].get("nodePort").is_none());
    }

    #[test]
    fn test_service_account_keeps_secrets() {
        let sa = |extra: Value| {
            let mut value = json!({
                "apiVersion": "v1",
                "kind": "ServiceAccount",
                "metadata": {"name": "dependency-watchdog-probe", "namespace": "kube-system"},
            });
            value.as_object_mut().unwrap().extend(extra.as_object().unwrap().clone());
            ManifestObject::new(Gvk::of::<ServiceAccount>(), serde_json::from_value(value).unwrap())
        };
        let mut desired = sa(json!({"automountServiceAccountToken": false}));
        let current = sa(json!({"secrets": [{"name": "token-abc"}]}));

        merge_service_account(&mut desired, &current);

        assert_eq!(desired.object().data["secrets"], json!([{"name": "token-abc"}]));
        assert_eq!(desired.object().data["automountServiceAccountToken"], false);
    }
}
