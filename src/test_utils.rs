// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities: a canned-response kube-rs transport and an in-memory cluster.

use crate::error::{ConvoyError, Result};
use crate::kubernetes::{ObjectReader, ObjectWriter, PropagationPolicy};
use crate::registry::TypeSet;
use crate::types::{Gvk, ManifestObject, ObjectKey};
use async_trait::async_trait;
use http::{Request, Response};
use kube::client::Body;
use kube::core::ErrorResponse;
use kube::Client;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::Service;

/// A mock HTTP service that returns predefined responses based on request paths.
#[derive(Clone)]
pub struct MockService {
    responses: Arc<Mutex<HashMap<(String, String), (u16, String)>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Add a response for requests with `method` matching the exact path
    pub fn on(self, method: &str, path: &str, status: u16, body: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert((method.to_string(), path.to_string()), (status, body.to_string()));
        self
    }

    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.on("GET", path, status, body)
    }

    pub fn on_put(self, path: &str, status: u16, body: &str) -> Self {
        self.on("PUT", path, status, body)
    }

    pub fn on_delete(self, path: &str, status: u16, body: &str) -> Self {
        self.on("DELETE", path, status, body)
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "https://kubernetes.default.svc")
    }

    fn find_response(&self, method: &str, path: &str) -> Option<(u16, String)> {
        let responses = self.responses.lock().unwrap();

        if let Some(resp) = responses.get(&(method.to_string(), path.to_string())) {
            return Some(resp.clone());
        }

        for ((m, p), resp) in responses.iter() {
            if m == method && path.starts_with(p) {
                return Some(resp.clone());
            }
        }

        None
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<Request<Body>> for MockService {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = std::result::Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();

        let (status, body) = self
            .find_response(&method, &path)
            .unwrap_or_else(|| (404, status_json(404, "NotFound", "not found")));

        Box::pin(async move {
            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(body.into_bytes()))
                .unwrap())
        })
    }
}

/// A Status response body
pub fn status_json(code: u16, reason: &str, message: &str) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": message,
        "reason": reason,
        "code": code
    })
    .to_string()
}

/// Create a 404 not found response
pub fn not_found_json(resource: &str, name: &str) -> String {
    status_json(404, "NotFound", &format!("{} \"{}\" not found", resource, name))
}

/// Create a mock secret JSON response
pub fn secret_json(namespace: &str, name: &str, resource_version: &str) -> String {
    serde_json::json!({
        "apiVersion": "v1",
        "kind": "Secret",
        "metadata": {
            "name": name,
            "namespace": namespace,
            "resourceVersion": resource_version,
            "uid": "test-uid"
        },
        "type": "Opaque"
    })
    .to_string()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verb {
    Create,
    Update,
    Delete(PropagationPolicy),
}

/// One write call received by a [`FakeCluster`], whether or not it was accepted
#[derive(Clone, Debug)]
pub struct WriteRecord {
    pub verb: Verb,
    pub key: ObjectKey,
    pub accepted: bool,
}

#[derive(Default)]
struct FakeState {
    objects: BTreeMap<ObjectKey, ManifestObject>,
    last_version: u64,
    pending_conflicts: u32,
    failing: HashSet<ObjectKey>,
    writes: Vec<WriteRecord>,
}

impl FakeState {
    fn next_version(&mut self) -> String {
        self.last_version += 1;
        self.last_version.to_string()
    }

    fn record(&mut self, verb: Verb, key: &ObjectKey, accepted: bool) {
        self.writes.push(WriteRecord {
            verb,
            key: key.clone(),
            accepted,
        });
    }

    fn injected_failure(&self, key: &ObjectKey) -> Option<ConvoyError> {
        self.failing.contains(key).then(|| {
            ConvoyError::KubeError(kube::Error::Api(ErrorResponse {
                status: "Failure".to_string(),
                message: format!("injected failure for {}", key),
                reason: "InternalError".to_string(),
                code: 500,
            }))
        })
    }
}

/// In-memory cluster API with resourceVersion checks, injectable conflicts and
/// a log of every write call.
///
/// Clones share state, so a test can keep one handle while the code under test
/// owns another.
#[derive(Clone, Default)]
pub struct FakeCluster {
    state: Arc<Mutex<FakeState>>,
    types: Option<Arc<TypeSet>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject kinds outside `types` the way a real target does
    pub fn with_types(mut self, types: Arc<TypeSet>) -> Self {
        self.types = Some(types);
        self
    }

    fn check_kind(&self, gvk: &Gvk) -> Result<()> {
        match &self.types {
            Some(types) => types.lookup(gvk).map(|_| ()),
            None => Ok(()),
        }
    }

    /// Store an object directly, without logging a write
    pub fn insert(&self, mut object: ManifestObject) {
        let mut state = self.state.lock().unwrap();
        let version = state.next_version();
        object.object_mut().metadata.resource_version = Some(version);
        state.objects.insert(object.key(), object);
    }

    pub fn get_object(&self, key: &ObjectKey) -> Option<ManifestObject> {
        self.state.lock().unwrap().objects.get(key).cloned()
    }

    pub fn keys(&self) -> Vec<ObjectKey> {
        self.state.lock().unwrap().objects.keys().cloned().collect()
    }

    /// The next `count` updates fail with a conflict, each as if another actor
    /// had written the object in between
    pub fn inject_conflicts(&self, count: u32) {
        self.state.lock().unwrap().pending_conflicts = count;
    }

    /// Every write to `key` fails with a server error
    pub fn fail_writes_to(&self, key: ObjectKey) {
        self.state.lock().unwrap().failing.insert(key);
    }

    pub fn restore_writes_to(&self, key: &ObjectKey) {
        self.state.lock().unwrap().failing.remove(key);
    }

    pub fn writes(&self) -> Vec<WriteRecord> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.state.lock().unwrap().writes.clear();
    }

    /// Number of write calls with `verb`, accepted or not
    pub fn attempts(&self, verb: Verb) -> usize {
        self.writes().iter().filter(|w| w.verb == verb).count()
    }
}

fn labels_match(object: &ManifestObject, selector: &str) -> bool {
    let labels = object.object().metadata.labels.clone().unwrap_or_default();
    selector
        .split(',')
        .filter(|term| !term.is_empty())
        .all(|term| match term.split_once('=') {
            Some((key, value)) => labels.get(key.trim()).is_some_and(|v| v == value.trim()),
            None => labels.contains_key(term.trim()),
        })
}

#[async_trait]
impl ObjectReader for FakeCluster {
    async fn get(&self, key: &ObjectKey) -> Result<Option<ManifestObject>> {
        self.check_kind(&key.gvk)?;
        Ok(self.get_object(key))
    }

    async fn list(
        &self,
        gvk: &Gvk,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<ManifestObject>> {
        self.check_kind(gvk)?;
        let state = self.state.lock().unwrap();
        Ok(state
            .objects
            .values()
            .filter(|o| o.gvk() == gvk)
            .filter(|o| namespace.map_or(true, |ns| o.namespace().as_deref() == Some(ns)))
            .filter(|o| label_selector.map_or(true, |s| labels_match(o, s)))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ObjectWriter for FakeCluster {
    async fn create(&self, object: &ManifestObject) -> Result<ManifestObject> {
        self.check_kind(object.gvk())?;
        let key = object.key();
        let mut state = self.state.lock().unwrap();

        if let Some(err) = state.injected_failure(&key) {
            state.record(Verb::Create, &key, false);
            return Err(err);
        }
        if state.objects.contains_key(&key) {
            state.record(Verb::Create, &key, false);
            return Err(ConvoyError::Conflict(key));
        }

        let mut stored = object.clone();
        stored.object_mut().metadata.resource_version = Some(state.next_version());
        state.objects.insert(key.clone(), stored.clone());
        state.record(Verb::Create, &key, true);
        Ok(stored)
    }

    async fn update(&self, object: &ManifestObject) -> Result<ManifestObject> {
        self.check_kind(object.gvk())?;
        let key = object.key();
        let mut state = self.state.lock().unwrap();

        if let Some(err) = state.injected_failure(&key) {
            state.record(Verb::Update, &key, false);
            return Err(err);
        }
        let Some(stored_version) = state.objects.get(&key).map(|o| o.resource_version()) else {
            state.record(Verb::Update, &key, false);
            return Err(ConvoyError::NotFound(key));
        };

        if state.pending_conflicts > 0 {
            state.pending_conflicts -= 1;
            let version = state.next_version();
            if let Some(stored) = state.objects.get_mut(&key) {
                stored.object_mut().metadata.resource_version = Some(version);
            }
            state.record(Verb::Update, &key, false);
            return Err(ConvoyError::Conflict(key));
        }
        if object.resource_version() != stored_version {
            state.record(Verb::Update, &key, false);
            return Err(ConvoyError::Conflict(key));
        }

        let mut stored = object.clone();
        stored.object_mut().metadata.resource_version = Some(state.next_version());
        state.objects.insert(key.clone(), stored.clone());
        state.record(Verb::Update, &key, true);
        Ok(stored)
    }

    async fn delete(&self, key: &ObjectKey, propagation: PropagationPolicy) -> Result<()> {
        self.check_kind(&key.gvk)?;
        let mut state = self.state.lock().unwrap();
        let verb = Verb::Delete(propagation);

        if let Some(err) = state.injected_failure(key) {
            state.record(verb, key, false);
            return Err(err);
        }
        if state.objects.remove(key).is_none() {
            state.record(verb, key, false);
            return Err(ConvoyError::NotFound(key.clone()));
        }

        state.record(verb, key, true);
        Ok(())
    }
}
