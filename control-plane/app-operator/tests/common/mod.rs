#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use app_operator::controller::{
    ChildRef, ObjectStore, ReconcileSettings, Reconciler, StoreError,
};
use app_operator::crd::{
    AppDeployment, AppDeploymentSpec, AppDeploymentStatus, ExposeSpec,
};
use async_trait::async_trait;
use kube::core::DynamicObject;
use kube::{Client, api::Api};
use serde_json::json;
use tokio::task::JoinHandle;

// DNS-1123 safe numeric suffix for unique names
pub const DIGITS: [char; 10] =
    ['0', '1', '2', '3', '4', '5', '6', '7', '8', '9'];
pub fn uniq(prefix: &str) -> String {
    format!("{prefix}-{}", nanoid::nanoid!(6, &DIGITS))
}

pub const NS: &str = "apps";

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Op {
    Get,
    Create,
    Update,
    Delete,
    Status,
}

/// A persisted mutation; dry runs and reads are not recorded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Write {
    Create(String),
    Update(String),
    Delete(String),
    Status(String),
}

impl Write {
    pub fn kind(&self) -> &str {
        let key = match self {
            Write::Create(k)
            | Write::Update(k)
            | Write::Delete(k)
            | Write::Status(k) => k,
        };
        key.split('/').next().unwrap_or_default()
    }
}

#[derive(Default)]
struct Inner {
    objects: BTreeMap<String, DynamicObject>,
    statuses: BTreeMap<String, AppDeploymentStatus>,
    writes: Vec<Write>,
    dry_runs: usize,
    next_rv: u64,
    failures: BTreeMap<(Op, String), StoreError>,
}

impl Inner {
    fn bump(&mut self) -> String {
        self.next_rv += 1;
        self.next_rv.to_string()
    }

    fn take_failure(&mut self, op: Op, kind: &str) -> Result<(), StoreError> {
        match self.failures.remove(&(op, kind.to_string())) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// In-memory object store keyed by `kind/namespace/name`. Updates are
/// compare-on-write against the stored resourceVersion.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

fn key_of(key: &ChildRef) -> String {
    format!("{}/{}/{}", key.resource.kind, key.namespace, key.name)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `op` against `kind` with `err`.
    pub fn fail_next(&self, op: Op, kind: &str, err: StoreError) {
        let mut inner = self.inner.lock().unwrap();
        inner.failures.insert((op, kind.to_string()), err);
    }

    pub fn writes(&self) -> Vec<Write> {
        self.inner.lock().unwrap().writes.clone()
    }

    pub fn clear_writes(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.writes.clear();
        inner.dry_runs = 0;
    }

    pub fn dry_runs(&self) -> usize {
        self.inner.lock().unwrap().dry_runs
    }

    pub fn object(&self, kind: &str, name: &str) -> Option<DynamicObject> {
        let inner = self.inner.lock().unwrap();
        inner.objects.get(&format!("{kind}/{NS}/{name}")).cloned()
    }

    pub fn kinds(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        inner
            .objects
            .keys()
            .filter_map(|k| k.split('/').next().map(str::to_string))
            .collect()
    }

    pub fn status(&self, name: &str) -> Option<AppDeploymentStatus> {
        let inner = self.inner.lock().unwrap();
        inner.statuses.get(&format!("{NS}/{name}")).cloned()
    }

    /// Simulate the Deployment controller reporting ready pods.
    pub fn set_ready_replicas(&self, name: &str, ready: i32) {
        let mut inner = self.inner.lock().unwrap();
        let rv = inner.bump();
        let obj = inner
            .objects
            .get_mut(&format!("Deployment/{NS}/{name}"))
            .expect("deployment exists");
        obj.data["status"] = json!({ "readyReplicas": ready });
        obj.metadata.resource_version = Some(rv);
    }

    /// Simulate a concurrent writer touching an object.
    pub fn touch(&self, kind: &str, name: &str) {
        let mut inner = self.inner.lock().unwrap();
        let rv = inner.bump();
        if let Some(obj) = inner.objects.get_mut(&format!("{kind}/{NS}/{name}")) {
            obj.metadata.resource_version = Some(rv);
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(
        &self,
        key: &ChildRef,
    ) -> Result<Option<DynamicObject>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.take_failure(Op::Get, &key.resource.kind)?;
        Ok(inner.objects.get(&key_of(key)).cloned())
    }

    async fn create(
        &self,
        key: &ChildRef,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.take_failure(Op::Create, &key.resource.kind)?;
        let k = key_of(key);
        if inner.objects.contains_key(&k) {
            return Err(StoreError::AlreadyExists);
        }
        let mut stored = obj.clone();
        stored.metadata.resource_version = Some(inner.bump());
        inner.objects.insert(k.clone(), stored.clone());
        inner.writes.push(Write::Create(k));
        Ok(stored)
    }

    async fn update(
        &self,
        key: &ChildRef,
        obj: &DynamicObject,
        dry_run: bool,
    ) -> Result<DynamicObject, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.take_failure(Op::Update, &key.resource.kind)?;
        let k = key_of(key);
        let Some(current) = inner.objects.get(&k).cloned() else {
            return Err(StoreError::NotFound);
        };
        if obj.metadata.resource_version != current.metadata.resource_version {
            return Err(StoreError::Conflict(format!("{k} was modified")));
        }
        let mut next = obj.clone();
        if let Some(status) = current.data.get("status") {
            next.data["status"] = status.clone();
        }
        if dry_run {
            inner.dry_runs += 1;
            return Ok(next);
        }
        next.metadata.resource_version = Some(inner.bump());
        inner.objects.insert(k.clone(), next.clone());
        inner.writes.push(Write::Update(k));
        Ok(next)
    }

    async fn delete(&self, key: &ChildRef) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.take_failure(Op::Delete, &key.resource.kind)?;
        let k = key_of(key);
        inner.objects.remove(&k).ok_or(StoreError::NotFound)?;
        inner.writes.push(Write::Delete(k));
        Ok(())
    }

    async fn write_status(
        &self,
        namespace: &str,
        name: &str,
        status: &AppDeploymentStatus,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.take_failure(Op::Status, "AppDeployment")?;
        let k = format!("{namespace}/{name}");
        inner.statuses.insert(k.clone(), status.clone());
        inner.writes.push(Write::Status(format!("AppDeployment/{k}")));
        Ok(())
    }
}

pub fn reconciler() -> Reconciler<MemoryStore> {
    Reconciler::new(MemoryStore::new(), ReconcileSettings::default())
}

pub fn record(name: &str, replicas: i32, expose: ExposeSpec) -> AppDeployment {
    let mut r = AppDeployment::new(
        name,
        AppDeploymentSpec {
            image: "ghcr.io/example/app:1.0".into(),
            port: 8080,
            replicas: Some(replicas),
            expose,
            ..Default::default()
        },
    );
    r.metadata.namespace = Some(NS.into());
    r.metadata.uid = Some(format!("uid-{name}"));
    r
}

pub fn routed(host: &str, tls: bool) -> ExposeSpec {
    ExposeSpec {
        mode: "routed".into(),
        tls,
        ingress_domain: Some(host.into()),
        ..Default::default()
    }
}

pub fn direct(node_port: i32) -> ExposeSpec {
    ExposeSpec {
        mode: "direct-port".into(),
        node_port: Some(node_port),
        ..Default::default()
    }
}

/// Feed the persisted status back into the record, as a fresh watch event
/// would.
pub fn refresh(record: &mut AppDeployment, store: &MemoryStore) {
    let name = record.metadata.name.clone().unwrap_or_default();
    if let Some(status) = store.status(&name) {
        record.status = Some(status);
    }
}

// RAII guard to abort the controller and remove the record
pub struct ControllerGuard {
    ns: String,
    name: String,
    client: Client,
    ctrl: Option<JoinHandle<()>>,
}

impl ControllerGuard {
    pub fn new(ns: &str, name: &str, client: Client) -> Self {
        Self {
            ns: ns.to_string(),
            name: name.to_string(),
            client,
            ctrl: None,
        }
    }
    pub fn with_controller(mut self, ctrl: JoinHandle<()>) -> Self {
        self.ctrl = Some(ctrl);
        self
    }
}

impl Drop for ControllerGuard {
    fn drop(&mut self) {
        if let Some(ref handle) = self.ctrl {
            handle.abort();
        }
        let ns = self.ns.clone();
        let name = self.name.clone();
        let client = self.client.clone();
        let _ = tokio::spawn(async move {
            let api: Api<AppDeployment> = Api::namespaced(client, &ns);
            let _ = api.delete(&name, &Default::default()).await;
        });
    }
}

pub async fn wait_until<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..60 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(1000)).await;
    }
    false
}
