pub mod conditions;
pub mod diff;
pub mod reconcile;
pub mod store;

use std::sync::Arc;

use futures_util::StreamExt;
use k8s_openapi::api::{
    apps::v1::Deployment, core::v1::Service, networking::v1::Ingress,
};
use kube::{
    Client, Resource, ResourceExt,
    api::Api,
    runtime::{Controller, controller::Action, watcher::Config},
};
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::OperatorConfig;
use crate::crd::{AppDeployment, ExposureError, ValidationErrors};
use crate::templates::ManagedKind;

pub use reconcile::{ReconcileSettings, Reconciler};
pub use store::{ChildRef, KubeStore, ObjectStore, StoreError};

/// Delay before retrying a pass that lost an optimistic-concurrency race.
pub const CONFLICT_REQUEUE: Duration = Duration::from_secs(1);

#[derive(thiserror::Error, Debug)]
pub enum ReconcileErr {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    InvalidSpec(#[from] ValidationErrors),
    #[error(transparent)]
    Exposure(#[from] ExposureError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("{0:?} has no manifest in the current exposure mode")]
    NotApplicable(ManagedKind),
}

impl ReconcileErr {
    /// A stale-read conflict; retry quickly from a fresh read.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ReconcileErr::Store(StoreError::Conflict(_)))
    }

    /// The record itself is wrong; retrying will not help until it changes.
    pub fn is_invalid_config(&self) -> bool {
        matches!(
            self,
            ReconcileErr::InvalidSpec(_)
                | ReconcileErr::Exposure(_)
                | ReconcileErr::Store(StoreError::Invalid(_))
        )
    }
}

pub struct ControllerContext {
    pub reconciler: Reconciler<KubeStore>,
    pub error_requeue: Duration,
}

pub async fn run_controller(
    client: Client,
    cfg: OperatorConfig,
) -> anyhow::Result<()> {
    let records: Api<AppDeployment> = scoped_api(&client, &cfg);
    let deployments: Api<Deployment> = scoped_api(&client, &cfg);
    let services: Api<Service> = scoped_api(&client, &cfg);
    let ingresses: Api<Ingress> = scoped_api(&client, &cfg);

    let store = KubeStore::new(client.clone(), cfg.field_manager.clone());
    let ctx = Arc::new(ControllerContext {
        reconciler: Reconciler::new(store, cfg.reconcile_settings()),
        error_requeue: Duration::from_secs(cfg.error_requeue_secs),
    });

    info!(namespace = ?cfg.watch_namespace, "starting AppDeployment controller");
    Controller::new(records, Config::default())
        .owns(deployments, Config::default())
        .owns(services, Config::default())
        .owns(ingresses, Config::default())
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((obj_ref, action)) => {
                    debug!(object = %obj_ref, "reconciled: requeue={:?}", action)
                }
                Err(e) => error!(error = ?e, "reconcile error"),
            }
        })
        .await;

    Ok(())
}

fn scoped_api<K>(client: &Client, cfg: &OperatorConfig) -> Api<K>
where
    K: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    <K as Resource>::DynamicType: Default,
{
    match cfg.watch_namespace.as_deref() {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

async fn reconcile(
    obj: Arc<AppDeployment>,
    ctx: Arc<ControllerContext>,
) -> Result<Action, ReconcileErr> {
    // Children carry a controller owner reference; garbage collection
    // removes them once the record is gone.
    if obj.meta().deletion_timestamp.is_some() {
        debug!(name = %obj.name_any(), "record is being deleted");
        return Ok(Action::await_change());
    }
    ctx.reconciler.reconcile(&obj).await
}

fn error_policy(
    obj: Arc<AppDeployment>,
    error: &ReconcileErr,
    ctx: Arc<ControllerContext>,
) -> Action {
    let name = obj.name_any();
    if error.is_conflict() {
        debug!(%name, "conflict; retrying from a fresh read");
        Action::requeue(CONFLICT_REQUEUE)
    } else if error.is_invalid_config() {
        warn!(%name, %error, "invalid configuration; waiting for a spec change");
        Action::await_change()
    } else {
        warn!(%name, %error, "reconcile failed; backing off");
        Action::requeue(ctx.error_requeue)
    }
}
