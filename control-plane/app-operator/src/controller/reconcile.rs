use std::time::Duration;

use k8s_openapi::api::apps::v1::Deployment;
use kube::core::DynamicObject;
use kube::runtime::controller::Action;
use kube::ResourceExt;
use tracing::{debug, info, instrument, trace};

use super::ReconcileErr;
use super::conditions::ConditionTracker;
use super::diff::{needs_write, prepare_update};
use super::store::{ChildRef, ObjectStore, StoreError, from_dynamic};
use crate::crd::{AppDeployment, AppDeploymentStatus, ConditionType, Exposure};
use crate::templates::{DEFAULT_INGRESS_CLASS, ManagedKind, RenderContext};

pub const DEFAULT_REQUEUE_AFTER: Duration = Duration::from_secs(10);

pub const REASON_DEPLOYMENT_READY: &str = "DeploymentReady";
pub const REASON_DEPLOYMENT_NOT_READY: &str = "DeploymentNotReady";
pub const REASON_SERVICE_READY: &str = "ServiceReady";
pub const REASON_SERVICE_NOT_READY: &str = "ServiceNotReady";
pub const REASON_INGRESS_READY: &str = "IngressReady";
pub const REASON_INGRESS_NOT_READY: &str = "IngressNotReady";

/// Knobs the reconcile pass needs from the operator configuration.
#[derive(Clone, Debug)]
pub struct ReconcileSettings {
    /// Delay before the next pass while children are not ready yet
    pub requeue_after: Duration,
    pub ingress_class: Option<String>,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            requeue_after: DEFAULT_REQUEUE_AFTER,
            ingress_class: Some(DEFAULT_INGRESS_CLASS.to_string()),
        }
    }
}

/// Drives the children of one AppDeployment toward the desired shape.
/// Passes for the same record must not overlap; the kube-runtime
/// controller guarantees that.
pub struct Reconciler<S> {
    store: S,
    settings: ReconcileSettings,
}

impl<S: ObjectStore> Reconciler<S> {
    pub fn new(store: S, settings: ReconcileSettings) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// One reconciliation pass. Children are handled strictly in order
    /// Deployment -> Service -> Ingress; any store failure aborts the pass
    /// without touching status.
    #[instrument(skip_all, fields(ns = %record.namespace().unwrap_or_else(|| "default".into()), name = %record.name_any()))]
    pub async fn reconcile(
        &self,
        record: &AppDeployment,
    ) -> Result<Action, ReconcileErr> {
        record.spec.validate()?;
        let ctx = RenderContext::from_record(
            record,
            self.settings.ingress_class.as_deref(),
        )?;
        debug!(mode = ctx.expose.exposure.mode_name(), "reconcile: begin");

        // Status is edited on a copy; the record handed in stays untouched.
        let original = record.status.clone().unwrap_or_default();
        let mut tracker = ConditionTracker::new(original.clone());

        self.reconcile_deployment(&ctx, &mut tracker).await?;
        self.reconcile_service(&ctx, &mut tracker).await?;
        self.reconcile_ingress(&ctx, &mut tracker).await?;

        self.finish(&ctx, &original, tracker).await
    }

    async fn reconcile_deployment(
        &self,
        ctx: &RenderContext,
        tracker: &mut ConditionTracker,
    ) -> Result<(), ReconcileErr> {
        let key = child_ref(ctx, ManagedKind::Deployment);
        let desired = desired_of(ctx, ManagedKind::Deployment)?;
        match self.store.get(&key).await? {
            None => {
                self.store.create(&key, &desired).await?;
                info!(child = %key, "created deployment");
                tracker.upsert(
                    ConditionType::Deployment,
                    false,
                    REASON_DEPLOYMENT_NOT_READY,
                    &format!("Deployment {} is not ready", ctx.name),
                );
            }
            Some(current) => {
                self.update_if_changed(&key, desired, &current).await?;
                let observed: Deployment = from_dynamic(current)?;
                let ready_replicas = observed
                    .status
                    .as_ref()
                    .and_then(|s| s.ready_replicas)
                    .unwrap_or(0);
                let wanted = ctx.spec.replicas.unwrap_or(1);
                // Message is count-free; status changes only on a flip.
                trace!(ready_replicas, wanted, "deployment readiness");
                if ready_replicas == wanted {
                    tracker.upsert(
                        ConditionType::Deployment,
                        true,
                        REASON_DEPLOYMENT_READY,
                        &format!("Deployment {} is ready", ctx.name),
                    );
                } else {
                    tracker.upsert(
                        ConditionType::Deployment,
                        false,
                        REASON_DEPLOYMENT_NOT_READY,
                        &format!("Deployment {} is not ready", ctx.name),
                    );
                }
            }
        }
        Ok(())
    }

    async fn reconcile_service(
        &self,
        ctx: &RenderContext,
        tracker: &mut ConditionTracker,
    ) -> Result<(), ReconcileErr> {
        let key = child_ref(ctx, ManagedKind::Service);
        let desired = desired_of(ctx, ManagedKind::Service)?;
        match self.store.get(&key).await? {
            None => {
                self.store.create(&key, &desired).await?;
                info!(child = %key, mode = ctx.expose.exposure.mode_name(), "created service");
                tracker.upsert(
                    ConditionType::Service,
                    false,
                    REASON_SERVICE_NOT_READY,
                    &format!("Service {} is not ready", ctx.name),
                );
            }
            Some(current) => {
                self.update_if_changed(&key, desired, &current).await?;
                tracker.upsert(
                    ConditionType::Service,
                    true,
                    REASON_SERVICE_READY,
                    &format!("Service {} is ready", ctx.name),
                );
            }
        }
        Ok(())
    }

    async fn reconcile_ingress(
        &self,
        ctx: &RenderContext,
        tracker: &mut ConditionTracker,
    ) -> Result<(), ReconcileErr> {
        let key = child_ref(ctx, ManagedKind::Ingress);
        let current = self.store.get(&key).await?;
        match (&ctx.expose.exposure, current) {
            (Exposure::DirectPort { .. }, None) => {
                trace!("ingress not applicable in direct-port mode");
                tracker.remove(ConditionType::Ingress);
            }
            (Exposure::DirectPort { .. }, Some(_)) => {
                match self.store.delete(&key).await {
                    Ok(()) => info!(child = %key, "deleted ingress after switch to direct-port"),
                    Err(StoreError::NotFound) => {
                        debug!(child = %key, "ingress already gone")
                    }
                    Err(e) => return Err(e.into()),
                }
                tracker.remove(ConditionType::Ingress);
            }
            (Exposure::Routed { .. }, None) => {
                let desired = desired_of(ctx, ManagedKind::Ingress)?;
                self.store.create(&key, &desired).await?;
                info!(child = %key, "created ingress");
                tracker.upsert(
                    ConditionType::Ingress,
                    false,
                    REASON_INGRESS_NOT_READY,
                    &format!("Ingress {} is not ready", ctx.name),
                );
                self.ensure_tls(ctx).await?;
            }
            (Exposure::Routed { .. }, Some(current)) => {
                let desired = desired_of(ctx, ManagedKind::Ingress)?;
                self.update_if_changed(&key, desired, &current).await?;
                tracker.upsert(
                    ConditionType::Ingress,
                    true,
                    REASON_INGRESS_READY,
                    &format!("Ingress {} is ready", ctx.name),
                );
                self.ensure_tls(ctx).await?;
            }
        }
        Ok(())
    }

    /// Create the Issuer and Certificate when routed+TLS. Existing
    /// documents are left alone; they are never diffed or updated.
    #[instrument(skip_all)]
    pub async fn ensure_tls(
        &self,
        ctx: &RenderContext,
    ) -> Result<(), ReconcileErr> {
        if !ctx.expose.exposure.wants_tls() {
            return Ok(());
        }
        for kind in [ManagedKind::Issuer, ManagedKind::Certificate] {
            let Some(desired) = ctx.generate(kind)? else {
                continue;
            };
            let key = child_ref(ctx, kind);
            if self.store.get(&key).await?.is_some() {
                trace!(child = %key, "tls document present");
                continue;
            }
            match self.store.create(&key, &desired).await {
                Ok(_) => info!(child = %key, "created tls document"),
                Err(StoreError::AlreadyExists) => {
                    debug!(child = %key, "tls document created concurrently")
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Dry-run the desired object, then write only when the server-side
    /// result differs from what is stored.
    async fn update_if_changed(
        &self,
        key: &ChildRef,
        desired: DynamicObject,
        current: &DynamicObject,
    ) -> Result<bool, ReconcileErr> {
        let desired = prepare_update(desired, current);
        let preview = self.store.update(key, &desired, true).await?;
        if !needs_write(&preview, current) {
            debug!(child = %key, "spec unchanged; skipping update");
            return Ok(false);
        }
        self.store.update(key, &desired, false).await?;
        info!(child = %key, "updated");
        Ok(true)
    }

    async fn finish(
        &self,
        ctx: &RenderContext,
        original: &AppDeploymentStatus,
        mut tracker: ConditionTracker,
    ) -> Result<Action, ReconcileErr> {
        let agg = tracker.aggregate();
        tracker.apply_aggregate(&agg);
        let status = tracker.into_status();
        if &status != original {
            self.store
                .write_status(&ctx.namespace, &ctx.name, &status)
                .await?;
            info!(phase = %agg.phase, reason = %agg.reason, ready = agg.all_ready, "status updated");
        } else {
            trace!("status unchanged; skipping write");
        }
        if agg.all_ready {
            Ok(Action::await_change())
        } else {
            Ok(Action::requeue(self.settings.requeue_after))
        }
    }
}

fn child_ref(ctx: &RenderContext, kind: ManagedKind) -> ChildRef {
    ChildRef::new(kind.api_resource(), &ctx.namespace, &ctx.name)
}

fn desired_of(
    ctx: &RenderContext,
    kind: ManagedKind,
) -> Result<DynamicObject, ReconcileErr> {
    ctx.generate(kind)?.ok_or(ReconcileErr::NotApplicable(kind))
}
