pub mod ingress;
pub mod service;
pub mod tls;
pub mod workload;

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{
    ObjectMeta, OwnerReference,
};
use kube::core::{DynamicObject, GroupVersionKind};
use kube::discovery::ApiResource;
use kube::{Resource, ResourceExt};

use crate::crd::{AppDeployment, AppDeploymentSpec, ExposureError, ResolvedExpose};

pub use ingress::render_ingress;
pub use service::render_service;
pub use tls::{render_certificate, render_issuer};
pub use workload::render_deployment;

pub const OWNER_LABEL: &str = "oaas.io/owner";
pub const DEFAULT_INGRESS_CLASS: &str = "nginx";

/// Every child kind the operator manages, in reconcile order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ManagedKind {
    Deployment,
    Service,
    Ingress,
    Issuer,
    Certificate,
}

impl ManagedKind {
    pub fn api_resource(&self) -> ApiResource {
        match self {
            ManagedKind::Deployment => ApiResource::erase::<Deployment>(&()),
            ManagedKind::Service => ApiResource::erase::<Service>(&()),
            ManagedKind::Ingress => ApiResource::erase::<Ingress>(&()),
            ManagedKind::Issuer => ApiResource::from_gvk(
                &GroupVersionKind::gvk("cert-manager.io", "v1", "Issuer"),
            ),
            ManagedKind::Certificate => ApiResource::from_gvk(
                &GroupVersionKind::gvk("cert-manager.io", "v1", "Certificate"),
            ),
        }
    }
}

/// Everything a template needs, derived once from the record.
#[derive(Clone, Debug)]
pub struct RenderContext {
    pub name: String,
    pub namespace: String,
    pub owner: Option<OwnerReference>,
    /// Spec with defaults applied
    pub spec: AppDeploymentSpec,
    pub expose: ResolvedExpose,
    pub ingress_class: Option<String>,
}

impl RenderContext {
    /// Fails only when the expose block cannot be resolved.
    pub fn from_record(
        record: &AppDeployment,
        ingress_class: Option<&str>,
    ) -> Result<Self, ExposureError> {
        let spec = record.spec.defaulted();
        let expose = spec.expose.resolve(spec.port)?;
        Ok(Self {
            name: record.name_any(),
            namespace: record
                .namespace()
                .unwrap_or_else(|| "default".to_string()),
            owner: record.controller_owner_ref(&()),
            spec,
            expose,
            ingress_class: ingress_class.map(str::to_string),
        })
    }

    pub fn labels(&self) -> BTreeMap<String, String> {
        let mut lbls = BTreeMap::new();
        lbls.insert("app".to_string(), self.name.clone());
        lbls.insert(OWNER_LABEL.to_string(), self.name.clone());
        lbls
    }

    /// Metadata shared by all children: same name/namespace as the record,
    /// owner labels and a controller reference for cascade deletion.
    pub fn child_meta(&self) -> ObjectMeta {
        ObjectMeta {
            name: Some(self.name.clone()),
            namespace: Some(self.namespace.clone()),
            labels: Some(self.labels()),
            owner_references: self.owner.clone().map(|o| vec![o]),
            ..Default::default()
        }
    }

    /// Secret shared by the Certificate and the Ingress TLS block.
    pub fn tls_secret_name(&self) -> String {
        format!("{}-tls", self.name)
    }

    /// Desired shape of `kind` for this record, or `None` when the kind does
    /// not apply to the current exposure mode.
    pub fn generate(
        &self,
        kind: ManagedKind,
    ) -> Result<Option<DynamicObject>, serde_json::Error> {
        use crate::controller::store::to_dynamic;
        match kind {
            ManagedKind::Deployment => {
                to_dynamic(&render_deployment(self)).map(Some)
            }
            ManagedKind::Service => to_dynamic(&render_service(self)).map(Some),
            ManagedKind::Ingress => {
                render_ingress(self).map(|i| to_dynamic(&i)).transpose()
            }
            ManagedKind::Issuer => Ok(render_issuer(self)),
            ManagedKind::Certificate => Ok(render_certificate(self)),
        }
    }
}
