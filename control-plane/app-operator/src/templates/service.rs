use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use super::RenderContext;
use crate::crd::Exposure;

/// ClusterIP Service in routed mode; NodePort Service bound to the chosen
/// external port in direct-port mode.
pub fn render_service(ctx: &RenderContext) -> Service {
    let mut port = ServicePort {
        name: Some("http".to_string()),
        protocol: Some("TCP".to_string()),
        port: ctx.expose.service_port,
        target_port: Some(IntOrString::Int(ctx.spec.port)),
        ..Default::default()
    };
    let type_ = match &ctx.expose.exposure {
        Exposure::Routed { .. } => "ClusterIP",
        Exposure::DirectPort { node_port } => {
            port.node_port = Some(node_port.get());
            "NodePort"
        }
    };

    Service {
        metadata: ctx.child_meta(),
        spec: Some(ServiceSpec {
            type_: Some(type_.to_string()),
            selector: Some(ctx.labels()),
            ports: Some(vec![port]),
            ..Default::default()
        }),
        ..Default::default()
    }
}
