use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend,
    IngressRule, IngressServiceBackend, IngressSpec, IngressTLS,
    ServiceBackendPort,
};

use super::RenderContext;
use crate::crd::Exposure;

/// Single-rule Ingress routing `/` on the hostname to the record's Service.
/// `None` outside routed mode.
pub fn render_ingress(ctx: &RenderContext) -> Option<Ingress> {
    let Exposure::Routed { hostname, tls } = &ctx.expose.exposure else {
        return None;
    };

    let backend = IngressBackend {
        service: Some(IngressServiceBackend {
            name: ctx.name.clone(),
            port: Some(ServiceBackendPort {
                number: Some(ctx.expose.service_port),
                ..Default::default()
            }),
        }),
        ..Default::default()
    };
    let rule = IngressRule {
        host: Some(hostname.clone()),
        http: Some(HTTPIngressRuleValue {
            paths: vec![HTTPIngressPath {
                path: Some("/".to_string()),
                path_type: "Prefix".to_string(),
                backend,
            }],
        }),
    };
    let tls_block = tls.then(|| {
        vec![IngressTLS {
            hosts: Some(vec![hostname.clone()]),
            secret_name: Some(ctx.tls_secret_name()),
        }]
    });

    Some(Ingress {
        metadata: ctx.child_meta(),
        spec: Some(IngressSpec {
            ingress_class_name: ctx.ingress_class.clone(),
            rules: Some(vec![rule]),
            tls: tls_block,
            ..Default::default()
        }),
        ..Default::default()
    })
}
