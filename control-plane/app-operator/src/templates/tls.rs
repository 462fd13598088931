use kube::core::DynamicObject;
use serde_json::json;

use super::{ManagedKind, RenderContext};
use crate::crd::Exposure;

// cert-manager owns these schemas; the operator only assembles opaque
// documents and submits them.

fn tls_hostname(ctx: &RenderContext) -> Option<&str> {
    match &ctx.expose.exposure {
        Exposure::Routed {
            hostname,
            tls: true,
        } => Some(hostname.as_str()),
        _ => None,
    }
}

fn document(
    ctx: &RenderContext,
    kind: ManagedKind,
    spec: serde_json::Value,
) -> DynamicObject {
    let mut obj = DynamicObject::new(&ctx.name, &kind.api_resource())
        .data(json!({ "spec": spec }));
    obj.metadata = ctx.child_meta();
    obj
}

/// Namespaced self-signing Issuer.
pub fn render_issuer(ctx: &RenderContext) -> Option<DynamicObject> {
    tls_hostname(ctx)?;
    Some(document(ctx, ManagedKind::Issuer, json!({ "selfSigned": {} })))
}

/// Certificate for the routed hostname, issued by the record's Issuer and
/// stored in the secret the Ingress TLS block points at.
pub fn render_certificate(ctx: &RenderContext) -> Option<DynamicObject> {
    let host = tls_hostname(ctx)?;
    Some(document(
        ctx,
        ManagedKind::Certificate,
        json!({
            "dnsNames": [host],
            "issuerRef": {
                "kind": "Issuer",
                "name": ctx.name,
            },
            "secretName": ctx.tls_secret_name(),
        }),
    ))
}
