use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, PodSpec, PodTemplateSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};

use super::RenderContext;

/// Render the application Deployment. Optional container fields stay unset
/// when empty so they never diff against the server copy.
pub fn render_deployment(ctx: &RenderContext) -> Deployment {
    let labels = Some(ctx.labels());
    let spec = &ctx.spec;

    let mut container = Container {
        name: ctx.name.clone(),
        image: Some(spec.image.clone()),
        ports: Some(vec![ContainerPort {
            container_port: spec.port,
            ..Default::default()
        }]),
        ..Default::default()
    };
    if !spec.start_cmd.is_empty() {
        container.command = Some(spec.start_cmd.clone());
    }
    if !spec.args.is_empty() {
        container.args = Some(spec.args.clone());
    }
    if !spec.environments.is_empty() {
        container.env = Some(
            spec.environments
                .iter()
                .map(|e| EnvVar {
                    name: e.name.clone(),
                    value: e.value.clone(),
                    ..Default::default()
                })
                .collect(),
        );
    }

    Deployment {
        metadata: ctx.child_meta(),
        spec: Some(DeploymentSpec {
            replicas: spec.replicas,
            selector: LabelSelector {
                match_labels: labels.clone(),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels,
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}
