use kube::core::DynamicObject;
use serde_json::Value;
use tracing::trace;

/// Decide whether `desired` must be written over `current`. Only the `spec`
/// sub-document is compared; metadata and status churn never triggers a
/// write.
pub fn needs_write(desired: &DynamicObject, current: &DynamicObject) -> bool {
    let differs = spec_of(desired) != spec_of(current);
    trace!(
        name = desired.metadata.name.as_deref().unwrap_or(""),
        differs, "diff: compared spec"
    );
    differs
}

fn spec_of(obj: &DynamicObject) -> &Value {
    obj.data.get("spec").unwrap_or(&Value::Null)
}

/// Carry the server-owned concurrency token onto a freshly rendered object
/// so the update is compare-on-write.
pub fn prepare_update(
    mut desired: DynamicObject,
    current: &DynamicObject,
) -> DynamicObject {
    desired.metadata.resource_version = current.metadata.resource_version.clone();
    desired
}
