use std::time::Duration;

use envconfig::Envconfig;

use crate::controller::ReconcileSettings;

#[derive(Envconfig, Clone, Debug)]
pub struct OperatorConfig {
    #[envconfig(from = "HTTP_PORT", default = "8089")]
    pub http_port: u16,

    /// Restrict the watch to one namespace; unset watches all namespaces.
    /// Env: OPERATOR_WATCH_NAMESPACE
    #[envconfig(from = "OPERATOR_WATCH_NAMESPACE")]
    pub watch_namespace: Option<String>,

    #[envconfig(from = "OPERATOR_FIELD_MANAGER", default = "app-operator")]
    pub field_manager: String,

    /// Delay before re-checking a record whose children are not ready yet.
    /// Env: OPERATOR_REQUEUE_SECS
    #[envconfig(from = "OPERATOR_REQUEUE_SECS", default = "10")]
    pub requeue_secs: u64,

    /// Backoff after a failed pass (conflicts retry sooner).
    /// Env: OPERATOR_ERROR_REQUEUE_SECS
    #[envconfig(from = "OPERATOR_ERROR_REQUEUE_SECS", default = "30")]
    pub error_requeue_secs: u64,

    /// Empty string leaves ingressClassName unset.
    #[envconfig(from = "OPERATOR_INGRESS_CLASS", default = "nginx")]
    pub ingress_class: String,
}

impl OperatorConfig {
    pub fn reconcile_settings(&self) -> ReconcileSettings {
        let ingress_class = match self.ingress_class.trim() {
            "" => None,
            class => Some(class.to_string()),
        };
        ReconcileSettings {
            requeue_after: Duration::from_secs(self.requeue_secs),
            ingress_class,
        }
    }
}
