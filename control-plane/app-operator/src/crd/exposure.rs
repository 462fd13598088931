use super::app_deployment::{AppDeploymentSpec, ExposeSpec};

pub const MODE_ROUTED: &str = "routed";
pub const MODE_DIRECT_PORT: &str = "direct-port";

pub const NODE_PORT_MIN: i32 = 30000;
pub const NODE_PORT_MAX: i32 = 32767;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ExposureError {
    #[error("unsupported expose mode {0:?}; expected \"routed\" or \"direct-port\"")]
    UnsupportedMode(String),
    #[error("expose.ingressDomain is required when mode is \"routed\"")]
    MissingHostname,
    #[error("expose.nodePort is required when mode is \"direct-port\"")]
    MissingNodePort,
    #[error("expose.nodePort {0} is outside the allowed range 30000-32767")]
    NodePortOutOfRange(i32),
    #[error("expose.servicePort {0} is not a valid port")]
    InvalidServicePort(i32),
}

/// An external node port, guaranteed to lie in [30000, 32767].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodePort(i32);

impl NodePort {
    pub fn new(port: i32) -> Result<Self, ExposureError> {
        if (NODE_PORT_MIN..=NODE_PORT_MAX).contains(&port) {
            Ok(NodePort(port))
        } else {
            Err(ExposureError::NodePortOutOfRange(port))
        }
    }

    pub fn get(self) -> i32 {
        self.0
    }
}

/// Resolved exposure strategy. The two modes are mutually exclusive and
/// carry only the fields that make sense for them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Exposure {
    Routed { hostname: String, tls: bool },
    DirectPort { node_port: NodePort },
}

impl Exposure {
    /// True only for routed mode with TLS requested.
    pub fn wants_tls(&self) -> bool {
        matches!(self, Exposure::Routed { tls: true, .. })
    }

    pub fn mode_name(&self) -> &'static str {
        match self {
            Exposure::Routed { .. } => MODE_ROUTED,
            Exposure::DirectPort { .. } => MODE_DIRECT_PORT,
        }
    }
}

/// Exposure plus the effective service port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedExpose {
    pub exposure: Exposure,
    pub service_port: i32,
}

impl ExposeSpec {
    /// Build the tagged exposure variant. Invalid combinations are errors;
    /// nothing is clamped or guessed.
    pub fn resolve(
        &self,
        container_port: i32,
    ) -> Result<ResolvedExpose, ExposureError> {
        let exposure = match self.mode.as_str() {
            MODE_ROUTED => {
                let hostname = self
                    .ingress_domain
                    .as_deref()
                    .map(str::trim)
                    .filter(|h| !h.is_empty())
                    .ok_or(ExposureError::MissingHostname)?;
                Exposure::Routed {
                    hostname: hostname.to_string(),
                    tls: self.tls,
                }
            }
            MODE_DIRECT_PORT => {
                let port =
                    self.node_port.ok_or(ExposureError::MissingNodePort)?;
                Exposure::DirectPort {
                    node_port: NodePort::new(port)?,
                }
            }
            other => return Err(ExposureError::UnsupportedMode(other.into())),
        };
        let service_port = match self.service_port {
            None | Some(0) => container_port,
            Some(p) if (1..=65535).contains(&p) => p,
            Some(p) => return Err(ExposureError::InvalidServicePort(p)),
        };
        Ok(ResolvedExpose {
            exposure,
            service_port,
        })
    }
}

/// A single rejected field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    pub path: &'static str,
    pub message: String,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid AppDeployment spec: {}", join_errors(.0))]
pub struct ValidationErrors(pub Vec<FieldError>);

fn join_errors(errs: &[FieldError]) -> String {
    errs.iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl AppDeploymentSpec {
    /// Copy of the spec with defaults filled in: replicas 0/absent -> 1,
    /// expose.servicePort 0/absent -> port.
    pub fn defaulted(&self) -> AppDeploymentSpec {
        let mut out = self.clone();
        if out.replicas.unwrap_or(0) == 0 {
            out.replicas = Some(1);
        }
        if out.expose.service_port.unwrap_or(0) == 0 {
            out.expose.service_port = Some(out.port);
        }
        out
    }

    /// Collect every field error instead of stopping at the first one.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errs = Vec::new();
        if self.image.trim().is_empty() {
            errs.push(FieldError {
                path: "spec.image",
                message: "must not be empty".into(),
            });
        }
        if self.port <= 0 || self.port > 65535 {
            errs.push(FieldError {
                path: "spec.port",
                message: format!("{} is not a valid port", self.port),
            });
        }
        if self.replicas.is_some_and(|r| r < 0) {
            errs.push(FieldError {
                path: "spec.replicas",
                message: "must not be negative".into(),
            });
        }
        if let Err(e) = self.expose.resolve(self.port) {
            let path = match e {
                ExposureError::UnsupportedMode(_) => "spec.expose.mode",
                ExposureError::MissingHostname => "spec.expose.ingressDomain",
                ExposureError::MissingNodePort
                | ExposureError::NodePortOutOfRange(_) => {
                    "spec.expose.nodePort"
                }
                ExposureError::InvalidServicePort(_) => {
                    "spec.expose.servicePort"
                }
            };
            errs.push(FieldError {
                path,
                message: e.to_string(),
            });
        }
        if errs.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(errs))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expose(mode: &str) -> ExposeSpec {
        ExposeSpec {
            mode: mode.into(),
            ..Default::default()
        }
    }

    #[test]
    fn node_port_bounds_are_inclusive() {
        assert!(NodePort::new(30000).is_ok());
        assert!(NodePort::new(32767).is_ok());
        assert_eq!(
            NodePort::new(29999),
            Err(ExposureError::NodePortOutOfRange(29999))
        );
        assert_eq!(
            NodePort::new(32768),
            Err(ExposureError::NodePortOutOfRange(32768))
        );
    }

    #[test]
    fn routed_requires_hostname() {
        let mut e = expose(MODE_ROUTED);
        assert_eq!(e.resolve(80), Err(ExposureError::MissingHostname));
        e.ingress_domain = Some("   ".into());
        assert_eq!(e.resolve(80), Err(ExposureError::MissingHostname));
        e.ingress_domain = Some("a.example.com".into());
        e.tls = true;
        let r = e.resolve(80).unwrap();
        assert!(r.exposure.wants_tls());
        assert_eq!(r.service_port, 80);
    }

    #[test]
    fn direct_port_out_of_range_is_not_clamped() {
        let mut e = expose(MODE_DIRECT_PORT);
        e.node_port = Some(29999);
        assert_eq!(
            e.resolve(8080),
            Err(ExposureError::NodePortOutOfRange(29999))
        );
    }

    #[test]
    fn tls_flag_is_ignored_outside_routed_mode() {
        let mut e = expose(MODE_DIRECT_PORT);
        e.node_port = Some(31000);
        e.tls = true;
        let r = e.resolve(8080).unwrap();
        assert!(!r.exposure.wants_tls());
        assert!(matches!(r.exposure, Exposure::DirectPort { .. }));
    }

    #[test]
    fn unknown_mode_fails_closed() {
        assert_eq!(
            expose("nodePort").resolve(80),
            Err(ExposureError::UnsupportedMode("nodePort".into()))
        );
    }

    #[test]
    fn explicit_service_port_wins() {
        let mut e = expose(MODE_DIRECT_PORT);
        e.node_port = Some(31000);
        e.service_port = Some(9090);
        assert_eq!(e.resolve(8080).unwrap().service_port, 9090);
        e.service_port = Some(0);
        assert_eq!(e.resolve(8080).unwrap().service_port, 8080);
    }

    #[test]
    fn out_of_range_service_port_is_rejected_not_defaulted() {
        let mut e = expose(MODE_DIRECT_PORT);
        e.node_port = Some(31000);
        for bad in [-5, 65536] {
            e.service_port = Some(bad);
            assert_eq!(
                e.resolve(8080),
                Err(ExposureError::InvalidServicePort(bad))
            );
        }

        let spec = AppDeploymentSpec {
            image: "x".into(),
            port: 8080,
            expose: ExposeSpec {
                service_port: Some(-5),
                ..e
            },
            ..Default::default()
        };
        assert_eq!(spec.defaulted().expose.service_port, Some(-5));
        let errs = spec.validate().unwrap_err();
        let paths: Vec<_> = errs.0.iter().map(|e| e.path).collect();
        assert_eq!(paths, vec!["spec.expose.servicePort"]);
    }

    #[test]
    fn defaulted_fills_replicas_and_service_port() {
        let spec = AppDeploymentSpec {
            image: "x".into(),
            port: 8080,
            replicas: Some(0),
            expose: expose(MODE_ROUTED),
            ..Default::default()
        };
        let d = spec.defaulted();
        assert_eq!(d.replicas, Some(1));
        assert_eq!(d.expose.service_port, Some(8080));
        // original untouched
        assert_eq!(spec.replicas, Some(0));
    }

    #[test]
    fn validate_reports_all_field_errors() {
        let spec = AppDeploymentSpec {
            image: "".into(),
            port: 0,
            expose: expose("ingress"),
            ..Default::default()
        };
        let errs = spec.validate().unwrap_err();
        let paths: Vec<_> = errs.0.iter().map(|e| e.path).collect();
        assert_eq!(
            paths,
            vec!["spec.image", "spec.port", "spec.expose.mode"]
        );
    }
}
