pub mod app_deployment;
pub mod exposure;

pub use app_deployment::*;
pub use exposure::{
    Exposure, ExposureError, FieldError, NodePort, ResolvedExpose,
    ValidationErrors,
};
