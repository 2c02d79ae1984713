use std::time::Duration;
use thiserror::Error;

use crate::domain::{ModelingMethod, SystemConfiguration};

#[derive(Debug, Error)]
pub enum ProductionError {
    #[error("invalid coordinates ({latitude}, {longitude})")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    #[error("invalid system size: {0} kW")]
    InvalidSystemSize(f64),

    #[error("capacity factor {0} is outside (0, 1]")]
    InvalidCapacityFactor(f64),

    #[error("production service rejected request at ({latitude}, {longitude}): {}", .errors.join("; "))]
    ServiceRejected {
        latitude: f64,
        longitude: f64,
        configuration: Box<SystemConfiguration>,
        errors: Vec<String>,
    },

    #[error("production service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("production service timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed production service response: {0}")]
    MalformedResponse(String),

    #[error("modeling method '{0}' is not implemented")]
    MethodNotImplemented(ModelingMethod),
}

impl ProductionError {
    /// Failures the estimator degrades from by switching to the synthetic model.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ProductionError::ServiceUnavailable(_)
                | ProductionError::Timeout(_)
                | ProductionError::MalformedResponse(_)
        )
    }
}

impl From<reqwest::Error> for ProductionError {
    fn from(e: reqwest::Error) -> Self {
        ProductionError::ServiceUnavailable(e.to_string())
    }
}
