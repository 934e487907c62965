use crate::access::DisclosureError;
use crate::alerts::AlertError;
use crate::config::ConfigError;
use crate::enforcement::EnforcementError;
use crate::monitoring::MonitorError;
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Disclosure(DisclosureError),
    Monitor(MonitorError),
    Enforcement(EnforcementError),
    Alert(AlertError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Disclosure(err) => match err {
                DisclosureError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                DisclosureError::PermissionDenied { .. } => StatusCode::FORBIDDEN,
                DisclosureError::AccountSuspended(_) => StatusCode::LOCKED,
                DisclosureError::ProfileNotFound(_) => StatusCode::NOT_FOUND,
                DisclosureError::Ledger(_) | DisclosureError::Repository(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
            },
            AppError::Monitor(err) => match err {
                MonitorError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                _ => StatusCode::SERVICE_UNAVAILABLE,
            },
            AppError::Enforcement(err) => match err {
                EnforcementError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                EnforcementError::InvalidTransition { .. } => StatusCode::CONFLICT,
                EnforcementError::NotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::SERVICE_UNAVAILABLE,
            },
            AppError::Alert(err) => match err {
                AlertError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                AlertError::InvalidState { .. } => StatusCode::CONFLICT,
                AlertError::NotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::SERVICE_UNAVAILABLE,
            },
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Disclosure(err) => write!(f, "{}", err),
            AppError::Monitor(err) => write!(f, "{}", err),
            AppError::Enforcement(err) => write!(f, "{}", err),
            AppError::Alert(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Disclosure(err) => Some(err),
            AppError::Monitor(err) => Some(err),
            AppError::Enforcement(err) => Some(err),
            AppError::Alert(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::Disclosure(DisclosureError::PermissionDenied { missing }) => json!({
                "error": self.to_string(),
                "missing": missing,
            }),
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<DisclosureError> for AppError {
    fn from(value: DisclosureError) -> Self {
        Self::Disclosure(value)
    }
}

impl From<MonitorError> for AppError {
    fn from(value: MonitorError) -> Self {
        Self::Monitor(value)
    }
}

impl From<EnforcementError> for AppError {
    fn from(value: EnforcementError) -> Self {
        Self::Enforcement(value)
    }
}

impl From<AlertError> for AppError {
    fn from(value: AlertError) -> Self {
        Self::Alert(value)
    }
}
