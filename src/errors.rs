use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Internal server error: {0}")]
    InternalServerError(String),

    #[error("Body parsing error: {0}")]
    BodyParsingError(String),

    #[error("Monitoring API error: {0}")]
    MonitoringApiError(String),

    #[error("Temporarily unavailable: {0}")]
    ServiceUnavailable(String),
}

/// Helper for mapping any unknown error into internal error
pub fn internal_error<E: ToString>(err: E) -> AppError {
    AppError::InternalServerError(err.to_string())
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match self {
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BodyParsingError(_) => StatusCode::BAD_REQUEST,
            AppError::MonitoringApiError(_) => StatusCode::BAD_GATEWAY,
            // 503 makes push queues redeliver the task later
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let body = Json(json!({
            "message": self.to_string()
        }));

        (status, body).into_response()
    }
}

/// Classified failures of the discovery / retrieval / export pipeline.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("config error: {0}")]
    Config(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("monitoring API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("no series returned for filter `{filter}`")]
    NoSeries { filter: String },

    #[error("{count} series returned for filter `{filter}`, expected exactly one")]
    AmbiguousSeries { filter: String, count: usize },

    #[error("label value `{0}` contains a double quote")]
    InvalidLabelValue(String),

    #[error("export sink error: {0}")]
    Sink(String),

    #[error("task queue error: {0}")]
    Queue(String),

    #[error("task worker returned {status}: {body}")]
    Worker { status: u16, body: String },
}

impl ExportError {
    /// Network failures, throttling and backend 5xx are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            ExportError::Transport(_) => true,
            ExportError::Api { status, .. } => *status == 429 || *status >= 500,
            // the worker asks for redelivery only with 429/503; other codes mean the job ran
            ExportError::Worker { status, .. } => *status == 429 || *status == 503,
            _ => false,
        }
    }

    /// Errors that abort the whole run instead of a single job.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ExportError::Auth(_) | ExportError::Config(_))
    }
}

impl From<ExportError> for AppError {
    fn from(err: ExportError) -> Self {
        let message = err.to_string();
        match &err {
            ExportError::Config(_) | ExportError::InvalidLabelValue(_) => {
                AppError::BodyParsingError(message)
            }
            ExportError::Queue(_) => AppError::ServiceUnavailable(message),
            e if e.is_retryable() => AppError::ServiceUnavailable(message),
            ExportError::Auth(_) | ExportError::Api { .. } => AppError::MonitoringApiError(message),
            _ => AppError::InternalServerError(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(ExportError::Transport("reset".into()).is_retryable());
        assert!(ExportError::Api { status: 503, body: String::new() }.is_retryable());
        assert!(ExportError::Api { status: 429, body: String::new() }.is_retryable());
        assert!(!ExportError::Api { status: 400, body: String::new() }.is_retryable());
        assert!(!ExportError::NoSeries { filter: "f".into() }.is_retryable());
        assert!(!ExportError::Auth("denied".into()).is_retryable());
        assert!(ExportError::Worker { status: 503, body: String::new() }.is_retryable());
        assert!(!ExportError::Worker { status: 500, body: String::new() }.is_retryable());
        assert!(!ExportError::Worker { status: 502, body: String::new() }.is_retryable());
    }

    #[test]
    fn only_auth_and_config_are_fatal() {
        assert!(ExportError::Auth("x".into()).is_fatal());
        assert!(ExportError::Config("x".into()).is_fatal());
        assert!(!ExportError::Transport("x".into()).is_fatal());
        assert!(!ExportError::AmbiguousSeries { filter: "f".into(), count: 2 }.is_fatal());
    }

    #[test]
    fn export_errors_map_to_http_errors() {
        let app: AppError = ExportError::Transport("timeout".into()).into();
        assert!(matches!(app, AppError::ServiceUnavailable(_)));

        let app: AppError = ExportError::InvalidLabelValue("a\"b".into()).into();
        assert!(matches!(app, AppError::BodyParsingError(_)));

        let app: AppError = ExportError::Auth("denied".into()).into();
        assert!(matches!(app, AppError::MonitoringApiError(_)));

        let app: AppError = ExportError::AmbiguousSeries { filter: "f".into(), count: 3 }.into();
        assert!(matches!(app, AppError::InternalServerError(_)));
    }
}
