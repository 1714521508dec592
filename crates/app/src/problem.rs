use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use bizadmin_storage::{CompanyError, EmployeeError, HistoryError};

use crate::aggregates::LoadError;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// JSON error returned by the API: `{"error": "<message>"}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new<S: Into<String>>(status: StatusCode, message: S) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Datastore failure; the underlying message is passed through verbatim.
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        let message = err.to_string();
        error!(stage = "api", error = %message, "datastore request failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = Json(ErrorBody {
            error: self.message,
        })
        .into_response();
        *response.status_mut() = self.status;
        response
    }
}

impl From<CompanyError> for ApiError {
    fn from(err: CompanyError) -> Self {
        Self::internal(err)
    }
}

impl From<EmployeeError> for ApiError {
    fn from(err: EmployeeError) -> Self {
        Self::internal(err)
    }
}

impl From<HistoryError> for ApiError {
    fn from(err: HistoryError) -> Self {
        Self::internal(err)
    }
}

impl From<LoadError> for ApiError {
    fn from(err: LoadError) -> Self {
        Self::internal(err)
    }
}
