//! # Error Handling
//!
//! Every configuration mistake (a page below 1, an unknown search type, a
//! resource mapper nobody registered, ...) surfaces as
//! [`DataTableError::InvalidParameter`] at the moment the bad value is set.
//! Failures of the underlying query engine are carried unchanged in
//! [`DataTableError::Query`].
//!
//! When returned from an Axum handler the error becomes a JSON response:
//! configuration errors are reported verbatim with `400 Bad Request`, query
//! errors are logged through `tracing` and answered with a generic
//! `500 Internal Server Error`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use serde::Serialize;
use std::fmt;

#[derive(Debug)]
pub enum DataTableError {
    /// A setter or filter builder received a value outside its allowed range
    InvalidParameter {
        /// User-facing error message
        message: String,
    },

    /// The query engine failed while executing (details logged, not exposed)
    Query(DbErr),
}

impl DataTableError {
    /// Create an `InvalidParameter` error
    ///
    /// # Example
    /// ```rust,ignore
    /// return Err(DataTableError::invalid("Page number must be greater than 0"));
    /// ```
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_invalid_parameter(&self) -> bool {
        matches!(self, Self::InvalidParameter { .. })
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidParameter { .. } => StatusCode::BAD_REQUEST,
            Self::Query(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the user-facing error message (sanitized)
    fn user_message(&self) -> String {
        match self {
            Self::InvalidParameter { message } => message.clone(),
            Self::Query(_) => "A database error occurred".to_string(),
        }
    }

    fn log_internal(&self) {
        match self {
            Self::Query(internal) => {
                tracing::error!(error = ?internal, "Query execution failed");
            }
            Self::InvalidParameter { message } => {
                tracing::debug!(error = %message, "Invalid data table parameter");
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for DataTableError {
    fn into_response(self) -> Response {
        self.log_internal();

        let status = self.status_code();
        let response = ErrorResponse {
            error: self.user_message(),
        };

        (status, Json(response)).into_response()
    }
}

impl fmt::Display for DataTableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParameter { message } => write!(f, "{message}"),
            Self::Query(err) => write!(f, "query failed: {err}"),
        }
    }
}

impl std::error::Error for DataTableError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Query(err) => Some(err),
            Self::InvalidParameter { .. } => None,
        }
    }
}

impl From<DbErr> for DataTableError {
    fn from(err: DbErr) -> Self {
        Self::Query(err)
    }
}
