//! HTTP error responses.
//!
//! Bridges [`BookingError`] to JSON error bodies `{ code, message, details? }`
//! through Axum's `IntoResponse`.

use crate::error::BookingError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};
use std::fmt;

/// Error returned by HTTP handlers
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    code: String,
    details: Option<Value>,
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Creates an error with an explicit status and code
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: String) -> Self {
        Self {
            status,
            message,
            code,
            details: None,
            source: None,
        }
    }

    /// Attach structured details for the client
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Attach the underlying error, logged for server errors
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// 400 with code `BAD_REQUEST`
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            message.into(),
            "BAD_REQUEST".to_string(),
        )
    }

    /// 401 with code `UNAUTHORIZED`
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            message.into(),
            "UNAUTHORIZED".to_string(),
        )
    }

    /// 403 with code `FORBIDDEN`
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            message.into(),
            "FORBIDDEN".to_string(),
        )
    }

    /// 500 with code `INTERNAL_SERVER_ERROR`
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message.into(),
            "INTERNAL_SERVER_ERROR".to_string(),
        )
    }

    /// HTTP status
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable code
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            match &self.source {
                Some(source) => tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    error = %source,
                    "Internal server error"
                ),
                None => tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    "Internal server error"
                ),
            }
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
            details: self.details,
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<BookingError> for AppError {
    fn from(error: BookingError) -> Self {
        let status = match &error {
            BookingError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            BookingError::NotFound { .. } => StatusCode::NOT_FOUND,
            BookingError::StallDisabled { .. }
            | BookingError::StallAlreadyReserved { .. }
            | BookingError::InvalidState { .. }
            | BookingError::Conflict { .. }
            | BookingError::VendorHasActiveReservations { .. } => StatusCode::CONFLICT,
            BookingError::QuotaExceeded { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            BookingError::Forbidden { .. } => StatusCode::FORBIDDEN,
            BookingError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        };

        let details = match &error {
            BookingError::StallDisabled { stall_codes }
            | BookingError::StallAlreadyReserved { stall_codes } => {
                Some(json!({ "stall_codes": stall_codes }))
            },
            BookingError::QuotaExceeded {
                current_count,
                requested,
                limit,
            } => Some(json!({
                "current_count": current_count,
                "requested": requested,
                "limit": limit,
            })),
            BookingError::InvalidState { current, expected } => {
                Some(json!({ "current": current, "expected": expected }))
            },
            BookingError::VendorHasActiveReservations { count } => {
                Some(json!({ "active_reservations": count }))
            },
            _ => None,
        };

        let app_error = Self::new(status, error.to_string(), error.code().to_string());
        match details {
            Some(details) => app_error.with_details(details),
            None => app_error,
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("An internal error occurred").with_source(err)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::Resource;
    use crate::types::ReservationStatus;

    #[test]
    fn test_error_display() {
        let err = AppError::bad_request("Invalid input");
        assert_eq!(err.to_string(), "[BAD_REQUEST] Invalid input");
    }

    #[test]
    fn test_quota_maps_to_422_with_details() {
        let err = AppError::from(BookingError::QuotaExceeded {
            current_count: 2,
            requested: 2,
            limit: 3,
        });
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code(), "QUOTA_EXCEEDED");
        let details = err.details.unwrap();
        assert_eq!(details["current_count"], 2);
        assert_eq!(details["limit"], 3);
    }

    #[test]
    fn test_race_loss_is_distinguishable_from_quota() {
        let err = AppError::from(BookingError::StallAlreadyReserved {
            stall_codes: vec!["B-03".to_string()],
        });
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "STALL_ALREADY_RESERVED");
        assert_eq!(err.details.unwrap()["stall_codes"][0], "B-03");
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (BookingError::invalid("x"), StatusCode::BAD_REQUEST),
            (
                BookingError::not_found(Resource::Stall, "A-01"),
                StatusCode::NOT_FOUND,
            ),
            (
                BookingError::InvalidState {
                    current: ReservationStatus::Cancelled,
                    expected: ReservationStatus::Pending,
                },
                StatusCode::CONFLICT,
            ),
            (BookingError::forbidden("x"), StatusCode::FORBIDDEN),
            (
                BookingError::Unavailable {
                    reason: "shutting down".to_string(),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(AppError::from(error).status(), status);
        }
    }
}
