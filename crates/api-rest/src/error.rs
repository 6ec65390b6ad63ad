//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use femcare_core::{AccountError, AuthError, DashboardError, StoreError};

use crate::dto::ErrorRes;

const LOGIN_ROUTE: &str = "/login";

/// Every failure a handler can return.
#[derive(Debug)]
pub enum ApiError {
    /// No identity is signed in.
    Unauthenticated,
    Account(AccountError),
    Dashboard(DashboardError),
    Repair(StoreError),
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        ApiError::Account(err)
    }
}

impl From<DashboardError> for ApiError {
    fn from(err: DashboardError) -> Self {
        ApiError::Dashboard(err)
    }
}

fn auth_status(err: &AuthError) -> StatusCode {
    match err {
        AuthError::UserNotFound | AuthError::WrongPassword => StatusCode::UNAUTHORIZED,
        AuthError::InvalidEmail | AuthError::WeakPassword => StatusCode::BAD_REQUEST,
        AuthError::UserDisabled | AuthError::OperationNotAllowed => StatusCode::FORBIDDEN,
        AuthError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
        AuthError::EmailAlreadyInUse => StatusCode::CONFLICT,
        AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    fn parts(&self) -> (StatusCode, String, Option<&'static str>) {
        match self {
            ApiError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "Not authenticated".to_owned(),
                Some(LOGIN_ROUTE),
            ),
            ApiError::Account(err) => {
                let status = match err {
                    AccountError::PasswordReset(AuthError::UserNotFound) => StatusCode::NOT_FOUND,
                    AccountError::SignIn(e)
                    | AccountError::Registration(e)
                    | AccountError::PasswordReset(e) => auth_status(e),
                    AccountError::LoginProfile(_) | AccountError::RegistrationProfile(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, err.user_message().to_owned(), None)
            }
            ApiError::Dashboard(err) => match err {
                DashboardError::NoPatientData => (StatusCode::NOT_FOUND, err.to_string(), None),
                DashboardError::Unauthorized => {
                    (StatusCode::UNAUTHORIZED, err.to_string(), Some(LOGIN_ROUTE))
                }
                DashboardError::Fetch(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string(), None)
                }
            },
            ApiError::Repair(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_owned(),
                None,
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, reason, redirect) = self.parts();
        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        }

        let body = ErrorRes {
            success: false,
            reason,
            redirect: redirect.map(str::to_owned),
        };
        (status, Json(body)).into_response()
    }
}
