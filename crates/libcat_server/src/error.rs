//! HTTP mapping for core errors.
//!
//! # Invariants
//! - Authorization failures are 403, never a redirect to a login page.
//! - Form errors are 400 with `{"errors": {field: [messages]}}`.
//! - Storage failures are 500 with a generic body; details only go to the log.
//! - Malformed paths, queries and bodies keep the status axum assigns them,
//!   but only once the caller has passed the route's permission check.

use axum::extract::rejection::{FormRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use libcat_core::{AccountServiceError, AuthzError, CatalogServiceError, FormErrors};
use log::error;
use serde::Serialize;

const NON_FIELD_ERRORS: &str = "__all__";

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct FormErrorBody {
    pub errors: FormErrors,
}

#[derive(Debug)]
pub enum AppError {
    Forbidden(String),
    NotFound(String),
    Invalid(FormErrors),
    /// The request could not be extracted (bad path id, query or body).
    Rejected {
        status: StatusCode,
        message: String,
    },
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::Forbidden(message) => {
                (StatusCode::FORBIDDEN, Json(ErrorBody { error: message })).into_response()
            }
            Self::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorBody { error: message })).into_response()
            }
            Self::Invalid(errors) => {
                (StatusCode::BAD_REQUEST, Json(FormErrorBody { errors })).into_response()
            }
            Self::Rejected { status, message } => {
                (status, Json(ErrorBody { error: message })).into_response()
            }
            Self::Internal(detail) => {
                error!("event=request_failed module=server status=error detail={detail}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorBody {
                        error: "internal server error".to_string(),
                    }),
                )
                    .into_response()
            }
        }
    }
}

impl From<CatalogServiceError> for AppError {
    fn from(value: CatalogServiceError) -> Self {
        match value {
            CatalogServiceError::Forbidden(err) => Self::Forbidden(err.to_string()),
            err @ CatalogServiceError::NotFound { .. } => Self::NotFound(err.to_string()),
            CatalogServiceError::Invalid(errors) => Self::Invalid(errors),
            CatalogServiceError::Repo(err) => Self::Internal(err.to_string()),
        }
    }
}

impl From<AccountServiceError> for AppError {
    fn from(value: AccountServiceError) -> Self {
        match value {
            AccountServiceError::Invalid(errors) => Self::Invalid(errors),
            err @ AccountServiceError::InvalidCredentials => {
                Self::Invalid(FormErrors::single(NON_FIELD_ERRORS, err.to_string()))
            }
            AccountServiceError::Repo(err) => Self::Internal(err.to_string()),
            AccountServiceError::Hash(err) => Self::Internal(err.to_string()),
        }
    }
}

impl From<AuthzError> for AppError {
    fn from(value: AuthzError) -> Self {
        Self::Forbidden(value.to_string())
    }
}

impl From<PathRejection> for AppError {
    fn from(value: PathRejection) -> Self {
        Self::Rejected {
            status: value.status(),
            message: value.body_text(),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(value: QueryRejection) -> Self {
        Self::Rejected {
            status: value.status(),
            message: value.body_text(),
        }
    }
}

impl From<FormRejection> for AppError {
    fn from(value: FormRejection) -> Self {
        Self::Rejected {
            status: value.status(),
            message: value.body_text(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use libcat_core::{AuthzError, BookPermission};

    #[test]
    fn catalog_errors_map_to_status_codes() {
        let forbidden: AppError = CatalogServiceError::Forbidden(AuthzError::PermissionDenied {
            permission: BookPermission::View,
            username: None,
        })
        .into();
        assert_eq!(forbidden.into_response().status(), StatusCode::FORBIDDEN);

        let missing: AppError = CatalogServiceError::NotFound {
            entity: "book",
            id: 7,
        }
        .into();
        assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);

        let invalid: AppError =
            CatalogServiceError::Invalid(FormErrors::single("title", "required")).into();
        assert_eq!(invalid.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn bad_credentials_are_a_non_field_form_error() {
        let AppError::Invalid(errors) = AccountServiceError::InvalidCredentials.into() else {
            panic!("expected a form error");
        };
        assert!(errors.get(NON_FIELD_ERRORS).is_some());
    }
}
