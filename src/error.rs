//! Error taxonomy shared by the policy, store and service layers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::integrity::UniqueKey;
use crate::telemetry::record_unique_conflict;

#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

impl ApiError {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }
}

/// Why a caller was refused. Kept separate from validation and missing
/// resources so the transport layer can pick the right status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForbiddenReason {
    NotPermitted,
    RoleChangeRequiresAdmin,
    ProductBanned,
    ModerationFieldsOnly,
    ElevatedRoleRequired,
    AdminRequired,
}

impl ForbiddenReason {
    pub fn message(&self) -> &'static str {
        match self {
            ForbiddenReason::NotPermitted => "Not authorized to perform this action",
            ForbiddenReason::RoleChangeRequiresAdmin => "Only admins can change user roles",
            ForbiddenReason::ProductBanned => "Product is banned and cannot be edited",
            ForbiddenReason::ModerationFieldsOnly => {
                "Moderators may only change moderation fields"
            }
            ForbiddenReason::ElevatedRoleRequired => "Moderator or admin access required",
            ForbiddenReason::AdminRequired => "Admin access required",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ForbiddenReason::NotPermitted => "FORBIDDEN",
            ForbiddenReason::RoleChangeRequiresAdmin => "ROLE_CHANGE_FORBIDDEN",
            ForbiddenReason::ProductBanned => "PRODUCT_BANNED",
            ForbiddenReason::ModerationFieldsOnly => "MODERATION_FIELDS_ONLY",
            ForbiddenReason::ElevatedRoleRequired => "ELEVATED_ROLE_REQUIRED",
            ForbiddenReason::AdminRequired => "ADMIN_REQUIRED",
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("{}", .0.message())]
    Forbidden(ForbiddenReason),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {}", .0.message())]
    Conflict(UniqueKey),

    #[error("Conflict: {0}")]
    StateConflict(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn forbidden() -> Self {
        ServiceError::Forbidden(ForbiddenReason::NotPermitted)
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ServiceError::Validation(msg.into())
    }

    pub fn storage(err: impl std::fmt::Display) -> Self {
        ServiceError::Storage(err.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Conflict(_) | ServiceError::StateConflict(_) => StatusCode::CONFLICT,
            ServiceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Unauthenticated => "UNAUTHENTICATED",
            ServiceError::Forbidden(reason) => reason.code(),
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::Validation(_) => "VALIDATION_ERROR",
            ServiceError::Conflict(key) => key.code(),
            ServiceError::StateConflict(_) => "CONFLICT",
            ServiceError::Storage(_) => "STORAGE_ERROR",
        }
    }

    pub fn to_api_error(&self) -> ApiError {
        match self {
            // Storage details stay in the logs.
            ServiceError::Storage(_) => ApiError::new("Internal server error", self.code()),
            other => ApiError::new(other.to_string(), other.code()),
        }
    }
}

impl From<diesel::result::Error> for ServiceError {
    fn from(err: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind, Error};

        match err {
            Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                match info.constraint_name().and_then(UniqueKey::from_constraint_name) {
                    Some(key) => {
                        record_unique_conflict(key.constraint_name());
                        ServiceError::Conflict(key)
                    }
                    None => ServiceError::StateConflict(info.message().to_string()),
                }
            }
            Error::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                ServiceError::Validation(format!("Referenced row does not exist: {}", info.message()))
            }
            Error::DatabaseError(DatabaseErrorKind::CheckViolation, info) => {
                ServiceError::Validation(info.message().to_string())
            }
            Error::DatabaseError(DatabaseErrorKind::SerializationFailure, info) => {
                ServiceError::StateConflict(info.message().to_string())
            }
            other => ServiceError::Storage(other.to_string()),
        }
    }
}

impl From<diesel::r2d2::PoolError> for ServiceError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        ServiceError::Storage(format!("Database connection unavailable: {err}"))
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::Validation(format!("Validation error: {err}"))
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        if let ServiceError::Storage(detail) = &self {
            error!(error = %detail, "Storage failure");
        }
        (self.status(), Json(self.to_api_error())).into_response()
    }
}
