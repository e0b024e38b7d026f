use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure codes reported by the identity provider, object storage and the
/// callable-function gateway, normalized from their wire spellings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorCode {
    EmailExists,
    InvalidEmail,
    WeakPassword,
    InvalidCredential,
    UserDisabled,
    TooManyRequests,
    TokenExpired,
    PopupBlocked,
    PopupClosedByUser,
    CancelledPopupRequest,
    NetworkRequestFailed,
    Unauthenticated,
    PermissionDenied,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    Internal,
    Other(String),
}

impl ProviderErrorCode {
    /// Parses a provider code. Accepts the REST spellings (`EMAIL_EXISTS`,
    /// `WEAK_PASSWORD : Password should be at least 6 characters`), the
    /// client SDK spellings (`auth/popup-blocked`) and callable statuses
    /// (`UNAUTHENTICATED`).
    pub fn from_wire(raw: &str) -> Self {
        let head = raw.split(':').next().unwrap_or_default().trim();
        let normalized = head
            .trim_start_matches("auth/")
            .trim_start_matches("storage/")
            .trim_start_matches("functions/")
            .to_ascii_uppercase()
            .replace('-', "_");

        match normalized.as_str() {
            "EMAIL_EXISTS" | "EMAIL_ALREADY_IN_USE" => Self::EmailExists,
            "INVALID_EMAIL" | "MISSING_EMAIL" => Self::InvalidEmail,
            "WEAK_PASSWORD" | "MISSING_PASSWORD" => Self::WeakPassword,
            "INVALID_LOGIN_CREDENTIALS" | "INVALID_PASSWORD" | "EMAIL_NOT_FOUND"
            | "INVALID_CREDENTIAL" | "WRONG_PASSWORD" | "USER_NOT_FOUND" => {
                Self::InvalidCredential
            }
            "USER_DISABLED" => Self::UserDisabled,
            "TOO_MANY_ATTEMPTS_TRY_LATER" | "TOO_MANY_REQUESTS" | "RESOURCE_EXHAUSTED"
            | "QUOTA_EXCEEDED" => Self::TooManyRequests,
            "TOKEN_EXPIRED" | "INVALID_REFRESH_TOKEN" | "INVALID_ID_TOKEN"
            | "USER_TOKEN_EXPIRED" => Self::TokenExpired,
            "POPUP_BLOCKED" => Self::PopupBlocked,
            "POPUP_CLOSED_BY_USER" => Self::PopupClosedByUser,
            "CANCELLED_POPUP_REQUEST" => Self::CancelledPopupRequest,
            "NETWORK_REQUEST_FAILED" | "UNAVAILABLE" => Self::NetworkRequestFailed,
            "UNAUTHENTICATED" | "UNAUTHORIZED" => Self::Unauthenticated,
            "PERMISSION_DENIED" => Self::PermissionDenied,
            "INVALID_ARGUMENT" | "FAILED_PRECONDITION" => Self::InvalidArgument,
            "DEADLINE_EXCEEDED" | "RETRY_LIMIT_EXCEEDED" => Self::DeadlineExceeded,
            "NOT_FOUND" | "OBJECT_NOT_FOUND" => Self::NotFound,
            "INTERNAL" | "UNKNOWN" => Self::Internal,
            _ => Self::Other(head.to_string()),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{code:?}: {message}")]
pub struct ProviderError {
    pub code: ProviderErrorCode,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn from_wire(raw: &str) -> Self {
        Self::new(ProviderErrorCode::from_wire(raw), raw)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NetworkRequestFailed, message)
    }

    pub fn is(&self, code: &ProviderErrorCode) -> bool {
        &self.code == code
    }
}
