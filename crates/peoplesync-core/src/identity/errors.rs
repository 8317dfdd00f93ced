//! Provider error codes and their translation into the error taxonomy.
//!
//! Collaborators report failures as a structured code. The code table here
//! is fixed: anything not listed falls back to a generic message.

use crate::error::SyncError;

/// Failure reported by an external collaborator (identity provider or
/// remote collection)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ProviderError {
    pub code: String,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn known_code(&self) -> Option<ErrorCode> {
        ErrorCode::parse(&self.code)
    }
}

/// Every provider code this system knows how to explain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    UserNotFound,
    WrongPassword,
    InvalidCredential,
    InvalidEmail,
    MissingPassword,
    UserDisabled,
    EmailAlreadyInUse,
    WeakPassword,
    OperationNotAllowed,
    RequiresRecentLogin,
    NetworkRequestFailed,
    Unavailable,
    PermissionDenied,
    NotFound,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 14] = [
        ErrorCode::UserNotFound,
        ErrorCode::WrongPassword,
        ErrorCode::InvalidCredential,
        ErrorCode::InvalidEmail,
        ErrorCode::MissingPassword,
        ErrorCode::UserDisabled,
        ErrorCode::EmailAlreadyInUse,
        ErrorCode::WeakPassword,
        ErrorCode::OperationNotAllowed,
        ErrorCode::RequiresRecentLogin,
        ErrorCode::NetworkRequestFailed,
        ErrorCode::Unavailable,
        ErrorCode::PermissionDenied,
        ErrorCode::NotFound,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::UserNotFound => "auth/user-not-found",
            ErrorCode::WrongPassword => "auth/wrong-password",
            ErrorCode::InvalidCredential => "auth/invalid-credential",
            ErrorCode::InvalidEmail => "auth/invalid-email",
            ErrorCode::MissingPassword => "auth/missing-password",
            ErrorCode::UserDisabled => "auth/user-disabled",
            ErrorCode::EmailAlreadyInUse => "auth/email-already-in-use",
            ErrorCode::WeakPassword => "auth/weak-password",
            ErrorCode::OperationNotAllowed => "auth/operation-not-allowed",
            ErrorCode::RequiresRecentLogin => "auth/requires-recent-login",
            ErrorCode::NetworkRequestFailed => "auth/network-request-failed",
            ErrorCode::Unavailable => "unavailable",
            ErrorCode::PermissionDenied => "permission-denied",
            ErrorCode::NotFound => "not-found",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == code)
    }

    pub fn error(self, message: impl Into<String>) -> ProviderError {
        ProviderError::new(self.as_str(), message)
    }
}

/// The user action a provider failure happened in; selects the wording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAction {
    SignIn,
    SignUp,
    SignOut,
    PasswordReset,
    Reauthenticate,
    ProfileUpdate,
    ContactWrite,
}

const SIGN_IN_GENERIC: &str = "Login failed. Please try again.";
const GENERIC: &str = "Something went wrong. Please try again.";

/// User-facing message for a provider code in the context of `action`
pub fn user_message(code: Option<ErrorCode>, action: AuthAction) -> &'static str {
    use ErrorCode::*;

    match action {
        AuthAction::SignIn | AuthAction::PasswordReset => match code {
            Some(UserNotFound) => "No user found with this email. Please sign up first.",
            Some(WrongPassword | InvalidCredential) => "Incorrect password. Please try again.",
            Some(InvalidEmail) => "Invalid email format.",
            Some(MissingPassword) => "Please enter your password.",
            Some(NetworkRequestFailed | Unavailable) => {
                "Network error. Please check your connection and try again."
            }
            Some(UserDisabled) => "Your account has been disabled. Please contact support.",
            _ => SIGN_IN_GENERIC,
        },
        AuthAction::SignUp => match code {
            Some(EmailAlreadyInUse) => "This email is already registered. Please log in instead.",
            Some(InvalidEmail) => "Please enter a valid email address.",
            Some(WeakPassword) => "Password should be at least 6 characters.",
            Some(OperationNotAllowed) => "Email/password accounts are not enabled.",
            Some(NetworkRequestFailed | Unavailable) => {
                "Network error. Please check your connection."
            }
            _ => GENERIC,
        },
        AuthAction::SignOut
        | AuthAction::Reauthenticate
        | AuthAction::ProfileUpdate
        | AuthAction::ContactWrite => {
            match code {
                Some(WrongPassword | InvalidCredential) => "Current password is incorrect.",
                Some(RequiresRecentLogin) => "Please sign in again to continue.",
                Some(WeakPassword) => "Password should be at least 6 characters.",
                Some(NetworkRequestFailed | Unavailable) => {
                    "Network error. Please check your connection and try again."
                }
                _ => GENERIC,
            }
        }
    }
}

/// Translate a collaborator failure into the error taxonomy.
pub fn translate(err: ProviderError, action: AuthAction) -> SyncError {
    use ErrorCode::*;

    let code = err.known_code();
    let message = user_message(code, action).to_string();

    match code {
        Some(NetworkRequestFailed | Unavailable) => SyncError::Network(message),
        Some(PermissionDenied) => SyncError::Authorization(err.message),
        Some(NotFound) => SyncError::NotFound(err.message),
        Some(RequiresRecentLogin) => SyncError::Reauthentication(message),
        Some(_) if action == AuthAction::Reauthenticate => SyncError::Reauthentication(message),
        Some(_) => SyncError::Authentication(message),
        None if action == AuthAction::Reauthenticate => SyncError::Reauthentication(message),
        None if err.code.starts_with("auth/") => SyncError::Authentication(message),
        None => SyncError::Network(message),
    }
}
