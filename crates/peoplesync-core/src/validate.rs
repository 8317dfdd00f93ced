//! Input validation for contacts, credentials, display names and images.
//!
//! Everything here is pure and returns its verdict as a value so callers can
//! render field-scoped messages. Nothing performs I/O.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::SyncError;
use crate::types::{ContactField, ContactFormData, ImageBlob};

/// Upper bound for an uploaded image, in bytes (2 MiB)
pub const MAX_IMAGE_BYTES: usize = 2 * 1024 * 1024;

/// MIME types accepted for avatar uploads
pub const ALLOWED_IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/gif", "image/webp"];

/// Symbols that satisfy the password policy's symbol requirement
pub const PASSWORD_SYMBOLS: &str = "@$!%*#?&";

pub const MIN_PASSWORD_LEN: usize = 8;

/// Minimum number of digits in a phone number
pub const MIN_PHONE_DIGITS: usize = 10;

pub const MAX_DISPLAY_NAME_LEN: usize = 64;

pub const PASSWORD_POLICY_MESSAGE: &str =
    "Password must be at least 8 characters and include letters, numbers & symbols";

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9\s\-()]+$").expect("valid phone regex"));

/// Outcome of validating a form: valid, or a message per failing field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation<F: Ord> {
    errors: BTreeMap<F, String>,
}

impl<F: Ord + Copy + std::fmt::Display> Validation<F> {
    fn new() -> Self {
        Self {
            errors: BTreeMap::new(),
        }
    }

    /// Record `message` for `field` unless the field already failed.
    fn fail(&mut self, field: F, message: impl Into<String>) {
        self.errors.entry(field).or_insert_with(|| message.into());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &BTreeMap<F, String> {
        &self.errors
    }

    pub fn error(&self, field: F) -> Option<&str> {
        self.errors.get(&field).map(String::as_str)
    }

    /// Message of the first failing field, for form-level banners
    pub fn first_error(&self) -> Option<&str> {
        self.errors.values().next().map(String::as_str)
    }

    /// `Ok(())` if valid, otherwise a [`SyncError::Validation`]
    pub fn into_result(self) -> Result<(), SyncError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(SyncError::validation(self.errors))
        }
    }
}

/// Credential form fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CredentialField {
    Email,
    Password,
    Confirm,
}

impl std::fmt::Display for CredentialField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            CredentialField::Email => "email",
            CredentialField::Password => "password",
            CredentialField::Confirm => "confirm",
        })
    }
}

/// Result of an image check: the first failing check's message, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCheck {
    pub valid: bool,
    pub error: Option<String>,
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email.trim())
}

/// Relaxed international phone shape: optional leading `+`, then digits,
/// spaces, hyphens and parentheses, with at least ten digits overall.
pub fn is_valid_phone(phone: &str) -> bool {
    let phone = phone.trim();
    PHONE_RE.is_match(phone)
        && phone.chars().filter(|c| c.is_ascii_digit()).count() >= MIN_PHONE_DIGITS
}

/// Validate a contact form. Name, email and phone are required; role and
/// location are free text.
pub fn validate_contact(data: &ContactFormData) -> Validation<ContactField> {
    let mut v = Validation::new();

    if data.name.trim().is_empty() {
        v.fail(ContactField::Name, "Name is required");
    }

    if data.email.trim().is_empty() {
        v.fail(ContactField::Email, "Email is required");
    } else if !is_valid_email(&data.email) {
        v.fail(ContactField::Email, "Please enter a valid email address");
    }

    if data.phone.trim().is_empty() {
        v.fail(ContactField::Phone, "Phone is required");
    } else if !is_valid_phone(&data.phone) {
        v.fail(ContactField::Phone, "Please enter a valid phone number");
    }

    v
}

/// Password policy: at least 8 characters with a letter, a digit and one of
/// [`PASSWORD_SYMBOLS`].
pub fn check_password_policy(password: &str) -> Result<(), &'static str> {
    let long_enough = password.chars().count() >= MIN_PASSWORD_LEN;
    let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_symbol = password.chars().any(|c| PASSWORD_SYMBOLS.contains(c));

    if long_enough && has_letter && has_digit && has_symbol {
        Ok(())
    } else {
        Err(PASSWORD_POLICY_MESSAGE)
    }
}

/// Validate the sign-up form
pub fn validate_credentials(email: &str, password: &str, confirm: &str) -> Validation<CredentialField> {
    let mut v = Validation::new();

    if email.trim().is_empty() {
        v.fail(CredentialField::Email, "Email is required");
    } else if !is_valid_email(email) {
        v.fail(CredentialField::Email, "Please enter a valid email address.");
    }

    if password.trim().is_empty() {
        v.fail(CredentialField::Password, "Password is required");
    } else if let Err(msg) = check_password_policy(password) {
        v.fail(CredentialField::Password, msg);
    }

    if confirm.trim().is_empty() {
        v.fail(CredentialField::Confirm, "Please confirm your password");
    } else if password != confirm {
        v.fail(CredentialField::Confirm, "Passwords do not match");
    }

    v
}

/// Validate and normalise a display name (trimmed, non-empty, bounded).
pub fn validate_display_name(name: &str) -> Result<String, String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Display name cannot be empty".to_string());
    }
    if trimmed.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(format!(
            "Display name must be at most {MAX_DISPLAY_NAME_LEN} characters"
        ));
    }
    Ok(trimmed.to_string())
}

/// Validate an avatar upload before any decoding work.
///
/// All checks run; the first failing check's message is reported.
pub fn validate_image(blob: &ImageBlob) -> ImageCheck {
    let mime = blob.mime_type.trim().to_ascii_lowercase();
    let checks = [
        (
            blob.len() <= MAX_IMAGE_BYTES,
            "Image must be 2 MB or smaller".to_string(),
        ),
        (
            ALLOWED_IMAGE_TYPES.contains(&mime.as_str()),
            format!("Unsupported image type '{}'. Use JPEG, PNG, GIF or WEBP", blob.mime_type),
        ),
        (!blob.is_empty(), "Image file is empty".to_string()),
    ];

    let error = checks
        .into_iter()
        .find(|(passed, _)| !passed)
        .map(|(_, message)| message);

    ImageCheck {
        valid: error.is_none(),
        error,
    }
}
