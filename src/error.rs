//! Error types for the shipment wizard.
//!
//! None of these are fatal: the machine turns every one of them into a
//! "stay on the current step" outcome with a visible message.

use serde::{Serialize, Serializer};

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Verification error: {0}")]
    Verification(#[from] VerificationError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// A field the current step needs is missing or incomplete.
///
/// Recovered locally: the user stays on the step and sees a field-level
/// message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Choose whether you are sending or receiving the parcel")]
    RoleNotSelected,

    #[error("Route is incomplete: both cities are required")]
    RouteIncomplete,

    #[error("Package details are incomplete")]
    PackageIncomplete,

    #[error("Address for {field} must contain a house number")]
    MissingHouseNumber { field: &'static str },

    #[error("Full name is required for {field}")]
    NameRequired { field: &'static str },

    #[error("Phone number for {field} is missing or malformed")]
    PhoneRequired { field: &'static str },

    #[error("Choose who pays for delivery")]
    PayerNotSelected,

    #[error("Choose a delivery method")]
    DeliveryMethodNotSelected,

    #[error("Choose a pickup point")]
    PickupPointRequired,

    #[error("Enter a valid e-mail address")]
    InvalidEmail,

    #[error("Consent to personal data processing is required")]
    ConsentRequired,
}

/// Phone-verification failures.
///
/// Recovered by resetting only the verification sub-state, never the
/// whole session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    #[error("Phone number is empty or malformed")]
    InvalidPhone,

    #[error("Verification code must be exactly 4 digits")]
    InvalidCodeFormat,

    #[error("Code mismatch: {0}")]
    CodeMismatch(String),

    #[error("Code delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("No code has been requested for this phone")]
    NoCodeRequested,

    #[error("Phone is already verified")]
    AlreadyVerified,

    #[error("{0}")]
    Transport(#[from] TransportError),
}

/// Malformed serialized session or invite payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("Payload is empty")]
    Empty,

    #[error("Percent-decoding failed: {0}")]
    Percent(String),

    #[error("Base64 decoding failed: {0}")]
    Base64(String),

    #[error("Payload is not valid UTF-8")]
    Utf8,

    #[error("Payload JSON is invalid: {0}")]
    Json(String),

    #[error("Invite link is invalid or expired")]
    InvalidInvite,
}

/// A collaborator (code delivery or tariff service) could not be reached.
///
/// Surfaced to the user as retryable; the session is never discarded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Service {service} is unreachable: {reason}")]
    Unreachable { service: String, reason: String },

    #[error("Service {service} answered with HTTP {status}")]
    Status { service: String, status: u16 },

    #[error("Invalid response from {service}: {reason}")]
    InvalidResponse { service: String, reason: String },
}

impl TransportError {
    pub fn unreachable(service: &str, reason: impl ToString) -> Self {
        Self::Unreachable {
            service: service.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_response(service: &str, reason: impl ToString) -> Self {
        Self::InvalidResponse {
            service: service.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Why a `continue` (or code submission) left the user on the same step.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StepError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Verification(#[from] VerificationError),

    #[error("The wizard has already finished")]
    FlowFinished,

    #[error("Role can no longer be changed at this step")]
    RoleLocked,
}

impl StepError {
    /// Stable machine-readable kind for the screens.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Verification(VerificationError::Transport(_)) => "transport",
            Self::Verification(_) => "verification",
            Self::FlowFinished => "finished",
            Self::RoleLocked => "roleLocked",
        }
    }

    /// Whether retrying the same action may succeed without user edits.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Verification(VerificationError::Transport(_))
                | Self::Verification(VerificationError::DeliveryFailed(_))
        )
    }
}

impl Serialize for StepError {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("StepError", 3)?;
        s.serialize_field("kind", self.kind())?;
        s.serialize_field("message", &self.to_string())?;
        s.serialize_field("retryable", &self.is_retryable())?;
        s.end()
    }
}

/// Result type alias for the wizard.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_error_kinds() {
        let v: StepError = ValidationError::PackageIncomplete.into();
        assert_eq!(v.kind(), "validation");
        assert!(!v.is_retryable());

        let t: StepError = VerificationError::Transport(TransportError::unreachable(
            "code-gateway",
            "connection refused",
        ))
        .into();
        assert_eq!(t.kind(), "transport");
        assert!(t.is_retryable());

        assert_eq!(StepError::FlowFinished.kind(), "finished");
    }

    #[test]
    fn step_error_serializes_kind_and_message() {
        let err: StepError = ValidationError::MissingHouseNumber {
            field: "pickup address",
        }
        .into();
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "validation");
        assert_eq!(
            json["message"],
            "Address for pickup address must contain a house number"
        );
        assert_eq!(json["retryable"], false);
    }
}
