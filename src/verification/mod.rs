//! Phone verification sub-protocol.
//!
//! `Idle → CodeSent → Verified`. A resend keeps the session in `CodeSent`,
//! "change number" drops it back to `Idle`, and `Verified` is terminal for
//! the phone it was reached with.

pub mod gateway;
pub mod phone;

pub use gateway::{
    AuthSink, AuthTokens, CodeChannel, CodeGateway, HttpCodeGateway, SendCodeResponse,
    TestPhoneGateway, VerifyCodeResponse,
};
pub use phone::{is_valid_phone, mask_phone, normalize_phone};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::VerificationError;

/// Where the verification of one phone currently stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum VerificationState {
    Idle,
    #[serde(rename_all = "camelCase")]
    CodeSent {
        /// Channel that actually delivered the code.
        channel: CodeChannel,
        telegram_delivered: bool,
        sent_at: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    Verified { verified_at: DateTime<Utc> },
}

impl std::fmt::Display for VerificationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::CodeSent { .. } => "codeSent",
            Self::Verified { .. } => "verified",
        };
        write!(f, "{s}")
    }
}

/// Outcome of a successful code send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeDispatch {
    pub channel: CodeChannel,
    /// `false` after a Telegram request means "check SMS instead".
    pub telegram_delivered: bool,
}

/// Verification state for the phone field in use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationSession {
    phone: String,
    state: VerificationState,
    last_error: Option<String>,
}

impl Default for VerificationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl VerificationSession {
    pub fn new() -> Self {
        Self {
            phone: String::new(),
            state: VerificationState::Idle,
            last_error: None,
        }
    }

    /// Start out verified for a phone whose verification is already on
    /// record server-side. Never fed from a client payload.
    pub fn restored(phone: &str, verified: bool) -> Self {
        let phone = normalize_phone(phone);
        if verified && is_valid_phone(&phone) {
            Self {
                phone,
                state: VerificationState::Verified {
                    verified_at: Utc::now(),
                },
                last_error: None,
            }
        } else {
            Self::new()
        }
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn state(&self) -> &VerificationState {
        &self.state
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_verified(&self) -> bool {
        matches!(self.state, VerificationState::Verified { .. })
    }

    /// Verified, and for this very number.
    pub fn is_verified_for(&self, phone: &str) -> bool {
        self.is_verified() && self.phone == normalize_phone(phone)
    }

    pub fn code_requested(&self) -> bool {
        matches!(self.state, VerificationState::CodeSent { .. })
    }

    /// A code is pending for this very number.
    pub fn code_pending_for(&self, phone: &str) -> bool {
        self.code_requested() && self.phone == normalize_phone(phone)
    }

    pub fn telegram_delivered(&self) -> bool {
        matches!(
            self.state,
            VerificationState::CodeSent {
                telegram_delivered: true,
                ..
            }
        )
    }

    /// Ask the gateway to send a code. Also used for resends.
    pub async fn send_code(
        &mut self,
        gateway: &dyn CodeGateway,
        phone: &str,
        channel: CodeChannel,
    ) -> Result<CodeDispatch, VerificationError> {
        if self.is_verified_for(phone) {
            return Err(self.fail(VerificationError::AlreadyVerified));
        }
        let normalized = normalize_phone(phone);
        if !is_valid_phone(&normalized) {
            return Err(self.fail(VerificationError::InvalidPhone));
        }

        let response = match gateway.send_verification_code(&normalized, channel).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(phone = %mask_phone(&normalized), "Code gateway unreachable: {}", e);
                return Err(self.fail(VerificationError::Transport(e)));
            }
        };
        if !response.delivered() {
            let reason = response
                .error
                .unwrap_or_else(|| "Code delivery failed".to_string());
            return Err(self.fail(VerificationError::DeliveryFailed(reason)));
        }

        let telegram_delivered = channel == CodeChannel::Telegram && response.telegram_delivered;
        let delivered_over = if telegram_delivered {
            CodeChannel::Telegram
        } else {
            CodeChannel::Sms
        };
        tracing::info!(
            phone = %mask_phone(&normalized),
            requested = %channel,
            delivered = %delivered_over,
            "Verification code sent"
        );

        self.phone = normalized;
        self.state = VerificationState::CodeSent {
            channel: delivered_over,
            telegram_delivered,
            sent_at: Utc::now(),
        };
        self.last_error = None;
        Ok(CodeDispatch {
            channel: delivered_over,
            telegram_delivered,
        })
    }

    /// Check a code for the phone the last code was sent to.
    ///
    /// Returns the tokens the gateway issued, if any. A mismatch keeps the
    /// session in `CodeSent` so the user can retry or resend.
    pub async fn verify_code(
        &mut self,
        gateway: &dyn CodeGateway,
        code: &str,
    ) -> Result<Option<AuthTokens>, VerificationError> {
        if self.is_verified() {
            return Err(self.fail(VerificationError::AlreadyVerified));
        }
        if !self.code_requested() {
            return Err(self.fail(VerificationError::NoCodeRequested));
        }

        let code = code.trim();
        if code.chars().count() != 4 || !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(self.fail(VerificationError::InvalidCodeFormat));
        }

        let response = match gateway.verify_verification_code(&self.phone, code).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(phone = %mask_phone(&self.phone), "Code gateway unreachable: {}", e);
                return Err(self.fail(VerificationError::Transport(e)));
            }
        };
        if !response.verified {
            let reason = response.error.unwrap_or_else(|| "Invalid code".to_string());
            tracing::debug!(phone = %mask_phone(&self.phone), "Code rejected: {}", reason);
            return Err(self.fail(VerificationError::CodeMismatch(reason)));
        }

        tracing::info!(phone = %mask_phone(&self.phone), "Phone verified");
        self.state = VerificationState::Verified {
            verified_at: Utc::now(),
        };
        self.last_error = None;
        Ok(response.tokens)
    }

    /// Forget the phone entirely; the user will type a new one.
    pub fn change_number(&mut self) {
        *self = Self::new();
    }

    /// Drop a pending code but keep a completed verification.
    pub fn reset_pending(&mut self) {
        if self.code_requested() {
            self.state = VerificationState::Idle;
            self.last_error = None;
        }
    }

    fn fail(&mut self, error: VerificationError) -> VerificationError {
        self.last_error = Some(error.to_string());
        error
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::error::TransportError;

    /// Accepts "4321" and records every phone it is asked about.
    #[derive(Default)]
    struct ScriptedGateway {
        telegram_available: bool,
        fail_delivery: bool,
        offline: bool,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CodeGateway for ScriptedGateway {
        async fn send_verification_code(
            &self,
            phone: &str,
            channel: CodeChannel,
        ) -> Result<SendCodeResponse, TransportError> {
            self.seen.lock().unwrap().push(phone.to_string());
            if self.offline {
                return Err(TransportError::unreachable("code-gateway", "connection refused"));
            }
            if self.fail_delivery {
                return Ok(SendCodeResponse {
                    error: Some("SMS provider down".into()),
                    ..Default::default()
                });
            }
            Ok(SendCodeResponse {
                success: true,
                telegram_delivered: channel == CodeChannel::Telegram && self.telegram_available,
                error: None,
            })
        }

        async fn verify_verification_code(
            &self,
            _phone: &str,
            code: &str,
        ) -> Result<VerifyCodeResponse, TransportError> {
            if code == "4321" {
                Ok(VerifyCodeResponse::accepted(Some(AuthTokens::new("a", "r"))))
            } else {
                Ok(VerifyCodeResponse::rejected("Неверный код"))
            }
        }
    }

    #[tokio::test]
    async fn happy_path_reaches_verified() {
        let gateway = ScriptedGateway {
            telegram_available: true,
            ..Default::default()
        };
        let mut session = VerificationSession::new();
        let dispatch = session
            .send_code(&gateway, "+7 (900) 123-45-67", CodeChannel::Telegram)
            .await
            .unwrap();
        assert!(dispatch.telegram_delivered);
        assert_eq!(session.phone(), "+79001234567");
        assert!(session.code_pending_for("+79001234567"));
        assert_eq!(gateway.seen.lock().unwrap()[0], "+79001234567");

        let tokens = session.verify_code(&gateway, "4321").await.unwrap();
        assert!(tokens.is_some());
        assert!(session.is_verified_for("+7 900 123 45 67"));
        assert_eq!(session.state().to_string(), "verified");
    }

    #[tokio::test]
    async fn telegram_fallback_is_reported() {
        let gateway = ScriptedGateway::default();
        let mut session = VerificationSession::new();
        let dispatch = session
            .send_code(&gateway, "+79001234567", CodeChannel::Telegram)
            .await
            .unwrap();
        assert!(!dispatch.telegram_delivered);
        assert_eq!(dispatch.channel, CodeChannel::Sms);
        assert!(!session.telegram_delivered());
    }

    #[tokio::test]
    async fn invalid_phone_never_reaches_gateway() {
        let gateway = ScriptedGateway::default();
        let mut session = VerificationSession::new();
        for phone in ["", "12345", "+7 abc"] {
            let err = session
                .send_code(&gateway, phone, CodeChannel::Sms)
                .await
                .unwrap_err();
            assert_eq!(err, VerificationError::InvalidPhone);
        }
        assert!(gateway.seen.lock().unwrap().is_empty());
        assert_eq!(session.state(), &VerificationState::Idle);
        assert!(session.last_error().is_some());
    }

    #[tokio::test]
    async fn delivery_and_transport_failures() {
        let gateway = ScriptedGateway {
            fail_delivery: true,
            ..Default::default()
        };
        let mut session = VerificationSession::new();
        let err = session
            .send_code(&gateway, "+79001234567", CodeChannel::Sms)
            .await
            .unwrap_err();
        assert_eq!(err, VerificationError::DeliveryFailed("SMS provider down".into()));
        assert!(!session.code_requested());

        let offline = ScriptedGateway {
            offline: true,
            ..Default::default()
        };
        let err = session
            .send_code(&offline, "+79001234567", CodeChannel::Sms)
            .await
            .unwrap_err();
        assert!(matches!(err, VerificationError::Transport(_)));
    }

    #[tokio::test]
    async fn code_format_and_mismatch() {
        let gateway = ScriptedGateway::default();
        let mut session = VerificationSession::new();

        let err = session.verify_code(&gateway, "4321").await.unwrap_err();
        assert_eq!(err, VerificationError::NoCodeRequested);

        session
            .send_code(&gateway, "+79001234567", CodeChannel::Sms)
            .await
            .unwrap();
        for bad in ["", "123", "12345", "12a4"] {
            let err = session.verify_code(&gateway, bad).await.unwrap_err();
            assert_eq!(err, VerificationError::InvalidCodeFormat, "{bad:?}");
        }
        let err = session.verify_code(&gateway, "0000").await.unwrap_err();
        assert_eq!(err, VerificationError::CodeMismatch("Неверный код".into()));
        assert!(session.code_requested());

        session.verify_code(&gateway, "4321").await.unwrap();
        let err = session.verify_code(&gateway, "4321").await.unwrap_err();
        assert_eq!(err, VerificationError::AlreadyVerified);
    }

    #[tokio::test]
    async fn resend_keeps_code_sent_and_change_number_resets() {
        let gateway = ScriptedGateway::default();
        let mut session = VerificationSession::new();
        session
            .send_code(&gateway, "+79001234567", CodeChannel::Sms)
            .await
            .unwrap();
        session
            .send_code(&gateway, "+79001234567", CodeChannel::Sms)
            .await
            .unwrap();
        assert!(session.code_requested());
        assert_eq!(gateway.seen.lock().unwrap().len(), 2);

        session.change_number();
        assert_eq!(session.state(), &VerificationState::Idle);
        assert!(session.phone().is_empty());
    }

    #[tokio::test]
    async fn reset_pending_keeps_verification() {
        let gateway = ScriptedGateway::default();
        let mut session = VerificationSession::new();
        session
            .send_code(&gateway, "+79001234567", CodeChannel::Sms)
            .await
            .unwrap();
        session.reset_pending();
        assert_eq!(session.state(), &VerificationState::Idle);
        assert_eq!(session.phone(), "+79001234567");

        session
            .send_code(&gateway, "+79001234567", CodeChannel::Sms)
            .await
            .unwrap();
        session.verify_code(&gateway, "4321").await.unwrap();
        session.reset_pending();
        assert!(session.is_verified());

        let err = session
            .send_code(&gateway, "+79001234567", CodeChannel::Sms)
            .await
            .unwrap_err();
        assert_eq!(err, VerificationError::AlreadyVerified);
    }

    #[test]
    fn restored_sessions() {
        assert!(VerificationSession::restored("+79001234567", true).is_verified());
        assert!(!VerificationSession::restored("+79001234567", false).is_verified());
        assert!(!VerificationSession::restored("", true).is_verified());
    }
}
