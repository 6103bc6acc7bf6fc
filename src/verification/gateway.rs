//! Code-delivery gateway: the trait the wizard talks to, the HTTP
//! implementation backed by the auth API, and the test-phone decorator.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use super::phone::{mask_phone, normalize_phone};
use crate::error::TransportError;

const SERVICE: &str = "code-gateway";

/// Channel a verification code is requested over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeChannel {
    Telegram,
    Sms,
}

impl std::fmt::Display for CodeChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Telegram => write!(f, "telegram"),
            Self::Sms => write!(f, "sms"),
        }
    }
}

impl std::str::FromStr for CodeChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "telegram" => Ok(Self::Telegram),
            "sms" => Ok(Self::Sms),
            other => Err(format!("unknown code channel '{other}'")),
        }
    }
}

/// Result of asking the gateway to send a code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendCodeResponse {
    #[serde(default)]
    pub success: bool,
    /// The code went out over Telegram. `false` with `success` means the
    /// gateway fell back to SMS.
    #[serde(default, alias = "telegram_sent")]
    pub telegram_delivered: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl SendCodeResponse {
    /// Either flag means a code is on its way.
    pub fn delivered(&self) -> bool {
        self.success || self.telegram_delivered
    }
}

/// Session tokens issued after a successful verification.
pub struct AuthTokens {
    pub access: SecretString,
    pub refresh: SecretString,
}

impl std::fmt::Debug for AuthTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthTokens")
            .field("access", &"[REDACTED]")
            .field("refresh", &"[REDACTED]")
            .finish()
    }
}

impl AuthTokens {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: SecretString::from(access.into()),
            refresh: SecretString::from(refresh.into()),
        }
    }
}

/// Result of checking a code with the gateway.
#[derive(Debug, Default)]
pub struct VerifyCodeResponse {
    pub verified: bool,
    pub tokens: Option<AuthTokens>,
    pub error: Option<String>,
}

impl VerifyCodeResponse {
    pub fn accepted(tokens: Option<AuthTokens>) -> Self {
        Self {
            verified: true,
            tokens,
            error: None,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            verified: false,
            tokens: None,
            error: Some(error.into()),
        }
    }
}

/// External service that delivers and checks verification codes.
#[async_trait]
pub trait CodeGateway: Send + Sync {
    async fn send_verification_code(
        &self,
        phone: &str,
        channel: CodeChannel,
    ) -> Result<SendCodeResponse, TransportError>;

    async fn verify_verification_code(
        &self,
        phone: &str,
        code: &str,
    ) -> Result<VerifyCodeResponse, TransportError>;
}

/// Receives tokens issued on verification; the wizard never keeps them.
pub trait AuthSink: Send + Sync {
    fn store_tokens(&self, phone: &str, tokens: AuthTokens);

    /// Whether this phone already holds an authenticated session. A resumed
    /// draft skips the code only when this says so.
    fn is_authenticated(&self, _phone: &str) -> bool {
        false
    }
}

// ── HTTP gateway ────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Deserialize)]
struct WireTokens {
    access: String,
    refresh: String,
}

#[derive(Deserialize, Default)]
struct WireVerifyBody {
    #[serde(default)]
    tokens: Option<WireTokens>,
}

/// [`CodeGateway`] over the backend auth API
/// (`POST {base}/auth/send-code/`, `POST {base}/auth/verify-code/`).
pub struct HttpCodeGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCodeGateway {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout, using defaults: {}", e);
                reqwest::Client::new()
            });
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/auth/{path}/", self.base_url)
    }

    async fn post(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<(reqwest::StatusCode, String), TransportError> {
        let resp = self
            .client
            .post(self.api_url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::unreachable(SERVICE, e))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| TransportError::invalid_response(SERVICE, e))?;
        Ok((status, text))
    }

    /// A non-2xx answer carrying `{"error": ...}` is a business failure;
    /// anything else is a transport failure.
    fn error_message(status: reqwest::StatusCode, text: &str) -> Result<String, TransportError> {
        serde_json::from_str::<ErrorBody>(text)
            .map(|body| body.error)
            .map_err(|_| TransportError::Status {
                service: SERVICE.to_string(),
                status: status.as_u16(),
            })
    }
}

#[async_trait]
impl CodeGateway for HttpCodeGateway {
    async fn send_verification_code(
        &self,
        phone: &str,
        channel: CodeChannel,
    ) -> Result<SendCodeResponse, TransportError> {
        let body = serde_json::json!({ "phone": phone, "method": channel.to_string() });
        let (status, text) = self.post("send-code", &body).await?;

        if !status.is_success() {
            let error = Self::error_message(status, &text)?;
            tracing::warn!(phone = %mask_phone(phone), %status, "Code send rejected: {}", error);
            return Ok(SendCodeResponse {
                success: false,
                telegram_delivered: false,
                error: Some(error),
            });
        }

        serde_json::from_str(&text).map_err(|e| TransportError::invalid_response(SERVICE, e))
    }

    async fn verify_verification_code(
        &self,
        phone: &str,
        code: &str,
    ) -> Result<VerifyCodeResponse, TransportError> {
        let body = serde_json::json!({ "phone": phone, "code": code });
        let (status, text) = self.post("verify-code", &body).await?;

        if !status.is_success() {
            let error = Self::error_message(status, &text)?;
            return Ok(VerifyCodeResponse::rejected(error));
        }

        let parsed: WireVerifyBody = if text.trim().is_empty() {
            WireVerifyBody::default()
        } else {
            serde_json::from_str(&text)
                .map_err(|e| TransportError::invalid_response(SERVICE, e))?
        };
        let tokens = parsed
            .tokens
            .map(|t| AuthTokens::new(t.access, t.refresh));
        if tokens.is_none() {
            tracing::debug!(phone = %mask_phone(phone), "Verification succeeded without tokens");
        }
        Ok(VerifyCodeResponse::accepted(tokens))
    }
}

// ── Test-phone decorator ────────────────────────────────────────────

/// Answers a fixed set of development phones locally and forwards every
/// other number to the wrapped gateway.
pub struct TestPhoneGateway {
    inner: Arc<dyn CodeGateway>,
    phones: HashSet<String>,
    code: String,
}

impl TestPhoneGateway {
    pub fn new(
        inner: Arc<dyn CodeGateway>,
        phones: impl IntoIterator<Item = impl AsRef<str>>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            inner,
            phones: phones
                .into_iter()
                .map(|p| normalize_phone(p.as_ref()))
                .filter(|p| !p.is_empty())
                .collect(),
            code: code.into(),
        }
    }

    pub fn is_test_phone(&self, phone: &str) -> bool {
        self.phones.contains(&normalize_phone(phone))
    }
}

#[async_trait]
impl CodeGateway for TestPhoneGateway {
    async fn send_verification_code(
        &self,
        phone: &str,
        channel: CodeChannel,
    ) -> Result<SendCodeResponse, TransportError> {
        if !self.is_test_phone(phone) {
            return self.inner.send_verification_code(phone, channel).await;
        }
        tracing::info!(phone = %mask_phone(phone), "Test phone: code send answered locally");
        Ok(SendCodeResponse {
            success: true,
            telegram_delivered: channel == CodeChannel::Telegram,
            error: None,
        })
    }

    async fn verify_verification_code(
        &self,
        phone: &str,
        code: &str,
    ) -> Result<VerifyCodeResponse, TransportError> {
        if !self.is_test_phone(phone) {
            return self.inner.verify_verification_code(phone, code).await;
        }
        if code.trim() == self.code {
            Ok(VerifyCodeResponse::accepted(None))
        } else {
            Ok(VerifyCodeResponse::rejected("Invalid code"))
        }
    }
}
