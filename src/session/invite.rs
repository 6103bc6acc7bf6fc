//! Shareable links: the recipient invite and the quote share.
//!
//! Both carry a reduced payload, never the inviter's full draft, and both
//! decode to `None` on any malformed or tampered input.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::codec::{decode_payload, encode_payload};
use super::model::{
    Contact, InviteMode, Offer, PackageInfo, Parties, PaymentPayer, Role, Route, SessionState,
};

/// What an invited recipient needs to start their own wizard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitePayload {
    pub route: Route,
    pub package: PackageInfo,
    #[serde(default)]
    pub sender_name: String,
    #[serde(default)]
    pub sender_phone: String,
    #[serde(default)]
    pub sender_address: String,
    #[serde(default)]
    pub recipient_phone: Option<String>,
}

impl InvitePayload {
    pub fn from_session(session: &SessionState) -> Self {
        let parties = session.parties();
        let recipient_phone = Some(parties.recipient_phone.trim())
            .filter(|p| !p.is_empty())
            .map(str::to_string);
        Self {
            route: session.resolved_route(),
            package: session.package().clone(),
            sender_name: parties.sender_name.clone(),
            sender_phone: parties.sender_phone.clone(),
            sender_address: parties.sender_address.clone(),
            recipient_phone,
        }
    }
}

/// A picked offer shared with someone else, with enough context to
/// re-quote it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteSharePayload {
    pub route: Route,
    pub package: PackageInfo,
    pub offer: Offer,
}

impl QuoteSharePayload {
    pub fn from_session(session: &SessionState) -> Option<Self> {
        session.selected_offer().map(|offer| Self {
            route: session.resolved_route(),
            package: session.package().clone(),
            offer: offer.clone(),
        })
    }
}

/// Encoder/decoder for shareable payloads.
pub struct InviteCodec;

impl InviteCodec {
    /// Encode with the same scheme as [`SessionState::serialize`].
    pub fn encode<T: Serialize>(payload: &T) -> String {
        match encode_payload(payload) {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::warn!("Failed to encode share payload: {}", e);
                String::new()
            }
        }
    }

    /// Decode a payload; `None` on any malformed input.
    pub fn decode<T: DeserializeOwned>(data: &str) -> Option<T> {
        decode_payload(data)
            .map_err(|e| tracing::debug!("Rejected share payload: {}", e))
            .ok()
    }

    /// Decode an invite, additionally rejecting one without a usable route.
    pub fn decode_invite(data: &str) -> Option<InvitePayload> {
        Self::decode::<InvitePayload>(data).filter(|invite| {
            let usable = invite.route.is_complete();
            if !usable {
                tracing::debug!("Rejected invite without a complete route");
            }
            usable
        })
    }

    /// `{base}/recipient?data=…`
    pub fn invite_link(base_url: &str, payload: &InvitePayload) -> String {
        format!(
            "{}/recipient?data={}",
            base_url.trim_end_matches('/'),
            Self::encode(payload)
        )
    }

    /// `{base}/offers?data=…`
    pub fn quote_share_link(base_url: &str, payload: &QuoteSharePayload) -> String {
        format!(
            "{}/offers?data={}",
            base_url.trim_end_matches('/'),
            Self::encode(payload)
        )
    }
}

impl SessionState {
    /// A fresh recipient session seeded from an invite.
    ///
    /// The recipient phone, when the inviter supplied one, becomes both the
    /// locked recipient phone and the operator phone to verify. Delivery is
    /// paid by the invited recipient.
    pub fn from_invite(invite: &InvitePayload) -> Self {
        let recipient_phone = invite.recipient_phone.clone().unwrap_or_default();
        Self {
            route: invite.route.clone(),
            role: Role::Recipient,
            invite_mode: InviteMode::InvitedRecipient,
            package: invite.package.clone(),
            parties: Parties {
                sender_name: invite.sender_name.clone(),
                sender_phone: invite.sender_phone.clone(),
                sender_address: invite.sender_address.clone(),
                recipient_phone: recipient_phone.clone(),
                ..Default::default()
            },
            contact: Contact {
                phone: recipient_phone,
                verified: false,
            },
            payment_payer: PaymentPayer::Me,
            ..Default::default()
        }
    }
}
