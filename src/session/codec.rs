//! Query-parameter payload codec.
//!
//! JSON → UTF-8 → base64 → percent-encoding, the inverse on the way back.
//! The escaping set matches a browser's `encodeURIComponent`, so payloads
//! produced here and by the web client are interchangeable.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::model::SessionState;
use crate::error::CodecError;

/// Characters `encodeURIComponent` leaves alone.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Encode any serializable value as a query-parameter-safe string.
pub fn encode_payload<T: Serialize>(value: &T) -> Result<String, CodecError> {
    let json = serde_json::to_string(value).map_err(|e| CodecError::Json(e.to_string()))?;
    let b64 = STANDARD.encode(json.as_bytes());
    Ok(utf8_percent_encode(&b64, URI_COMPONENT).to_string())
}

/// Decode a payload produced by [`encode_payload`].
///
/// Tolerates a payload that was already percent-decoded once (a `+` turned
/// into a space by a form decoder) and the URL-safe base64 alphabet.
pub fn decode_payload<T: DeserializeOwned>(payload: &str) -> Result<T, CodecError> {
    let trimmed = payload.trim();
    if trimmed.is_empty() {
        return Err(CodecError::Empty);
    }

    let unescaped = percent_decode_str(trimmed)
        .decode_utf8()
        .map_err(|e| CodecError::Percent(e.to_string()))?;
    let normalized = unescaped.replace(' ', "+");

    let bytes = STANDARD
        .decode(normalized.as_bytes())
        .or_else(|_| URL_SAFE_NO_PAD.decode(normalized.trim_end_matches('=').as_bytes()))
        .map_err(|e| CodecError::Base64(e.to_string()))?;

    let text = String::from_utf8(bytes).map_err(|_| CodecError::Utf8)?;
    serde_json::from_str(&text).map_err(|e| CodecError::Json(e.to_string()))
}

impl SessionState {
    /// Self-contained, URL-safe encoding of the whole draft.
    pub fn serialize(&self) -> String {
        match encode_payload(self) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("Failed to serialize session: {}", e);
                String::new()
            }
        }
    }

    /// Inverse of [`serialize`](Self::serialize). `None` means "start fresh".
    pub fn deserialize(payload: &str) -> Option<SessionState> {
        match decode_payload(payload) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::debug!("Discarding malformed session payload: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::session::{
        Consent, Contact, DeliveryMethod, InviteMode, Offer, PackageDetails, PackageInfo, Parties,
        PaymentPayer, Role, Route, SizePreset,
    };

    fn sample_session() -> SessionState {
        SessionState {
            route: Route::new("Москва", "Санкт-Петербург"),
            role: Role::Sender,
            package: PackageInfo::new(PackageDetails::manual(20, 15, 10, dec!(2))),
            parties: Parties {
                sender_name: "Иван Петров".into(),
                sender_address: "ул Ленина 15".into(),
                recipient_phone: "+79001234567".into(),
                ..Default::default()
            },
            contact: Contact {
                phone: "+79007654321".into(),
                verified: true,
            },
            payment_payer: PaymentPayer::Me,
            selected_offer: Some(Offer {
                carrier_id: 7,
                carrier_name: "CDEK".into(),
                carrier_code: "cdek".into(),
                tariff_code: Some(136),
                tariff_name: "Посылка склад-склад".into(),
                price: dec!(512.40),
                eta_days: Some(2),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn session_round_trip() {
        let session = sample_session();
        let payload = session.serialize();
        assert_eq!(SessionState::deserialize(&payload), Some(session));
    }

    #[test]
    fn payload_is_query_safe() {
        let payload = sample_session().serialize();
        assert!(
            payload
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "%-_.!~*'()".contains(c)),
            "unexpected character in {payload}"
        );
    }

    #[test]
    fn accepts_form_decoded_and_url_safe_variants() {
        let session = sample_session();
        let json = serde_json::to_string(&session).unwrap();

        let standard = STANDARD.encode(json.as_bytes());
        let with_spaces = standard.replace('+', " ");
        assert_eq!(SessionState::deserialize(&with_spaces), Some(session.clone()));

        let url_safe = URL_SAFE_NO_PAD.encode(json.as_bytes());
        assert_eq!(SessionState::deserialize(&url_safe), Some(session));
    }

    #[test]
    fn malformed_payloads_yield_none() {
        for payload in ["", "   ", "%%%", "not base64 at all!", "eyJ", "bnVsbA%3D%3D"] {
            assert_eq!(SessionState::deserialize(payload), None, "{payload:?}");
        }
        assert!(matches!(
            decode_payload::<SessionState>(""),
            Err(CodecError::Empty)
        ));
        let not_json = STANDARD.encode("hello");
        assert!(matches!(
            decode_payload::<SessionState>(&not_json),
            Err(CodecError::Json(_))
        ));
        let not_utf8 = STANDARD.encode([0xff, 0xfe, 0xfd]);
        assert!(matches!(
            decode_payload::<SessionState>(&not_utf8),
            Err(CodecError::Utf8)
        ));
    }

    #[test]
    fn missing_fields_take_defaults() {
        let payload = encode_payload(&serde_json::json!({"route": {"fromCity": "Тула"}})).unwrap();
        let session = SessionState::deserialize(&payload).unwrap();
        assert_eq!(session.route().from_city, "Тула");
        assert_eq!(session.role(), Role::Unset);
        assert!(session.selected_offer().is_none());
    }

    fn text() -> impl Strategy<Value = String> {
        "[a-zA-Zа-яА-ЯёЁ0-9 ,./+-]{0,16}"
    }

    fn decimal() -> impl Strategy<Value = Decimal> {
        (0i64..10_000_000, 0u32..3).prop_map(|(n, scale)| Decimal::new(n, scale))
    }

    fn package_details() -> impl Strategy<Value = PackageDetails> {
        prop_oneof![
            Just(PackageDetails::NotChosen),
            text().prop_map(|photo_ref| PackageDetails::Photo { photo_ref }),
            (
                proptest::option::of(0u32..500),
                proptest::option::of(0u32..500),
                proptest::option::of(0u32..500),
                proptest::option::of(decimal()),
            )
                .prop_map(|(length, width, height, weight)| PackageDetails::Manual {
                    length,
                    width,
                    height,
                    weight,
                }),
            proptest::option::of(prop::sample::select(SizePreset::ALL.to_vec()))
                .prop_map(|preset| PackageDetails::Unknown { preset }),
        ]
    }

    fn offer() -> impl Strategy<Value = Offer> {
        (
            any::<u64>(),
            text(),
            text(),
            proptest::option::of(0u32..300),
            decimal(),
            proptest::option::of(0u32..30),
        )
            .prop_map(
                |(carrier_id, carrier_name, tariff_name, tariff_code, price, eta_days)| Offer {
                    carrier_id,
                    carrier_code: carrier_name.to_lowercase(),
                    carrier_name,
                    tariff_code,
                    tariff_name,
                    price,
                    eta_days,
                },
            )
    }

    fn session() -> impl Strategy<Value = SessionState> {
        let head = (
            (text(), text()),
            prop::sample::select(vec![Role::Sender, Role::Recipient, Role::Unset]),
            prop::sample::select(vec![
                InviteMode::None,
                InviteMode::Assistant,
                InviteMode::InvitedRecipient,
            ]),
            package_details(),
            proptest::option::of(decimal()),
        );
        let parties = proptest::collection::vec(text(), 8);
        let tail = (
            (text(), any::<bool>()),
            prop::sample::select(vec![PaymentPayer::Me, PaymentPayer::Counterpart, PaymentPayer::Unset]),
            proptest::option::of(offer()),
            text(),
            (any::<bool>(), any::<bool>()),
            proptest::option::of(prop::sample::select(vec![
                DeliveryMethod::Courier,
                DeliveryMethod::PickupPoint,
            ])),
            any::<bool>(),
        );
        (head, parties, tail).prop_map(|(head, p, tail)| {
            let ((from, to), role, invite_mode, details, estimated_value) = head;
            let ((phone, verified), payer, selected_offer, email, (pd, mk), method, rtp) = tail;
            SessionState {
                route: Route::new(from, to),
                role,
                invite_mode,
                package: PackageInfo {
                    details,
                    estimated_value,
                },
                parties: Parties {
                    sender_name: p[0].clone(),
                    sender_phone: p[1].clone(),
                    sender_address: p[2].clone(),
                    recipient_name: p[3].clone(),
                    recipient_phone: p[4].clone(),
                    recipient_address: p[5].clone(),
                    recipient_pickup_point_code: p[6].clone(),
                    recipient_pickup_point_address: p[7].clone(),
                },
                contact: Contact { phone, verified },
                payment_payer: payer,
                selected_offer,
                email,
                consent: Consent {
                    personal_data: pd,
                    marketing: mk,
                },
                delivery_method: method,
                return_to_payment: rtp,
            }
        })
    }

    proptest! {
        #[test]
        fn serialize_then_deserialize_is_identity(s in session()) {
            let payload = s.serialize();
            prop_assert_eq!(SessionState::deserialize(&payload), Some(s));
        }
    }
}
