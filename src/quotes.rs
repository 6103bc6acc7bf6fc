//! Tariff quotes: request building from a draft and the gateway that
//! fetches offers from the tariff backend.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{TransportError, ValidationError};
use crate::session::{Offer, PackageDetails, SessionState, DEFAULT_WEIGHT_KG};

const SERVICE: &str = "tariff-service";

/// Everything the tariff service needs to price a shipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub weight_kg: Decimal,
    pub length_cm: u32,
    pub width_cm: u32,
    pub height_cm: u32,
    pub from_city: String,
    pub to_city: String,
    pub from_address: String,
    pub to_address: String,
}

impl QuoteRequest {
    /// Build a request from the draft. Presets resolve to their concrete
    /// size and weight limit; a photo package quotes at 1 kg.
    pub fn from_session(session: &SessionState) -> Result<Self, ValidationError> {
        let route = session.resolved_route();
        if !route.is_complete() {
            return Err(ValidationError::RouteIncomplete);
        }

        let (weight_kg, (length_cm, width_cm, height_cm)) = match &session.package().details {
            PackageDetails::NotChosen => return Err(ValidationError::PackageIncomplete),
            PackageDetails::Photo { .. } => (DEFAULT_WEIGHT_KG, (0, 0, 0)),
            PackageDetails::Manual {
                length,
                width,
                height,
                weight,
            } => (
                weight.unwrap_or(DEFAULT_WEIGHT_KG),
                (
                    length.unwrap_or_default(),
                    width.unwrap_or_default(),
                    height.unwrap_or_default(),
                ),
            ),
            PackageDetails::Unknown { preset: Some(preset) } => {
                (preset.max_weight_kg(), preset.dimensions_cm())
            }
            PackageDetails::Unknown { preset: None } => {
                return Err(ValidationError::PackageIncomplete)
            }
        };

        let parties = session.parties();
        Ok(Self {
            weight_kg,
            length_cm,
            width_cm,
            height_cm,
            from_city: route.from_city,
            to_city: route.to_city,
            from_address: parties.sender_address.clone(),
            to_address: parties.recipient_address.clone(),
        })
    }

    fn wire_body(&self) -> serde_json::Value {
        serde_json::json!({
            "weight": self.weight_kg.to_f64().unwrap_or(1.0),
            "length": self.length_cm,
            "width": self.width_cm,
            "height": self.height_cm,
            "from_city": self.from_city,
            "to_city": self.to_city,
            "from_address": self.from_address,
            "to_address": self.to_address,
        })
    }
}

/// Source of priced offers.
#[async_trait]
pub trait QuoteGateway: Send + Sync {
    /// Offers sorted by price, cheapest first.
    async fn fetch_quotes(&self, request: &QuoteRequest) -> Result<Vec<Offer>, TransportError>;
}

#[derive(Deserialize)]
struct WireQuotes {
    #[serde(default)]
    options: Vec<WireOption>,
}

#[derive(Deserialize)]
struct WireOption {
    #[serde(default)]
    company_id: u64,
    #[serde(default)]
    company_name: String,
    #[serde(default)]
    company_code: String,
    price: f64,
    #[serde(default)]
    tariff_code: Option<u32>,
    #[serde(default)]
    tariff_name: String,
    #[serde(default)]
    delivery_time: Option<u32>,
}

impl From<WireOption> for Offer {
    fn from(o: WireOption) -> Self {
        Offer {
            carrier_id: o.company_id,
            carrier_name: o.company_name,
            carrier_code: o.company_code,
            tariff_code: o.tariff_code,
            tariff_name: o.tariff_name,
            price: Decimal::from_f64_retain(o.price)
                .unwrap_or_default()
                .round_dp(2),
            eta_days: o.delivery_time.filter(|days| *days > 0),
        }
    }
}

fn parse_offers(text: &str) -> Result<Vec<Offer>, TransportError> {
    let wire: WireQuotes =
        serde_json::from_str(text).map_err(|e| TransportError::invalid_response(SERVICE, e))?;
    let mut offers: Vec<Offer> = wire.options.into_iter().map(Offer::from).collect();
    offers.sort_by(|a, b| a.price.cmp(&b.price));
    Ok(offers)
}

/// [`QuoteGateway`] over `POST {base}/tariffs/calculate/`.
pub struct HttpQuoteGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpQuoteGateway {
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
}

#[async_trait]
impl QuoteGateway for HttpQuoteGateway {
    async fn fetch_quotes(&self, request: &QuoteRequest) -> Result<Vec<Offer>, TransportError> {
        let resp = self
            .client
            .post(format!("{}/tariffs/calculate/", self.base_url))
            .json(&request.wire_body())
            .send()
            .await
            .map_err(|e| TransportError::unreachable(SERVICE, e))?;

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(%status, from = %request.from_city, to = %request.to_city, "Tariff request failed");
            return Err(TransportError::Status {
                service: SERVICE.to_string(),
                status: status.as_u16(),
            });
        }

        let text = resp
            .text()
            .await
            .map_err(|e| TransportError::invalid_response(SERVICE, e))?;
        let offers = parse_offers(&text)?;
        tracing::info!(
            from = %request.from_city,
            to = %request.to_city,
            count = offers.len(),
            "Tariffs fetched"
        );
        Ok(offers)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::session::{Route, SessionPatch, SizePreset};

    fn session_with(package: PackageDetails) -> SessionState {
        SessionState::new(Route::new("Москва", "Казань")).update(SessionPatch {
            package: Some(package),
            sender_address: Some("ул Ленина 15".into()),
            ..Default::default()
        })
    }

    #[test]
    fn presets_resolve_to_dimensions() {
        let request =
            QuoteRequest::from_session(&session_with(PackageDetails::preset(SizePreset::Shoes)))
                .unwrap();
        assert_eq!(
            (request.length_cm, request.width_cm, request.height_cm),
            (33, 25, 15)
        );
        assert_eq!(request.weight_kg, dec!(7));
        assert_eq!(request.from_address, "ул Ленина 15");
    }

    #[test]
    fn photo_and_partial_manual_default_to_one_kilo() {
        let request =
            QuoteRequest::from_session(&session_with(PackageDetails::photo("img-1"))).unwrap();
        assert_eq!(request.weight_kg, dec!(1));
        assert_eq!(request.length_cm, 0);

        let request = QuoteRequest::from_session(&session_with(PackageDetails::Manual {
            length: Some(20),
            width: Some(15),
            height: Some(10),
            weight: None,
        }))
        .unwrap();
        assert_eq!(request.weight_kg, dec!(1));
        assert_eq!(request.height_cm, 10);
    }

    #[test]
    fn incomplete_inputs_are_rejected() {
        assert_eq!(
            QuoteRequest::from_session(&session_with(PackageDetails::NotChosen)),
            Err(ValidationError::PackageIncomplete)
        );

        let no_route = SessionState::default().update(SessionPatch {
            package: Some(PackageDetails::preset(SizePreset::Iron)),
            ..Default::default()
        });
        assert_eq!(
            QuoteRequest::from_session(&no_route),
            Err(ValidationError::RouteIncomplete)
        );
    }

    #[test]
    fn route_is_resolved_from_addresses() {
        let session = SessionState::default().update(SessionPatch {
            package: Some(PackageDetails::preset(SizePreset::Iron)),
            sender_address: Some("г. Москва, ул Ленина 15".into()),
            recipient_address: Some("Казань, ул Баумана 3".into()),
            ..Default::default()
        });
        let request = QuoteRequest::from_session(&session).unwrap();
        assert_eq!(request.from_city, "Москва");
        assert_eq!(request.to_city, "Казань");
    }

    #[test]
    fn wire_body_uses_backend_field_names() {
        let request = QuoteRequest::from_session(&session_with(PackageDetails::manual(
            20,
            15,
            10,
            dec!(2.5),
        )))
        .unwrap();
        let body = request.wire_body();
        assert_eq!(body["weight"], 2.5);
        assert_eq!(body["from_city"], "Москва");
        assert_eq!(body["length"], 20);
    }

    #[test]
    fn offers_are_parsed_and_sorted() {
        let text = r#"{"weight":2.0,"options":[
            {"company_id":2,"company_name":"Boxberry","company_code":"boxberry","price":512.3,"tariff_name":"Курьер"},
            {"company_id":1,"company_name":"CDEK","company_code":"cdek","price":349.999,"tariff_code":136,"tariff_name":"Посылка склад-склад","delivery_time":3}
        ]}"#;
        let offers = parse_offers(text).unwrap();
        assert_eq!(offers.len(), 2);
        assert_eq!(offers[0].carrier_code, "cdek");
        assert_eq!(offers[0].price, dec!(350.00));
        assert_eq!(offers[0].eta_days, Some(3));
        assert!(offers[0].needs_pickup_point(None));
        assert_eq!(offers[1].price, dec!(512.30));
        assert_eq!(offers[1].eta_days, None);

        assert!(matches!(
            parse_offers("<html>"),
            Err(TransportError::InvalidResponse { .. })
        ));
    }
}
