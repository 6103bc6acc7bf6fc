//! Shipment draft data model.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::address::{self, AddressParts};

/// Tariff codes whose delivery ends at a carrier pickup point.
const PICKUP_POINT_TARIFFS: [u32; 4] = [62, 63, 136, 138];
const PICKUP_POINT_TARIFF_RANGE: std::ops::RangeInclusive<u32> = 233..=240;

/// Weight assumed when a package does not state one.
pub const DEFAULT_WEIGHT_KG: Decimal = dec!(1);

/// Origin and destination cities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Route {
    pub from_city: String,
    pub to_city: String,
}

impl Route {
    pub fn new(from_city: impl Into<String>, to_city: impl Into<String>) -> Self {
        Self {
            from_city: from_city.into(),
            to_city: to_city.into(),
        }
    }

    /// Both cities are known; required before any quote can be requested.
    pub fn is_complete(&self) -> bool {
        !self.from_city.trim().is_empty() && !self.to_city.trim().is_empty()
    }
}

/// Whether the wizard operator sends or receives the parcel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Sender,
    Recipient,
    Unset,
}

impl Role {
    pub fn counterpart(&self) -> Role {
        match self {
            Self::Sender => Self::Recipient,
            Self::Recipient => Self::Sender,
            Self::Unset => Self::Unset,
        }
    }

    pub fn is_set(&self) -> bool {
        !matches!(self, Self::Unset)
    }
}

impl Default for Role {
    fn default() -> Self {
        Self::Unset
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sender => write!(f, "sender"),
            Self::Recipient => write!(f, "recipient"),
            Self::Unset => write!(f, "unset"),
        }
    }
}

/// How the current session relates to an invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InviteMode {
    /// Self-contained single-party flow.
    None,
    /// The sender is preparing a shipment the recipient will finish.
    Assistant,
    /// Opened from an invite link; the recipient phone is locked.
    InvitedRecipient,
}

impl Default for InviteMode {
    fn default() -> Self {
        Self::None
    }
}

impl std::fmt::Display for InviteMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Assistant => write!(f, "assistant"),
            Self::InvitedRecipient => write!(f, "invitedRecipient"),
        }
    }
}

/// Typical parcel sizes offered when the user does not know the dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SizePreset {
    Smartphone,
    Iron,
    Shoes,
    Microwave,
}

impl SizePreset {
    pub const ALL: [SizePreset; 4] = [
        SizePreset::Smartphone,
        SizePreset::Iron,
        SizePreset::Shoes,
        SizePreset::Microwave,
    ];

    /// Length, width, height in centimetres.
    pub fn dimensions_cm(&self) -> (u32, u32, u32) {
        match self {
            Self::Smartphone => (17, 12, 9),
            Self::Iron => (21, 20, 11),
            Self::Shoes => (33, 25, 15),
            Self::Microwave => (42, 35, 30),
        }
    }

    pub fn max_weight_kg(&self) -> Decimal {
        match self {
            Self::Smartphone => dec!(1),
            Self::Iron => dec!(3),
            Self::Shoes => dec!(7),
            Self::Microwave => dec!(15),
        }
    }
}

/// The three mutually exclusive ways of describing a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum PackageDetails {
    NotChosen,
    #[serde(rename_all = "camelCase")]
    Photo { photo_ref: String },
    Manual {
        #[serde(default)]
        length: Option<u32>,
        #[serde(default)]
        width: Option<u32>,
        #[serde(default)]
        height: Option<u32>,
        #[serde(default)]
        weight: Option<Decimal>,
    },
    Unknown {
        #[serde(default)]
        preset: Option<SizePreset>,
    },
}

impl Default for PackageDetails {
    fn default() -> Self {
        Self::NotChosen
    }
}

impl PackageDetails {
    /// Manual dimensions in centimetres and weight in kilograms.
    pub fn manual(length: u32, width: u32, height: u32, weight: Decimal) -> Self {
        Self::Manual {
            length: Some(length),
            width: Some(width),
            height: Some(height),
            weight: Some(weight),
        }
    }

    pub fn preset(preset: SizePreset) -> Self {
        Self::Unknown {
            preset: Some(preset),
        }
    }

    pub fn photo(photo_ref: impl Into<String>) -> Self {
        Self::Photo {
            photo_ref: photo_ref.into(),
        }
    }

    /// Completeness is always derived from the populated fields: a photo,
    /// all four manual measurements, or a chosen preset.
    pub fn is_complete(&self) -> bool {
        match self {
            Self::NotChosen => false,
            Self::Photo { photo_ref } => !photo_ref.trim().is_empty(),
            Self::Manual {
                length,
                width,
                height,
                weight,
            } => {
                [length, width, height]
                    .iter()
                    .all(|d| d.is_some_and(|v| v > 0))
                    && weight.is_some_and(|w| w > Decimal::ZERO)
            }
            Self::Unknown { preset } => preset.is_some(),
        }
    }

    pub fn mode_name(&self) -> &'static str {
        match self {
            Self::NotChosen => "notChosen",
            Self::Photo { .. } => "photo",
            Self::Manual { .. } => "manual",
            Self::Unknown { .. } => "unknown",
        }
    }
}

/// Package description plus the declared value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PackageInfo {
    pub details: PackageDetails,
    pub estimated_value: Option<Decimal>,
}

impl PackageInfo {
    pub fn new(details: PackageDetails) -> Self {
        Self {
            details,
            estimated_value: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.details.is_complete()
    }
}

/// Sender and recipient identity, phones and addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Parties {
    pub sender_name: String,
    pub sender_phone: String,
    pub sender_address: String,
    pub recipient_name: String,
    pub recipient_phone: String,
    pub recipient_address: String,
    pub recipient_pickup_point_code: String,
    pub recipient_pickup_point_address: String,
}

impl Parties {
    pub fn sender_address_parts(&self) -> AddressParts {
        address::parse_separated_address(&self.sender_address)
    }

    pub fn recipient_address_parts(&self) -> AddressParts {
        address::parse_separated_address(&self.recipient_address)
    }
}

/// Phone of whoever is operating the wizard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Contact {
    pub phone: String,
    pub verified: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PaymentPayer {
    Me,
    Counterpart,
    Unset,
}

impl Default for PaymentPayer {
    fn default() -> Self {
        Self::Unset
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeliveryMethod {
    /// Courier to the door.
    Courier,
    PickupPoint,
}

/// A priced carrier/tariff combination picked on the quote screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    pub carrier_id: u64,
    pub carrier_name: String,
    #[serde(default)]
    pub carrier_code: String,
    #[serde(default)]
    pub tariff_code: Option<u32>,
    #[serde(default)]
    pub tariff_name: String,
    pub price: Decimal,
    #[serde(default)]
    pub eta_days: Option<u32>,
}

impl Offer {
    /// Whether this tariff delivers to a carrier pickup point rather than
    /// the door, given the delivery method the user picked.
    pub fn needs_pickup_point(&self, method: Option<DeliveryMethod>) -> bool {
        if method == Some(DeliveryMethod::Courier) {
            return false;
        }
        let is_cdek = self.carrier_name.eq_ignore_ascii_case("cdek")
            || self.carrier_code.eq_ignore_ascii_case("cdek");
        let pickup_tariff = self.tariff_code.is_some_and(|code| {
            PICKUP_POINT_TARIFFS.contains(&code) || PICKUP_POINT_TARIFF_RANGE.contains(&code)
        });
        is_cdek && pickup_tariff
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Consent {
    pub personal_data: bool,
    pub marketing: bool,
}

/// One in-progress shipment draft.
///
/// Fields are only mutated through [`SessionPatch`](super::SessionPatch)
/// and the wizard machine; everything else reads through the accessors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionState {
    pub(crate) route: Route,
    pub(crate) role: Role,
    pub(crate) invite_mode: InviteMode,
    pub(crate) package: PackageInfo,
    pub(crate) parties: Parties,
    pub(crate) contact: Contact,
    pub(crate) payment_payer: PaymentPayer,
    pub(crate) selected_offer: Option<Offer>,
    pub(crate) email: String,
    pub(crate) consent: Consent,
    pub(crate) delivery_method: Option<DeliveryMethod>,
    pub(crate) return_to_payment: bool,
}

impl SessionState {
    pub fn new(route: Route) -> Self {
        Self {
            route,
            ..Self::default()
        }
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn invite_mode(&self) -> InviteMode {
        self.invite_mode
    }

    pub fn package(&self) -> &PackageInfo {
        &self.package
    }

    pub fn parties(&self) -> &Parties {
        &self.parties
    }

    pub fn contact(&self) -> &Contact {
        &self.contact
    }

    pub fn payment_payer(&self) -> PaymentPayer {
        self.payment_payer
    }

    pub fn selected_offer(&self) -> Option<&Offer> {
        self.selected_offer.as_ref()
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn consent(&self) -> Consent {
        self.consent
    }

    pub fn delivery_method(&self) -> Option<DeliveryMethod> {
        self.delivery_method
    }

    pub fn return_to_payment(&self) -> bool {
        self.return_to_payment
    }

    /// The recipient phone was fixed by whoever sent the invite, or by the
    /// invited recipient's own verification when the invite carried none.
    pub fn recipient_phone_locked(&self) -> bool {
        self.invite_mode == InviteMode::InvitedRecipient
            && !self.parties.recipient_phone.trim().is_empty()
    }

    /// Whether the selected offer still needs a pickup point chosen.
    pub fn pickup_point_required(&self) -> bool {
        self.selected_offer
            .as_ref()
            .is_some_and(|offer| offer.needs_pickup_point(self.delivery_method))
    }

    /// Route with empty cities filled in from the party addresses.
    pub fn resolved_route(&self) -> Route {
        let mut route = self.route.clone();
        if route.from_city.trim().is_empty() {
            if let Some(city) = address::city_from_address(&self.parties.sender_address) {
                route.from_city = city;
            }
        }
        if route.to_city.trim().is_empty() {
            if let Some(city) = address::city_from_address(&self.parties.recipient_address) {
                route.to_city = city;
            }
        }
        route
    }

    pub(crate) fn set_role(&mut self, role: Role) {
        self.role = role;
    }

    pub(crate) fn set_invite_mode(&mut self, mode: InviteMode) {
        self.invite_mode = mode;
    }

    pub(crate) fn set_selected_offer(&mut self, offer: Offer) {
        self.selected_offer = Some(offer);
    }

    pub(crate) fn set_return_to_payment(&mut self, value: bool) {
        self.return_to_payment = value;
    }

    /// Carry the invite binding of `current` over a replacement draft. An
    /// invited session stays invited, and a locked recipient phone (which is
    /// also the operator phone) stays what the inviter fixed.
    pub(crate) fn keep_invite_binding(&mut self, current: &SessionState) {
        if current.invite_mode != InviteMode::InvitedRecipient {
            return;
        }
        self.invite_mode = InviteMode::InvitedRecipient;
        self.role = Role::Recipient;
        if current.recipient_phone_locked() {
            self.parties.recipient_phone = current.parties.recipient_phone.clone();
            self.contact.phone = current.contact.phone.clone();
        }
    }

    /// Record a successful verification and copy the operator's phone into
    /// the party field that belongs to the current role.
    pub(crate) fn mark_contact_verified(&mut self) {
        self.contact.verified = true;
        self.assign_operator_phone();
    }

    pub(crate) fn assign_operator_phone(&mut self) {
        let phone = self.contact.phone.clone();
        match self.role {
            Role::Sender => self.parties.sender_phone = phone,
            Role::Recipient if !self.recipient_phone_locked() => {
                self.parties.recipient_phone = phone
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cdek_offer(tariff: Option<u32>) -> Offer {
        Offer {
            carrier_id: 1,
            carrier_name: "CDEK".into(),
            carrier_code: "cdek".into(),
            tariff_code: tariff,
            tariff_name: "Склад-Склад".into(),
            price: dec!(450.00),
            eta_days: Some(3),
        }
    }

    #[test]
    fn package_completeness() {
        assert!(!PackageDetails::NotChosen.is_complete());
        assert!(PackageDetails::manual(20, 15, 10, dec!(2)).is_complete());
        assert!(
            !PackageDetails::Manual {
                length: Some(20),
                width: Some(15),
                height: None,
                weight: Some(dec!(2)),
            }
            .is_complete()
        );
        assert!(!PackageDetails::manual(20, 0, 10, dec!(2)).is_complete());
        assert!(!PackageDetails::manual(20, 15, 10, Decimal::ZERO).is_complete());
        assert!(PackageDetails::preset(SizePreset::Shoes).is_complete());
        assert!(!PackageDetails::Unknown { preset: None }.is_complete());
        assert!(PackageDetails::photo("upload-17").is_complete());
        assert!(!PackageDetails::photo("  ").is_complete());
    }

    #[test]
    fn package_serializes_with_mode_tag() {
        let info = PackageInfo::new(PackageDetails::manual(20, 15, 10, dec!(2)));
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["details"]["mode"], "manual");
        assert_eq!(json["details"]["length"], 20);

        let photo: PackageDetails =
            serde_json::from_str(r#"{"mode":"photo","photoRef":"abc"}"#).unwrap();
        assert_eq!(photo, PackageDetails::photo("abc"));

        let unknown: PackageDetails = serde_json::from_str(r#"{"mode":"unknown"}"#).unwrap();
        assert_eq!(unknown, PackageDetails::Unknown { preset: None });
    }

    #[test]
    fn preset_dimensions() {
        assert_eq!(SizePreset::Smartphone.dimensions_cm(), (17, 12, 9));
        assert_eq!(SizePreset::Microwave.max_weight_kg(), dec!(15));
        assert_eq!(SizePreset::ALL.len(), 4);
    }

    #[test]
    fn pickup_point_tariffs() {
        assert!(cdek_offer(Some(136)).needs_pickup_point(None));
        assert!(cdek_offer(Some(233)).needs_pickup_point(None));
        assert!(cdek_offer(Some(240)).needs_pickup_point(Some(DeliveryMethod::PickupPoint)));
        assert!(!cdek_offer(Some(137)).needs_pickup_point(None));
        assert!(!cdek_offer(Some(241)).needs_pickup_point(None));
        assert!(!cdek_offer(None).needs_pickup_point(None));
        assert!(!cdek_offer(Some(136)).needs_pickup_point(Some(DeliveryMethod::Courier)));

        let mut other = cdek_offer(Some(136));
        other.carrier_name = "Boxberry".into();
        other.carrier_code = "boxberry".into();
        assert!(!other.needs_pickup_point(None));
    }

    #[test]
    fn role_display_matches_serde() {
        for role in [Role::Sender, Role::Recipient, Role::Unset] {
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{role}\""));
        }
        for mode in [
            InviteMode::None,
            InviteMode::Assistant,
            InviteMode::InvitedRecipient,
        ] {
            let json = serde_json::to_string(&mode).unwrap();
            assert_eq!(json, format!("\"{mode}\""));
        }
    }

    #[test]
    fn resolved_route_falls_back_to_addresses() {
        let mut session = SessionState::new(Route::new("", "Казань"));
        session.parties.sender_address = "г. Москва, ул Ленина 15".into();
        session.parties.recipient_address = "г. Тула, ул Мира 2".into();
        let route = session.resolved_route();
        assert_eq!(route.from_city, "Москва");
        assert_eq!(route.to_city, "Казань");
    }

    #[test]
    fn verified_phone_is_copied_by_role() {
        let mut session = SessionState::default();
        session.role = Role::Recipient;
        session.contact.phone = "+79001234567".into();
        session.mark_contact_verified();
        assert!(session.contact.verified);
        assert_eq!(session.parties.recipient_phone, "+79001234567");
        assert!(session.parties.sender_phone.is_empty());

        session.invite_mode = InviteMode::InvitedRecipient;
        session.parties.recipient_phone = "+79990000001".into();
        session.assign_operator_phone();
        assert_eq!(session.parties.recipient_phone, "+79990000001");
    }
}
