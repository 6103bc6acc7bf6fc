//! Partial updates to a session draft.
//!
//! A patch only merges; it never validates. The wizard guards decide
//! whether the merged state is good enough to move on.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::model::{
    Consent, DeliveryMethod, Offer, PackageDetails, PaymentPayer, Route, SessionState,
};
use crate::address;
use crate::verification::normalize_phone;

/// Field-level edits submitted by a step screen. `None` leaves the field
/// untouched.
///
/// Role and invite mode are absent on purpose: only the wizard machine
/// sets them. The selected offer can be set but never cleared here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionPatch {
    pub route: Option<Route>,
    pub package: Option<PackageDetails>,
    pub estimated_value: Option<Decimal>,
    pub sender_name: Option<String>,
    pub sender_phone: Option<String>,
    pub sender_address: Option<String>,
    /// Edits the sender address through its parts; wins over `sender_address`.
    pub sender_address_parts: Option<address::AddressParts>,
    pub recipient_name: Option<String>,
    pub recipient_phone: Option<String>,
    pub recipient_address: Option<String>,
    pub recipient_address_parts: Option<address::AddressParts>,
    pub recipient_pickup_point_code: Option<String>,
    pub recipient_pickup_point_address: Option<String>,
    pub contact_phone: Option<String>,
    pub payment_payer: Option<PaymentPayer>,
    pub selected_offer: Option<Offer>,
    pub email: Option<String>,
    pub consent: Option<Consent>,
    pub delivery_method: Option<DeliveryMethod>,
}

impl SessionPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

impl SessionState {
    /// Merge a patch and return the resulting session.
    pub fn update(mut self, patch: SessionPatch) -> Self {
        self.apply(patch);
        self
    }

    /// Merge a patch in place.
    ///
    /// For an invited recipient, the recipient phone and the operator phone
    /// (which are the same number) are locked and edits to them are dropped.
    /// Changing the operator phone to a different number clears its
    /// verified flag.
    pub fn apply(&mut self, patch: SessionPatch) {
        let SessionPatch {
            route,
            package,
            estimated_value,
            sender_name,
            sender_phone,
            sender_address,
            sender_address_parts,
            recipient_name,
            recipient_phone,
            recipient_address,
            recipient_address_parts,
            recipient_pickup_point_code,
            recipient_pickup_point_address,
            contact_phone,
            payment_payer,
            selected_offer,
            email,
            consent,
            delivery_method,
        } = patch;

        if let Some(route) = route {
            self.route = route;
        }
        if let Some(details) = package {
            self.package.details = details;
        }
        if let Some(value) = estimated_value {
            self.package.estimated_value = Some(value);
        }

        let parties = &mut self.parties;
        if let Some(name) = sender_name {
            parties.sender_name = name;
        }
        if let Some(phone) = sender_phone {
            parties.sender_phone = phone;
        }
        if let Some(address) = sender_address {
            parties.sender_address = address;
        }
        if let Some(parts) = sender_address_parts {
            parties.sender_address = parts.compose();
        }
        if let Some(name) = recipient_name {
            parties.recipient_name = name;
        }
        if let Some(address) = recipient_address {
            parties.recipient_address = address;
        }
        if let Some(parts) = recipient_address_parts {
            parties.recipient_address = parts.compose();
        }
        if let Some(code) = recipient_pickup_point_code {
            parties.recipient_pickup_point_code = code;
        }
        if let Some(address) = recipient_pickup_point_address {
            parties.recipient_pickup_point_address = address;
        }

        let locked = self.recipient_phone_locked();
        if let Some(phone) = recipient_phone {
            if locked {
                tracing::debug!("Ignoring edit of locked recipient phone");
            } else {
                self.parties.recipient_phone = phone;
            }
        }
        if let Some(phone) = contact_phone {
            if locked {
                tracing::debug!("Ignoring edit of locked operator phone");
            } else {
                if normalize_phone(&phone) != normalize_phone(&self.contact.phone) {
                    self.contact.verified = false;
                }
                self.contact.phone = phone;
            }
        }

        if let Some(payer) = payment_payer {
            self.payment_payer = payer;
        }
        if let Some(offer) = selected_offer {
            self.selected_offer = Some(offer);
        }
        if let Some(email) = email {
            self.email = email;
        }
        if let Some(consent) = consent {
            self.consent = consent;
        }
        if let Some(method) = delivery_method {
            self.delivery_method = Some(method);
        }
    }
}
