//! Completeness guards, one per step.
//!
//! Pure functions of the session. Package completeness is recomputed from
//! the package fields every time; there is no cached flag to drift.

use std::sync::LazyLock;

use regex::Regex;

use super::steps::{Position, StepId};
use crate::address::has_explicit_house_number;
use crate::error::ValidationError;
use crate::session::{PaymentPayer, SessionState};
use crate::verification::is_valid_phone;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

/// Whether the step at `position` may be left forward.
///
/// For phone steps this only covers phase 1 (a well-formed phone); code
/// verification is driven by the machine.
pub fn check(position: Position, session: &SessionState) -> Result<(), ValidationError> {
    check_step(position.step_id(), session)
}

pub fn check_step(step: StepId, session: &SessionState) -> Result<(), ValidationError> {
    let parties = session.parties();
    match step {
        StepId::RoleSelect => session
            .role()
            .is_set()
            .then_some(())
            .ok_or(ValidationError::RoleNotSelected),
        StepId::Package => session
            .package()
            .is_complete()
            .then_some(())
            .ok_or(ValidationError::PackageIncomplete),
        StepId::ContactPhone | StepId::UserPhone => {
            require_phone(&session.contact().phone, "your phone")
        }
        StepId::PickupAddress => {
            require_house(&parties.sender_address, "pickup address")?;
            if parties.sender_name.trim().is_empty() {
                return Err(ValidationError::NameRequired { field: "sender" });
            }
            Ok(())
        }
        StepId::RecipientPhone => require_phone(&parties.recipient_phone, "recipient"),
        StepId::Payment => match session.payment_payer() {
            PaymentPayer::Unset => Err(ValidationError::PayerNotSelected),
            _ => Ok(()),
        },
        StepId::RecipientAddress => {
            require_house(&parties.recipient_address, "recipient address")?;
            require_full_name(&parties.recipient_name, "recipient")
        }
        StepId::SenderAddress => require_house(&parties.sender_address, "sender address"),
        StepId::SenderFio => {
            require_full_name(&parties.sender_name, "sender")?;
            require_phone(&parties.sender_phone, "sender")
        }
        StepId::DeliveryAddress => require_house(&parties.recipient_address, "delivery address"),
        StepId::DeliveryMethod => session
            .delivery_method()
            .map(|_| ())
            .ok_or(ValidationError::DeliveryMethodNotSelected),
        StepId::SelectPickupPoint => {
            if parties.recipient_pickup_point_code.trim().is_empty() {
                Err(ValidationError::PickupPointRequired)
            } else {
                Ok(())
            }
        }
        StepId::Email => {
            if !is_valid_email(session.email()) {
                return Err(ValidationError::InvalidEmail);
            }
            if !session.consent().personal_data {
                return Err(ValidationError::ConsentRequired);
            }
            Ok(())
        }
        StepId::OrderComplete => Ok(()),
    }
}

/// At least two words: surname and given name.
pub fn is_full_name(name: &str) -> bool {
    name.split_whitespace().count() >= 2
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email.trim())
}

fn require_house(address: &str, field: &'static str) -> Result<(), ValidationError> {
    if has_explicit_house_number(address) {
        Ok(())
    } else {
        Err(ValidationError::MissingHouseNumber { field })
    }
}

fn require_full_name(name: &str, field: &'static str) -> Result<(), ValidationError> {
    if is_full_name(name) {
        Ok(())
    } else {
        Err(ValidationError::NameRequired { field })
    }
}

fn require_phone(phone: &str, field: &'static str) -> Result<(), ValidationError> {
    if is_valid_phone(phone) {
        Ok(())
    } else {
        Err(ValidationError::PhoneRequired { field })
    }
}
