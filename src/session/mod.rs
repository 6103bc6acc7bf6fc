//! Shipment draft: collected answers, patches and shareable encodings.

pub mod codec;
pub mod invite;
pub mod model;
pub mod patch;

pub use codec::{decode_payload, encode_payload};
pub use invite::{InviteCodec, InvitePayload, QuoteSharePayload};
pub use model::{
    Consent, Contact, DEFAULT_WEIGHT_KG, DeliveryMethod, InviteMode, Offer, PackageDetails,
    PackageInfo, Parties, PaymentPayer, Role, Route, SessionState, SizePreset,
};
pub use patch::SessionPatch;
