//! Parcel Wizard: shipment-onboarding flow engine.

pub mod address;
pub mod config;
pub mod error;
pub mod quotes;
pub mod routes;
pub mod session;
pub mod verification;
pub mod wizard;
