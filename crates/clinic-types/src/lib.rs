//! # Clinic Types
//!
//! Validated newtypes and enumerations shared across the clinic workspace:
//! - Subject identifiers (canonical and legacy forms)
//! - Actor roles and subject eligibility states
//! - Clinical artifact enumerations (advice status, urgency, request kind)
//! - Validated text wrappers
//!
//! These types carry no storage or workflow behaviour; the core crate builds
//! on them.

mod ids;
mod roles;
mod text;

pub use ids::{CanonicalId, IdError, LegacyId};
pub use roles::{AdviceStatus, Eligibility, RequestKind, Role, Urgency};
pub use text::{NonEmptyText, TextError};
