//! # Clinic Core
//!
//! Identity resolution and clinical-record workflow logic for the clinic
//! back-office:
//! - Resolving subject references that arrive as either canonical or legacy
//!   identifiers
//! - Allocating human-facing legacy identifiers without collision
//! - Gating clinical-artifact operations by actor role and subject state
//! - The creation/status lifecycle of reports, advice and requests
//!
//! **No API concerns**: HTTP routing, sessions and status-code mapping belong
//! to the boundary layer. Every operation here returns a typed
//! [`WorkflowResult`] and never throws opaquely.

pub mod allocator;
pub mod artifacts;
pub mod authz;
pub mod config;
pub mod directory;
pub mod error;
pub mod lifecycle;
pub mod memory;
pub mod resolver;
pub mod subjects;

pub use authz::{authorize, Actor, Decision, DenialReason, WorkflowAction};
pub use config::CoreConfig;
pub use error::{StoreError, WorkflowError, WorkflowResult};

use std::future::Future;
use std::time::Duration;

/// Bounds a store call by the configured deadline.
///
/// An elapsed deadline is [`WorkflowError::Timeout`], distinct from the
/// not-found and denied failures; the core never retries it (retry policy
/// belongs to the caller).
pub(crate) async fn store_call<T, F>(limit: Duration, fut: F) -> WorkflowResult<T>
where
    F: Future<Output = std::result::Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(WorkflowError::from),
        Err(_) => Err(WorkflowError::Timeout),
    }
}
