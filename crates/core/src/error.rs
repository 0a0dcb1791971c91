//! Error taxonomy for the clinical-record workflow core.
//!
//! Every operation exposed to the boundary layer returns one of these typed
//! failures; the boundary maps them to user-visible messages and HTTP status
//! codes. The core never recovers from them locally beyond the allocator's
//! bounded retry.

/// Failures raised by a persistent store implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The legacy-identifier unique constraint rejected an insert.
    #[error("legacy identifier '{0}' is already allocated")]
    DuplicateLegacyId(String),
    /// Any other persistence failure. Retryable by the caller, not the core.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Failures surfaced by the workflow core.
///
/// "Not found" and "found but ineligible" are different user-visible
/// conditions and are kept as distinct variants on purpose.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("subject not found")]
    SubjectNotFound,
    #[error("subject is not eligible for new clinical records")]
    SubjectIneligible,
    #[error("role is not permitted to perform this action")]
    RoleForbidden,
    #[error("patients may only act on their own record")]
    NotSelf,
    #[error("could not allocate a unique legacy identifier after {retries} retries")]
    AllocationExhausted { retries: u32 },
    #[error("advice record not found")]
    AdviceNotFound,
    #[error("store call exceeded the configured deadline")]
    Timeout,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type WorkflowResult<T> = std::result::Result<T, WorkflowError>;
