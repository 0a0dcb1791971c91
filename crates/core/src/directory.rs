//! Subject Directory: the persistent store of clinical-subject accounts.
//!
//! The directory is the single shared mutable resource in the system. The
//! core consumes it through the [`SubjectDirectory`] trait; production
//! deployments back it with a database, tests and the bundled binary use the
//! in-memory implementation from [`crate::memory`].
//!
//! The legacy identifier is a unique secondary key and the constraint is
//! enforced by the store at insert time ([`StoreError::DuplicateLegacyId`]),
//! not merely checked by callers. The allocator's retry loop relies on this.

use crate::StoreError;
use chrono::{DateTime, NaiveDate, Utc};
use clinic_types::{CanonicalId, Eligibility, LegacyId};

/// Demographic fields carried on a subject account. Opaque to the core:
/// nothing here participates in resolution, allocation or gating.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Demographics {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
}

/// A patient account held by the Subject Directory.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Subject {
    /// Opaque, globally unique, assigned by the directory at insert.
    pub canonical_id: CanonicalId,
    /// Human-facing key, unique across the population, immutable.
    pub legacy_id: LegacyId,
    pub eligibility: Eligibility,
    pub demographics: Demographics,
    pub created_at: DateTime<Utc>,
}

/// Input to [`SubjectDirectory::insert`]. The canonical identifier and
/// creation timestamp are assigned by the store; new subjects always start
/// `active`.
#[derive(Clone, Debug)]
pub struct NewSubject {
    pub legacy_id: LegacyId,
    pub demographics: Demographics,
}

/// Partial update applied by [`SubjectDirectory::update`]. The legacy
/// identifier is deliberately absent: it is immutable after allocation.
#[derive(Clone, Debug, Default)]
pub struct SubjectPatch {
    pub eligibility: Option<Eligibility>,
    pub demographics: Option<Demographics>,
}

/// Lookup and mutation operations the core requires from a subject store.
///
/// All methods may suspend (store access is I/O-bound). Implementations must
/// enforce legacy-identifier uniqueness in `insert`.
#[allow(async_fn_in_trait)]
pub trait SubjectDirectory: Send + Sync {
    async fn find_by_canonical_id(&self, id: &CanonicalId) -> Result<Option<Subject>, StoreError>;

    async fn find_by_legacy_id(&self, legacy_id: &str) -> Result<Option<Subject>, StoreError>;

    /// Every legacy identifier currently allocated, in no particular order.
    async fn list_legacy_ids(&self) -> Result<Vec<LegacyId>, StoreError>;

    /// Inserts a new subject, assigning its canonical identifier.
    ///
    /// Fails with [`StoreError::DuplicateLegacyId`] when the legacy
    /// identifier is already taken.
    async fn insert(&self, new_subject: NewSubject) -> Result<Subject, StoreError>;

    /// Applies a partial update, returning the updated subject or `None`
    /// when no subject has that canonical identifier.
    async fn update(
        &self,
        id: &CanonicalId,
        patch: SubjectPatch,
    ) -> Result<Option<Subject>, StoreError>;
}
