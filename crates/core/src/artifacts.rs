//! Clinical artifact records and their store.
//!
//! Reports, Advice records and patient-raised Requests are independent
//! collections correlated only by the canonical subject identifier. None of
//! them owns a subject; they hold a non-owning reference confirmed by a
//! directory lookup at creation time.

use crate::StoreError;
use chrono::{DateTime, NaiveDate, Utc};
use clinic_types::{AdviceStatus, CanonicalId, NonEmptyText, RequestKind, Urgency};

/// An immutable clinical report. Created once against an active subject,
/// never updated afterwards.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Report {
    pub id: CanonicalId,
    pub subject: CanonicalId,
    pub author: CanonicalId,
    pub diagnosis: String,
    pub treatment: String,
    pub prescription: String,
    pub follow_up_date: Option<NaiveDate>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

/// Clinician-supplied fields of a new report.
#[derive(Clone, Debug)]
pub struct ReportDraft {
    pub diagnosis: NonEmptyText,
    pub treatment: String,
    pub prescription: String,
    pub follow_up_date: Option<NaiveDate>,
    pub notes: String,
}

/// An advice record. Status starts `pending` unless authored by a clinician,
/// and only ever advances to `approved`.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Advice {
    pub id: CanonicalId,
    pub subject: CanonicalId,
    pub author: CanonicalId,
    pub condition: String,
    pub advice: String,
    pub medications: String,
    pub lifestyle: String,
    pub urgency: Urgency,
    pub status: AdviceStatus,
    pub created_at: DateTime<Utc>,
}

/// Author-supplied fields of a new advice record.
#[derive(Clone, Debug)]
pub struct AdviceDraft {
    pub condition: NonEmptyText,
    pub advice: NonEmptyText,
    pub medications: String,
    pub lifestyle: String,
    pub urgency: Urgency,
}

/// A single-shot notification-like artifact raised by a patient asking for
/// attention. Carries no status; a clinician consumes it out-of-band and the
/// resulting advice record is correlated only by subject.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Request {
    pub id: CanonicalId,
    pub kind: RequestKind,
    pub subject_line: String,
    pub description: String,
    pub urgency: Urgency,
    /// Only meaningful for appointment requests.
    pub preferred_date: Option<NaiveDate>,
    pub requested_by: CanonicalId,
    pub created_at: DateTime<Utc>,
}

/// Patient-supplied fields of a new request.
#[derive(Clone, Debug)]
pub struct RequestDraft {
    pub kind: RequestKind,
    pub subject_line: NonEmptyText,
    pub description: String,
    pub urgency: Urgency,
    pub preferred_date: Option<NaiveDate>,
}

/// Persistence operations for clinical artifacts.
///
/// Creation is a single insert per artifact, so a record is either fully
/// persisted with all required fields or not persisted at all.
#[allow(async_fn_in_trait)]
pub trait ArtifactStore: Send + Sync {
    async fn insert_report(&self, report: Report) -> Result<Report, StoreError>;

    async fn reports_for_subject(&self, subject: &CanonicalId) -> Result<Vec<Report>, StoreError>;

    async fn insert_advice(&self, advice: Advice) -> Result<Advice, StoreError>;

    /// Marks an advice record approved, returning the updated record.
    ///
    /// Idempotent: approving already-approved advice returns it unchanged.
    /// Returns `Ok(None)` when no advice record has that identifier.
    async fn approve_advice(&self, id: &CanonicalId) -> Result<Option<Advice>, StoreError>;

    async fn advice_for_subject(&self, subject: &CanonicalId) -> Result<Vec<Advice>, StoreError>;

    async fn insert_request(&self, request: Request) -> Result<Request, StoreError>;

    async fn requests_for_subject(&self, subject: &CanonicalId)
        -> Result<Vec<Request>, StoreError>;
}
