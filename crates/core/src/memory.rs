//! In-memory store implementing [`SubjectDirectory`] and [`ArtifactStore`].
//!
//! Backs the bundled REST binary and the test suite. The legacy-identifier
//! unique constraint is enforced under the write lock, exactly like a unique
//! index would be, so the allocator's retry loop can be exercised against it.

use crate::artifacts::{Advice, ArtifactStore, Report, Request};
use crate::directory::{NewSubject, Subject, SubjectDirectory, SubjectPatch};
use crate::StoreError;
use chrono::Utc;
use clinic_types::{AdviceStatus, CanonicalId, Eligibility, LegacyId};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct MemoryInner {
    subjects: HashMap<CanonicalId, Subject>,
    /// legacy id -> canonical id; the unique secondary index.
    legacy_index: HashMap<String, CanonicalId>,
    reports: Vec<Report>,
    advice: HashMap<CanonicalId, Advice>,
    requests: Vec<Request>,
}

/// Shared in-memory store. Cheap to clone via `Arc` at the call sites; the
/// struct itself holds the data behind a single `RwLock`.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SubjectDirectory for MemoryStore {
    async fn find_by_canonical_id(&self, id: &CanonicalId) -> Result<Option<Subject>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.subjects.get(id).cloned())
    }

    async fn find_by_legacy_id(&self, legacy_id: &str) -> Result<Option<Subject>, StoreError> {
        let inner = self.inner.read().await;
        let subject = inner
            .legacy_index
            .get(legacy_id)
            .and_then(|canonical| inner.subjects.get(canonical))
            .cloned();
        Ok(subject)
    }

    async fn list_legacy_ids(&self) -> Result<Vec<LegacyId>, StoreError> {
        let inner = self.inner.read().await;
        inner
            .legacy_index
            .keys()
            .map(|id| LegacyId::new(id).map_err(|e| StoreError::Unavailable(e.to_string())))
            .collect()
    }

    async fn insert(&self, new_subject: NewSubject) -> Result<Subject, StoreError> {
        let mut inner = self.inner.write().await;

        let legacy_key = new_subject.legacy_id.as_str().to_owned();
        if inner.legacy_index.contains_key(&legacy_key) {
            return Err(StoreError::DuplicateLegacyId(legacy_key));
        }

        let subject = Subject {
            canonical_id: CanonicalId::new(),
            legacy_id: new_subject.legacy_id,
            eligibility: Eligibility::Active,
            demographics: new_subject.demographics,
            created_at: Utc::now(),
        };
        inner
            .legacy_index
            .insert(legacy_key, subject.canonical_id.clone());
        inner
            .subjects
            .insert(subject.canonical_id.clone(), subject.clone());
        Ok(subject)
    }

    async fn update(
        &self,
        id: &CanonicalId,
        patch: SubjectPatch,
    ) -> Result<Option<Subject>, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(subject) = inner.subjects.get_mut(id) else {
            return Ok(None);
        };
        if let Some(eligibility) = patch.eligibility {
            subject.eligibility = eligibility;
        }
        if let Some(demographics) = patch.demographics {
            subject.demographics = demographics;
        }
        Ok(Some(subject.clone()))
    }
}

impl ArtifactStore for MemoryStore {
    async fn insert_report(&self, report: Report) -> Result<Report, StoreError> {
        let mut inner = self.inner.write().await;
        inner.reports.push(report.clone());
        Ok(report)
    }

    async fn reports_for_subject(&self, subject: &CanonicalId) -> Result<Vec<Report>, StoreError> {
        let inner = self.inner.read().await;
        let mut reports: Vec<Report> = inner
            .reports
            .iter()
            .filter(|r| &r.subject == subject)
            .cloned()
            .collect();
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reports)
    }

    async fn insert_advice(&self, advice: Advice) -> Result<Advice, StoreError> {
        let mut inner = self.inner.write().await;
        inner.advice.insert(advice.id.clone(), advice.clone());
        Ok(advice)
    }

    async fn approve_advice(&self, id: &CanonicalId) -> Result<Option<Advice>, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(advice) = inner.advice.get_mut(id) else {
            return Ok(None);
        };
        advice.status = AdviceStatus::Approved;
        Ok(Some(advice.clone()))
    }

    async fn advice_for_subject(&self, subject: &CanonicalId) -> Result<Vec<Advice>, StoreError> {
        let inner = self.inner.read().await;
        let mut records: Vec<Advice> = inner
            .advice
            .values()
            .filter(|a| &a.subject == subject)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn insert_request(&self, request: Request) -> Result<Request, StoreError> {
        let mut inner = self.inner.write().await;
        inner.requests.push(request.clone());
        Ok(request)
    }

    async fn requests_for_subject(
        &self,
        subject: &CanonicalId,
    ) -> Result<Vec<Request>, StoreError> {
        let inner = self.inner.read().await;
        let mut requests: Vec<Request> = inner
            .requests
            .iter()
            .filter(|r| &r.requested_by == subject)
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::Demographics;

    fn demographics(first: &str) -> Demographics {
        Demographics {
            first_name: first.into(),
            last_name: "Mensah".into(),
            email: format!("{}@example.org", first.to_ascii_lowercase()),
            phone: "0200000000".into(),
            date_of_birth: None,
            gender: None,
        }
    }

    fn new_subject(legacy: &str) -> NewSubject {
        NewSubject {
            legacy_id: LegacyId::new(legacy).unwrap(),
            demographics: demographics("Ama"),
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_canonical_id_and_active_state() {
        let store = MemoryStore::new();
        let subject = store.insert(new_subject("PAT0001")).await.unwrap();

        assert_eq!(subject.eligibility, Eligibility::Active);
        assert_eq!(subject.legacy_id.as_str(), "PAT0001");

        let by_canonical = store
            .find_by_canonical_id(&subject.canonical_id)
            .await
            .unwrap();
        assert_eq!(by_canonical, Some(subject));
    }

    #[tokio::test]
    async fn test_insert_enforces_legacy_unique_constraint() {
        let store = MemoryStore::new();
        store.insert(new_subject("PAT0001")).await.unwrap();

        let result = store.insert(new_subject("PAT0001")).await;
        assert!(matches!(
            result,
            Err(StoreError::DuplicateLegacyId(id)) if id == "PAT0001"
        ));
    }

    #[tokio::test]
    async fn test_update_patches_eligibility_only() {
        let store = MemoryStore::new();
        let subject = store.insert(new_subject("PAT0001")).await.unwrap();

        let updated = store
            .update(
                &subject.canonical_id,
                SubjectPatch {
                    eligibility: Some(Eligibility::Inactive),
                    demographics: None,
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.eligibility, Eligibility::Inactive);
        assert_eq!(updated.demographics, subject.demographics);
        assert_eq!(updated.legacy_id, subject.legacy_id);
    }

    #[tokio::test]
    async fn test_update_unknown_subject_returns_none() {
        let store = MemoryStore::new();
        let missing = CanonicalId::new();

        let result = store.update(&missing, SubjectPatch::default()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_list_legacy_ids_reflects_population() {
        let store = MemoryStore::new();
        store.insert(new_subject("PAT0001")).await.unwrap();
        store.insert(new_subject("PT0007")).await.unwrap();

        let mut ids: Vec<String> = store
            .list_legacy_ids()
            .await
            .unwrap()
            .into_iter()
            .map(|id| id.as_str().to_owned())
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["PAT0001", "PT0007"]);
    }
}
