//! Subject account operations: registration and staff-driven updates.
//!
//! Registration is the one place in the core that must be correct under
//! concurrency. The allocator's scan-then-increment is not atomic, so two
//! concurrent registrations can compute the same candidate; the directory's
//! unique constraint rejects the loser and the loop recomputes, bounded by
//! the configured retry count.

use crate::allocator::IdentifierAllocator;
use crate::config::CoreConfig;
use crate::directory::{Demographics, NewSubject, Subject, SubjectDirectory, SubjectPatch};
use crate::error::{StoreError, WorkflowError, WorkflowResult};
use crate::resolver::IdentityResolver;
use crate::store_call;
use clinic_types::Eligibility;
use std::sync::Arc;

use crate::authz::Actor;

pub struct SubjectService<D> {
    cfg: Arc<CoreConfig>,
    directory: Arc<D>,
    allocator: IdentifierAllocator<D>,
    resolver: IdentityResolver<D>,
}

impl<D> Clone for SubjectService<D> {
    fn clone(&self) -> Self {
        Self {
            cfg: self.cfg.clone(),
            directory: self.directory.clone(),
            allocator: self.allocator.clone(),
            resolver: self.resolver.clone(),
        }
    }
}

impl<D: SubjectDirectory> SubjectService<D> {
    pub fn new(cfg: Arc<CoreConfig>, directory: Arc<D>) -> Self {
        let allocator = IdentifierAllocator::new(cfg.clone(), directory.clone());
        let resolver = IdentityResolver::new(cfg.clone(), directory.clone());
        Self {
            cfg,
            directory,
            allocator,
            resolver,
        }
    }

    /// Registers a new subject account.
    ///
    /// Staff only. Allocates the next legacy identifier and inserts; when the
    /// store's unique constraint rejects the candidate, the identifier is
    /// recomputed and the insert retried, at most
    /// [`CoreConfig::allocation_retries`] times before surfacing
    /// [`WorkflowError::AllocationExhausted`].
    pub async fn register(
        &self,
        actor: &Actor,
        demographics: Demographics,
    ) -> WorkflowResult<Subject> {
        if !actor.role.is_staff() {
            return Err(WorkflowError::RoleForbidden);
        }

        let retries = self.cfg.allocation_retries();
        let mut attempts = 0u32;
        loop {
            let legacy_id = self.allocator.next_legacy_id().await?;
            let candidate = NewSubject {
                legacy_id: legacy_id.clone(),
                demographics: demographics.clone(),
            };

            let insert =
                tokio::time::timeout(self.cfg.store_timeout(), self.directory.insert(candidate))
                    .await;
            match insert {
                Err(_) => return Err(WorkflowError::Timeout),
                Ok(Ok(subject)) => {
                    tracing::info!(
                        legacy_id = %subject.legacy_id,
                        canonical_id = %subject.canonical_id,
                        "registered subject"
                    );
                    return Ok(subject);
                }
                Ok(Err(StoreError::DuplicateLegacyId(taken))) => {
                    attempts += 1;
                    if attempts > retries {
                        return Err(WorkflowError::AllocationExhausted { retries });
                    }
                    tracing::warn!(
                        candidate = %taken,
                        attempt = attempts,
                        "legacy id lost allocation race; recomputing"
                    );
                }
                Ok(Err(other)) => return Err(other.into()),
            }
        }
    }

    /// Sets a subject's eligibility state. Staff only; the subject is
    /// resolved first so an unknown reference fails with `SubjectNotFound`.
    pub async fn set_eligibility(
        &self,
        actor: &Actor,
        reference: &str,
        eligibility: Eligibility,
    ) -> WorkflowResult<Subject> {
        if !actor.role.is_staff() {
            return Err(WorkflowError::RoleForbidden);
        }

        let subject = self.resolver.resolve(reference).await?;
        let patch = SubjectPatch {
            eligibility: Some(eligibility),
            demographics: None,
        };
        let updated = store_call(
            self.cfg.store_timeout(),
            self.directory.update(&subject.canonical_id, patch),
        )
        .await?;
        updated.ok_or(WorkflowError::SubjectNotFound)
    }

    /// Replaces a subject's demographic fields. Staff only.
    pub async fn update_demographics(
        &self,
        actor: &Actor,
        reference: &str,
        demographics: Demographics,
    ) -> WorkflowResult<Subject> {
        if !actor.role.is_staff() {
            return Err(WorkflowError::RoleForbidden);
        }

        let subject = self.resolver.resolve(reference).await?;
        let patch = SubjectPatch {
            eligibility: None,
            demographics: Some(demographics),
        };
        let updated = store_call(
            self.cfg.store_timeout(),
            self.directory.update(&subject.canonical_id, patch),
        )
        .await?;
        updated.ok_or(WorkflowError::SubjectNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use clinic_types::{CanonicalId, Role};
    use std::collections::HashSet;
    use std::time::Duration;

    fn cfg_with_retries(retries: u32) -> Arc<CoreConfig> {
        Arc::new(
            CoreConfig::new(
                "PAT",
                4,
                vec!["PT".into()],
                retries,
                Duration::from_secs(5),
            )
            .unwrap(),
        )
    }

    fn demographics(first: &str) -> Demographics {
        Demographics {
            first_name: first.into(),
            last_name: "Annan".into(),
            email: format!("{}@example.org", first.to_ascii_lowercase()),
            phone: "0200000001".into(),
            date_of_birth: None,
            gender: None,
        }
    }

    fn staff() -> Actor {
        Actor::new(CanonicalId::new(), Role::Admin)
    }

    #[tokio::test]
    async fn test_first_registrations_take_sequential_ids() {
        let service = SubjectService::new(cfg_with_retries(3), Arc::new(MemoryStore::new()));

        let first = service.register(&staff(), demographics("Ama")).await.unwrap();
        let second = service.register(&staff(), demographics("Kojo")).await.unwrap();

        assert_eq!(first.legacy_id.as_str(), "PAT0001");
        assert_eq!(second.legacy_id.as_str(), "PAT0002");
    }

    #[tokio::test]
    async fn test_patient_cannot_register_subjects() {
        let service = SubjectService::new(cfg_with_retries(3), Arc::new(MemoryStore::new()));
        let patient = Actor::new(CanonicalId::new(), Role::Patient);

        let result = service.register(&patient, demographics("Ama")).await;
        assert!(matches!(result, Err(WorkflowError::RoleForbidden)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_registrations_allocate_distinct_ids() {
        let service = Arc::new(SubjectService::new(
            cfg_with_retries(64),
            Arc::new(MemoryStore::new()),
        ));

        let mut handles = Vec::new();
        for n in 0..50 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service
                    .register(&staff(), demographics(&format!("Subject{n}")))
                    .await
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            let subject = handle.await.unwrap().unwrap();
            assert!(
                seen.insert(subject.legacy_id.as_str().to_owned()),
                "duplicate legacy id allocated: {}",
                subject.legacy_id
            );
        }
        assert_eq!(seen.len(), 50);
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_allocation_error() {
        // A store whose insert always reports a duplicate, as if every
        // candidate loses the allocation race.
        struct AlwaysDuplicate;

        impl SubjectDirectory for AlwaysDuplicate {
            async fn find_by_canonical_id(
                &self,
                _id: &CanonicalId,
            ) -> Result<Option<Subject>, StoreError> {
                Ok(None)
            }

            async fn find_by_legacy_id(&self, _id: &str) -> Result<Option<Subject>, StoreError> {
                Ok(None)
            }

            async fn list_legacy_ids(&self) -> Result<Vec<clinic_types::LegacyId>, StoreError> {
                Ok(Vec::new())
            }

            async fn insert(&self, new_subject: NewSubject) -> Result<Subject, StoreError> {
                Err(StoreError::DuplicateLegacyId(
                    new_subject.legacy_id.as_str().to_owned(),
                ))
            }

            async fn update(
                &self,
                _id: &CanonicalId,
                _patch: SubjectPatch,
            ) -> Result<Option<Subject>, StoreError> {
                Ok(None)
            }
        }

        let service = SubjectService::new(cfg_with_retries(2), Arc::new(AlwaysDuplicate));
        let result = service.register(&staff(), demographics("Ama")).await;

        assert!(matches!(
            result,
            Err(WorkflowError::AllocationExhausted { retries: 2 })
        ));
    }

    #[tokio::test]
    async fn test_set_eligibility_round_trip() {
        let store = Arc::new(MemoryStore::new());
        let service = SubjectService::new(cfg_with_retries(3), store);

        let subject = service.register(&staff(), demographics("Ama")).await.unwrap();
        let updated = service
            .set_eligibility(&staff(), subject.legacy_id.as_str(), Eligibility::Suspended)
            .await
            .unwrap();

        assert_eq!(updated.eligibility, Eligibility::Suspended);
        assert_eq!(updated.canonical_id, subject.canonical_id);
    }

    #[tokio::test]
    async fn test_set_eligibility_requires_staff() {
        let service = SubjectService::new(cfg_with_retries(3), Arc::new(MemoryStore::new()));
        let patient = Actor::new(CanonicalId::new(), Role::Patient);

        let result = service
            .set_eligibility(&patient, "PAT0001", Eligibility::Inactive)
            .await;
        assert!(matches!(result, Err(WorkflowError::RoleForbidden)));
    }

    #[tokio::test]
    async fn test_update_demographics_replaces_fields() {
        let service = SubjectService::new(cfg_with_retries(3), Arc::new(MemoryStore::new()));

        let subject = service.register(&staff(), demographics("Ama")).await.unwrap();
        let updated = service
            .update_demographics(
                &staff(),
                &subject.canonical_id.to_string(),
                demographics("Amara"),
            )
            .await
            .unwrap();

        assert_eq!(updated.demographics.first_name, "Amara");
        assert_eq!(updated.legacy_id, subject.legacy_id);
    }
}
