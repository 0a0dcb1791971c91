//! Identity Resolver: maps an ambiguous subject reference to one account.
//!
//! A reference arrives as either the canonical identifier or the human-facing
//! legacy identifier. Resolution is an ordered two-branch strategy, decided
//! once by syntax, so that failure attribution stays precise: a miss is
//! always `SubjectNotFound`, and an eligibility problem on a found subject is
//! always the distinct `SubjectIneligible`.
//!
//! The resolver is a pure read and never caches across calls; eligibility can
//! change between requests.

use crate::config::CoreConfig;
use crate::directory::{Subject, SubjectDirectory};
use crate::error::{WorkflowError, WorkflowResult};
use crate::store_call;
use clinic_types::CanonicalId;
use std::sync::Arc;

pub struct IdentityResolver<D> {
    cfg: Arc<CoreConfig>,
    directory: Arc<D>,
}

impl<D> Clone for IdentityResolver<D> {
    fn clone(&self) -> Self {
        Self {
            cfg: self.cfg.clone(),
            directory: self.directory.clone(),
        }
    }
}

impl<D: SubjectDirectory> IdentityResolver<D> {
    pub fn new(cfg: Arc<CoreConfig>, directory: Arc<D>) -> Self {
        Self { cfg, directory }
    }

    /// Resolves a subject reference in either identifier form.
    ///
    /// If the reference is syntactically canonical it is looked up by
    /// canonical identifier, otherwise by legacy identifier. The branch is
    /// fixed before the lookup; a miss on the applicable branch is
    /// [`WorkflowError::SubjectNotFound`].
    pub async fn resolve(&self, reference: &str) -> WorkflowResult<Subject> {
        let reference = reference.trim();
        let limit = self.cfg.store_timeout();

        let found = if CanonicalId::is_canonical(reference) {
            let id = CanonicalId::parse(reference)
                .map_err(|e| WorkflowError::InvalidInput(e.to_string()))?;
            store_call(limit, self.directory.find_by_canonical_id(&id)).await?
        } else {
            store_call(limit, self.directory.find_by_legacy_id(reference)).await?
        };

        found.ok_or(WorkflowError::SubjectNotFound)
    }

    /// Resolves a subject and additionally certifies eligibility.
    ///
    /// Existence is confirmed first; only then is the eligibility state
    /// examined, so callers about to create a clinical artifact receive
    /// [`WorkflowError::SubjectIneligible`] rather than a not-found failure
    /// for a real but deactivated subject.
    pub async fn resolve_eligible(&self, reference: &str) -> WorkflowResult<Subject> {
        let subject = self.resolve(reference).await?;
        if !subject.eligibility.is_active() {
            return Err(WorkflowError::SubjectIneligible);
        }
        Ok(subject)
    }
}
