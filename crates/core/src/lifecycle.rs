//! Clinical Artifact Lifecycle.
//!
//! Every write path follows the same shape: resolve the subject reference,
//! consult the authorization gate, then persist with a single insert. A
//! creation either lands with all required fields or not at all.
//!
//! Advice status rules: advice authored directly by a clinician is
//! self-certifying and is constructed already approved; advice solicited
//! through a patient request stays pending until a clinician acts. The status
//! only ever moves pending to approved.

use crate::artifacts::{
    Advice, AdviceDraft, ArtifactStore, Report, ReportDraft, Request, RequestDraft,
};
use crate::authz::{authorize, Actor, WorkflowAction};
use crate::config::CoreConfig;
use crate::directory::SubjectDirectory;
use crate::error::{WorkflowError, WorkflowResult};
use crate::resolver::IdentityResolver;
use crate::store_call;
use chrono::Utc;
use clinic_types::{AdviceStatus, CanonicalId};
use std::sync::Arc;

pub struct ClinicalService<D, A> {
    cfg: Arc<CoreConfig>,
    resolver: IdentityResolver<D>,
    artifacts: Arc<A>,
}

impl<D, A> Clone for ClinicalService<D, A> {
    fn clone(&self) -> Self {
        Self {
            cfg: self.cfg.clone(),
            resolver: self.resolver.clone(),
            artifacts: self.artifacts.clone(),
        }
    }
}

impl<D: SubjectDirectory, A: ArtifactStore> ClinicalService<D, A> {
    pub fn new(cfg: Arc<CoreConfig>, directory: Arc<D>, artifacts: Arc<A>) -> Self {
        let resolver = IdentityResolver::new(cfg.clone(), directory);
        Self {
            cfg,
            resolver,
            artifacts,
        }
    }

    /// Files an immutable clinical report against an active subject.
    ///
    /// The subject reference may be in either identifier form. A resolved but
    /// deactivated subject fails with [`WorkflowError::SubjectIneligible`],
    /// never with the not-found error.
    pub async fn create_report(
        &self,
        actor: &Actor,
        reference: &str,
        draft: ReportDraft,
    ) -> WorkflowResult<Report> {
        let subject = self.resolver.resolve_eligible(reference).await?;
        authorize(actor, WorkflowAction::CreateReport, &subject).into_result()?;

        let report = Report {
            id: CanonicalId::new(),
            subject: subject.canonical_id,
            author: actor.id.clone(),
            diagnosis: draft.diagnosis.into_inner(),
            treatment: draft.treatment,
            prescription: draft.prescription,
            follow_up_date: draft.follow_up_date,
            notes: draft.notes,
            created_at: Utc::now(),
        };
        let report = store_call(self.cfg.store_timeout(), self.artifacts.insert_report(report))
            .await?;
        tracing::info!(report_id = %report.id, subject = %report.subject, "report created");
        Ok(report)
    }

    /// Creates an advice record authored by a clinician.
    ///
    /// The record is constructed already approved when the author holds a
    /// staff role; the gate has rejected everyone else before this point, but
    /// the rule is kept data-driven rather than assumed.
    pub async fn create_advice(
        &self,
        actor: &Actor,
        reference: &str,
        draft: AdviceDraft,
    ) -> WorkflowResult<Advice> {
        let subject = self.resolver.resolve(reference).await?;
        authorize(actor, WorkflowAction::CreateAdvice, &subject).into_result()?;

        let status = if actor.role.is_staff() {
            AdviceStatus::Approved
        } else {
            AdviceStatus::Pending
        };
        let advice = Advice {
            id: CanonicalId::new(),
            subject: subject.canonical_id,
            author: actor.id.clone(),
            condition: draft.condition.into_inner(),
            advice: draft.advice.into_inner(),
            medications: draft.medications,
            lifestyle: draft.lifestyle,
            urgency: draft.urgency,
            status,
            created_at: Utc::now(),
        };
        let advice = store_call(self.cfg.store_timeout(), self.artifacts.insert_advice(advice))
            .await?;
        tracing::info!(
            advice_id = %advice.id,
            subject = %advice.subject,
            status = %advice.status,
            "advice created"
        );
        Ok(advice)
    }

    /// Records a patient-raised advice or appointment request.
    ///
    /// The actor's own identity is the subject; patients cannot raise a
    /// request on behalf of another subject. The request carries no status
    /// and is consumed by clinicians out-of-band.
    pub async fn submit_request(
        &self,
        actor: &Actor,
        draft: RequestDraft,
    ) -> WorkflowResult<Request> {
        let subject = self.resolver.resolve(&actor.id.to_string()).await?;
        authorize(actor, WorkflowAction::CreateRequest, &subject).into_result()?;

        let request = Request {
            id: CanonicalId::new(),
            kind: draft.kind,
            subject_line: draft.subject_line.into_inner(),
            description: draft.description,
            urgency: draft.urgency,
            preferred_date: draft.preferred_date,
            requested_by: subject.canonical_id,
            created_at: Utc::now(),
        };
        let request = store_call(
            self.cfg.store_timeout(),
            self.artifacts.insert_request(request),
        )
        .await?;
        tracing::info!(request_id = %request.id, requested_by = %request.requested_by, "request submitted");
        Ok(request)
    }

    /// Advances an advice record to approved. Staff only.
    ///
    /// Approval is monotonic: approving an already-approved record returns it
    /// unchanged, and nothing ever moves a record back to pending.
    pub async fn approve_advice(
        &self,
        actor: &Actor,
        advice_id: &CanonicalId,
    ) -> WorkflowResult<Advice> {
        if !actor.role.is_staff() {
            return Err(WorkflowError::RoleForbidden);
        }

        let approved = store_call(
            self.cfg.store_timeout(),
            self.artifacts.approve_advice(advice_id),
        )
        .await?;
        approved.ok_or(WorkflowError::AdviceNotFound)
    }

    /// Lists advice for a subject, newest first. Staff see any subject's
    /// advice; a patient sees only their own.
    pub async fn advice_for_subject(
        &self,
        actor: &Actor,
        reference: &str,
    ) -> WorkflowResult<Vec<Advice>> {
        let subject = self.resolver.resolve(reference).await?;
        authorize(actor, WorkflowAction::ViewAdvice, &subject).into_result()?;

        store_call(
            self.cfg.store_timeout(),
            self.artifacts.advice_for_subject(&subject.canonical_id),
        )
        .await
    }

    /// Lists reports for a subject, newest first. Staff only.
    pub async fn reports_for_subject(
        &self,
        actor: &Actor,
        reference: &str,
    ) -> WorkflowResult<Vec<Report>> {
        let subject = self.resolver.resolve(reference).await?;
        authorize(actor, WorkflowAction::ViewReport, &subject).into_result()?;

        store_call(
            self.cfg.store_timeout(),
            self.artifacts.reports_for_subject(&subject.canonical_id),
        )
        .await
    }

    /// Lists a subject's open requests, newest first. Staff see any
    /// subject's requests; a patient sees only their own.
    pub async fn requests_for_subject(
        &self,
        actor: &Actor,
        reference: &str,
    ) -> WorkflowResult<Vec<Request>> {
        let subject = self.resolver.resolve(reference).await?;
        authorize(actor, WorkflowAction::ViewAdvice, &subject).into_result()?;

        store_call(
            self.cfg.store_timeout(),
            self.artifacts.requests_for_subject(&subject.canonical_id),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::Demographics;
    use crate::memory::MemoryStore;
    use crate::subjects::SubjectService;
    use clinic_types::{Eligibility, NonEmptyText, RequestKind, Role, Urgency};
    use std::time::Duration;

    struct Fixture {
        subjects: SubjectService<MemoryStore>,
        clinical: ClinicalService<MemoryStore, MemoryStore>,
    }

    fn fixture() -> Fixture {
        let cfg = Arc::new(
            CoreConfig::new("PAT", 4, vec!["PT".into()], 3, Duration::from_secs(5)).unwrap(),
        );
        let store = Arc::new(MemoryStore::new());
        Fixture {
            subjects: SubjectService::new(cfg.clone(), store.clone()),
            clinical: ClinicalService::new(cfg, store.clone(), store),
        }
    }

    fn demographics(first: &str) -> Demographics {
        Demographics {
            first_name: first.into(),
            last_name: "Mensah".into(),
            email: format!("{}@example.org", first.to_ascii_lowercase()),
            phone: "0200000002".into(),
            date_of_birth: None,
            gender: None,
        }
    }

    fn physician() -> Actor {
        Actor::new(CanonicalId::new(), Role::Physician)
    }

    fn report_draft() -> ReportDraft {
        ReportDraft {
            diagnosis: NonEmptyText::new("acute bronchitis").unwrap(),
            treatment: "rest and fluids".into(),
            prescription: "amoxicillin 500mg".into(),
            follow_up_date: None,
            notes: String::new(),
        }
    }

    fn advice_draft() -> AdviceDraft {
        AdviceDraft {
            condition: NonEmptyText::new("hypertension").unwrap(),
            advice: NonEmptyText::new("reduce salt intake").unwrap(),
            medications: "lisinopril".into(),
            lifestyle: "daily walk".into(),
            urgency: Urgency::Normal,
        }
    }

    fn request_draft() -> RequestDraft {
        RequestDraft {
            kind: RequestKind::Advice,
            subject_line: NonEmptyText::new("persistent headaches").unwrap(),
            description: "three weeks now, worse in the morning".into(),
            urgency: Urgency::High,
            preferred_date: None,
        }
    }

    #[tokio::test]
    async fn test_report_created_against_resolved_subject() {
        let fx = fixture();
        let doctor = physician();
        let patient = fx
            .subjects
            .register(&doctor, demographics("Ama"))
            .await
            .unwrap();

        let report = fx
            .clinical
            .create_report(&doctor, patient.legacy_id.as_str(), report_draft())
            .await
            .unwrap();

        assert_eq!(report.subject, patient.canonical_id);
        assert_eq!(report.author, doctor.id);
        assert_eq!(report.diagnosis, "acute bronchitis");
    }

    #[tokio::test]
    async fn test_report_rejected_after_deactivation() {
        let fx = fixture();
        let doctor = physician();
        let patient = fx
            .subjects
            .register(&doctor, demographics("Ama"))
            .await
            .unwrap();

        fx.clinical
            .create_report(&doctor, patient.legacy_id.as_str(), report_draft())
            .await
            .unwrap();

        fx.subjects
            .set_eligibility(&doctor, patient.legacy_id.as_str(), Eligibility::Inactive)
            .await
            .unwrap();

        let result = fx
            .clinical
            .create_report(&doctor, patient.legacy_id.as_str(), report_draft())
            .await;
        assert!(matches!(result, Err(WorkflowError::SubjectIneligible)));
    }

    #[tokio::test]
    async fn test_report_for_unknown_subject_is_not_found() {
        let fx = fixture();

        let result = fx
            .clinical
            .create_report(&physician(), "PAT4242", report_draft())
            .await;
        assert!(matches!(result, Err(WorkflowError::SubjectNotFound)));
    }

    #[tokio::test]
    async fn test_clinician_advice_is_created_approved() {
        let fx = fixture();
        let doctor = physician();
        let patient = fx
            .subjects
            .register(&doctor, demographics("Ama"))
            .await
            .unwrap();

        let advice = fx
            .clinical
            .create_advice(&doctor, &patient.canonical_id.to_string(), advice_draft())
            .await
            .unwrap();

        assert_eq!(advice.status, AdviceStatus::Approved);
        assert_eq!(advice.subject, patient.canonical_id);
    }

    #[tokio::test]
    async fn test_patient_cannot_create_advice() {
        let fx = fixture();
        let doctor = physician();
        let patient = fx
            .subjects
            .register(&doctor, demographics("Ama"))
            .await
            .unwrap();
        let other = fx
            .subjects
            .register(&doctor, demographics("Kojo"))
            .await
            .unwrap();

        let as_patient = Actor::new(patient.canonical_id.clone(), Role::Patient);
        let result = fx
            .clinical
            .create_advice(&as_patient, &other.canonical_id.to_string(), advice_draft())
            .await;

        assert!(matches!(result, Err(WorkflowError::RoleForbidden)));
    }

    #[tokio::test]
    async fn test_request_then_advice_yields_approved_record() {
        let fx = fixture();
        let doctor = physician();
        let patient = fx
            .subjects
            .register(&doctor, demographics("Ama"))
            .await
            .unwrap();

        let as_patient = Actor::new(patient.canonical_id.clone(), Role::Patient);
        let request = fx
            .clinical
            .submit_request(&as_patient, request_draft())
            .await
            .unwrap();
        assert_eq!(request.requested_by, patient.canonical_id);

        // Clinician consumes the request out-of-band and creates independent
        // advice; the two artifacts are correlated only by subject.
        let advice = fx
            .clinical
            .create_advice(&doctor, patient.legacy_id.as_str(), advice_draft())
            .await
            .unwrap();
        assert_eq!(advice.status, AdviceStatus::Approved);
        assert_eq!(advice.subject, request.requested_by);
    }

    #[tokio::test]
    async fn test_physician_cannot_submit_patient_request() {
        let fx = fixture();
        let doctor = physician();
        fx.subjects
            .register(&doctor, demographics("Ama"))
            .await
            .unwrap();

        let result = fx.clinical.submit_request(&doctor, request_draft()).await;
        // The physician has no subject account, so resolution of their own
        // identity misses before the role check can run.
        assert!(matches!(
            result,
            Err(WorkflowError::SubjectNotFound | WorkflowError::RoleForbidden)
        ));
    }

    #[tokio::test]
    async fn test_approval_is_monotonic() {
        let fx = fixture();
        let doctor = physician();
        let patient = fx
            .subjects
            .register(&doctor, demographics("Ama"))
            .await
            .unwrap();

        let advice = fx
            .clinical
            .create_advice(&doctor, patient.legacy_id.as_str(), advice_draft())
            .await
            .unwrap();
        assert_eq!(advice.status, AdviceStatus::Approved);

        // Approving approved advice is a no-op, not an error.
        let again = fx.clinical.approve_advice(&doctor, &advice.id).await.unwrap();
        assert_eq!(again.status, AdviceStatus::Approved);
        assert_eq!(again.id, advice.id);
    }

    #[tokio::test]
    async fn test_approve_unknown_advice_is_distinct_error() {
        let fx = fixture();

        let result = fx
            .clinical
            .approve_advice(&physician(), &CanonicalId::new())
            .await;
        assert!(matches!(result, Err(WorkflowError::AdviceNotFound)));
    }

    #[tokio::test]
    async fn test_patient_views_only_own_advice() {
        let fx = fixture();
        let doctor = physician();
        let ama = fx
            .subjects
            .register(&doctor, demographics("Ama"))
            .await
            .unwrap();
        let kojo = fx
            .subjects
            .register(&doctor, demographics("Kojo"))
            .await
            .unwrap();

        fx.clinical
            .create_advice(&doctor, ama.legacy_id.as_str(), advice_draft())
            .await
            .unwrap();

        let as_ama = Actor::new(ama.canonical_id.clone(), Role::Patient);
        let own = fx
            .clinical
            .advice_for_subject(&as_ama, &ama.canonical_id.to_string())
            .await
            .unwrap();
        assert_eq!(own.len(), 1);

        let result = fx
            .clinical
            .advice_for_subject(&as_ama, kojo.legacy_id.as_str())
            .await;
        assert!(matches!(result, Err(WorkflowError::NotSelf)));
    }

    #[tokio::test]
    async fn test_report_listing_is_staff_only_and_newest_first() {
        let fx = fixture();
        let doctor = physician();
        let patient = fx
            .subjects
            .register(&doctor, demographics("Ama"))
            .await
            .unwrap();

        for diagnosis in ["first visit", "second visit"] {
            let draft = ReportDraft {
                diagnosis: NonEmptyText::new(diagnosis).unwrap(),
                ..report_draft()
            };
            fx.clinical
                .create_report(&doctor, patient.legacy_id.as_str(), draft)
                .await
                .unwrap();
        }

        let reports = fx
            .clinical
            .reports_for_subject(&doctor, patient.legacy_id.as_str())
            .await
            .unwrap();
        assert_eq!(reports.len(), 2);
        assert!(reports[0].created_at >= reports[1].created_at);

        let as_patient = Actor::new(patient.canonical_id.clone(), Role::Patient);
        let result = fx
            .clinical
            .reports_for_subject(&as_patient, patient.legacy_id.as_str())
            .await;
        assert!(matches!(result, Err(WorkflowError::RoleForbidden)));
    }
}
