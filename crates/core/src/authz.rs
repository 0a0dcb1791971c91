//! Workflow Authorization Gate.
//!
//! One pure decision function answers every "may this actor do this to this
//! subject" question in the workflow core. Call sites never test roles with
//! ad hoc conditionals; a new artifact type gets a new rule row here and
//! nothing else changes.

use crate::directory::Subject;
use crate::error::{WorkflowError, WorkflowResult};
use clinic_types::{CanonicalId, Role};

/// The authenticated actor on whose behalf an operation runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    pub id: CanonicalId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: CanonicalId, role: Role) -> Self {
        Self { id, role }
    }
}

/// Clinical-artifact operations subject to gating.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkflowAction {
    CreateReport,
    CreateAdvice,
    CreateRequest,
    ViewReport,
    ViewAdvice,
}

/// Machine-distinguishable denial reasons; the boundary layer maps each to
/// its own user-visible message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DenialReason {
    RoleForbidden,
    SubjectIneligible,
    NotSelf,
}

/// Outcome of an authorization check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenialReason),
}

impl Decision {
    /// Converts the decision into a result, mapping each denial reason onto
    /// its workflow error.
    pub fn into_result(self) -> WorkflowResult<()> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(DenialReason::RoleForbidden) => Err(WorkflowError::RoleForbidden),
            Decision::Deny(DenialReason::SubjectIneligible) => Err(WorkflowError::SubjectIneligible),
            Decision::Deny(DenialReason::NotSelf) => Err(WorkflowError::NotSelf),
        }
    }
}

/// Decides whether `actor` may perform `action` against `target`.
///
/// Rules:
/// - `CreateReport`: staff only, and the target must currently be active
///   (reports cannot be filed against an ineligible subject).
/// - `ViewReport`: staff only.
/// - `CreateAdvice`: staff against any resolved subject. Patients never
///   create advice directly; they raise a request instead.
/// - `CreateRequest`: only a patient acting on their own identity.
/// - `ViewAdvice`: staff for any subject; a patient only for themself.
pub fn authorize(actor: &Actor, action: WorkflowAction, target: &Subject) -> Decision {
    let is_self = actor.id == target.canonical_id;

    match action {
        WorkflowAction::CreateReport => {
            if !actor.role.is_staff() {
                Decision::Deny(DenialReason::RoleForbidden)
            } else if !target.eligibility.is_active() {
                Decision::Deny(DenialReason::SubjectIneligible)
            } else {
                Decision::Allow
            }
        }
        WorkflowAction::ViewReport => {
            if actor.role.is_staff() {
                Decision::Allow
            } else {
                Decision::Deny(DenialReason::RoleForbidden)
            }
        }
        WorkflowAction::CreateAdvice => {
            if actor.role.is_staff() {
                Decision::Allow
            } else {
                Decision::Deny(DenialReason::RoleForbidden)
            }
        }
        WorkflowAction::CreateRequest => {
            if actor.role != Role::Patient {
                Decision::Deny(DenialReason::RoleForbidden)
            } else if !is_self {
                Decision::Deny(DenialReason::NotSelf)
            } else {
                Decision::Allow
            }
        }
        WorkflowAction::ViewAdvice => {
            if actor.role.is_staff() || is_self {
                Decision::Allow
            } else {
                Decision::Deny(DenialReason::NotSelf)
            }
        }
    }
}
