use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::catalog::SchoolCatalog;
use super::domain::{ApprovalStatus, HonorTypeId, LevelKey};
use super::repository::{HonorResult, HonorResultKey, HonorResultStore, ResultStoreError};

/// What an override does to the approval status of the row it touches. The
/// observed system leaves this unspecified, so it is a named policy rather
/// than an assumption.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverridePolicy {
    /// The overridden row keeps whatever approval status it had.
    #[default]
    PreserveStatus,
    /// Overriding sends the row back to pending for re-approval.
    ResetToPending,
}

/// Decision taken by an approval authority on a pending result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approve,
    Reject,
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("no honor result recorded for student '{student}' at {level} {school_year}")]
    NotFound {
        student: String,
        level: LevelKey,
        school_year: String,
    },
    #[error("result is {from}, only pending results can be decided")]
    InvalidTransition { from: &'static str },
    #[error("honor type '{honor_type}' is not offered at {level}")]
    HonorNotOffered {
        honor_type: HonorTypeId,
        level: LevelKey,
    },
    #[error("an override requires a non-empty reason")]
    EmptyOverrideReason,
    #[error(transparent)]
    Store(#[from] ResultStoreError),
}

/// State machine over persisted honor results. The generator never touches
/// status or override fields; this service never creates rows.
pub struct ApprovalService<S> {
    catalog: Arc<SchoolCatalog>,
    results: Arc<S>,
    override_policy: OverridePolicy,
}

impl<S> ApprovalService<S>
where
    S: HonorResultStore + 'static,
{
    pub fn new(catalog: Arc<SchoolCatalog>, results: Arc<S>, override_policy: OverridePolicy) -> Self {
        Self {
            catalog,
            results,
            override_policy,
        }
    }

    pub fn override_policy(&self) -> OverridePolicy {
        self.override_policy
    }

    /// `pending -> approved | rejected`, driven by an external approval
    /// authority. Any other starting state is an invalid transition.
    pub fn decide(
        &self,
        key: &HonorResultKey,
        decision: ApprovalDecision,
        actor: &str,
    ) -> Result<HonorResult, WorkflowError> {
        let mut result = self.fetch_existing(key)?;

        if result.approval_status != ApprovalStatus::Pending {
            return Err(WorkflowError::InvalidTransition {
                from: result.approval_status.label(),
            });
        }

        result.approval_status = match decision {
            ApprovalDecision::Approve => ApprovalStatus::Approved,
            ApprovalDecision::Reject => ApprovalStatus::Rejected,
        };
        result.approved_by = Some(actor.to_string());
        self.results.save(result.clone())?;

        info!(
            student = %result.student_id,
            level = %result.level,
            school_year = %result.school_year,
            status = result.approval_status.label(),
            actor,
            "honor result decided"
        );
        Ok(result)
    }

    /// Side entry applicable regardless of status: force a different honor
    /// type onto the row, recording who and why. Whether the row returns to
    /// pending is governed by the configured [`OverridePolicy`].
    pub fn override_honor(
        &self,
        key: &HonorResultKey,
        honor_type: &HonorTypeId,
        reason: &str,
        actor: &str,
    ) -> Result<HonorResult, WorkflowError> {
        if reason.trim().is_empty() {
            return Err(WorkflowError::EmptyOverrideReason);
        }
        if self.catalog.criterion(key.level, honor_type).is_none() {
            return Err(WorkflowError::HonorNotOffered {
                honor_type: honor_type.clone(),
                level: key.level,
            });
        }

        let mut result = self.fetch_existing(key)?;
        result.honor_type_id = honor_type.clone();
        result.is_overridden = true;
        result.override_reason = Some(reason.trim().to_string());
        if self.override_policy == OverridePolicy::ResetToPending {
            result.approval_status = ApprovalStatus::Pending;
            result.approved_by = None;
        }
        self.results.save(result.clone())?;

        info!(
            student = %result.student_id,
            level = %result.level,
            school_year = %result.school_year,
            honor_type = %result.honor_type_id,
            policy = ?self.override_policy,
            actor,
            "honor result overridden"
        );
        Ok(result)
    }

    fn fetch_existing(&self, key: &HonorResultKey) -> Result<HonorResult, WorkflowError> {
        match self.results.fetch(key) {
            Ok(Some(result)) => Ok(result),
            Ok(None) | Err(ResultStoreError::NotFound) => Err(WorkflowError::NotFound {
                student: key.student_id.0.clone(),
                level: key.level,
                school_year: key.school_year.as_str().to_string(),
            }),
            Err(err) => Err(WorkflowError::Store(err)),
        }
    }
}
