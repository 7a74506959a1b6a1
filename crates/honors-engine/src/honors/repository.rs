use serde::{Deserialize, Serialize};

use super::domain::{
    ApprovalStatus, HonorTypeId, LevelKey, RosterFilters, SchoolYear, StudentGrade, StudentId,
    StudentRecord,
};

/// Natural key of a persisted honor result: a student holds exactly one
/// honor distinction per level per school year.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HonorResultKey {
    pub student_id: StudentId,
    pub level: LevelKey,
    pub school_year: SchoolYear,
}

/// Persisted qualification outcome. Created only by the honor roll
/// generator; status and override fields are mutated only by the approval
/// workflow. No other component writes these rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HonorResult {
    pub student_id: StudentId,
    pub student_name: String,
    pub level: LevelKey,
    pub school_year: SchoolYear,
    pub honor_type_id: HonorTypeId,
    pub gpa: f64,
    pub approval_status: ApprovalStatus,
    pub is_overridden: bool,
    pub override_reason: Option<String>,
    pub approved_by: Option<String>,
}

impl HonorResult {
    pub fn key(&self) -> HonorResultKey {
        HonorResultKey {
            student_id: self.student_id.clone(),
            level: self.level,
            school_year: self.school_year.clone(),
        }
    }

    /// A result that has left the pending state, or was manually overridden,
    /// is frozen with respect to re-generation.
    pub fn is_frozen(&self) -> bool {
        self.is_overridden || self.approval_status != ApprovalStatus::Pending
    }
}

/// Sanitized representation of a stored result for listings and exports.
#[derive(Debug, Clone, Serialize)]
pub struct HonorResultView {
    pub student_id: StudentId,
    pub student_name: String,
    pub honor_type_id: HonorTypeId,
    pub gpa: f64,
    pub status: &'static str,
    pub is_overridden: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
}

impl From<&HonorResult> for HonorResultView {
    fn from(result: &HonorResult) -> Self {
        Self {
            student_id: result.student_id.clone(),
            student_name: result.student_name.clone(),
            honor_type_id: result.honor_type_id.clone(),
            gpa: result.gpa,
            status: result.approval_status.label(),
            is_overridden: result.is_overridden,
            override_reason: result.override_reason.clone(),
            approved_by: result.approved_by.clone(),
        }
    }
}

/// What the store did with a generated candidate row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertDisposition {
    /// No row existed for the key; a pending row was created.
    Created,
    /// A pending, non-overridden row existed and was refreshed in place.
    Refreshed,
    /// The existing row is frozen (approved, rejected, or overridden) and
    /// was left untouched.
    Preserved,
}

impl UpsertDisposition {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Refreshed => "refreshed",
            Self::Preserved => "preserved",
        }
    }

    /// Whether the candidate row landed in storage as pending.
    pub const fn wrote_pending(self) -> bool {
        matches!(self, Self::Created | Self::Refreshed)
    }
}

/// Error enumeration for honor result storage failures.
#[derive(Debug, thiserror::Error)]
pub enum ResultStoreError {
    #[error("honor result not found")]
    NotFound,
    #[error("result store unavailable: {0}")]
    Unavailable(String),
}

/// Storage abstraction for persisted honor results.
///
/// `upsert_generated` must be atomic: implementations read the existing
/// row, check its status, and write under one critical section so that
/// concurrent generation runs can never double-write a key or clobber a
/// frozen row.
pub trait HonorResultStore: Send + Sync {
    fn upsert_generated(&self, candidate: HonorResult)
        -> Result<UpsertDisposition, ResultStoreError>;
    fn fetch(&self, key: &HonorResultKey) -> Result<Option<HonorResult>, ResultStoreError>;
    fn list_for(
        &self,
        level: LevelKey,
        school_year: &SchoolYear,
    ) -> Result<Vec<HonorResult>, ResultStoreError>;
    /// Replace an existing row; `NotFound` when the key was never generated.
    /// Reserved to the approval workflow.
    fn save(&self, result: HonorResult) -> Result<(), ResultStoreError>;
}

/// Error enumeration for roster lookups.
#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("student roster unavailable: {0}")]
    Unavailable(String),
}

/// Student enumeration collaborator. Scoping by section/strand/department is
/// the roster's concern, driven by the filters.
pub trait StudentRoster: Send + Sync {
    fn students_for(
        &self,
        level: LevelKey,
        school_year: &SchoolYear,
        filters: &RosterFilters,
    ) -> Result<Vec<StudentRecord>, RosterError>;

    fn find_student(
        &self,
        student_id: &StudentId,
        level: LevelKey,
        school_year: &SchoolYear,
    ) -> Result<Option<StudentRecord>, RosterError>;
}

/// Error enumeration for grade reads.
#[derive(Debug, thiserror::Error)]
pub enum GradeStoreError {
    #[error("grade data malformed: {0}")]
    Malformed(String),
    #[error("grade store unavailable: {0}")]
    Unavailable(String),
}

/// Read access to raw grades as produced by grade entry.
pub trait GradeStore: Send + Sync {
    fn grades_for(
        &self,
        student_id: &StudentId,
        level: LevelKey,
        school_year: &SchoolYear,
    ) -> Result<Vec<StudentGrade>, GradeStoreError>;
}

/// Fire-and-forget signal that new pending results await approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingHonorsNotice {
    pub level: LevelKey,
    pub school_year: SchoolYear,
    pub pending: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationReceipt {
    pub notification_id: String,
}

/// Notification dispatch error; always logged, never propagated to the
/// caller of generation.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Outbound hook toward the platform's notification collaborator.
pub trait NotificationGateway: Send + Sync {
    fn notify_pending_honors(
        &self,
        notice: PendingHonorsNotice,
    ) -> Result<NotificationReceipt, NotificationError>;
}
