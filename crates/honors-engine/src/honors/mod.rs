//! Honor qualification engine: grade aggregation, per-level evaluation,
//! batch honor roll generation, and the approval/override workflow over
//! persisted results.

pub mod aggregate;
pub mod catalog;
pub mod domain;
pub mod evaluation;
pub mod generator;
pub mod repository;
pub mod router;
pub mod seed;
pub mod workflow;

#[cfg(test)]
mod tests;

pub use aggregate::{aggregate_grades, AggregationError, GradeAggregate, SubjectAggregate};
pub use catalog::{AdditionalRule, HonorCriterion, SchoolCatalog};
pub use domain::{
    AcademicLevel, ApprovalStatus, GradingPeriod, HonorScope, HonorType, HonorTypeId, LevelKey,
    PeriodId, PeriodType, RosterFilters, SchoolYear, StudentGrade, StudentId, StudentRecord,
    Subject, SubjectId,
};
pub use evaluation::{
    evaluate_level, evaluator_for, CheckKind, CriterionCheck, EvaluationContext, LevelEvaluator,
    Qualification,
};
pub use generator::{
    ConsistencyLookback, EnginePolicy, GenerationEntry, GenerationError, GenerationReport,
    HonorRollService, SkippedStudent, StudentEvaluation,
};
pub use repository::{
    GradeStore, GradeStoreError, HonorResult, HonorResultKey, HonorResultStore, HonorResultView,
    NotificationError, NotificationGateway, NotificationReceipt, PendingHonorsNotice,
    ResultStoreError, RosterError, StudentRoster, UpsertDisposition,
};
pub use router::{honors_router, HonorsState};
pub use seed::SeedImportError;
pub use workflow::{ApprovalDecision, ApprovalService, OverridePolicy, WorkflowError};
