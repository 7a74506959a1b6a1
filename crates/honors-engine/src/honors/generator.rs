use std::collections::HashMap;
use std::sync::{Arc, Mutex, TryLockError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::aggregate::{aggregate_grades, GradeAggregate};
use super::catalog::SchoolCatalog;
use super::domain::{
    ApprovalStatus, HonorTypeId, LevelKey, RosterFilters, SchoolYear, StudentId, StudentRecord,
};
use super::evaluation::{evaluate_level, EvaluationContext, Qualification};
use super::repository::{
    GradeStore, HonorResult, HonorResultKey, HonorResultStore, NotificationGateway,
    PendingHonorsNotice, ResultStoreError, RosterError, StudentRoster, UpsertDisposition,
};

/// How the consistency rule resolves "the immediately preceding period".
/// One definition is implemented today; the enum keeps the product question
/// visible and testable rather than baked in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyLookback {
    #[default]
    PriorSchoolYearSameLevel,
}

/// Tunables threaded into the generator from configuration.
#[derive(Debug, Clone, Default)]
pub struct EnginePolicy {
    /// Overall deadline for one generation batch; when exceeded the batch
    /// stops and reports partial results instead of failing outright.
    pub batch_timeout: Option<Duration>,
    pub consistency_lookback: ConsistencyLookback,
}

/// Outcome line for one processed student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationEntry {
    pub student_id: StudentId,
    pub student_name: String,
    pub qualified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub honor_type_id: Option<HonorTypeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub honor_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disposition: Option<UpsertDisposition>,
}

/// A student whose evaluation failed; counted apart from qualified and
/// disqualified students.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedStudent {
    pub student_id: StudentId,
    pub reason: String,
}

/// Aggregate outcome of one generation run, returned for caller display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationReport {
    pub level: LevelKey,
    pub school_year: SchoolYear,
    pub generated_at: DateTime<Utc>,
    pub total_processed: usize,
    pub total_qualified: usize,
    pub total_skipped: usize,
    /// Frozen rows (approved, rejected, or overridden) that re-generation
    /// deliberately left untouched.
    pub total_preserved: usize,
    pub timed_out: bool,
    pub message: String,
    pub entries: Vec<GenerationEntry>,
    pub skipped: Vec<SkippedStudent>,
}

/// Ad-hoc single-student calculation result for administrative tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentEvaluation {
    pub student_id: StudentId,
    pub student_name: String,
    pub level: LevelKey,
    pub school_year: SchoolYear,
    pub overall_average: Option<f64>,
    pub min_subject_average: Option<f64>,
    pub qualifications: Vec<Qualification>,
}

/// Errors that abort an engine call outright. Per-student problems never
/// surface here; they are skipped and reported.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("academic level '{0}' is not configured in the catalog")]
    UnknownLevel(LevelKey),
    #[error("honor roll generation already in progress for {level} {school_year}")]
    InProgress {
        level: LevelKey,
        school_year: SchoolYear,
    },
    #[error("student '{0}' is not enrolled at the requested level and school year")]
    UnknownStudent(StudentId),
    #[error("evaluation failed for student '{student}': {reason}")]
    Evaluation { student: StudentId, reason: String },
    #[error(transparent)]
    Roster(#[from] RosterError),
}

type GenerationKey = (LevelKey, SchoolYear);

/// Orchestrates honor roll generation: enumerate, aggregate, evaluate,
/// resolve, and upsert, serialized per (level, school_year) key so
/// concurrent triggers cannot double-write.
pub struct HonorRollService<R, G, S, N> {
    catalog: Arc<SchoolCatalog>,
    roster: Arc<R>,
    grades: Arc<G>,
    results: Arc<S>,
    notifications: Arc<N>,
    policy: EnginePolicy,
    generation_locks: Mutex<HashMap<GenerationKey, Arc<Mutex<()>>>>,
}

impl<R, G, S, N> HonorRollService<R, G, S, N>
where
    R: StudentRoster + 'static,
    G: GradeStore + 'static,
    S: HonorResultStore + 'static,
    N: NotificationGateway + 'static,
{
    pub fn new(
        catalog: Arc<SchoolCatalog>,
        roster: Arc<R>,
        grades: Arc<G>,
        results: Arc<S>,
        notifications: Arc<N>,
        policy: EnginePolicy,
    ) -> Self {
        Self {
            catalog,
            roster,
            grades,
            results,
            notifications,
            policy,
            generation_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn catalog(&self) -> &SchoolCatalog {
        &self.catalog
    }

    /// Generate (or re-generate) the honor roll for a level and school year.
    ///
    /// Re-running with unchanged grades is idempotent: rows are upserted by
    /// (student, level, school_year) and frozen rows are preserved, with the
    /// preservation reported rather than silent.
    pub fn generate(
        &self,
        level: LevelKey,
        school_year: &SchoolYear,
    ) -> Result<GenerationReport, GenerationError> {
        if self.catalog.level(level).is_none() {
            return Err(GenerationError::UnknownLevel(level));
        }

        let key_lock = self.lock_for(level, school_year);
        let _guard = match key_lock.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => {
                return Err(GenerationError::InProgress {
                    level,
                    school_year: school_year.clone(),
                })
            }
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        let students = self
            .roster
            .students_for(level, school_year, &RosterFilters::default())?;
        info!(
            level = %level,
            school_year = %school_year,
            students = students.len(),
            "starting honor roll generation"
        );

        let deadline = self.policy.batch_timeout.map(|t| Instant::now() + t);
        let mut report = GenerationReport {
            level,
            school_year: school_year.clone(),
            generated_at: Utc::now(),
            total_processed: 0,
            total_qualified: 0,
            total_skipped: 0,
            total_preserved: 0,
            timed_out: false,
            message: String::new(),
            entries: Vec::new(),
            skipped: Vec::new(),
        };
        let mut pending_written = 0usize;

        for student in &students {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                warn!(
                    level = %level,
                    school_year = %school_year,
                    processed = report.total_processed,
                    remaining = students.len() - report.total_processed,
                    "generation deadline exceeded, reporting partial results"
                );
                report.timed_out = true;
                break;
            }

            report.total_processed += 1;
            match self.process_student(student, level, school_year) {
                Ok(entry) => {
                    if entry.qualified {
                        report.total_qualified += 1;
                    }
                    match entry.disposition {
                        Some(UpsertDisposition::Preserved) => report.total_preserved += 1,
                        Some(_) => pending_written += 1,
                        None => {}
                    }
                    report.entries.push(entry);
                }
                Err(reason) => {
                    warn!(student = %student.id, %reason, "skipping student");
                    report.total_skipped += 1;
                    report.skipped.push(SkippedStudent {
                        student_id: student.id.clone(),
                        reason,
                    });
                }
            }
        }

        report.message = format!(
            "processed {} of {} students: {} qualified, {} skipped, {} preserved{}",
            report.total_processed,
            students.len(),
            report.total_qualified,
            report.total_skipped,
            report.total_preserved,
            if report.timed_out {
                " (stopped at deadline)"
            } else {
                ""
            },
        );
        info!(level = %level, school_year = %school_year, message = %report.message, "generation finished");

        if pending_written > 0 {
            self.dispatch_notification(level, school_year, pending_written);
        }

        Ok(report)
    }

    /// Ad-hoc calculation for one student; evaluates every configured honor
    /// type without persisting anything.
    pub fn evaluate_student(
        &self,
        student_id: &StudentId,
        level: LevelKey,
        school_year: &SchoolYear,
    ) -> Result<StudentEvaluation, GenerationError> {
        if self.catalog.level(level).is_none() {
            return Err(GenerationError::UnknownLevel(level));
        }
        let student = self
            .roster
            .find_student(student_id, level, school_year)?
            .ok_or_else(|| GenerationError::UnknownStudent(student_id.clone()))?;

        let (aggregate, qualifications) = self
            .aggregate_and_evaluate(&student, level, school_year)
            .map_err(|reason| GenerationError::Evaluation {
                student: student.id.clone(),
                reason,
            })?;

        Ok(StudentEvaluation {
            student_id: student.id.clone(),
            student_name: student.name.clone(),
            level,
            school_year: school_year.clone(),
            overall_average: aggregate.overall_average,
            min_subject_average: aggregate.min_subject_average,
            qualifications,
        })
    }

    fn lock_for(&self, level: LevelKey, school_year: &SchoolYear) -> Arc<Mutex<()>> {
        let mut locks = self
            .generation_locks
            .lock()
            .expect("generation lock registry mutex poisoned");
        locks
            .entry((level, school_year.clone()))
            .or_default()
            .clone()
    }

    fn aggregate_and_evaluate(
        &self,
        student: &StudentRecord,
        level: LevelKey,
        school_year: &SchoolYear,
    ) -> Result<(GradeAggregate, Vec<Qualification>), String> {
        let grades = self
            .grades
            .grades_for(&student.id, level, school_year)
            .map_err(|err| err.to_string())?;
        let aggregate = aggregate_grades(&student.id, level, school_year, &grades, &self.catalog)
            .map_err(|err| err.to_string())?;

        let prior_honor = self.prior_honor(student, level, school_year);
        let ctx = EvaluationContext {
            student,
            prior_honor: prior_honor.as_ref(),
        };
        let qualifications = evaluate_level(&self.catalog, &aggregate, &ctx);
        Ok((aggregate, qualifications))
    }

    fn process_student(
        &self,
        student: &StudentRecord,
        level: LevelKey,
        school_year: &SchoolYear,
    ) -> Result<GenerationEntry, String> {
        let (_aggregate, qualifications) =
            self.aggregate_and_evaluate(student, level, school_year)?;

        let Some((best, average)) = resolve_best_honor(&qualifications) else {
            return Ok(GenerationEntry {
                student_id: student.id.clone(),
                student_name: student.name.clone(),
                qualified: false,
                honor_type_id: None,
                honor_name: None,
                average: None,
                disposition: None,
            });
        };

        let candidate = HonorResult {
            student_id: student.id.clone(),
            student_name: student.name.clone(),
            level,
            school_year: school_year.clone(),
            honor_type_id: best.honor_type_id.clone(),
            gpa: average,
            approval_status: ApprovalStatus::Pending,
            is_overridden: false,
            override_reason: None,
            approved_by: None,
        };
        let disposition = self
            .results
            .upsert_generated(candidate)
            .map_err(|err| err.to_string())?;

        Ok(GenerationEntry {
            student_id: student.id.clone(),
            student_name: student.name.clone(),
            qualified: true,
            honor_type_id: Some(best.honor_type_id.clone()),
            honor_name: Some(best.honor_name.clone()),
            average: Some(average),
            disposition: Some(disposition),
        })
    }

    /// Prior-year honor history per the configured lookback. A store failure
    /// here degrades to "no history" with a warning rather than failing the
    /// student.
    fn prior_honor(
        &self,
        student: &StudentRecord,
        level: LevelKey,
        school_year: &SchoolYear,
    ) -> Option<HonorResult> {
        let ConsistencyLookback::PriorSchoolYearSameLevel = self.policy.consistency_lookback;
        let prior_year = school_year.previous()?;
        let key = HonorResultKey {
            student_id: student.id.clone(),
            level,
            school_year: prior_year,
        };
        match self.results.fetch(&key) {
            Ok(prior) => prior,
            Err(ResultStoreError::NotFound) => None,
            Err(err) => {
                warn!(student = %student.id, error = %err, "prior honor lookup failed, treating as no history");
                None
            }
        }
    }

    fn dispatch_notification(&self, level: LevelKey, school_year: &SchoolYear, pending: usize) {
        let notice = PendingHonorsNotice {
            level,
            school_year: school_year.clone(),
            pending,
        };
        match self.notifications.notify_pending_honors(notice) {
            Ok(receipt) => info!(
                level = %level,
                school_year = %school_year,
                pending,
                notification = %receipt.notification_id,
                "pending honors notification dispatched"
            ),
            Err(err) => warn!(
                level = %level,
                school_year = %school_year,
                error = %err,
                "pending honors notification failed"
            ),
        }
    }
}

/// Resolve multiple qualifying honor types to exactly one: lowest tier rank
/// wins, with the honor type id as a deterministic fallback. Array order is
/// never the tie-break.
fn resolve_best_honor(qualifications: &[Qualification]) -> Option<(&Qualification, f64)> {
    qualifications
        .iter()
        .filter(|q| q.qualified)
        .min_by(|a, b| {
            a.rank
                .cmp(&b.rank)
                .then_with(|| a.honor_type_id.cmp(&b.honor_type_id))
        })
        .and_then(|best| best.average.map(|average| (best, average)))
}
