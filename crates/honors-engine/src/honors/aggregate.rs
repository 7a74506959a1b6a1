use serde::{Deserialize, Serialize};
use tracing::warn;

use super::catalog::SchoolCatalog;
use super::domain::{LevelKey, PeriodId, SchoolYear, StudentGrade, StudentId, SubjectId};

/// One raw grade attributed to a collection period, kept for audit/export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodGrade {
    pub period_id: PeriodId,
    pub period_name: String,
    pub grade: f64,
}

/// Per-subject rollup: the recorded period grades, their mean, and whether
/// every expected collection period was graded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectAggregate {
    pub subject_id: SubjectId,
    pub subject_name: String,
    pub category: Option<String>,
    pub period_grades: Vec<PeriodGrade>,
    pub expected_periods: usize,
    pub average: f64,
    pub complete: bool,
}

/// Aggregated grade picture for one (student, level, school_year) tuple.
///
/// Subjects with zero recorded grades are excluded entirely rather than
/// treated as zeros; subjects missing some periods are averaged over what
/// exists and flagged partial. The overall average is the unweighted mean of
/// subject averages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeAggregate {
    pub student_id: StudentId,
    pub level: LevelKey,
    pub school_year: SchoolYear,
    pub subjects: Vec<SubjectAggregate>,
    pub overall_average: Option<f64>,
    pub min_subject_average: Option<f64>,
    pub partial_subjects: usize,
}

impl GradeAggregate {
    /// No subject carries a single grade; evaluators treat this as
    /// automatically disqualified.
    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }
}

/// Data errors surfaced while collapsing raw grades. A malformed grade fails
/// the student, not the batch.
#[derive(Debug, thiserror::Error)]
pub enum AggregationError {
    #[error("grade {grade} for student {student} in subject {subject} is off the 0-100 scale")]
    OffScaleGrade {
        student: StudentId,
        subject: SubjectId,
        grade: f64,
    },
}

/// Collapse raw per-period grades into per-subject and overall averages for
/// one student. Grades referencing unknown subjects or non-collection
/// periods are warned and ignored; a student enrolled in nothing yields an
/// empty aggregate, never an error.
pub fn aggregate_grades(
    student_id: &StudentId,
    level: LevelKey,
    school_year: &SchoolYear,
    grades: &[StudentGrade],
    catalog: &SchoolCatalog,
) -> Result<GradeAggregate, AggregationError> {
    let collection_periods = catalog.collection_periods(level);
    let expected_periods = collection_periods.len();

    let mut subjects: Vec<SubjectAggregate> = Vec::new();

    for grade in grades {
        if grade.level != level || &grade.school_year != school_year {
            continue;
        }
        if !grade.is_on_scale() {
            return Err(AggregationError::OffScaleGrade {
                student: student_id.clone(),
                subject: grade.subject_id.clone(),
                grade: grade.grade,
            });
        }
        let Some(period) = collection_periods.iter().find(|p| p.id == grade.period_id) else {
            warn!(
                student = %student_id,
                period = %grade.period_id.0,
                "grade recorded against a non-collection period, ignoring"
            );
            continue;
        };
        let Some(subject) = catalog.subject(&grade.subject_id) else {
            warn!(
                student = %student_id,
                subject = %grade.subject_id.0,
                "grade references an unknown subject, ignoring"
            );
            continue;
        };

        let position = match subjects.iter().position(|s| s.subject_id == subject.id) {
            Some(position) => position,
            None => {
                subjects.push(SubjectAggregate {
                    subject_id: subject.id.clone(),
                    subject_name: subject.name.clone(),
                    category: subject.category.clone(),
                    period_grades: Vec::new(),
                    expected_periods,
                    average: 0.0,
                    complete: false,
                });
                subjects.len() - 1
            }
        };
        let entry = &mut subjects[position];

        if entry
            .period_grades
            .iter()
            .any(|recorded| recorded.period_id == grade.period_id)
        {
            // Uniqueness is owned by grade entry; keep the first row if it slips.
            warn!(
                student = %student_id,
                subject = %subject.id.0,
                period = %grade.period_id.0,
                "duplicate grade for period, keeping the first"
            );
            continue;
        }

        entry.period_grades.push(PeriodGrade {
            period_id: period.id.clone(),
            period_name: period.name.clone(),
            grade: grade.grade,
        });
    }

    let mut partial_subjects = 0;
    for subject in &mut subjects {
        let graded = subject.period_grades.len();
        let sum: f64 = subject.period_grades.iter().map(|p| p.grade).sum();
        subject.average = sum / graded as f64;
        subject.complete = graded == subject.expected_periods;
        if !subject.complete {
            partial_subjects += 1;
        }
    }

    let overall_average = if subjects.is_empty() {
        None
    } else {
        let sum: f64 = subjects.iter().map(|s| s.average).sum();
        Some(sum / subjects.len() as f64)
    };
    let min_subject_average = subjects
        .iter()
        .map(|s| s.average)
        .fold(None, |acc: Option<f64>, avg| match acc {
            Some(current) if current <= avg => Some(current),
            _ => Some(avg),
        });

    Ok(GradeAggregate {
        student_id: student_id.clone(),
        level,
        school_year: school_year.clone(),
        subjects,
        overall_average,
        min_subject_average,
        partial_subjects,
    })
}
