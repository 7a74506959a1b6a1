use tracing::warn;

use super::super::aggregate::{GradeAggregate, SubjectAggregate};
use super::super::catalog::AdditionalRule;
use super::super::domain::{ApprovalStatus, StudentRecord};
use super::super::repository::HonorResult;
use super::{CheckKind, CriterionCheck};

/// The aggregate as seen by a single criterion after additional rules (e.g.
/// category exclusions) have been applied.
pub(crate) struct EffectiveAggregate<'a> {
    pub subjects: Vec<&'a SubjectAggregate>,
    pub overall_average: Option<f64>,
    pub min_subject_average: Option<f64>,
    pub partial_subjects: usize,
}

fn restat<'a>(subjects: Vec<&'a SubjectAggregate>) -> EffectiveAggregate<'a> {
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
    let partial_subjects = subjects.iter().filter(|s| !s.complete).count();
    EffectiveAggregate {
        subjects,
        overall_average,
        min_subject_average,
        partial_subjects,
    }
}

/// Apply the criterion's additional rules: exclusions reshape the aggregate,
/// membership rules append checks, unknown rules are warned no-ops.
pub(crate) fn apply_additional_rules<'a>(
    aggregate: &'a GradeAggregate,
    additional_rules: &[AdditionalRule],
    student: &StudentRecord,
    checks: &mut Vec<CriterionCheck>,
) -> EffectiveAggregate<'a> {
    let excluded_categories: Vec<&str> = additional_rules
        .iter()
        .filter_map(|rule| match rule {
            AdditionalRule::ExcludeSubjectCategory { category } => Some(category.as_str()),
            _ => None,
        })
        .collect();

    let subjects: Vec<&SubjectAggregate> = aggregate
        .subjects
        .iter()
        .filter(|subject| {
            !subject.category.as_deref().is_some_and(|category| {
                excluded_categories
                    .iter()
                    .any(|excluded| excluded.eq_ignore_ascii_case(category))
            })
        })
        .collect();
    let effective = restat(subjects);

    for rule in additional_rules {
        match rule {
            AdditionalRule::ExcludeSubjectCategory { category } => {
                let dropped = aggregate.subjects.len() - effective.subjects.len();
                checks.push(CriterionCheck {
                    kind: CheckKind::AdditionalRule,
                    passed: true,
                    notes: format!("excluded {dropped} subject(s) in category '{category}'"),
                });
            }
            AdditionalRule::RequireDepartment { department } => {
                let member = student
                    .department
                    .as_deref()
                    .is_some_and(|d| d.eq_ignore_ascii_case(department));
                checks.push(CriterionCheck {
                    kind: CheckKind::AdditionalRule,
                    passed: member,
                    notes: if member {
                        format!("student belongs to required department '{department}'")
                    } else {
                        format!("student is not in required department '{department}'")
                    },
                });
            }
            AdditionalRule::MinGradedSubjects { count } => {
                let graded = effective.subjects.len();
                checks.push(CriterionCheck {
                    kind: CheckKind::AdditionalRule,
                    passed: graded >= *count,
                    notes: format!("{graded} graded subject(s), minimum {count}"),
                });
            }
            AdditionalRule::Unknown { key, .. } => {
                warn!(rule = %key, "unknown additional rule, ignoring");
                checks.push(CriterionCheck {
                    kind: CheckKind::AdditionalRule,
                    passed: true,
                    notes: format!("unknown rule '{key}' ignored"),
                });
            }
        }
    }

    effective
}

/// Overall average must fall within the configured band; a missing bound is
/// open-ended, and no bounds at all passes trivially.
pub(crate) fn average_band_check(
    average: Option<f64>,
    lower: Option<f64>,
    upper: Option<f64>,
) -> CriterionCheck {
    let Some(average) = average else {
        return CriterionCheck {
            kind: CheckKind::AverageBand,
            passed: false,
            notes: "no overall average available".to_string(),
        };
    };

    if let Some(lower) = lower {
        if average < lower {
            return CriterionCheck {
                kind: CheckKind::AverageBand,
                passed: false,
                notes: format!("overall average {average:.2} below minimum {lower:.2}"),
            };
        }
    }
    if let Some(upper) = upper {
        if average > upper {
            return CriterionCheck {
                kind: CheckKind::AverageBand,
                passed: false,
                notes: format!("overall average {average:.2} above maximum {upper:.2}"),
            };
        }
    }

    let notes = match (lower, upper) {
        (Some(lower), Some(upper)) => {
            format!("overall average {average:.2} within [{lower:.2}, {upper:.2}]")
        }
        (Some(lower), None) => format!("overall average {average:.2} meets minimum {lower:.2}"),
        (None, Some(upper)) => format!("overall average {average:.2} within maximum {upper:.2}"),
        (None, None) => format!("overall average {average:.2}, no band configured"),
    };
    CriterionCheck {
        kind: CheckKind::AverageBand,
        passed: true,
        notes,
    }
}

/// Every subject average must meet the floor, and every subject must be
/// complete: a partial subject fails the criterion outright rather than
/// passing on an incomplete average.
pub(crate) fn subject_floor_check(effective: &EffectiveAggregate<'_>, floor: f64) -> CriterionCheck {
    if effective.subjects.is_empty() {
        return CriterionCheck {
            kind: CheckKind::SubjectFloor,
            passed: false,
            notes: "no graded subjects to hold to the floor".to_string(),
        };
    }
    if effective.partial_subjects > 0 {
        return CriterionCheck {
            kind: CheckKind::SubjectFloor,
            passed: false,
            notes: format!(
                "{} subject(s) missing period grades; the floor requires every period present",
                effective.partial_subjects
            ),
        };
    }

    let min = effective
        .min_subject_average
        .unwrap_or(f64::NEG_INFINITY);
    if min >= floor {
        CriterionCheck {
            kind: CheckKind::SubjectFloor,
            passed: true,
            notes: format!("lowest subject average {min:.2} meets floor {floor:.2}"),
        }
    } else {
        CriterionCheck {
            kind: CheckKind::SubjectFloor,
            passed: false,
            notes: format!("lowest subject average {min:.2} below floor {floor:.2}"),
        }
    }
}

/// Numeric year level must fall within the configured range. A student with
/// no year level on record cannot pass a year-scoped criterion.
pub(crate) fn year_level_check(
    year_level: Option<u8>,
    min_year: Option<u8>,
    max_year: Option<u8>,
) -> CriterionCheck {
    let Some(year) = year_level else {
        return CriterionCheck {
            kind: CheckKind::YearLevel,
            passed: false,
            notes: "student has no year level on record".to_string(),
        };
    };

    let below = min_year.is_some_and(|min| year < min);
    let above = max_year.is_some_and(|max| year > max);
    if below || above {
        CriterionCheck {
            kind: CheckKind::YearLevel,
            passed: false,
            notes: format!(
                "year level {year} outside eligible range {}..{}",
                min_year.map_or("*".to_string(), |y| y.to_string()),
                max_year.map_or("*".to_string(), |y| y.to_string()),
            ),
        }
    } else {
        CriterionCheck {
            kind: CheckKind::YearLevel,
            passed: true,
            notes: format!("year level {year} within eligible range"),
        }
    }
}

/// The consistency requirement: an approved honor in the immediately
/// preceding school year at the same level. Absence of history fails the
/// criterion.
pub(crate) fn consistency_check(prior_honor: Option<&HonorResult>) -> CriterionCheck {
    match prior_honor {
        Some(prior) if prior.approval_status == ApprovalStatus::Approved => CriterionCheck {
            kind: CheckKind::ConsistentHonor,
            passed: true,
            notes: format!(
                "approved {} honor held in {}",
                prior.honor_type_id, prior.school_year
            ),
        },
        Some(prior) => CriterionCheck {
            kind: CheckKind::ConsistentHonor,
            passed: false,
            notes: format!(
                "prior-year honor in {} is {}, not approved",
                prior.school_year,
                prior.approval_status.label()
            ),
        },
        None => CriterionCheck {
            kind: CheckKind::ConsistentHonor,
            passed: false,
            notes: "no prior-year honor on record".to_string(),
        },
    }
}
