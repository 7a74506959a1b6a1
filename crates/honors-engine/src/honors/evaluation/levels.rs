use super::super::aggregate::GradeAggregate;
use super::super::catalog::HonorCriterion;
use super::super::domain::{HonorType, LevelKey};
use super::rules;
use super::{CheckKind, CriterionCheck, EvaluationContext, LevelEvaluator, Qualification};

fn enrollment_failure() -> CriterionCheck {
    CriterionCheck {
        kind: CheckKind::Enrollment,
        passed: false,
        notes: "no graded subjects recorded for the school year".to_string(),
    }
}

/// Shared evaluation flow for basic education levels: a flat minimum grade
/// (optionally capped by `max_gpa`), the per-subject floor, consistency, and
/// any additional rules.
fn evaluate_basic_education(
    aggregate: &GradeAggregate,
    honor: &HonorType,
    criterion: &HonorCriterion,
    ctx: &EvaluationContext<'_>,
) -> Qualification {
    if aggregate.is_empty() {
        return Qualification::disqualified(honor, vec![enrollment_failure()]);
    }

    let mut checks = Vec::new();
    let effective =
        rules::apply_additional_rules(aggregate, &criterion.additional_rules, ctx.student, &mut checks);

    checks.push(rules::average_band_check(
        effective.overall_average,
        criterion.min_grade.or(criterion.min_gpa),
        criterion.max_gpa,
    ));
    if let Some(floor) = criterion.min_grade_all {
        checks.push(rules::subject_floor_check(&effective, floor));
    }
    if criterion.require_consistent_honor {
        checks.push(rules::consistency_check(ctx.prior_honor));
    }

    let qualified = checks.iter().all(|check| check.passed);
    Qualification {
        honor_type_id: honor.id.clone(),
        honor_name: honor.name.clone(),
        rank: honor.rank,
        qualified,
        average: effective.overall_average,
        min_subject_average: effective.min_subject_average,
        checks,
    }
}

/// Elementary: single year-level axis; section scoping happens upstream in
/// the generator's roster enumeration.
pub struct ElementaryEvaluator;

impl LevelEvaluator for ElementaryEvaluator {
    fn level(&self) -> LevelKey {
        LevelKey::Elementary
    }

    fn evaluate(
        &self,
        aggregate: &GradeAggregate,
        honor: &HonorType,
        criterion: &HonorCriterion,
        ctx: &EvaluationContext<'_>,
    ) -> Qualification {
        evaluate_basic_education(aggregate, honor, criterion, ctx)
    }
}

/// Junior High: same shape as Elementary.
pub struct JuniorHighEvaluator;

impl LevelEvaluator for JuniorHighEvaluator {
    fn level(&self) -> LevelKey {
        LevelKey::JuniorHighschool
    }

    fn evaluate(
        &self,
        aggregate: &GradeAggregate,
        honor: &HonorType,
        criterion: &HonorCriterion,
        ctx: &EvaluationContext<'_>,
    ) -> Qualification {
        evaluate_basic_education(aggregate, honor, criterion, ctx)
    }
}

/// Senior High: criteria share the basic education shape; the track/strand
/// axis only affects which students the generator enumerates.
pub struct SeniorHighEvaluator;

impl LevelEvaluator for SeniorHighEvaluator {
    fn level(&self) -> LevelKey {
        LevelKey::SeniorHighschool
    }

    fn evaluate(
        &self,
        aggregate: &GradeAggregate,
        honor: &HonorType,
        criterion: &HonorCriterion,
        ctx: &EvaluationContext<'_>,
    ) -> Qualification {
        evaluate_basic_education(aggregate, honor, criterion, ctx)
    }
}

/// College: a year-range gate rejects ineligible students before any grade
/// work runs, and qualification requires the GPA band rather than a flat
/// minimum.
pub struct CollegeEvaluator;

impl LevelEvaluator for CollegeEvaluator {
    fn level(&self) -> LevelKey {
        LevelKey::College
    }

    fn evaluate(
        &self,
        aggregate: &GradeAggregate,
        honor: &HonorType,
        criterion: &HonorCriterion,
        ctx: &EvaluationContext<'_>,
    ) -> Qualification {
        let mut checks = Vec::new();

        if criterion.min_year.is_some() || criterion.max_year.is_some() {
            let gate = rules::year_level_check(
                ctx.student.year_level,
                criterion.min_year,
                criterion.max_year,
            );
            let rejected = !gate.passed;
            checks.push(gate);
            if rejected {
                return Qualification::disqualified(honor, checks);
            }
        }

        if aggregate.is_empty() {
            checks.push(enrollment_failure());
            return Qualification::disqualified(honor, checks);
        }

        let effective = rules::apply_additional_rules(
            aggregate,
            &criterion.additional_rules,
            ctx.student,
            &mut checks,
        );

        checks.push(rules::average_band_check(
            effective.overall_average,
            criterion.min_gpa,
            criterion.max_gpa,
        ));
        if let Some(floor) = criterion.min_grade_all {
            checks.push(rules::subject_floor_check(&effective, floor));
        }
        if criterion.require_consistent_honor {
            checks.push(rules::consistency_check(ctx.prior_honor));
        }

        let qualified = checks.iter().all(|check| check.passed);
        Qualification {
            honor_type_id: honor.id.clone(),
            honor_name: honor.name.clone(),
            rank: honor.rank,
            qualified,
            average: effective.overall_average,
            min_subject_average: effective.min_subject_average,
            checks,
        }
    }
}
