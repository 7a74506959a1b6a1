mod levels;
mod rules;

pub use levels::{
    CollegeEvaluator, ElementaryEvaluator, JuniorHighEvaluator, SeniorHighEvaluator,
};

use serde::{Deserialize, Serialize};

use super::aggregate::GradeAggregate;
use super::catalog::{HonorCriterion, SchoolCatalog};
use super::domain::{HonorType, HonorTypeId, LevelKey, StudentRecord};
use super::repository::HonorResult;

/// Inputs beyond the grade aggregate that criteria may consult: the roster
/// row (year level, department) and the student's prior-year honor history.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    pub student: &'a StudentRecord,
    /// The student's honor result from the immediately preceding school year
    /// at the same level, when one exists.
    pub prior_honor: Option<&'a HonorResult>,
}

/// Which evaluation primitive produced a check entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    Enrollment,
    AverageBand,
    SubjectFloor,
    YearLevel,
    ConsistentHonor,
    AdditionalRule,
}

/// Discrete contribution to a qualification verdict, keeping the decision
/// trail auditable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionCheck {
    pub kind: CheckKind,
    pub passed: bool,
    pub notes: String,
}

/// Verdict for one honor type. Evaluators always return the full list of
/// these, since a student may satisfy several honor types at once; resolution
/// to a single result happens later in the generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Qualification {
    pub honor_type_id: HonorTypeId,
    pub honor_name: String,
    pub rank: u8,
    pub qualified: bool,
    pub average: Option<f64>,
    pub min_subject_average: Option<f64>,
    pub checks: Vec<CriterionCheck>,
}

impl Qualification {
    fn disqualified(honor: &HonorType, checks: Vec<CriterionCheck>) -> Self {
        Self {
            honor_type_id: honor.id.clone(),
            honor_name: honor.name.clone(),
            rank: honor.rank,
            qualified: false,
            average: None,
            min_subject_average: None,
            checks,
        }
    }
}

/// One evaluation strategy per academic level, all sharing this interface.
pub trait LevelEvaluator: Send + Sync {
    fn level(&self) -> LevelKey;

    fn evaluate(
        &self,
        aggregate: &GradeAggregate,
        honor: &HonorType,
        criterion: &HonorCriterion,
        ctx: &EvaluationContext<'_>,
    ) -> Qualification;
}

/// Strategy lookup for the closed set of levels.
pub fn evaluator_for(key: LevelKey) -> &'static dyn LevelEvaluator {
    match key {
        LevelKey::Elementary => &ElementaryEvaluator,
        LevelKey::JuniorHighschool => &JuniorHighEvaluator,
        LevelKey::SeniorHighschool => &SeniorHighEvaluator,
        LevelKey::College => &CollegeEvaluator,
    }
}

/// Run the level's strategy against every honor type configured for it.
pub fn evaluate_level(
    catalog: &SchoolCatalog,
    aggregate: &GradeAggregate,
    ctx: &EvaluationContext<'_>,
) -> Vec<Qualification> {
    let evaluator = evaluator_for(aggregate.level);
    catalog
        .criteria_for(aggregate.level)
        .into_iter()
        .map(|(honor, criterion)| evaluator.evaluate(aggregate, honor, criterion, ctx))
        .collect()
}
