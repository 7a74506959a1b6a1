use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::domain::{
    AcademicLevel, GradingPeriod, HonorType, HonorTypeId, LevelKey, PeriodId, Subject, SubjectId,
};

/// Threshold configuration binding one honor type to one academic level.
/// At most one criterion exists per (level, honor_type) pair; the catalog
/// upserts by that key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HonorCriterion {
    pub level: LevelKey,
    pub honor_type_id: HonorTypeId,
    /// Lower GPA bound for band honors (College qualification requires this
    /// band rather than a flat minimum).
    pub min_gpa: Option<f64>,
    /// Upper GPA bound for band honors; open-ended when absent.
    pub max_gpa: Option<f64>,
    /// Flat floor on the overall average, used by basic education levels.
    pub min_grade: Option<f64>,
    /// Floor on every subject average, not just the overall mean.
    pub min_grade_all: Option<f64>,
    /// Eligible year-level range, meaningful at College.
    pub min_year: Option<u8>,
    pub max_year: Option<u8>,
    /// Requires an approved honor in the immediately preceding school year.
    pub require_consistent_honor: bool,
    pub additional_rules: Vec<AdditionalRule>,
}

impl HonorCriterion {
    pub fn new(level: LevelKey, honor_type_id: HonorTypeId) -> Self {
        Self {
            level,
            honor_type_id,
            min_gpa: None,
            max_gpa: None,
            min_grade: None,
            min_grade_all: None,
            min_year: None,
            max_year: None,
            require_consistent_honor: false,
            additional_rules: Vec::new(),
        }
    }
}

/// Closed set of level-specific criterion extensions. Unknown keys from the
/// configured rule bag survive as `Unknown` and evaluate as warned no-ops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum AdditionalRule {
    /// Drop subjects of the named category from averaging and floor checks.
    ExcludeSubjectCategory { category: String },
    /// Student must belong to the named department.
    RequireDepartment { department: String },
    /// Student must have at least this many subjects with recorded grades.
    MinGradedSubjects { count: usize },
    Unknown { key: String, value: Value },
}

impl AdditionalRule {
    /// Interpret one entry of the open-ended `additional_rules` parameter bag.
    pub fn from_entry(key: &str, value: &Value) -> Self {
        match key {
            "exclude_subject_category" => match value.as_str() {
                Some(category) => Self::ExcludeSubjectCategory {
                    category: category.to_string(),
                },
                None => Self::unknown(key, value),
            },
            "require_department" => match value.as_str() {
                Some(department) => Self::RequireDepartment {
                    department: department.to_string(),
                },
                None => Self::unknown(key, value),
            },
            "min_graded_subjects" => match value.as_u64() {
                Some(count) => Self::MinGradedSubjects {
                    count: count as usize,
                },
                None => Self::unknown(key, value),
            },
            _ => Self::unknown(key, value),
        }
    }

    fn unknown(key: &str, value: &Value) -> Self {
        Self::Unknown {
            key: key.to_string(),
            value: value.clone(),
        }
    }
}

/// Reference data consumed by the engine: levels, grading periods, subjects,
/// honor types, and the configured criteria. Loaded once per deployment from
/// the platform's administration tables; immutable during generation.
#[derive(Debug, Clone, Default)]
pub struct SchoolCatalog {
    levels: Vec<AcademicLevel>,
    periods: Vec<GradingPeriod>,
    subjects: Vec<Subject>,
    honor_types: Vec<HonorType>,
    criteria: Vec<HonorCriterion>,
}

impl SchoolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_level(&mut self, level: AcademicLevel) {
        if let Some(existing) = self.levels.iter_mut().find(|l| l.key == level.key) {
            *existing = level;
        } else {
            self.levels.push(level);
            self.levels.sort_by_key(|l| l.sort_order);
        }
    }

    pub fn add_period(&mut self, period: GradingPeriod) {
        if let Some(existing) = self.periods.iter_mut().find(|p| p.id == period.id) {
            *existing = period;
        } else {
            self.periods.push(period);
        }
    }

    pub fn add_subject(&mut self, subject: Subject) {
        if let Some(existing) = self.subjects.iter_mut().find(|s| s.id == subject.id) {
            *existing = subject;
        } else {
            self.subjects.push(subject);
        }
    }

    pub fn add_honor_type(&mut self, honor_type: HonorType) {
        if let Some(existing) = self.honor_types.iter_mut().find(|h| h.id == honor_type.id) {
            *existing = honor_type;
        } else {
            self.honor_types.push(honor_type);
        }
    }

    /// Upsert by (level, honor_type): the invariant is one criterion row per
    /// pair, so a second insert replaces the first.
    pub fn upsert_criterion(&mut self, criterion: HonorCriterion) {
        if let Some(existing) = self.criteria.iter_mut().find(|c| {
            c.level == criterion.level && c.honor_type_id == criterion.honor_type_id
        }) {
            *existing = criterion;
        } else {
            self.criteria.push(criterion);
        }
    }

    pub fn level(&self, key: LevelKey) -> Option<&AcademicLevel> {
        self.levels.iter().find(|l| l.key == key)
    }

    pub fn levels(&self) -> &[AcademicLevel] {
        &self.levels
    }

    pub fn subject(&self, id: &SubjectId) -> Option<&Subject> {
        self.subjects.iter().find(|s| &s.id == id)
    }

    pub fn period(&self, id: &PeriodId) -> Option<&GradingPeriod> {
        self.periods.iter().find(|p| &p.id == id)
    }

    pub fn honor_type(&self, id: &HonorTypeId) -> Option<&HonorType> {
        self.honor_types.iter().find(|h| &h.id == id)
    }

    /// Raw grade-collection periods for a level: leaves of the period
    /// hierarchy that are not computed final averages, in display order.
    pub fn collection_periods(&self, level: LevelKey) -> Vec<&GradingPeriod> {
        let mut periods: Vec<&GradingPeriod> = self
            .periods
            .iter()
            .filter(|p| p.level == level && !p.is_final_average && !self.is_parent(&p.id))
            .collect();
        periods.sort_by_key(|p| p.sort_order);
        periods
    }

    fn is_parent(&self, id: &PeriodId) -> bool {
        self.periods
            .iter()
            .any(|p| p.parent_id.as_ref() == Some(id))
    }

    /// Criteria resolver: absence means the honor type is not offered at the
    /// level, so callers skip rather than error.
    pub fn criterion(&self, level: LevelKey, honor_type: &HonorTypeId) -> Option<&HonorCriterion> {
        self.criteria
            .iter()
            .find(|c| c.level == level && &c.honor_type_id == honor_type)
    }

    /// All configured criteria for a level joined with their honor types,
    /// restricted to types whose scope admits the level and ordered by tier
    /// rank. Criteria pointing at unknown honor types are configuration
    /// errors: skipped with a warning, never fatal.
    pub fn criteria_for(&self, level: LevelKey) -> Vec<(&HonorType, &HonorCriterion)> {
        let mut pairs: Vec<(&HonorType, &HonorCriterion)> = self
            .criteria
            .iter()
            .filter(|c| c.level == level)
            .filter_map(|criterion| match self.honor_type(&criterion.honor_type_id) {
                Some(honor_type) if honor_type.scope.admits(level) => {
                    Some((honor_type, criterion))
                }
                Some(honor_type) => {
                    warn!(
                        honor_type = %honor_type.id,
                        level = %level,
                        scope = honor_type.scope.label(),
                        "criterion configured for a level outside the honor type's scope, skipping"
                    );
                    None
                }
                None => {
                    warn!(
                        honor_type = %criterion.honor_type_id,
                        level = %level,
                        "criterion references an unknown honor type, skipping"
                    );
                    None
                }
            })
            .collect();
        pairs.sort_by(|a, b| a.0.rank.cmp(&b.0.rank).then_with(|| a.0.id.cmp(&b.0.id)));
        pairs
    }
}
