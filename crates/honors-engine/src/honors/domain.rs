use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier wrapper for students as known to the roster collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StudentId(pub String);

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for catalog subjects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectId(pub String);

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for grading periods.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeriodId(pub String);

/// Identifier wrapper for honor types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HonorTypeId(pub String);

impl fmt::Display for HonorTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The closed set of academic levels the platform administers. Selects which
/// evaluation strategy applies during honor qualification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelKey {
    Elementary,
    JuniorHighschool,
    SeniorHighschool,
    College,
}

impl LevelKey {
    pub const fn ordered() -> [Self; 4] {
        [
            Self::Elementary,
            Self::JuniorHighschool,
            Self::SeniorHighschool,
            Self::College,
        ]
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Elementary => "elementary",
            Self::JuniorHighschool => "junior_highschool",
            Self::SeniorHighschool => "senior_highschool",
            Self::College => "college",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Elementary => "Elementary",
            Self::JuniorHighschool => "Junior High School",
            Self::SeniorHighschool => "Senior High School",
            Self::College => "College",
        }
    }
}

impl fmt::Display for LevelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LevelKey {
    type Err = UnknownLevelKey;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "elementary" => Ok(Self::Elementary),
            "junior_highschool" => Ok(Self::JuniorHighschool),
            "senior_highschool" => Ok(Self::SeniorHighschool),
            "college" => Ok(Self::College),
            _ => Err(UnknownLevelKey(raw.to_string())),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown academic level '{0}'")]
pub struct UnknownLevelKey(pub String);

/// Immutable reference row describing an academic level offered by the school.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcademicLevel {
    pub key: LevelKey,
    pub name: String,
    pub sort_order: u8,
}

/// School year in `YYYY-YYYY` form, always threaded explicitly; the engine
/// has no "current year" fallback.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SchoolYear(String);

impl SchoolYear {
    pub fn new(raw: &str) -> Result<Self, SchoolYearError> {
        let trimmed = raw.trim();
        let (start, end) = trimmed
            .split_once('-')
            .ok_or_else(|| SchoolYearError(trimmed.to_string()))?;
        let start: u16 = start
            .parse()
            .map_err(|_| SchoolYearError(trimmed.to_string()))?;
        let end: u16 = end
            .parse()
            .map_err(|_| SchoolYearError(trimmed.to_string()))?;
        if u32::from(end) != u32::from(start) + 1 {
            return Err(SchoolYearError(trimmed.to_string()));
        }
        Ok(Self(format!("{start}-{end}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The immediately preceding school year, used by the consistency rule.
    pub fn previous(&self) -> Option<SchoolYear> {
        let (start, _) = self.0.split_once('-')?;
        let start: u16 = start.parse().ok()?;
        let prior = start.checked_sub(1)?;
        Some(Self(format!("{prior}-{start}")))
    }
}

impl fmt::Display for SchoolYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SchoolYear {
    type Error = SchoolYearError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::new(&raw)
    }
}

impl From<SchoolYear> for String {
    fn from(year: SchoolYear) -> Self {
        year.0
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid school year '{0}', expected consecutive years as YYYY-YYYY")]
pub struct SchoolYearError(pub String);

/// Time slice within a school year during which grades are collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    Quarter,
    Midterm,
    Prefinal,
    Final,
}

impl PeriodType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Quarter => "Quarter",
            Self::Midterm => "Midterm",
            Self::Prefinal => "Prefinal",
            Self::Final => "Final",
        }
    }
}

/// Grading period reference row. `parent_id` encodes the two-tier hierarchy
/// (a semester parent with its term children). Periods flagged
/// `is_final_average` hold a computed rating and never feed raw grade
/// collection, else the subject average double counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradingPeriod {
    pub id: PeriodId,
    pub level: LevelKey,
    pub parent_id: Option<PeriodId>,
    pub period_type: PeriodType,
    pub name: String,
    pub sort_order: u8,
    pub is_final_average: bool,
}

/// Subject reference row, optionally scoped to a course, strand, section, or
/// department depending on the level that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    pub level: LevelKey,
    pub name: String,
    pub category: Option<String>,
    pub course: Option<String>,
    pub strand: Option<String>,
    pub section: Option<String>,
    pub department: Option<String>,
}

/// Raw grade row as produced by grade entry. Read-only to this engine; one
/// row per (student, subject, period, school_year).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentGrade {
    pub student_id: StudentId,
    pub subject_id: SubjectId,
    pub period_id: PeriodId,
    pub level: LevelKey,
    pub school_year: SchoolYear,
    pub grade: f64,
}

/// Grade scale bounds for this domain.
pub const GRADE_SCALE_MIN: f64 = 0.0;
pub const GRADE_SCALE_MAX: f64 = 100.0;

impl StudentGrade {
    pub fn is_on_scale(&self) -> bool {
        self.grade.is_finite() && (GRADE_SCALE_MIN..=GRADE_SCALE_MAX).contains(&self.grade)
    }
}

/// Groups honor types by the family of academic levels allowed to award them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HonorScope {
    Basic,
    Advanced,
    College,
}

impl HonorScope {
    /// Whether a level may award honor types carrying this scope.
    pub const fn admits(self, level: LevelKey) -> bool {
        matches!(
            (self, level),
            (Self::Basic, LevelKey::Elementary)
                | (Self::Basic, LevelKey::JuniorHighschool)
                | (Self::Advanced, LevelKey::SeniorHighschool)
                | (Self::College, LevelKey::College)
        )
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Advanced => "advanced",
            Self::College => "college",
        }
    }
}

/// A named distinction. `rank` is the explicit tier table used when a student
/// qualifies for more than one honor type: 1 is the highest distinction, and
/// the lowest rank wins resolution. Ties on rank fall back to honor type id
/// so resolution stays deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HonorType {
    pub id: HonorTypeId,
    pub name: String,
    pub scope: HonorScope,
    pub rank: u8,
}

/// Lifecycle state of a persisted honor result, acted on asynchronously by
/// approval authorities outside this engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

/// Roster row for an enrolled student as supplied by the roster collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub id: StudentId,
    pub name: String,
    pub year_level: Option<u8>,
    pub section: Option<String>,
    pub strand: Option<String>,
    pub course: Option<String>,
    pub department: Option<String>,
}

/// Enumeration filters forwarded to the roster collaborator. Which axes are
/// meaningful depends on the level: section for basic education, strand for
/// senior high, course/department for college.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterFilters {
    pub section: Option<String>,
    pub strand: Option<String>,
    pub course: Option<String>,
    pub department: Option<String>,
}
