use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::honors::catalog::{HonorCriterion, SchoolCatalog};
use crate::honors::domain::{
    AcademicLevel, GradingPeriod, HonorScope, HonorType, HonorTypeId, LevelKey, PeriodId,
    PeriodType, RosterFilters, SchoolYear, StudentGrade, StudentId, StudentRecord, Subject,
    SubjectId,
};
use crate::honors::generator::{EnginePolicy, HonorRollService};
use crate::honors::repository::{
    GradeStore, GradeStoreError, HonorResult, HonorResultKey, HonorResultStore,
    NotificationError, NotificationGateway, NotificationReceipt, PendingHonorsNotice,
    ResultStoreError, RosterError, StudentRoster, UpsertDisposition,
};

pub(super) fn sy(raw: &str) -> SchoolYear {
    SchoolYear::new(raw).expect("valid school year")
}

pub(super) fn sid(raw: &str) -> StudentId {
    StudentId(raw.to_string())
}

pub(super) fn honor(raw: &str) -> HonorTypeId {
    HonorTypeId(raw.to_string())
}

fn quarter(id: &str, level: LevelKey, parent: Option<&str>, sort_order: u8) -> GradingPeriod {
    GradingPeriod {
        id: PeriodId(id.to_string()),
        level,
        parent_id: parent.map(|p| PeriodId(p.to_string())),
        period_type: PeriodType::Quarter,
        name: id.to_string(),
        sort_order,
        is_final_average: false,
    }
}

fn subject(id: &str, level: LevelKey, category: Option<&str>) -> Subject {
    Subject {
        id: SubjectId(id.to_string()),
        level,
        name: id.to_string(),
        category: category.map(str::to_string),
        course: None,
        strand: None,
        section: None,
        department: None,
    }
}

/// Reference data shared across the suite: four levels, their grading
/// periods (including computed final-average rows and one parent/child
/// hierarchy), subjects, honor types, and the standing criteria.
pub(super) fn catalog() -> SchoolCatalog {
    let mut catalog = SchoolCatalog::new();

    for (sort_order, (key, name)) in [
        (LevelKey::Elementary, "Elementary"),
        (LevelKey::JuniorHighschool, "Junior High School"),
        (LevelKey::SeniorHighschool, "Senior High School"),
        (LevelKey::College, "College"),
    ]
    .into_iter()
    .enumerate()
    {
        catalog.add_level(AcademicLevel {
            key,
            name: name.to_string(),
            sort_order: sort_order as u8,
        });
    }

    for (index, id) in ["q1", "q2", "q3", "q4"].into_iter().enumerate() {
        catalog.add_period(quarter(id, LevelKey::Elementary, None, index as u8 + 1));
        catalog.add_period(quarter(
            &format!("jhs-{id}"),
            LevelKey::JuniorHighschool,
            None,
            index as u8 + 1,
        ));
    }
    catalog.add_period(GradingPeriod {
        id: PeriodId("final-rating".to_string()),
        level: LevelKey::Elementary,
        parent_id: None,
        period_type: PeriodType::Final,
        name: "Final Rating".to_string(),
        sort_order: 9,
        is_final_average: true,
    });

    // Senior high runs two semester parents with two quarters each.
    for (semester, quarters, base) in [("shs-sem1", ["shs-q1", "shs-q2"], 1u8), ("shs-sem2", ["shs-q3", "shs-q4"], 3u8)]
    {
        catalog.add_period(GradingPeriod {
            id: PeriodId(semester.to_string()),
            level: LevelKey::SeniorHighschool,
            parent_id: None,
            period_type: PeriodType::Final,
            name: semester.to_string(),
            sort_order: base,
            is_final_average: false,
        });
        for (offset, id) in quarters.into_iter().enumerate() {
            catalog.add_period(quarter(
                id,
                LevelKey::SeniorHighschool,
                Some(semester),
                base + offset as u8,
            ));
        }
    }

    for (index, (id, period_type)) in [
        ("col-midterm", PeriodType::Midterm),
        ("col-prefinal", PeriodType::Prefinal),
        ("col-final", PeriodType::Final),
    ]
    .into_iter()
    .enumerate()
    {
        catalog.add_period(GradingPeriod {
            id: PeriodId(id.to_string()),
            level: LevelKey::College,
            parent_id: None,
            period_type,
            name: id.to_string(),
            sort_order: index as u8 + 1,
            is_final_average: false,
        });
    }
    catalog.add_period(GradingPeriod {
        id: PeriodId("col-rating".to_string()),
        level: LevelKey::College,
        parent_id: None,
        period_type: PeriodType::Final,
        name: "Semester Rating".to_string(),
        sort_order: 9,
        is_final_average: true,
    });

    catalog.add_subject(subject("math", LevelKey::Elementary, None));
    catalog.add_subject(subject("science", LevelKey::Elementary, None));
    catalog.add_subject(subject("pe", LevelKey::Elementary, Some("non_academic")));
    catalog.add_subject(subject("jhs-math", LevelKey::JuniorHighschool, None));
    catalog.add_subject(subject("jhs-science", LevelKey::JuniorHighschool, None));
    catalog.add_subject(subject("shs-core1", LevelKey::SeniorHighschool, None));
    catalog.add_subject(subject("shs-core2", LevelKey::SeniorHighschool, None));
    catalog.add_subject(subject("calculus", LevelKey::College, None));
    catalog.add_subject(subject("physics", LevelKey::College, None));
    catalog.add_subject(subject("nstp", LevelKey::College, Some("civic")));

    for (id, name, scope, rank) in [
        ("with-highest-honors", "With Highest Honors", HonorScope::Basic, 1),
        ("with-high-honors", "With High Honors", HonorScope::Basic, 2),
        ("with-honors", "With Honors", HonorScope::Basic, 3),
        ("shs-with-highest-honors", "With Highest Honors", HonorScope::Advanced, 1),
        ("shs-with-honors", "With Honors", HonorScope::Advanced, 3),
        ("presidents-list", "President's List", HonorScope::College, 1),
        ("deans-list", "Dean's List", HonorScope::College, 2),
    ] {
        catalog.add_honor_type(HonorType {
            id: HonorTypeId(id.to_string()),
            name: name.to_string(),
            scope,
            rank,
        });
    }

    for level in [LevelKey::Elementary, LevelKey::JuniorHighschool] {
        let mut with_honors = HonorCriterion::new(level, honor("with-honors"));
        with_honors.min_grade = Some(90.0);
        with_honors.max_gpa = Some(94.99);
        catalog.upsert_criterion(with_honors);

        let mut with_high = HonorCriterion::new(level, honor("with-high-honors"));
        with_high.min_grade = Some(95.0);
        with_high.max_gpa = Some(97.99);
        catalog.upsert_criterion(with_high);

        let mut with_highest = HonorCriterion::new(level, honor("with-highest-honors"));
        with_highest.min_grade = Some(98.0);
        catalog.upsert_criterion(with_highest);
    }

    let mut shs = HonorCriterion::new(LevelKey::SeniorHighschool, honor("shs-with-honors"));
    shs.min_grade = Some(90.0);
    shs.max_gpa = Some(94.99);
    catalog.upsert_criterion(shs);
    let mut shs_highest =
        HonorCriterion::new(LevelKey::SeniorHighschool, honor("shs-with-highest-honors"));
    shs_highest.min_grade = Some(98.0);
    catalog.upsert_criterion(shs_highest);

    // College bands overlap on purpose: a 95+ student satisfies both lists
    // and resolution has to pick the higher tier.
    let mut deans = HonorCriterion::new(LevelKey::College, honor("deans-list"));
    deans.min_gpa = Some(90.0);
    deans.min_year = Some(1);
    deans.max_year = Some(4);
    catalog.upsert_criterion(deans);
    let mut presidents = HonorCriterion::new(LevelKey::College, honor("presidents-list"));
    presidents.min_gpa = Some(95.0);
    presidents.min_grade_all = Some(90.0);
    presidents.min_year = Some(1);
    presidents.max_year = Some(4);
    catalog.upsert_criterion(presidents);

    catalog
}

#[derive(Default)]
pub(super) struct MemoryRoster {
    students: Mutex<HashMap<(LevelKey, SchoolYear), Vec<StudentRecord>>>,
}

impl MemoryRoster {
    pub(super) fn enroll(&self, level: LevelKey, school_year: &SchoolYear, student: StudentRecord) {
        self.students
            .lock()
            .expect("roster mutex poisoned")
            .entry((level, school_year.clone()))
            .or_default()
            .push(student);
    }
}

impl StudentRoster for MemoryRoster {
    fn students_for(
        &self,
        level: LevelKey,
        school_year: &SchoolYear,
        _filters: &RosterFilters,
    ) -> Result<Vec<StudentRecord>, RosterError> {
        Ok(self
            .students
            .lock()
            .expect("roster mutex poisoned")
            .get(&(level, school_year.clone()))
            .cloned()
            .unwrap_or_default())
    }

    fn find_student(
        &self,
        student_id: &StudentId,
        level: LevelKey,
        school_year: &SchoolYear,
    ) -> Result<Option<StudentRecord>, RosterError> {
        Ok(self
            .students_for(level, school_year, &RosterFilters::default())?
            .into_iter()
            .find(|student| &student.id == student_id))
    }
}

#[derive(Default)]
pub(super) struct MemoryGrades {
    grades: Mutex<Vec<StudentGrade>>,
}

impl MemoryGrades {
    pub(super) fn record(&self, grade: StudentGrade) {
        self.grades.lock().expect("grade mutex poisoned").push(grade);
    }
}

impl GradeStore for MemoryGrades {
    fn grades_for(
        &self,
        student_id: &StudentId,
        level: LevelKey,
        school_year: &SchoolYear,
    ) -> Result<Vec<StudentGrade>, GradeStoreError> {
        Ok(self
            .grades
            .lock()
            .expect("grade mutex poisoned")
            .iter()
            .filter(|g| {
                &g.student_id == student_id && g.level == level && &g.school_year == school_year
            })
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub(super) struct MemoryResults {
    records: Mutex<HashMap<HonorResultKey, HonorResult>>,
}

impl MemoryResults {
    pub(super) fn count(&self) -> usize {
        self.records.lock().expect("result mutex poisoned").len()
    }

    pub(super) fn get(&self, key: &HonorResultKey) -> Option<HonorResult> {
        self.records
            .lock()
            .expect("result mutex poisoned")
            .get(key)
            .cloned()
    }
}

impl HonorResultStore for MemoryResults {
    fn upsert_generated(
        &self,
        candidate: HonorResult,
    ) -> Result<UpsertDisposition, ResultStoreError> {
        let mut records = self.records.lock().expect("result mutex poisoned");
        match records.get(&candidate.key()) {
            Some(existing) if existing.is_frozen() => Ok(UpsertDisposition::Preserved),
            Some(_) => {
                records.insert(candidate.key(), candidate);
                Ok(UpsertDisposition::Refreshed)
            }
            None => {
                records.insert(candidate.key(), candidate);
                Ok(UpsertDisposition::Created)
            }
        }
    }

    fn fetch(&self, key: &HonorResultKey) -> Result<Option<HonorResult>, ResultStoreError> {
        Ok(self
            .records
            .lock()
            .expect("result mutex poisoned")
            .get(key)
            .cloned())
    }

    fn list_for(
        &self,
        level: LevelKey,
        school_year: &SchoolYear,
    ) -> Result<Vec<HonorResult>, ResultStoreError> {
        let records = self.records.lock().expect("result mutex poisoned");
        let mut results: Vec<HonorResult> = records
            .values()
            .filter(|r| r.level == level && &r.school_year == school_year)
            .cloned()
            .collect();
        results.sort_by(|a, b| a.student_id.cmp(&b.student_id));
        Ok(results)
    }

    fn save(&self, result: HonorResult) -> Result<(), ResultStoreError> {
        let mut records = self.records.lock().expect("result mutex poisoned");
        if !records.contains_key(&result.key()) {
            return Err(ResultStoreError::NotFound);
        }
        records.insert(result.key(), result);
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct MemoryNotifications {
    notices: Mutex<Vec<PendingHonorsNotice>>,
}

impl MemoryNotifications {
    pub(super) fn notices(&self) -> Vec<PendingHonorsNotice> {
        self.notices.lock().expect("notice mutex poisoned").clone()
    }
}

impl NotificationGateway for MemoryNotifications {
    fn notify_pending_honors(
        &self,
        notice: PendingHonorsNotice,
    ) -> Result<NotificationReceipt, NotificationError> {
        let mut notices = self.notices.lock().expect("notice mutex poisoned");
        notices.push(notice);
        Ok(NotificationReceipt {
            notification_id: format!("notice-{:03}", notices.len()),
        })
    }
}

/// Gateway that always fails; generation must shrug it off.
pub(super) struct FailingNotifications;

impl NotificationGateway for FailingNotifications {
    fn notify_pending_honors(
        &self,
        _notice: PendingHonorsNotice,
    ) -> Result<NotificationReceipt, NotificationError> {
        Err(NotificationError::Transport("smtp relay down".to_string()))
    }
}

pub(super) type TestService =
    HonorRollService<MemoryRoster, MemoryGrades, MemoryResults, MemoryNotifications>;

pub(super) struct Harness {
    pub(super) catalog: Arc<SchoolCatalog>,
    pub(super) roster: Arc<MemoryRoster>,
    pub(super) grades: Arc<MemoryGrades>,
    pub(super) results: Arc<MemoryResults>,
    pub(super) notifications: Arc<MemoryNotifications>,
    pub(super) service: Arc<TestService>,
}

pub(super) fn harness() -> Harness {
    harness_with(catalog(), EnginePolicy::default())
}

pub(super) fn harness_with(catalog: SchoolCatalog, policy: EnginePolicy) -> Harness {
    let catalog = Arc::new(catalog);
    let roster = Arc::new(MemoryRoster::default());
    let grades = Arc::new(MemoryGrades::default());
    let results = Arc::new(MemoryResults::default());
    let notifications = Arc::new(MemoryNotifications::default());
    let service = Arc::new(HonorRollService::new(
        catalog.clone(),
        roster.clone(),
        grades.clone(),
        results.clone(),
        notifications.clone(),
        policy,
    ));
    Harness {
        catalog,
        roster,
        grades,
        results,
        notifications,
        service,
    }
}

pub(super) fn student(id: &str, name: &str) -> StudentRecord {
    StudentRecord {
        id: sid(id),
        name: name.to_string(),
        year_level: None,
        section: None,
        strand: None,
        course: None,
        department: None,
    }
}

pub(super) fn college_student(id: &str, name: &str, year_level: u8) -> StudentRecord {
    StudentRecord {
        year_level: Some(year_level),
        ..student(id, name)
    }
}

pub(super) fn record_grades(
    harness: &Harness,
    student_id: &str,
    level: LevelKey,
    school_year: &SchoolYear,
    subject_id: &str,
    per_period: &[(&str, f64)],
) {
    for (period_id, value) in per_period {
        harness.grades.record(StudentGrade {
            student_id: sid(student_id),
            subject_id: SubjectId(subject_id.to_string()),
            period_id: PeriodId(period_id.to_string()),
            level,
            school_year: school_year.clone(),
            grade: *value,
        });
    }
}

/// Canonical two-subject fixture: Math 95/93/94/96 and Science 91/90/92/93
/// the four elementary quarters.
pub(super) fn seed_math_science_quarters(harness: &Harness, student_id: &str, school_year: &SchoolYear) {
    record_grades(
        harness,
        student_id,
        LevelKey::Elementary,
        school_year,
        "math",
        &[("q1", 95.0), ("q2", 93.0), ("q3", 94.0), ("q4", 96.0)],
    );
    record_grades(
        harness,
        student_id,
        LevelKey::Elementary,
        school_year,
        "science",
        &[("q1", 91.0), ("q2", 90.0), ("q3", 92.0), ("q4", 93.0)],
    );
}

pub(super) fn result_key(student_id: &str, level: LevelKey, school_year: &SchoolYear) -> HonorResultKey {
    HonorResultKey {
        student_id: sid(student_id),
        level,
        school_year: school_year.clone(),
    }
}
