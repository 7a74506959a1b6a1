//! Shared fixtures for the integration suites: a compact school catalog and
//! in-memory collaborator implementations wired into the public service.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use honors_engine::honors::{
    AcademicLevel, EnginePolicy, GradeStore, GradeStoreError, GradingPeriod, HonorCriterion,
    HonorResult, HonorResultKey, HonorResultStore, HonorRollService, HonorScope, HonorType,
    HonorTypeId, LevelKey, NotificationError, NotificationGateway, NotificationReceipt,
    PendingHonorsNotice, PeriodId, PeriodType, ResultStoreError, RosterError, RosterFilters,
    SchoolCatalog, SchoolYear, StudentGrade, StudentId, StudentRecord, StudentRoster, Subject,
    SubjectId, UpsertDisposition,
};

pub fn school_year(raw: &str) -> SchoolYear {
    SchoolYear::new(raw).expect("valid school year")
}

pub fn student_id(raw: &str) -> StudentId {
    StudentId(raw.to_string())
}

fn subject(id: &str, level: LevelKey) -> Subject {
    Subject {
        id: SubjectId(id.to_string()),
        level,
        name: id.to_string(),
        category: None,
        course: None,
        strand: None,
        section: None,
        department: None,
    }
}

fn catalog() -> SchoolCatalog {
    let mut catalog = SchoolCatalog::new();
    catalog.add_level(AcademicLevel {
        key: LevelKey::Elementary,
        name: "Elementary".to_string(),
        sort_order: 0,
    });
    catalog.add_level(AcademicLevel {
        key: LevelKey::College,
        name: "College".to_string(),
        sort_order: 3,
    });

    for (index, id) in ["q1", "q2", "q3", "q4"].into_iter().enumerate() {
        catalog.add_period(GradingPeriod {
            id: PeriodId(id.to_string()),
            level: LevelKey::Elementary,
            parent_id: None,
            period_type: PeriodType::Quarter,
            name: id.to_string(),
            sort_order: index as u8 + 1,
            is_final_average: false,
        });
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

    catalog.add_subject(subject("math", LevelKey::Elementary));
    catalog.add_subject(subject("science", LevelKey::Elementary));
    catalog.add_subject(subject("calculus", LevelKey::College));
    catalog.add_subject(subject("physics", LevelKey::College));

    for (id, name, scope, rank) in [
        ("with-highest-honors", "With Highest Honors", HonorScope::Basic, 1),
        ("with-high-honors", "With High Honors", HonorScope::Basic, 2),
        ("with-honors", "With Honors", HonorScope::Basic, 3),
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

    let mut with_honors =
        HonorCriterion::new(LevelKey::Elementary, HonorTypeId("with-honors".to_string()));
    with_honors.min_grade = Some(90.0);
    with_honors.max_gpa = Some(94.99);
    catalog.upsert_criterion(with_honors);
    let mut with_high =
        HonorCriterion::new(LevelKey::Elementary, HonorTypeId("with-high-honors".to_string()));
    with_high.min_grade = Some(95.0);
    with_high.max_gpa = Some(97.99);
    catalog.upsert_criterion(with_high);
    let mut with_highest = HonorCriterion::new(
        LevelKey::Elementary,
        HonorTypeId("with-highest-honors".to_string()),
    );
    with_highest.min_grade = Some(98.0);
    catalog.upsert_criterion(with_highest);

    let mut deans = HonorCriterion::new(LevelKey::College, HonorTypeId("deans-list".to_string()));
    deans.min_gpa = Some(90.0);
    deans.min_year = Some(1);
    deans.max_year = Some(4);
    catalog.upsert_criterion(deans);
    let mut presidents =
        HonorCriterion::new(LevelKey::College, HonorTypeId("presidents-list".to_string()));
    presidents.min_gpa = Some(95.0);
    presidents.min_grade_all = Some(90.0);
    presidents.min_year = Some(1);
    presidents.max_year = Some(4);
    catalog.upsert_criterion(presidents);

    catalog
}

#[derive(Default)]
pub struct SharedRoster {
    students: Mutex<HashMap<(LevelKey, SchoolYear), Vec<StudentRecord>>>,
}

impl StudentRoster for SharedRoster {
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
            .find(|s| &s.id == student_id))
    }
}

#[derive(Default)]
pub struct SharedGrades {
    grades: Mutex<Vec<StudentGrade>>,
}

impl GradeStore for SharedGrades {
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
pub struct SharedResults {
    records: Mutex<HashMap<HonorResultKey, HonorResult>>,
}

impl SharedResults {
    pub fn row_count(&self) -> usize {
        self.records.lock().expect("result mutex poisoned").len()
    }

    pub fn stored(&self, key: &HonorResultKey) -> Option<HonorResult> {
        self.records
            .lock()
            .expect("result mutex poisoned")
            .get(key)
            .cloned()
    }
}

impl HonorResultStore for SharedResults {
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
        Ok(self
            .records
            .lock()
            .expect("result mutex poisoned")
            .values()
            .filter(|r| r.level == level && &r.school_year == school_year)
            .cloned()
            .collect())
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
pub struct SharedNotifications {
    notices: Mutex<Vec<PendingHonorsNotice>>,
}

impl SharedNotifications {
    pub fn sent(&self) -> Vec<PendingHonorsNotice> {
        self.notices.lock().expect("notice mutex poisoned").clone()
    }
}

impl NotificationGateway for SharedNotifications {
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

pub type FixtureService =
    HonorRollService<SharedRoster, SharedGrades, SharedResults, SharedNotifications>;

pub struct Fixture {
    pub catalog: Arc<SchoolCatalog>,
    pub roster: Arc<SharedRoster>,
    pub grades: Arc<SharedGrades>,
    pub results: Arc<SharedResults>,
    pub notifications: Arc<SharedNotifications>,
    pub service: Arc<FixtureService>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_catalog(catalog())
    }

    pub fn empty_catalog() -> Self {
        Self::with_catalog(SchoolCatalog::new())
    }

    fn with_catalog(catalog: SchoolCatalog) -> Self {
        let catalog = Arc::new(catalog);
        let roster = Arc::new(SharedRoster::default());
        let grades = Arc::new(SharedGrades::default());
        let results = Arc::new(SharedResults::default());
        let notifications = Arc::new(SharedNotifications::default());
        let service = Arc::new(HonorRollService::new(
            catalog.clone(),
            roster.clone(),
            grades.clone(),
            results.clone(),
            notifications.clone(),
            EnginePolicy::default(),
        ));
        Self {
            catalog,
            roster,
            grades,
            results,
            notifications,
            service,
        }
    }

    pub fn key(&self, id: &str, level: LevelKey, school_year: &SchoolYear) -> HonorResultKey {
        HonorResultKey {
            student_id: student_id(id),
            level,
            school_year: school_year.clone(),
        }
    }

    pub fn enroll_elementary(&self, id: &str, name: &str, school_year: &SchoolYear) {
        self.enroll(
            LevelKey::Elementary,
            school_year,
            StudentRecord {
                id: student_id(id),
                name: name.to_string(),
                year_level: None,
                section: Some("A".to_string()),
                strand: None,
                course: None,
                department: None,
            },
        );
    }

    pub fn enroll_college(&self, id: &str, name: &str, year_level: u8, school_year: &SchoolYear) {
        self.enroll(
            LevelKey::College,
            school_year,
            StudentRecord {
                id: student_id(id),
                name: name.to_string(),
                year_level: Some(year_level),
                section: None,
                strand: None,
                course: Some("BS Mathematics".to_string()),
                department: Some("Sciences".to_string()),
            },
        );
    }

    fn enroll(&self, level: LevelKey, school_year: &SchoolYear, student: StudentRecord) {
        self.roster
            .students
            .lock()
            .expect("roster mutex poisoned")
            .entry((level, school_year.clone()))
            .or_default()
            .push(student);
    }

    pub fn grade_elementary(
        &self,
        id: &str,
        school_year: &SchoolYear,
        subject: &str,
        quarters: [f64; 4],
    ) {
        for (period, value) in ["q1", "q2", "q3", "q4"].into_iter().zip(quarters) {
            self.record(id, LevelKey::Elementary, school_year, subject, period, value);
        }
    }

    pub fn grade_college(
        &self,
        id: &str,
        school_year: &SchoolYear,
        subject: &str,
        terms: [f64; 3],
    ) {
        for (period, value) in ["col-midterm", "col-prefinal", "col-final"]
            .into_iter()
            .zip(terms)
        {
            self.record(id, LevelKey::College, school_year, subject, period, value);
        }
    }

    fn record(
        &self,
        id: &str,
        level: LevelKey,
        school_year: &SchoolYear,
        subject: &str,
        period: &str,
        value: f64,
    ) {
        self.grades
            .grades
            .lock()
            .expect("grade mutex poisoned")
            .push(StudentGrade {
                student_id: student_id(id),
                subject_id: SubjectId(subject.to_string()),
                period_id: PeriodId(period.to_string()),
                level,
                school_year: school_year.clone(),
                grade: value,
            });
    }
}
