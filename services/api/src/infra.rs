use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

use honors_engine::honors::{
    GradeStore, GradeStoreError, HonorResult, HonorResultKey, HonorResultStore, LevelKey,
    NotificationError, NotificationGateway, NotificationReceipt, PendingHonorsNotice,
    ResultStoreError, RosterError, RosterFilters, SchoolYear, StudentGrade, StudentId,
    StudentRecord, StudentRoster, UpsertDisposition,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default)]
pub(crate) struct InMemoryRoster {
    students: Mutex<HashMap<(LevelKey, SchoolYear), Vec<StudentRecord>>>,
}

impl InMemoryRoster {
    pub(crate) fn enroll(&self, level: LevelKey, school_year: &SchoolYear, student: StudentRecord) {
        self.students
            .lock()
            .expect("roster mutex poisoned")
            .entry((level, school_year.clone()))
            .or_default()
            .push(student);
    }
}

impl StudentRoster for InMemoryRoster {
    fn students_for(
        &self,
        level: LevelKey,
        school_year: &SchoolYear,
        filters: &RosterFilters,
    ) -> Result<Vec<StudentRecord>, RosterError> {
        let students = self
            .students
            .lock()
            .expect("roster mutex poisoned")
            .get(&(level, school_year.clone()))
            .cloned()
            .unwrap_or_default();
        Ok(students
            .into_iter()
            .filter(|student| {
                filters
                    .section
                    .as_deref()
                    .map_or(true, |section| student.section.as_deref() == Some(section))
                    && filters
                        .strand
                        .as_deref()
                        .map_or(true, |strand| student.strand.as_deref() == Some(strand))
                    && filters
                        .course
                        .as_deref()
                        .map_or(true, |course| student.course.as_deref() == Some(course))
                    && filters.department.as_deref().map_or(true, |department| {
                        student.department.as_deref() == Some(department)
                    })
            })
            .collect())
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
pub(crate) struct InMemoryGradeStore {
    grades: Mutex<Vec<StudentGrade>>,
}

impl InMemoryGradeStore {
    pub(crate) fn record(&self, grade: StudentGrade) {
        self.grades.lock().expect("grade mutex poisoned").push(grade);
    }
}

impl GradeStore for InMemoryGradeStore {
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
            .filter(|grade| {
                &grade.student_id == student_id
                    && grade.level == level
                    && &grade.school_year == school_year
            })
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub(crate) struct InMemoryHonorResultStore {
    records: Mutex<HashMap<HonorResultKey, HonorResult>>,
}

impl HonorResultStore for InMemoryHonorResultStore {
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
            .filter(|result| result.level == level && &result.school_year == school_year)
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

/// Stand-in for the platform's notification service: logs the trigger and
/// hands back a receipt.
#[derive(Default)]
pub(crate) struct LoggingNotificationGateway {
    dispatched: AtomicU64,
}

impl NotificationGateway for LoggingNotificationGateway {
    fn notify_pending_honors(
        &self,
        notice: PendingHonorsNotice,
    ) -> Result<NotificationReceipt, NotificationError> {
        let sequence = self.dispatched.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            level = %notice.level,
            school_year = %notice.school_year,
            pending = notice.pending,
            "notifying approvers of pending honor results"
        );
        Ok(NotificationReceipt {
            notification_id: format!("honors-notice-{sequence:06}"),
        })
    }
}

pub(crate) fn parse_level(raw: &str) -> Result<LevelKey, String> {
    raw.parse::<LevelKey>().map_err(|err| err.to_string())
}

pub(crate) fn parse_school_year(raw: &str) -> Result<SchoolYear, String> {
    SchoolYear::new(raw).map_err(|err| err.to_string())
}
