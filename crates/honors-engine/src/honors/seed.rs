//! CSV fixture import for demos and CLI runs: roster rows and raw grade
//! rows, validated into domain types. Production grade entry stays outside
//! this engine; these readers only hydrate the in-memory collaborators.

use std::io::Read;

use serde::Deserialize;

use super::domain::{
    LevelKey, PeriodId, SchoolYear, StudentGrade, StudentId, StudentRecord, SubjectId,
};

#[derive(Debug, thiserror::Error)]
pub enum SeedImportError {
    #[error("csv parse failure: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: {message}")]
    InvalidRow { row: usize, message: String },
}

#[derive(Debug, Deserialize)]
struct StudentRow {
    student_id: String,
    name: String,
    level: String,
    #[serde(default)]
    year_level: Option<u8>,
    #[serde(default)]
    section: Option<String>,
    #[serde(default)]
    strand: Option<String>,
    #[serde(default)]
    course: Option<String>,
    #[serde(default)]
    department: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GradeRow {
    student_id: String,
    subject: String,
    period: String,
    level: String,
    school_year: String,
    grade: f64,
}

fn invalid(row: usize, message: impl ToString) -> SeedImportError {
    SeedImportError::InvalidRow {
        row,
        message: message.to_string(),
    }
}

/// Read `(level, student)` pairs from a roster CSV with headers
/// `student_id,name,level[,year_level,section,strand,course,department]`.
pub fn read_students<R: Read>(
    reader: R,
) -> Result<Vec<(LevelKey, StudentRecord)>, SeedImportError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut students = Vec::new();
    for (index, record) in csv_reader.deserialize::<StudentRow>().enumerate() {
        let row = index + 2; // header occupies line one
        let record = record?;
        let level: LevelKey = record.level.parse().map_err(|err| invalid(row, err))?;
        if record.student_id.trim().is_empty() {
            return Err(invalid(row, "student_id must not be blank"));
        }
        students.push((
            level,
            StudentRecord {
                id: StudentId(record.student_id),
                name: record.name,
                year_level: record.year_level,
                section: record.section,
                strand: record.strand,
                course: record.course,
                department: record.department,
            },
        ));
    }
    Ok(students)
}

/// Read raw grade rows from a CSV with headers
/// `student_id,subject,period,level,school_year,grade`.
pub fn read_grades<R: Read>(reader: R) -> Result<Vec<StudentGrade>, SeedImportError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut grades = Vec::new();
    for (index, record) in csv_reader.deserialize::<GradeRow>().enumerate() {
        let row = index + 2;
        let record = record?;
        let level: LevelKey = record.level.parse().map_err(|err| invalid(row, err))?;
        let school_year =
            SchoolYear::new(&record.school_year).map_err(|err| invalid(row, err))?;
        let grade = StudentGrade {
            student_id: StudentId(record.student_id),
            subject_id: SubjectId(record.subject),
            period_id: PeriodId(record.period),
            level,
            school_year,
            grade: record.grade,
        };
        if !grade.is_on_scale() {
            return Err(invalid(
                row,
                format!("grade {} is off the 0-100 scale", grade.grade),
            ));
        }
        grades.push(grade);
    }
    Ok(grades)
}
