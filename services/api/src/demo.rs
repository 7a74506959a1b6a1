use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Datelike, Local, NaiveDate};
use clap::Args;

use crate::infra::{
    parse_level, parse_school_year, InMemoryGradeStore, InMemoryHonorResultStore, InMemoryRoster,
    LoggingNotificationGateway,
};
use honors_engine::error::AppError;
use honors_engine::honors::seed::{read_grades, read_students};
use honors_engine::honors::{
    AcademicLevel, AdditionalRule, ApprovalDecision, ApprovalService, EnginePolicy,
    GenerationReport, GradingPeriod, HonorCriterion, HonorResult, HonorResultStore,
    HonorRollService, HonorScope, HonorType, HonorTypeId, LevelKey, OverridePolicy, PeriodId,
    PeriodType, ResultStoreError, SchoolCatalog, SchoolYear, StudentEvaluation, StudentGrade,
    StudentId, StudentRecord, Subject, SubjectId, WorkflowError,
};

pub(crate) type ApiService = HonorRollService<
    InMemoryRoster,
    InMemoryGradeStore,
    InMemoryHonorResultStore,
    LoggingNotificationGateway,
>;

#[derive(Args, Debug)]
pub(crate) struct GenerateArgs {
    /// Academic level to generate for (elementary, junior_highschool,
    /// senior_highschool, college)
    #[arg(long, value_parser = parse_level)]
    pub(crate) level: LevelKey,
    /// School year (YYYY-YYYY)
    #[arg(long, value_parser = parse_school_year)]
    pub(crate) school_year: SchoolYear,
    /// Roster CSV (student_id,name,level,...); defaults to the built-in demo roster
    #[arg(long)]
    pub(crate) students_csv: Option<PathBuf>,
    /// Grade CSV (student_id,subject,period,level,school_year,grade)
    #[arg(long)]
    pub(crate) grades_csv: Option<PathBuf>,
    /// Print the per-student outcome lines as well as the totals
    #[arg(long)]
    pub(crate) list_results: bool,
}

#[derive(Args, Debug)]
pub(crate) struct EvaluateArgs {
    /// Student identifier to evaluate
    #[arg(long)]
    pub(crate) student: String,
    #[arg(long, value_parser = parse_level)]
    pub(crate) level: LevelKey,
    #[arg(long, value_parser = parse_school_year)]
    pub(crate) school_year: SchoolYear,
    #[arg(long)]
    pub(crate) students_csv: Option<PathBuf>,
    #[arg(long)]
    pub(crate) grades_csv: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// School year for the demo run; defaults to the current one
    #[arg(long, value_parser = parse_school_year)]
    pub(crate) school_year: Option<SchoolYear>,
}

/// School year containing `today`, rolling over each June.
pub(crate) fn current_school_year(today: NaiveDate) -> SchoolYear {
    let start = if today.month() >= 6 {
        today.year()
    } else {
        today.year() - 1
    };
    SchoolYear::new(&format!("{}-{}", start, start + 1)).expect("consecutive years by construction")
}

fn period(
    id: &str,
    level: LevelKey,
    parent: Option<&str>,
    period_type: PeriodType,
    sort_order: u8,
    is_final_average: bool,
) -> GradingPeriod {
    GradingPeriod {
        id: PeriodId(id.to_string()),
        level,
        parent_id: parent.map(|p| PeriodId(p.to_string())),
        period_type,
        name: id.to_string(),
        sort_order,
        is_final_average,
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

/// Reference data mirroring a small school's configuration: four levels,
/// their grading calendars, and the standing honor criteria.
pub(crate) fn demo_catalog() -> SchoolCatalog {
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

    for level in [LevelKey::Elementary, LevelKey::JuniorHighschool] {
        let prefix = match level {
            LevelKey::Elementary => "elem",
            _ => "jhs",
        };
        for quarter in 1..=4u8 {
            catalog.add_period(period(
                &format!("{prefix}-q{quarter}"),
                level,
                None,
                PeriodType::Quarter,
                quarter,
                false,
            ));
        }
        catalog.add_period(period(
            &format!("{prefix}-final-rating"),
            level,
            None,
            PeriodType::Final,
            9,
            true,
        ));
    }

    for (semester, base) in [("shs-sem1", 1u8), ("shs-sem2", 3u8)] {
        catalog.add_period(period(
            semester,
            LevelKey::SeniorHighschool,
            None,
            PeriodType::Final,
            base,
            false,
        ));
        for offset in 0..2u8 {
            catalog.add_period(period(
                &format!("{semester}-q{}", offset + 1),
                LevelKey::SeniorHighschool,
                Some(semester),
                PeriodType::Quarter,
                base + offset,
                false,
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
        catalog.add_period(period(
            id,
            LevelKey::College,
            None,
            period_type,
            index as u8 + 1,
            false,
        ));
    }
    catalog.add_period(period(
        "col-rating",
        LevelKey::College,
        None,
        PeriodType::Final,
        9,
        true,
    ));

    for id in ["math", "science", "filipino"] {
        catalog.add_subject(subject(id, LevelKey::Elementary, None));
    }
    catalog.add_subject(subject("pe", LevelKey::Elementary, Some("non_academic")));
    for id in ["jhs-math", "jhs-science", "jhs-english"] {
        catalog.add_subject(subject(id, LevelKey::JuniorHighschool, None));
    }
    for id in ["shs-gen-math", "shs-comm", "shs-research"] {
        catalog.add_subject(subject(id, LevelKey::SeniorHighschool, None));
    }
    for id in ["calculus", "physics", "literature"] {
        catalog.add_subject(subject(id, LevelKey::College, None));
    }
    catalog.add_subject(subject("nstp", LevelKey::College, Some("civic")));

    for (id, name, scope, rank) in [
        ("with-highest-honors", "With Highest Honors", HonorScope::Basic, 1),
        ("with-high-honors", "With High Honors", HonorScope::Basic, 2),
        ("with-honors", "With Honors", HonorScope::Basic, 3),
        ("shs-with-highest-honors", "With Highest Honors", HonorScope::Advanced, 1),
        ("shs-with-high-honors", "With High Honors", HonorScope::Advanced, 2),
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

    for (level, prefix) in [
        (LevelKey::Elementary, ""),
        (LevelKey::JuniorHighschool, ""),
        (LevelKey::SeniorHighschool, "shs-"),
    ] {
        let mut with_honors =
            HonorCriterion::new(level, HonorTypeId(format!("{prefix}with-honors")));
        with_honors.min_grade = Some(90.0);
        with_honors.max_gpa = Some(94.99);
        catalog.upsert_criterion(with_honors);

        let mut with_high =
            HonorCriterion::new(level, HonorTypeId(format!("{prefix}with-high-honors")));
        with_high.min_grade = Some(95.0);
        with_high.max_gpa = Some(97.99);
        with_high.min_grade_all = Some(90.0);
        catalog.upsert_criterion(with_high);

        let mut with_highest =
            HonorCriterion::new(level, HonorTypeId(format!("{prefix}with-highest-honors")));
        with_highest.min_grade = Some(98.0);
        with_highest.min_grade_all = Some(93.0);
        catalog.upsert_criterion(with_highest);
    }

    // NSTP sits outside the collegiate GPA, so both lists exclude the civic
    // category before averaging.
    let civic_exclusion = AdditionalRule::ExcludeSubjectCategory {
        category: "civic".to_string(),
    };
    let mut deans = HonorCriterion::new(LevelKey::College, HonorTypeId("deans-list".to_string()));
    deans.min_gpa = Some(90.0);
    deans.min_year = Some(1);
    deans.max_year = Some(4);
    deans.additional_rules = vec![civic_exclusion.clone()];
    catalog.upsert_criterion(deans);
    let mut presidents =
        HonorCriterion::new(LevelKey::College, HonorTypeId("presidents-list".to_string()));
    presidents.min_gpa = Some(95.0);
    presidents.min_grade_all = Some(90.0);
    presidents.min_year = Some(1);
    presidents.max_year = Some(4);
    presidents.additional_rules = vec![civic_exclusion];
    catalog.upsert_criterion(presidents);

    catalog
}

fn record_block(
    grades: &InMemoryGradeStore,
    student: &str,
    level: LevelKey,
    school_year: &SchoolYear,
    subject: &str,
    per_period: &[(&str, f64)],
) {
    for (period, value) in per_period {
        grades.record(StudentGrade {
            student_id: StudentId(student.to_string()),
            subject_id: SubjectId(subject.to_string()),
            period_id: PeriodId(period.to_string()),
            level,
            school_year: school_year.clone(),
            grade: *value,
        });
    }
}

/// Built-in roster and grade fixture used when no CSVs are supplied.
pub(crate) fn seed_demo_data(
    roster: &InMemoryRoster,
    grades: &InMemoryGradeStore,
    school_year: &SchoolYear,
) {
    let elementary = [
        ("s-001", "Alon Reyes", [("math", 94.0), ("science", 92.0), ("filipino", 93.0), ("pe", 95.0)]),
        ("s-002", "Bea Santos", [("math", 96.0), ("science", 97.0), ("filipino", 95.0), ("pe", 96.0)]),
        ("s-003", "Caloy Uy", [("math", 85.0), ("science", 83.0), ("filipino", 86.0), ("pe", 90.0)]),
    ];
    for (id, name, subjects) in elementary {
        roster.enroll(
            LevelKey::Elementary,
            school_year,
            StudentRecord {
                id: StudentId(id.to_string()),
                name: name.to_string(),
                year_level: None,
                section: Some("Sampaguita".to_string()),
                strand: None,
                course: None,
                department: None,
            },
        );
        for (subject, base) in subjects {
            record_block(
                grades,
                id,
                LevelKey::Elementary,
                school_year,
                subject,
                &[
                    ("elem-q1", base - 1.0),
                    ("elem-q2", base),
                    ("elem-q3", base),
                    ("elem-q4", base + 1.0),
                ],
            );
        }
    }

    let college = [
        ("c-101", "Gio Tan", 3u8, [("calculus", 96.0), ("physics", 96.5), ("literature", 95.5), ("nstp", 88.0)]),
        ("c-102", "Fe Lim", 2u8, [("calculus", 91.0), ("physics", 92.0), ("literature", 90.5), ("nstp", 93.0)]),
    ];
    for (id, name, year_level, subjects) in college {
        roster.enroll(
            LevelKey::College,
            school_year,
            StudentRecord {
                id: StudentId(id.to_string()),
                name: name.to_string(),
                year_level: Some(year_level),
                section: None,
                strand: None,
                course: Some("BS Applied Mathematics".to_string()),
                department: Some("Sciences".to_string()),
            },
        );
        for (subject, base) in subjects {
            record_block(
                grades,
                id,
                LevelKey::College,
                school_year,
                subject,
                &[
                    ("col-midterm", base - 0.5),
                    ("col-prefinal", base),
                    ("col-final", base + 0.5),
                ],
            );
        }
    }
}

pub(crate) struct EngineHandles {
    pub(crate) catalog: Arc<SchoolCatalog>,
    pub(crate) results: Arc<InMemoryHonorResultStore>,
    pub(crate) service: Arc<ApiService>,
}

/// Build a full engine over in-memory collaborators, hydrated from CSV
/// fixtures when supplied and the built-in demo data otherwise.
pub(crate) fn build_engine(
    students_csv: Option<&PathBuf>,
    grades_csv: Option<&PathBuf>,
    school_year: &SchoolYear,
) -> Result<EngineHandles, AppError> {
    let catalog = Arc::new(demo_catalog());
    let roster = Arc::new(InMemoryRoster::default());
    let grades = Arc::new(InMemoryGradeStore::default());
    let results = Arc::new(InMemoryHonorResultStore::default());

    match (students_csv, grades_csv) {
        (Some(students_path), Some(grades_path)) => {
            for (level, student) in read_students(File::open(students_path)?)? {
                roster.enroll(level, school_year, student);
            }
            for grade in read_grades(File::open(grades_path)?)? {
                grades.record(grade);
            }
        }
        (None, None) => seed_demo_data(&roster, &grades, school_year),
        _ => {
            return Err(AppError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "provide both --students-csv and --grades-csv, or neither",
            )))
        }
    }

    let service = Arc::new(HonorRollService::new(
        catalog.clone(),
        roster,
        grades,
        results.clone(),
        Arc::new(LoggingNotificationGateway::default()),
        EnginePolicy::default(),
    ));
    Ok(EngineHandles {
        catalog,
        results,
        service,
    })
}

fn render_report(report: &GenerationReport, list_results: bool) {
    println!(
        "Honor roll: {} {}",
        report.level.label(),
        report.school_year
    );
    println!("  {}", report.message);
    for skipped in &report.skipped {
        println!("  skipped {}: {}", skipped.student_id, skipped.reason);
    }
    if list_results {
        for entry in &report.entries {
            match (&entry.honor_name, entry.average) {
                (Some(honor), Some(average)) => println!(
                    "  {:<8} {:<22} {:<22} avg {:.2}",
                    entry.student_id.0, entry.student_name, honor, average
                ),
                _ => println!(
                    "  {:<8} {:<22} no honor qualification",
                    entry.student_id.0, entry.student_name
                ),
            }
        }
    }
}

fn render_evaluation(evaluation: &StudentEvaluation) {
    println!(
        "Evaluation: {} ({}) at {} {}",
        evaluation.student_name,
        evaluation.student_id,
        evaluation.level.label(),
        evaluation.school_year
    );
    match evaluation.overall_average {
        Some(average) => println!("  overall average {average:.2}"),
        None => println!("  no graded subjects"),
    }
    for qualification in &evaluation.qualifications {
        println!(
            "  [{}] {} (rank {})",
            if qualification.qualified { "x" } else { " " },
            qualification.honor_name,
            qualification.rank
        );
        for check in &qualification.checks {
            println!("      - {}", check.notes);
        }
    }
}

pub(crate) fn run_generate(args: GenerateArgs) -> Result<(), AppError> {
    let GenerateArgs {
        level,
        school_year,
        students_csv,
        grades_csv,
        list_results,
    } = args;

    let engine = build_engine(students_csv.as_ref(), grades_csv.as_ref(), &school_year)?;
    let report = engine.service.generate(level, &school_year)?;
    render_report(&report, list_results);
    Ok(())
}

pub(crate) fn run_evaluate(args: EvaluateArgs) -> Result<(), AppError> {
    let EvaluateArgs {
        student,
        level,
        school_year,
        students_csv,
        grades_csv,
    } = args;

    let engine = build_engine(students_csv.as_ref(), grades_csv.as_ref(), &school_year)?;
    let evaluation = engine
        .service
        .evaluate_student(&StudentId(student), level, &school_year)?;
    render_evaluation(&evaluation);
    Ok(())
}

fn list_results(
    engine: &EngineHandles,
    level: LevelKey,
    school_year: &SchoolYear,
) -> Result<Vec<HonorResult>, AppError> {
    engine
        .results
        .list_for(level, school_year)
        .map_err(|err: ResultStoreError| AppError::Workflow(WorkflowError::Store(err)))
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let school_year = args
        .school_year
        .unwrap_or_else(|| current_school_year(Local::now().date_naive()));

    println!("Honor qualification engine demo, school year {school_year}");
    let engine = build_engine(None, None, &school_year)?;

    for level in [LevelKey::Elementary, LevelKey::College] {
        let report = engine.service.generate(level, &school_year)?;
        render_report(&report, true);
        println!();
    }

    let approvals = ApprovalService::new(
        engine.catalog.clone(),
        engine.results.clone(),
        OverridePolicy::PreserveStatus,
    );

    let pending = list_results(&engine, LevelKey::Elementary, &school_year)?;
    if let Some(first) = pending.first() {
        let approved = approvals.decide(&first.key(), ApprovalDecision::Approve, "principal")?;
        println!(
            "Approved {} for {} ({})",
            approved.honor_type_id, approved.student_name, approved.student_id
        );
    }

    let college = list_results(&engine, LevelKey::College, &school_year)?;
    if let Some(row) = college
        .iter()
        .find(|result| result.honor_type_id.0 == "deans-list")
    {
        let overridden = approvals.override_honor(
            &row.key(),
            &HonorTypeId("presidents-list".to_string()),
            "board resolution after grade correction",
            "chairperson",
        )?;
        println!(
            "Overrode {} ({}) to {} with the reason on file",
            overridden.student_name, overridden.student_id, overridden.honor_type_id
        );
    }

    println!();
    for level in [LevelKey::Elementary, LevelKey::College] {
        let rows = list_results(&engine, level, &school_year)?;
        println!("{} results:", level.label());
        for row in rows {
            println!(
                "  {:<8} {:<22} {:<22} {:<9} gpa {:.2}{}",
                row.student_id.0,
                row.student_name,
                row.honor_type_id.0,
                row.approval_status.label(),
                row.gpa,
                if row.is_overridden { " (overridden)" } else { "" }
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn school_year_rolls_over_in_june() {
        let spring = NaiveDate::from_ymd_opt(2025, 3, 15).expect("valid date");
        assert_eq!(current_school_year(spring).as_str(), "2024-2025");
        let fall = NaiveDate::from_ymd_opt(2025, 9, 15).expect("valid date");
        assert_eq!(current_school_year(fall).as_str(), "2025-2026");
    }

    #[test]
    fn demo_dataset_generates_expected_honors() {
        let school_year = SchoolYear::new("2024-2025").expect("valid year");
        let engine = build_engine(None, None, &school_year).expect("engine builds");

        let report = engine
            .service
            .generate(LevelKey::Elementary, &school_year)
            .expect("generation succeeds");
        assert_eq!(report.total_processed, 3);
        assert_eq!(report.total_qualified, 2);

        let report = engine
            .service
            .generate(LevelKey::College, &school_year)
            .expect("generation succeeds");
        assert_eq!(report.total_qualified, 2);
        let rows = engine
            .results
            .list_for(LevelKey::College, &school_year)
            .expect("rows list");
        // NSTP's 88-93 range is excluded from the collegiate GPA, so Gio
        // still clears the President's List floor.
        let gio = rows
            .iter()
            .find(|row| row.student_id.0 == "c-101")
            .expect("gio present");
        assert_eq!(gio.honor_type_id.0, "presidents-list");
        let fe = rows
            .iter()
            .find(|row| row.student_id.0 == "c-102")
            .expect("fe present");
        assert_eq!(fe.honor_type_id.0, "deans-list");
    }
}
