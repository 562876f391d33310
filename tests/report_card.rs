mod common;

use sms_core::actor::{Actor, Term};
use sms_core::calc::RawScores;
use sms_core::error::CoreError;
use sms_core::grades::{upsert_grade, GradeUpsert};
use sms_core::report::build_report_card;
use sms_core::rusqlite::Connection;

use common::*;

const YEAR: &str = "2024/2025";

/// Class 5 with three subjects taught by one teacher, one student.
fn build(conn: &Connection) -> Actor {
    let teacher = seed_teacher(conn, 1, 20);
    seed_class(conn, 5, None);
    for subject_id in [501, 502, 503] {
        seed_subject(conn, subject_id, 5);
        link_subject_teacher(conn, subject_id, 1);
    }
    seed_student(conn, 1, 10, Some(5));
    teacher
}

fn submit(conn: &mut Connection, teacher: &Actor, subject_id: i64, exam: f64, ltc: f64) {
    upsert_grade(
        conn,
        teacher,
        &GradeUpsert {
            student_id: 1,
            subject_id,
            class_id: 5,
            academic_year: YEAR.to_string(),
            term: Term::First,
            scores: RawScores {
                exam_score: Some(exam),
                ltc: Some(ltc),
                ..RawScores::default()
            },
            remark: None,
        },
    )
    .unwrap();
}

#[test]
fn no_rows_is_not_found() {
    let conn = test_db();
    build(&conn);
    let err = build_report_card(&conn, &admin(&conn, 99), 1, YEAR, Term::First).unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)), "got {err:?}");
}

#[test]
fn summary_counts_all_subjects_but_averages_only_scored_ones() {
    let mut conn = test_db();
    let teacher = build(&conn);

    submit(&mut conn, &teacher, 501, 90.0, 90.0);
    submit(&mut conn, &teacher, 502, 70.0, 70.0);
    // All-zero submission: a subject row with no usable score.
    submit(&mut conn, &teacher, 503, 0.0, 0.0);

    let card = build_report_card(&conn, &teacher, 1, YEAR, Term::First).unwrap();
    assert_eq!(card.results.len(), 3);
    assert_eq!(card.class_id, 5);

    let s = &card.summary;
    assert_eq!(s.number_of_subjects, 3);
    assert_eq!(s.marks_obtainable, 300.0);
    assert!((s.total_marks_obtained - 160.0).abs() < 1e-9);
    // 160 over the 2 scored subjects, not over 3.
    assert!((s.average - 80.0).abs() < 1e-9);
}

#[test]
fn average_is_rounded_to_two_decimals() {
    let mut conn = test_db();
    let teacher = build(&conn);

    submit(&mut conn, &teacher, 501, 90.0, 90.0);
    submit(&mut conn, &teacher, 502, 70.0, 70.0);
    submit(&mut conn, &teacher, 503, 90.0, 90.0);

    let card = build_report_card(&conn, &teacher, 1, YEAR, Term::First).unwrap();
    // (90 + 70 + 90) / 3 = 83.333... -> 83.33
    assert_eq!(card.summary.average, 83.33);
}

#[test]
fn access_follows_the_single_student_view_rule() {
    let mut conn = test_db();
    let teacher = build(&conn);
    submit(&mut conn, &teacher, 501, 90.0, 90.0);

    let student = Actor::new(10, sms_core::actor::Role::Student);
    assert!(build_report_card(&conn, &student, 1, YEAR, Term::First).is_ok());

    let guardian = seed_guardian(&conn, 1, 30);
    let err = build_report_card(&conn, &guardian, 1, YEAR, Term::First).unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)), "got {err:?}");

    link_guardian_student(&conn, 1, 1);
    assert!(build_report_card(&conn, &guardian, 1, YEAR, Term::First).is_ok());
}

#[test]
fn wrong_term_is_not_found() {
    let mut conn = test_db();
    let teacher = build(&conn);
    submit(&mut conn, &teacher, 501, 90.0, 90.0);

    let err = build_report_card(&conn, &teacher, 1, YEAR, Term::Second).unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)), "got {err:?}");
}
