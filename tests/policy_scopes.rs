mod common;

use std::collections::BTreeSet;

use sms_core::actor::{Actor, ResourceKind, Role};
use sms_core::policy::{resolve_scope, Scope, ScopeFilter};

use common::*;

const KINDS: [ResourceKind; 5] = [
    ResourceKind::Exam,
    ResourceKind::Grade,
    ResourceKind::Attendance,
    ResourceKind::Class,
    ResourceKind::Subject,
];

fn ids(values: &[i64]) -> BTreeSet<i64> {
    values.iter().copied().collect()
}

/// Two classes with subjects, one guardian linked to a student in each,
/// one teacher teaching a single subject.
struct Fixture {
    teacher: Actor,
    student: Actor,
    guardian: Actor,
}

fn build(conn: &sms_core::rusqlite::Connection) -> Fixture {
    let teacher = seed_teacher(conn, 1, 20);
    seed_class(conn, 5, None);
    seed_class(conn, 7, None);
    seed_subject(conn, 501, 5);
    seed_subject(conn, 502, 5);
    seed_subject(conn, 701, 7);
    link_subject_teacher(conn, 501, 1);

    let student = seed_student(conn, 1, 10, Some(5));
    seed_student(conn, 2, 11, Some(7));
    let guardian = seed_guardian(conn, 1, 30);
    link_guardian_student(conn, 1, 1);
    link_guardian_student(conn, 1, 2);

    Fixture {
        teacher,
        student,
        guardian,
    }
}

#[test]
fn admin_is_unrestricted_for_every_kind() {
    let conn = test_db();
    let admin = admin(&conn, 99);
    for kind in KINDS {
        assert_eq!(
            resolve_scope(&conn, &admin, kind).unwrap(),
            Scope::Unrestricted
        );
    }
}

#[test]
fn non_admin_roles_are_never_unrestricted() {
    let conn = test_db();
    let f = build(&conn);
    for actor in [f.teacher, f.student, f.guardian] {
        for kind in KINDS {
            let scope = resolve_scope(&conn, &actor, kind).unwrap();
            assert_ne!(
                scope,
                Scope::Unrestricted,
                "{:?} must not be unrestricted for {:?}",
                actor.role,
                kind
            );
        }
    }
}

#[test]
fn student_scopes_follow_own_class_and_own_rows() {
    let conn = test_db();
    let f = build(&conn);

    assert_eq!(
        resolve_scope(&conn, &f.student, ResourceKind::Exam).unwrap(),
        Scope::Filter(ScopeFilter::class_ids(ids(&[5])))
    );
    assert_eq!(
        resolve_scope(&conn, &f.student, ResourceKind::Grade).unwrap(),
        Scope::Filter(ScopeFilter::student_ids(ids(&[1])))
    );
    assert_eq!(
        resolve_scope(&conn, &f.student, ResourceKind::Attendance).unwrap(),
        Scope::Filter(ScopeFilter::student_ids(ids(&[1])))
    );
}

#[test]
fn student_without_class_is_denied_everywhere() {
    let conn = test_db();
    let unplaced = seed_student(&conn, 50, 60, None);
    for kind in KINDS {
        assert_eq!(resolve_scope(&conn, &unplaced, kind).unwrap(), Scope::Denied);
    }
}

#[test]
fn guardian_exam_scope_is_subjects_of_wards_classes() {
    let conn = test_db();
    let f = build(&conn);

    // Wards sit in classes 5 and 7, so the exam scope is exactly the
    // subjects belonging to those classes.
    assert_eq!(
        resolve_scope(&conn, &f.guardian, ResourceKind::Exam).unwrap(),
        Scope::Filter(ScopeFilter::subject_ids(ids(&[501, 502, 701])))
    );
    assert_eq!(
        resolve_scope(&conn, &f.guardian, ResourceKind::Grade).unwrap(),
        Scope::Filter(ScopeFilter::student_ids(ids(&[1, 2])))
    );
    assert_eq!(
        resolve_scope(&conn, &f.guardian, ResourceKind::Class).unwrap(),
        Scope::Filter(ScopeFilter::class_ids(ids(&[5, 7])))
    );
}

#[test]
fn guardian_without_wards_is_denied() {
    let conn = test_db();
    let lonely = seed_guardian(&conn, 9, 90);
    for kind in KINDS {
        assert_eq!(resolve_scope(&conn, &lonely, kind).unwrap(), Scope::Denied);
    }
}

#[test]
fn teacher_grade_scope_is_subject_granular() {
    let conn = test_db();
    let f = build(&conn);

    let expected = Scope::Filter(ScopeFilter::subject_ids(ids(&[501])));
    assert_eq!(
        resolve_scope(&conn, &f.teacher, ResourceKind::Exam).unwrap(),
        expected
    );
    assert_eq!(
        resolve_scope(&conn, &f.teacher, ResourceKind::Grade).unwrap(),
        expected
    );
    // Attendance listing stays closed; marking goes through the gate.
    assert_eq!(
        resolve_scope(&conn, &f.teacher, ResourceKind::Attendance).unwrap(),
        Scope::Denied
    );
}

#[test]
fn teacher_class_scope_unions_homeroom_and_taught_classes() {
    let conn = test_db();
    let f = build(&conn);
    // Homeroom over class 7, teaching subject 501 in class 5.
    conn.execute("UPDATE classes SET teacher_id = 1 WHERE id = 7", [])
        .unwrap();

    assert_eq!(
        resolve_scope(&conn, &f.teacher, ResourceKind::Class).unwrap(),
        Scope::Filter(ScopeFilter::class_ids(ids(&[5, 7])))
    );
}

#[test]
fn actor_with_no_backing_row_is_denied() {
    let conn = test_db();
    seed_user(&conn, 70, Role::Teacher);
    let ghost = Actor::new(70, Role::Teacher);
    for kind in KINDS {
        assert_eq!(resolve_scope(&conn, &ghost, kind).unwrap(), Scope::Denied);
    }
}

#[test]
fn scope_predicates_render_for_the_list_layer() {
    let filter = ScopeFilter {
        student_ids: Some(ids(&[1, 2])),
        subject_ids: Some(ids(&[501])),
        class_ids: None,
    };
    let (predicate, binds) = filter.sql_predicate();
    assert_eq!(predicate, "student_id IN (?,?) AND subject_id IN (?)");
    assert_eq!(binds.len(), 3);

    assert!(Scope::Denied.sql_predicate().is_none());
    let (unrestricted, binds) = Scope::Unrestricted.sql_predicate().unwrap();
    assert_eq!(unrestricted, "1=1");
    assert!(binds.is_empty());
}
