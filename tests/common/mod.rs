//! Shared fixture builders for the integration tests. Entities are
//! inserted with explicit ids so tests can reference them directly.

#![allow(dead_code)]

use sms_core::actor::{Actor, Role};
use sms_core::rusqlite::Connection;
use sms_core::db;

pub fn test_db() -> Connection {
    db::open_in_memory().expect("open in-memory db")
}

pub fn seed_user(conn: &Connection, id: i64, role: Role) {
    conn.execute(
        "INSERT INTO users(id, role, first_name, last_name, email)
         VALUES (?, ?, ?, ?, ?)",
        (
            id,
            role,
            format!("First{id}"),
            format!("Last{id}"),
            format!("user{id}@school.test"),
        ),
    )
    .expect("insert user");
}

pub fn seed_class(conn: &Connection, id: i64, homeroom_teacher_id: Option<i64>) {
    conn.execute(
        "INSERT INTO classes(id, name, teacher_id) VALUES (?, ?, ?)",
        (id, format!("Class {id}"), homeroom_teacher_id),
    )
    .expect("insert class");
}

pub fn seed_teacher(conn: &Connection, id: i64, user_id: i64) -> Actor {
    seed_user(conn, user_id, Role::Teacher);
    conn.execute(
        "INSERT INTO teachers(id, user_id) VALUES (?, ?)",
        (id, user_id),
    )
    .expect("insert teacher");
    Actor::new(user_id, Role::Teacher)
}

pub fn seed_student(conn: &Connection, id: i64, user_id: i64, class_id: Option<i64>) -> Actor {
    seed_user(conn, user_id, Role::Student);
    conn.execute(
        "INSERT INTO students(id, user_id, class_id) VALUES (?, ?, ?)",
        (id, user_id, class_id),
    )
    .expect("insert student");
    Actor::new(user_id, Role::Student)
}

pub fn seed_guardian(conn: &Connection, id: i64, user_id: i64) -> Actor {
    seed_user(conn, user_id, Role::Guardian);
    conn.execute(
        "INSERT INTO guardians(id, user_id) VALUES (?, ?)",
        (id, user_id),
    )
    .expect("insert guardian");
    Actor::new(user_id, Role::Guardian)
}

pub fn link_guardian_student(conn: &Connection, guardian_id: i64, student_id: i64) {
    conn.execute(
        "INSERT INTO guardian_students(guardian_id, student_id) VALUES (?, ?)",
        (guardian_id, student_id),
    )
    .expect("link guardian to student");
}

pub fn seed_subject(conn: &Connection, id: i64, class_id: i64) {
    conn.execute(
        "INSERT INTO subjects(id, name, class_id) VALUES (?, ?, ?)",
        (id, format!("Subject {id}"), class_id),
    )
    .expect("insert subject");
}

pub fn link_subject_teacher(conn: &Connection, subject_id: i64, teacher_id: i64) {
    conn.execute(
        "INSERT INTO subject_teachers(subject_id, teacher_id) VALUES (?, ?)",
        (subject_id, teacher_id),
    )
    .expect("link subject to teacher");
}

pub fn admin(conn: &Connection, user_id: i64) -> Actor {
    seed_user(conn, user_id, Role::Admin);
    Actor::new(user_id, Role::Admin)
}
