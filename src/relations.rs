//! Named relationship lookups over the entity graph.
//!
//! Each function performs one read and returns plain ids or id sets, so
//! the policy and authorization layers stay decoupled from the query
//! shapes. Nothing here writes.

use rusqlite::{params_from_iter, types::Value, Connection, OptionalExtension};
use std::collections::BTreeSet;

use crate::error::CoreError;

/// A student row reduced to what scope resolution needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StudentRef {
    pub id: i64,
    pub class_id: Option<i64>,
}

pub fn student_of_user(conn: &Connection, user_id: i64) -> Result<Option<StudentRef>, CoreError> {
    conn.query_row(
        "SELECT id, class_id FROM students WHERE user_id = ?",
        [user_id],
        |r| {
            Ok(StudentRef {
                id: r.get(0)?,
                class_id: r.get(1)?,
            })
        },
    )
    .optional()
    .map_err(CoreError::from)
}

pub fn teacher_id_of_user(conn: &Connection, user_id: i64) -> Result<Option<i64>, CoreError> {
    conn.query_row("SELECT id FROM teachers WHERE user_id = ?", [user_id], |r| {
        r.get(0)
    })
    .optional()
    .map_err(CoreError::from)
}

pub fn guardian_id_of_user(conn: &Connection, user_id: i64) -> Result<Option<i64>, CoreError> {
    conn.query_row(
        "SELECT id FROM guardians WHERE user_id = ?",
        [user_id],
        |r| r.get(0),
    )
    .optional()
    .map_err(CoreError::from)
}

pub fn student_ids_of_guardian(
    conn: &Connection,
    guardian_id: i64,
) -> Result<BTreeSet<i64>, CoreError> {
    let mut stmt =
        conn.prepare("SELECT student_id FROM guardian_students WHERE guardian_id = ?")?;
    let ids = stmt
        .query_map([guardian_id], |r| r.get::<_, i64>(0))?
        .collect::<Result<BTreeSet<_>, _>>()?;
    Ok(ids)
}

pub fn guardian_linked_to_student(
    conn: &Connection,
    guardian_id: i64,
    student_id: i64,
) -> Result<bool, CoreError> {
    let hit = conn
        .query_row(
            "SELECT 1 FROM guardian_students WHERE guardian_id = ? AND student_id = ?",
            (guardian_id, student_id),
            |r| r.get::<_, i64>(0),
        )
        .optional()?;
    Ok(hit.is_some())
}

/// Class ids of the given students. Students without a class contribute
/// nothing.
pub fn class_ids_of_students(
    conn: &Connection,
    student_ids: &BTreeSet<i64>,
) -> Result<BTreeSet<i64>, CoreError> {
    if student_ids.is_empty() {
        return Ok(BTreeSet::new());
    }
    let sql = format!(
        "SELECT DISTINCT class_id FROM students
         WHERE class_id IS NOT NULL AND id IN ({})",
        in_placeholders(student_ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let ids = stmt
        .query_map(params_from_iter(id_params(student_ids)), |r| {
            r.get::<_, i64>(0)
        })?
        .collect::<Result<BTreeSet<_>, _>>()?;
    Ok(ids)
}

pub fn subject_ids_in_classes(
    conn: &Connection,
    class_ids: &BTreeSet<i64>,
) -> Result<BTreeSet<i64>, CoreError> {
    if class_ids.is_empty() {
        return Ok(BTreeSet::new());
    }
    let sql = format!(
        "SELECT id FROM subjects WHERE class_id IN ({})",
        in_placeholders(class_ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let ids = stmt
        .query_map(params_from_iter(id_params(class_ids)), |r| {
            r.get::<_, i64>(0)
        })?
        .collect::<Result<BTreeSet<_>, _>>()?;
    Ok(ids)
}

pub fn subject_ids_of_teacher(
    conn: &Connection,
    teacher_id: i64,
) -> Result<BTreeSet<i64>, CoreError> {
    let mut stmt = conn.prepare("SELECT subject_id FROM subject_teachers WHERE teacher_id = ?")?;
    let ids = stmt
        .query_map([teacher_id], |r| r.get::<_, i64>(0))?
        .collect::<Result<BTreeSet<_>, _>>()?;
    Ok(ids)
}

pub fn teacher_teaches_subject(
    conn: &Connection,
    teacher_id: i64,
    subject_id: i64,
) -> Result<bool, CoreError> {
    let hit = conn
        .query_row(
            "SELECT 1 FROM subject_teachers WHERE teacher_id = ? AND subject_id = ?",
            (teacher_id, subject_id),
            |r| r.get::<_, i64>(0),
        )
        .optional()?;
    Ok(hit.is_some())
}

/// Classes where this teacher is the homeroom teacher.
pub fn homeroom_class_ids_of_teacher(
    conn: &Connection,
    teacher_id: i64,
) -> Result<BTreeSet<i64>, CoreError> {
    let mut stmt = conn.prepare("SELECT id FROM classes WHERE teacher_id = ?")?;
    let ids = stmt
        .query_map([teacher_id], |r| r.get::<_, i64>(0))?
        .collect::<Result<BTreeSet<_>, _>>()?;
    Ok(ids)
}

/// Classes that contain at least one subject this teacher teaches.
pub fn class_ids_of_taught_subjects(
    conn: &Connection,
    teacher_id: i64,
) -> Result<BTreeSet<i64>, CoreError> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT s.class_id
         FROM subjects s
         JOIN subject_teachers st ON st.subject_id = s.id
         WHERE st.teacher_id = ?",
    )?;
    let ids = stmt
        .query_map([teacher_id], |r| r.get::<_, i64>(0))?
        .collect::<Result<BTreeSet<_>, _>>()?;
    Ok(ids)
}

pub fn class_id_of_subject(conn: &Connection, subject_id: i64) -> Result<Option<i64>, CoreError> {
    conn.query_row(
        "SELECT class_id FROM subjects WHERE id = ?",
        [subject_id],
        |r| r.get(0),
    )
    .optional()
    .map_err(CoreError::from)
}

pub fn class_exists(conn: &Connection, class_id: i64) -> Result<bool, CoreError> {
    let hit = conn
        .query_row("SELECT 1 FROM classes WHERE id = ?", [class_id], |r| {
            r.get::<_, i64>(0)
        })
        .optional()?;
    Ok(hit.is_some())
}

pub(crate) fn in_placeholders(n: usize) -> String {
    std::iter::repeat("?").take(n).collect::<Vec<_>>().join(",")
}

pub(crate) fn id_params(ids: &BTreeSet<i64>) -> Vec<Value> {
    ids.iter().map(|id| Value::Integer(*id)).collect()
}
