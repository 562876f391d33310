//! AuthorizationGate: yes/no checks for single-resource operations, built
//! on the same relationship lookups as the policy resolver. Fails closed:
//! any lookup miss is `Forbidden`, never `Allow`.

use rusqlite::Connection;
use tracing::warn;

use crate::actor::{Actor, Role};
use crate::error::CoreError;
use crate::relations;

/// Single-resource operations the gate understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Create, update or delete one grade row for a subject.
    EditGrade { subject_id: i64 },
    /// View the full grade sheet of a subject.
    ViewGradeSheet { subject_id: i64 },
    /// Mark or amend attendance for a class.
    MarkAttendance { class_id: i64 },
    /// Access class-level records (roster, timetable).
    AccessClass { class_id: i64 },
    /// View one student's results or report card.
    ViewStudentResults { student_id: i64 },
    /// View a user's profile.
    ViewProfile { user_id: i64 },
    /// View a user's medical record.
    ViewMedicalRecord { user_id: i64 },
    /// Create, update or delete a user's medical record.
    EditMedicalRecord { user_id: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Forbidden,
}

impl Decision {
    pub fn is_allow(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Decide whether `actor` may perform `action`.
///
/// Errors are store failures only; a policy "no" is the `Forbidden`
/// decision, which callers surface as-is.
pub fn authorize(conn: &Connection, actor: &Actor, action: Action) -> Result<Decision, CoreError> {
    if actor.role == Role::Admin {
        return Ok(Decision::Allow);
    }
    let decision = match action {
        Action::EditGrade { subject_id } | Action::ViewGradeSheet { subject_id } => {
            teacher_of_subject(conn, actor, subject_id)?
        }
        Action::MarkAttendance { class_id } | Action::AccessClass { class_id } => {
            teacher_of_class(conn, actor, class_id)?
        }
        Action::ViewStudentResults { student_id } => {
            can_view_student_results(conn, actor, student_id)?
        }
        Action::ViewProfile { user_id }
        | Action::ViewMedicalRecord { user_id }
        | Action::EditMedicalRecord { user_id } => {
            // Own-record only for every non-admin role.
            if actor.user_id == user_id {
                Decision::Allow
            } else {
                Decision::Forbidden
            }
        }
    };
    if !decision.is_allow() {
        warn!(
            user_id = actor.user_id,
            role = actor.role.as_str(),
            ?action,
            "authorization denied"
        );
    }
    Ok(decision)
}

/// Like [`authorize`], but folds `Forbidden` into the error taxonomy for
/// write paths that stop immediately.
pub fn ensure(conn: &Connection, actor: &Actor, action: Action) -> Result<(), CoreError> {
    match authorize(conn, actor, action)? {
        Decision::Allow => Ok(()),
        Decision::Forbidden => Err(CoreError::Forbidden(
            "not permitted to perform this operation".to_string(),
        )),
    }
}

fn teacher_of_subject(
    conn: &Connection,
    actor: &Actor,
    subject_id: i64,
) -> Result<Decision, CoreError> {
    if actor.role != Role::Teacher {
        return Ok(Decision::Forbidden);
    }
    let Some(teacher_id) = relations::teacher_id_of_user(conn, actor.user_id)? else {
        return Ok(Decision::Forbidden);
    };
    if relations::teacher_teaches_subject(conn, teacher_id, subject_id)? {
        Ok(Decision::Allow)
    } else {
        Ok(Decision::Forbidden)
    }
}

/// A teacher is authorized for a class if they are its homeroom teacher or
/// teach any subject belonging to it.
fn teacher_of_class(
    conn: &Connection,
    actor: &Actor,
    class_id: i64,
) -> Result<Decision, CoreError> {
    if actor.role != Role::Teacher {
        return Ok(Decision::Forbidden);
    }
    if !relations::class_exists(conn, class_id)? {
        return Ok(Decision::Forbidden);
    }
    let Some(teacher_id) = relations::teacher_id_of_user(conn, actor.user_id)? else {
        return Ok(Decision::Forbidden);
    };
    if relations::homeroom_class_ids_of_teacher(conn, teacher_id)?.contains(&class_id) {
        return Ok(Decision::Allow);
    }
    if relations::class_ids_of_taught_subjects(conn, teacher_id)?.contains(&class_id) {
        return Ok(Decision::Allow);
    }
    Ok(Decision::Forbidden)
}

fn can_view_student_results(
    conn: &Connection,
    actor: &Actor,
    student_id: i64,
) -> Result<Decision, CoreError> {
    match actor.role {
        Role::Admin | Role::Teacher => Ok(Decision::Allow),
        Role::Student => {
            let Some(own) = relations::student_of_user(conn, actor.user_id)? else {
                return Ok(Decision::Forbidden);
            };
            if own.id == student_id {
                Ok(Decision::Allow)
            } else {
                Ok(Decision::Forbidden)
            }
        }
        Role::Guardian => {
            let Some(guardian_id) = relations::guardian_id_of_user(conn, actor.user_id)? else {
                return Ok(Decision::Forbidden);
            };
            if relations::guardian_linked_to_student(conn, guardian_id, student_id)? {
                Ok(Decision::Allow)
            } else {
                Ok(Decision::Forbidden)
            }
        }
    }
}
