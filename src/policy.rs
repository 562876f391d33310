//! AccessPolicyResolver: maps (actor, resource kind) to a row-scope
//! predicate derived from the relationship graph. Reads only; safe to call
//! any number of times per request.

use rusqlite::{types::Value, Connection};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

use crate::actor::{Actor, ResourceKind, Role};
use crate::error::CoreError;
use crate::relations;

/// Column constraints restricting which rows an actor may see. Every set
/// that is present must match; canonical column names are `class_id`,
/// `student_id` and `subject_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_ids: Option<BTreeSet<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_ids: Option<BTreeSet<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_ids: Option<BTreeSet<i64>>,
}

impl ScopeFilter {
    pub fn class_ids(ids: BTreeSet<i64>) -> ScopeFilter {
        ScopeFilter {
            class_ids: Some(ids),
            ..ScopeFilter::default()
        }
    }

    pub fn student_ids(ids: BTreeSet<i64>) -> ScopeFilter {
        ScopeFilter {
            student_ids: Some(ids),
            ..ScopeFilter::default()
        }
    }

    pub fn subject_ids(ids: BTreeSet<i64>) -> ScopeFilter {
        ScopeFilter {
            subject_ids: Some(ids),
            ..ScopeFilter::default()
        }
    }

    /// Render the constraints as a SQL conjunction plus bind values, for
    /// the generic list/query layer. An empty filter renders as `1=1`.
    pub fn sql_predicate(&self) -> (String, Vec<Value>) {
        let mut clauses: Vec<String> = Vec::new();
        let mut binds: Vec<Value> = Vec::new();
        for (column, ids) in [
            ("class_id", &self.class_ids),
            ("student_id", &self.student_ids),
            ("subject_id", &self.subject_ids),
        ] {
            if let Some(ids) = ids {
                clauses.push(format!(
                    "{} IN ({})",
                    column,
                    relations::in_placeholders(ids.len())
                ));
                binds.extend(relations::id_params(ids));
            }
        }
        if clauses.is_empty() {
            return ("1=1".to_string(), binds);
        }
        (clauses.join(" AND "), binds)
    }
}

/// Row scope for one (actor, resource kind) pair.
///
/// `Denied` is data, not an error: list endpoints translate it into an
/// empty collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", rename_all = "camelCase")]
pub enum Scope {
    Unrestricted,
    Denied,
    Filter(ScopeFilter),
}

impl Scope {
    pub fn is_denied(&self) -> bool {
        matches!(self, Scope::Denied)
    }

    /// Predicate for the list layer; `None` means "return no rows".
    pub fn sql_predicate(&self) -> Option<(String, Vec<Value>)> {
        match self {
            Scope::Unrestricted => Some(("1=1".to_string(), Vec::new())),
            Scope::Denied => None,
            Scope::Filter(f) => Some(f.sql_predicate()),
        }
    }

    fn filter_or_denied(filter: ScopeFilter) -> Scope {
        let empty = matches!(&filter.class_ids, Some(s) if s.is_empty())
            || matches!(&filter.student_ids, Some(s) if s.is_empty())
            || matches!(&filter.subject_ids, Some(s) if s.is_empty());
        if empty {
            Scope::Denied
        } else {
            Scope::Filter(filter)
        }
    }
}

/// Resolve the row scope for `actor` over `kind`.
///
/// Every lookup miss (no student row, no linked wards, no taught subjects)
/// collapses to `Denied` rather than an error.
pub fn resolve_scope(
    conn: &Connection,
    actor: &Actor,
    kind: ResourceKind,
) -> Result<Scope, CoreError> {
    let scope = match actor.role {
        Role::Admin => Scope::Unrestricted,
        Role::Student => student_scope(conn, actor.user_id, kind)?,
        Role::Guardian => guardian_scope(conn, actor.user_id, kind)?,
        Role::Teacher => teacher_scope(conn, actor.user_id, kind)?,
    };
    debug!(
        user_id = actor.user_id,
        role = actor.role.as_str(),
        ?kind,
        denied = scope.is_denied(),
        "resolved scope"
    );
    Ok(scope)
}

fn student_scope(conn: &Connection, user_id: i64, kind: ResourceKind) -> Result<Scope, CoreError> {
    let Some(student) = relations::student_of_user(conn, user_id)? else {
        return Ok(Scope::Denied);
    };
    // A student not enrolled in a class is visible to no scope at all,
    // not even their own grade rows.
    let Some(class_id) = student.class_id else {
        return Ok(Scope::Denied);
    };
    Ok(match kind {
        ResourceKind::Exam | ResourceKind::Class | ResourceKind::Subject => {
            Scope::Filter(ScopeFilter::class_ids(BTreeSet::from([class_id])))
        }
        ResourceKind::Grade | ResourceKind::Attendance => {
            Scope::Filter(ScopeFilter::student_ids(BTreeSet::from([student.id])))
        }
    })
}

fn guardian_scope(conn: &Connection, user_id: i64, kind: ResourceKind) -> Result<Scope, CoreError> {
    let Some(guardian_id) = relations::guardian_id_of_user(conn, user_id)? else {
        return Ok(Scope::Denied);
    };
    let wards = relations::student_ids_of_guardian(conn, guardian_id)?;
    if wards.is_empty() {
        return Ok(Scope::Denied);
    }
    Ok(match kind {
        ResourceKind::Exam | ResourceKind::Subject => {
            let class_ids = relations::class_ids_of_students(conn, &wards)?;
            let subject_ids = relations::subject_ids_in_classes(conn, &class_ids)?;
            Scope::filter_or_denied(ScopeFilter::subject_ids(subject_ids))
        }
        ResourceKind::Grade | ResourceKind::Attendance => {
            Scope::Filter(ScopeFilter::student_ids(wards))
        }
        ResourceKind::Class => {
            let class_ids = relations::class_ids_of_students(conn, &wards)?;
            Scope::filter_or_denied(ScopeFilter::class_ids(class_ids))
        }
    })
}

fn teacher_scope(conn: &Connection, user_id: i64, kind: ResourceKind) -> Result<Scope, CoreError> {
    let Some(teacher_id) = relations::teacher_id_of_user(conn, user_id)? else {
        return Ok(Scope::Denied);
    };
    Ok(match kind {
        // Subject granularity, not exam granularity: a teacher sees every
        // grade for subjects they teach, not only exams they authored.
        ResourceKind::Exam | ResourceKind::Grade | ResourceKind::Subject => {
            let subject_ids = relations::subject_ids_of_teacher(conn, teacher_id)?;
            Scope::filter_or_denied(ScopeFilter::subject_ids(subject_ids))
        }
        // List scope for attendance stays closed for teachers; per-class
        // marking goes through the authorization gate instead.
        ResourceKind::Attendance => Scope::Denied,
        ResourceKind::Class => {
            let mut class_ids = relations::homeroom_class_ids_of_teacher(conn, teacher_id)?;
            class_ids.extend(relations::class_ids_of_taught_subjects(conn, teacher_id)?);
            Scope::filter_or_denied(ScopeFilter::class_ids(class_ids))
        }
    })
}
