//! Grade persistence: composite-keyed upserts, bulk submission, deletion
//! and scope-filtered listing.
//!
//! Every write recomputes the derived fields through `calc` and re-ranks
//! the affected cohort inside the same transaction, so a submission is
//! durable only once its cohort statistics are too.

use rusqlite::{params_from_iter, types::Value, Connection, Row, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};

use crate::actor::{Actor, ResourceKind, Term};
use crate::authz::{self, Action};
use crate::calc::{self, LetterGrade, RawScores};
use crate::error::CoreError;
use crate::policy;
use crate::ranking::{self, CohortKey};

/// One grade row, raw and derived fields together.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub id: i64,
    pub student_id: i64,
    pub subject_id: i64,
    pub class_id: i64,
    pub academic_year: String,
    pub term: Term,
    pub ca1: Option<f64>,
    pub ca2: Option<f64>,
    pub exam_score: Option<f64>,
    pub ltc: Option<f64>,
    pub ca_total: Option<f64>,
    pub total_score: Option<f64>,
    pub overall_score: Option<f64>,
    pub letter: Option<LetterGrade>,
    pub subject_position: Option<i64>,
    pub class_average: Option<f64>,
    pub remark: Option<String>,
    pub updated_at: Option<String>,
}

const GRADE_COLUMNS: &str = "id, student_id, subject_id, class_id, academic_year, term,
    ca1, ca2, exam_score, ltc, ca_total, total_score, overall_score, letter,
    subject_position, class_average, remark, updated_at";

fn grade_from_row(r: &Row<'_>) -> rusqlite::Result<Grade> {
    Ok(Grade {
        id: r.get(0)?,
        student_id: r.get(1)?,
        subject_id: r.get(2)?,
        class_id: r.get(3)?,
        academic_year: r.get(4)?,
        term: r.get(5)?,
        ca1: r.get(6)?,
        ca2: r.get(7)?,
        exam_score: r.get(8)?,
        ltc: r.get(9)?,
        ca_total: r.get(10)?,
        total_score: r.get(11)?,
        overall_score: r.get(12)?,
        letter: r.get(13)?,
        subject_position: r.get(14)?,
        class_average: r.get(15)?,
        remark: r.get(16)?,
        updated_at: r.get(17)?,
    })
}

/// One grade submission keyed by (student, subject, academic year, term).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeUpsert {
    pub student_id: i64,
    pub subject_id: i64,
    pub class_id: i64,
    pub academic_year: String,
    pub term: Term,
    #[serde(flatten)]
    pub scores: RawScores,
    pub remark: Option<String>,
}

impl GradeUpsert {
    fn validate(&self) -> Result<(), CoreError> {
        if self.student_id <= 0 {
            return Err(CoreError::Validation("studentId is required".to_string()));
        }
        if self.subject_id <= 0 {
            return Err(CoreError::Validation("subjectId is required".to_string()));
        }
        if self.class_id <= 0 {
            return Err(CoreError::Validation("classId is required".to_string()));
        }
        if self.academic_year.trim().is_empty() {
            return Err(CoreError::Validation(
                "academicYear is required".to_string(),
            ));
        }
        Ok(())
    }

    fn cohort(&self) -> CohortKey {
        CohortKey {
            subject_id: self.subject_id,
            class_id: self.class_id,
            academic_year: self.academic_year.clone(),
            term: self.term,
        }
    }
}

/// Create or update the grade row for the submission's composite key, then
/// re-rank its cohort. Only the subject's teacher or an admin may write.
pub fn upsert_grade(
    conn: &mut Connection,
    actor: &Actor,
    submission: &GradeUpsert,
) -> Result<Grade, CoreError> {
    submission.validate()?;
    authz::ensure(
        conn,
        actor,
        Action::EditGrade {
            subject_id: submission.subject_id,
        },
    )?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let grade_id = upsert_row(&tx, submission)?;
    ranking::recompute_in_tx(&tx, &submission.cohort())?;
    let grade = grade_by_id_tx(&tx, grade_id)?;
    tx.commit()?;
    Ok(grade)
}

/// A batch of submissions for one cohort.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeBatch {
    pub class_id: i64,
    pub subject_id: i64,
    pub academic_year: String,
    pub term: Term,
    pub rows: Vec<BatchRow>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRow {
    pub student_id: i64,
    #[serde(flatten)]
    pub scores: RawScores,
    pub remark: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub results: Vec<Grade>,
    pub class_average: Option<f64>,
}

/// Upsert every row of the batch, then re-rank the cohort once. The whole
/// batch commits or rolls back together.
pub fn bulk_upsert_grades(
    conn: &mut Connection,
    actor: &Actor,
    batch: &GradeBatch,
) -> Result<BatchOutcome, CoreError> {
    authz::ensure(
        conn,
        actor,
        Action::EditGrade {
            subject_id: batch.subject_id,
        },
    )?;

    let submissions: Vec<GradeUpsert> = batch
        .rows
        .iter()
        .map(|row| GradeUpsert {
            student_id: row.student_id,
            subject_id: batch.subject_id,
            class_id: batch.class_id,
            academic_year: batch.academic_year.clone(),
            term: batch.term,
            scores: row.scores,
            remark: row.remark.clone(),
        })
        .collect();
    for submission in &submissions {
        submission.validate()?;
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let mut grade_ids = Vec::with_capacity(submissions.len());
    for submission in &submissions {
        grade_ids.push(upsert_row(&tx, submission)?);
    }
    let class_average = ranking::recompute_in_tx(
        &tx,
        &CohortKey {
            subject_id: batch.subject_id,
            class_id: batch.class_id,
            academic_year: batch.academic_year.clone(),
            term: batch.term,
        },
    )?;
    let mut results = Vec::with_capacity(grade_ids.len());
    for grade_id in grade_ids {
        results.push(grade_by_id_tx(&tx, grade_id)?);
    }
    tx.commit()?;
    Ok(BatchOutcome {
        results,
        class_average,
    })
}

/// Delete one grade row and re-rank the cohort it left.
pub fn delete_grade(conn: &mut Connection, actor: &Actor, grade_id: i64) -> Result<(), CoreError> {
    let existing = conn
        .query_row(
            &format!("SELECT {GRADE_COLUMNS} FROM grades WHERE id = ?"),
            [grade_id],
            grade_from_row,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                CoreError::NotFound("grade not found".to_string())
            }
            other => CoreError::from(other),
        })?;
    authz::ensure(
        conn,
        actor,
        Action::EditGrade {
            subject_id: existing.subject_id,
        },
    )?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute("DELETE FROM grades WHERE id = ?", [grade_id])?;
    ranking::recompute_in_tx(
        &tx,
        &CohortKey {
            subject_id: existing.subject_id,
            class_id: existing.class_id,
            academic_year: existing.academic_year.clone(),
            term: existing.term,
        },
    )?;
    tx.commit()?;
    Ok(())
}

/// Optional narrowing filters for grade listings, applied on top of the
/// actor's resolved scope.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeQuery {
    pub academic_year: Option<String>,
    pub term: Option<Term>,
    pub class_id: Option<i64>,
}

/// List grades visible to `actor`. A denied scope yields an empty list,
/// not an error.
pub fn list_grades(
    conn: &Connection,
    actor: &Actor,
    query: &GradeQuery,
) -> Result<Vec<Grade>, CoreError> {
    let scope = policy::resolve_scope(conn, actor, ResourceKind::Grade)?;
    let Some((predicate, mut binds)) = scope.sql_predicate() else {
        return Ok(Vec::new());
    };

    let mut sql = format!("SELECT {GRADE_COLUMNS} FROM grades WHERE {predicate}");
    if let Some(year) = &query.academic_year {
        sql.push_str(" AND academic_year = ?");
        binds.push(Value::Text(year.clone()));
    }
    if let Some(term) = query.term {
        sql.push_str(" AND term = ?");
        binds.push(Value::Text(term.as_str().to_string()));
    }
    if let Some(class_id) = query.class_id {
        sql.push_str(" AND class_id = ?");
        binds.push(Value::Integer(class_id));
    }
    sql.push_str(" ORDER BY id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(binds), grade_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// One student's grade rows, gated by the single-resource view rule
/// (student self, guardian ward, teacher or admin).
pub fn list_grades_for_student(
    conn: &Connection,
    actor: &Actor,
    student_id: i64,
    query: &GradeQuery,
) -> Result<Vec<Grade>, CoreError> {
    authz::ensure(conn, actor, Action::ViewStudentResults { student_id })?;

    let mut sql = format!(
        "SELECT {GRADE_COLUMNS} FROM grades g WHERE g.student_id = ?"
    );
    let mut binds: Vec<Value> = vec![Value::Integer(student_id)];
    if let Some(year) = &query.academic_year {
        sql.push_str(" AND g.academic_year = ?");
        binds.push(Value::Text(year.clone()));
    }
    if let Some(term) = query.term {
        sql.push_str(" AND g.term = ?");
        binds.push(Value::Text(term.as_str().to_string()));
    }
    sql.push_str(" ORDER BY (SELECT name FROM subjects s WHERE s.id = g.subject_id), g.id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(binds), grade_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn upsert_row(tx: &Transaction<'_>, submission: &GradeUpsert) -> Result<i64, CoreError> {
    let derived = calc::compute(&submission.scores);
    let updated_at = chrono::Utc::now().to_rfc3339();

    tx.execute(
        "INSERT INTO grades(
            student_id, subject_id, class_id, academic_year, term,
            ca1, ca2, exam_score, ltc,
            ca_total, total_score, overall_score, letter, remark, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(student_id, subject_id, academic_year, term) DO UPDATE SET
            class_id = excluded.class_id,
            ca1 = excluded.ca1,
            ca2 = excluded.ca2,
            exam_score = excluded.exam_score,
            ltc = excluded.ltc,
            ca_total = excluded.ca_total,
            total_score = excluded.total_score,
            overall_score = excluded.overall_score,
            letter = excluded.letter,
            remark = excluded.remark,
            updated_at = excluded.updated_at",
        (
            submission.student_id,
            submission.subject_id,
            submission.class_id,
            &submission.academic_year,
            submission.term,
            submission.scores.ca1,
            submission.scores.ca2,
            submission.scores.exam_score,
            submission.scores.ltc,
            derived.ca_total,
            derived.total_score,
            derived.overall_score,
            derived.letter,
            &submission.remark,
            &updated_at,
        ),
    )?;

    let grade_id = tx.query_row(
        "SELECT id FROM grades
         WHERE student_id = ? AND subject_id = ? AND academic_year = ? AND term = ?",
        (
            submission.student_id,
            submission.subject_id,
            &submission.academic_year,
            submission.term,
        ),
        |r| r.get(0),
    )?;
    Ok(grade_id)
}

fn grade_by_id_tx(tx: &Transaction<'_>, grade_id: i64) -> Result<Grade, CoreError> {
    tx.query_row(
        &format!("SELECT {GRADE_COLUMNS} FROM grades WHERE id = ?"),
        [grade_id],
        grade_from_row,
    )
    .map_err(CoreError::from)
}
