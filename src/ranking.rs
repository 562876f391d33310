//! CohortRankingEngine: recomputes the class average and 1-based rank for
//! every grade row in a cohort, atomically.
//!
//! A cohort is the set of grade rows sharing (subject, class, academic
//! year, term). The read-compute-write cycle always runs inside one
//! IMMEDIATE transaction, so two submissions into the same cohort
//! serialize instead of interleaving their write-backs.

use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::info;

use crate::actor::Term;
use crate::error::CoreError;

/// Identity of the unit over which ranking and the class average are
/// computed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortKey {
    pub subject_id: i64,
    pub class_id: i64,
    pub academic_year: String,
    pub term: Term,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedRow {
    pub grade_id: i64,
    pub overall_score: f64,
    pub position: i64,
}

/// Stable descending rank plus the arithmetic mean. Ties keep their input
/// order, which for store-fetched rows is ascending grade id.
pub fn rank_rows(rows: &[(i64, f64)]) -> (Option<f64>, Vec<RankedRow>) {
    if rows.is_empty() {
        return (None, Vec::new());
    }
    let sum: f64 = rows.iter().map(|(_, score)| score).sum();
    let average = sum / rows.len() as f64;

    let mut sorted: Vec<(i64, f64)> = rows.to_vec();
    sorted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    let ranked = sorted
        .iter()
        .enumerate()
        .map(|(i, (grade_id, score))| RankedRow {
            grade_id: *grade_id,
            overall_score: *score,
            position: (i + 1) as i64,
        })
        .collect();
    (Some(average), ranked)
}

/// Recompute the whole cohort in its own transaction. Returns the new
/// class average, or `None` for an empty cohort.
pub fn recompute(conn: &mut Connection, key: &CohortKey) -> Result<Option<f64>, CoreError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let average = recompute_in_tx(&tx, key)?;
    tx.commit()?;
    Ok(average)
}

/// Recompute within an already-open transaction. The grade write paths use
/// this so an upsert is durable only once its cohort ranking also commits.
pub(crate) fn recompute_in_tx(
    tx: &Transaction<'_>,
    key: &CohortKey,
) -> Result<Option<f64>, CoreError> {
    // Rows without an overall score never receive a position or average.
    let mut stmt = tx.prepare(
        "SELECT id, overall_score FROM grades
         WHERE subject_id = ? AND class_id = ? AND academic_year = ? AND term = ?
           AND overall_score IS NOT NULL
         ORDER BY id",
    )?;
    let rows: Vec<(i64, f64)> = stmt
        .query_map(
            (key.subject_id, key.class_id, &key.academic_year, key.term),
            |r| Ok((r.get::<_, i64>(0)?, r.get::<_, f64>(1)?)),
        )?
        .collect::<Result<Vec<_>, _>>()?;
    drop(stmt);

    let (average, ranked) = rank_rows(&rows);
    for row in &ranked {
        tx.execute(
            "UPDATE grades SET class_average = ?, subject_position = ? WHERE id = ?",
            (average, row.position, row.grade_id),
        )?;
    }

    info!(
        subject_id = key.subject_id,
        class_id = key.class_id,
        academic_year = %key.academic_year,
        term = key.term.as_str(),
        cohort_size = ranked.len(),
        "recomputed cohort ranking"
    );
    Ok(average)
}
