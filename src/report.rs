//! ReportCardAggregator: folds one student's per-subject results for a
//! (year, term) into totals and an average.

use rusqlite::Connection;
use serde::Serialize;

use crate::actor::{Actor, Term};
use crate::authz::{self, Action};
use crate::calc::GradeScale;
use crate::error::CoreError;
use crate::grades::{self, Grade, GradeQuery};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub number_of_subjects: usize,
    pub marks_obtainable: f64,
    pub total_marks_obtained: f64,
    /// Mean of the non-null overall scores, rounded to 2 decimal places.
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportCard {
    pub student_id: i64,
    pub class_id: i64,
    pub academic_year: String,
    pub term: Term,
    pub results: Vec<Grade>,
    pub summary: ReportSummary,
}

/// Build the report card, or `NotFound` when the student has no result
/// rows for the (year, term). Access follows the single-student view rule.
pub fn build_report_card(
    conn: &Connection,
    actor: &Actor,
    student_id: i64,
    academic_year: &str,
    term: Term,
) -> Result<ReportCard, CoreError> {
    authz::ensure(conn, actor, Action::ViewStudentResults { student_id })?;

    let results = grades::list_grades_for_student(
        conn,
        actor,
        student_id,
        &GradeQuery {
            academic_year: Some(academic_year.to_string()),
            term: Some(term),
            class_id: None,
        },
    )?;
    if results.is_empty() {
        return Err(CoreError::NotFound(
            "no results for this student in the given year and term".to_string(),
        ));
    }

    let scale = GradeScale::default();
    let scored: Vec<f64> = results.iter().filter_map(|g| g.overall_score).collect();
    let total_marks_obtained: f64 = scored.iter().sum();
    let average = if scored.is_empty() {
        0.0
    } else {
        round2(total_marks_obtained / scored.len() as f64)
    };

    let summary = ReportSummary {
        number_of_subjects: results.len(),
        marks_obtainable: results.len() as f64 * scale.max_mark,
        total_marks_obtained,
        average,
    };
    Ok(ReportCard {
        student_id,
        class_id: results[0].class_id,
        academic_year: academic_year.to_string(),
        term,
        results,
        summary,
    })
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::round2;

    #[test]
    fn rounds_half_away_from_zero_to_two_places() {
        assert_eq!(round2(83.333333), 83.33);
        assert_eq!(round2(83.336), 83.34);
        assert_eq!(round2(50.0), 50.0);
    }
}
