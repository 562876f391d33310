//! GradeCalculator: pure derivation of summary fields and the letter grade
//! from raw component scores. No store access.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};

/// Raw component scores as submitted. A missing component counts as 0 in
/// the sums.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawScores {
    pub ca1: Option<f64>,
    pub ca2: Option<f64>,
    pub exam_score: Option<f64>,
    pub ltc: Option<f64>,
}

/// Fields recomputed from [`RawScores`] on every write. Never read back as
/// authoritative inputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedScores {
    pub ca_total: Option<f64>,
    pub total_score: Option<f64>,
    pub overall_score: Option<f64>,
    pub letter: Option<LetterGrade>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LetterGrade {
    A,
    B,
    C,
    D,
    F,
}

impl LetterGrade {
    pub fn as_str(&self) -> &'static str {
        match self {
            LetterGrade::A => "A",
            LetterGrade::B => "B",
            LetterGrade::C => "C",
            LetterGrade::D => "D",
            LetterGrade::F => "F",
        }
    }

    pub fn parse(s: &str) -> Option<LetterGrade> {
        match s {
            "A" => Some(LetterGrade::A),
            "B" => Some(LetterGrade::B),
            "C" => Some(LetterGrade::C),
            "D" => Some(LetterGrade::D),
            "F" => Some(LetterGrade::F),
            _ => None,
        }
    }
}

impl ToSql for LetterGrade {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for LetterGrade {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        LetterGrade::parse(s)
            .ok_or_else(|| FromSqlError::Other(format!("unknown letter grade: {s}").into()))
    }
}

/// Letter thresholds (inclusive lower bounds on the overall score) and the
/// maximum obtainable mark per subject.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeScale {
    pub a_min: f64,
    pub b_min: f64,
    pub c_min: f64,
    pub d_min: f64,
    pub max_mark: f64,
}

impl Default for GradeScale {
    fn default() -> Self {
        GradeScale {
            a_min: 80.0,
            b_min: 65.0,
            c_min: 50.0,
            d_min: 40.0,
            max_mark: 100.0,
        }
    }
}

impl GradeScale {
    /// Letter for an overall score. Thresholds apply only when the score
    /// is positive; see [`compute`] for the zero case.
    pub fn letter_for(&self, overall_score: f64) -> LetterGrade {
        if overall_score >= self.a_min {
            LetterGrade::A
        } else if overall_score >= self.b_min {
            LetterGrade::B
        } else if overall_score >= self.c_min {
            LetterGrade::C
        } else if overall_score >= self.d_min {
            LetterGrade::D
        } else {
            LetterGrade::F
        }
    }
}

/// `ca_total = ca1 + ca2`, `total = ca_total + exam`,
/// `overall = (total + ltc) / 2`.
///
/// When the overall score works out to 0 every derived field is reported
/// as "no data" rather than a numeric zero. This conflates "no scores
/// entered" with "scored zero everywhere"; the behavior is kept as
/// observed in production and the ambiguity is tracked in DESIGN.md.
pub fn compute(raw: &RawScores) -> DerivedScores {
    compute_with(raw, &GradeScale::default())
}

pub fn compute_with(raw: &RawScores, scale: &GradeScale) -> DerivedScores {
    let ca1 = raw.ca1.unwrap_or(0.0);
    let ca2 = raw.ca2.unwrap_or(0.0);
    let exam = raw.exam_score.unwrap_or(0.0);
    let ltc = raw.ltc.unwrap_or(0.0);

    let ca_total = ca1 + ca2;
    let total_score = ca_total + exam;
    let overall_score = (total_score + ltc) / 2.0;

    if overall_score <= 0.0 {
        return DerivedScores::default();
    }

    DerivedScores {
        ca_total: Some(ca_total),
        total_score: Some(total_score),
        overall_score: Some(overall_score),
        letter: Some(scale.letter_for(overall_score)),
    }
}
