//! Core of a school-records backend: role-scoped data access, grade
//! computation, and cohort ranking over a SQLite entity store.
//!
//! The surrounding HTTP/routing layer is expected to hold the
//! `rusqlite::Connection`, build an [`actor::Actor`] from its session
//! token, and call into this crate for every read and write that touches
//! academic records.

pub mod actor;
pub mod authz;
pub mod calc;
pub mod db;
pub mod error;
pub mod grades;
pub mod policy;
pub mod ranking;
pub mod relations;
pub mod report;

pub use rusqlite;

pub use actor::{Actor, ResourceKind, Role, Term};
pub use authz::{authorize, Action, Decision};
pub use calc::{compute, DerivedScores, GradeScale, LetterGrade, RawScores};
pub use error::CoreError;
pub use grades::{Grade, GradeUpsert};
pub use policy::{resolve_scope, Scope, ScopeFilter};
pub use ranking::CohortKey;
pub use report::{build_report_card, ReportCard};
