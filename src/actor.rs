use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};

/// User role. Closed set: every new resource kind must define behavior for
/// every variant, which the exhaustive matches in `policy` enforce at
/// compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Teacher,
    Student,
    // Stored as PARENT in pre-existing user rows.
    #[serde(rename = "PARENT", alias = "GUARDIAN")]
    Guardian,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Teacher => "TEACHER",
            Role::Student => "STUDENT",
            Role::Guardian => "PARENT",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "ADMIN" => Some(Role::Admin),
            "TEACHER" => Some(Role::Teacher),
            "STUDENT" => Some(Role::Student),
            "PARENT" | "GUARDIAN" => Some(Role::Guardian),
            _ => None,
        }
    }
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        Role::parse(s).ok_or_else(|| FromSqlError::Other(format!("unknown role: {s}").into()))
    }
}

/// The caller identity for every core operation. Built by the embedding
/// layer from its session token; there is no ambient "current user".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub user_id: i64,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: i64, role: Role) -> Actor {
        Actor { user_id, role }
    }
}

/// Resource families that list/query endpoints scope through the policy
/// resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceKind {
    Exam,
    Grade,
    Attendance,
    Class,
    Subject,
}

/// Academic term within a school year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Term {
    First,
    Second,
    Third,
}

impl Term {
    pub fn as_str(&self) -> &'static str {
        match self {
            Term::First => "FIRST",
            Term::Second => "SECOND",
            Term::Third => "THIRD",
        }
    }

    pub fn parse(s: &str) -> Option<Term> {
        match s {
            "FIRST" => Some(Term::First),
            "SECOND" => Some(Term::Second),
            "THIRD" => Some(Term::Third),
            _ => None,
        }
    }
}

impl ToSql for Term {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for Term {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        Term::parse(s).ok_or_else(|| FromSqlError::Other(format!("unknown term: {s}").into()))
    }
}
