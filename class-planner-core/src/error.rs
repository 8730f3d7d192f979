use thiserror::Error;

use crate::conflict::Conflict;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Workbook could not be read: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("Workbook has no worksheet: {0}")]
    EmptyWorkbook(String),

    #[error("Workbook is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Catalog snapshot unusable: {0}")]
    Snapshot(String),

    #[error("Invalid course or subclass: {code} ({label})")]
    InvalidSelection { code: String, label: String },

    #[error("Course already in schedule: {0}")]
    DuplicateCourse(String),

    #[error("Time conflict detected ({} pair(s))", .conflicts.len())]
    TimeConflict { conflicts: Vec<Conflict> },

    #[error("No courses in schedule")]
    EmptySchedule,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
