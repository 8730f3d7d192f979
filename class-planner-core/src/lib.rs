//! Class Planner Core Library
//!
//! This library turns a university timetable export into a queryable course
//! catalog, checks schedules for time conflicts and exports them as ICS
//! calendars.

pub mod builder;
pub mod cache;
pub mod catalog;
pub mod conflict;
pub mod error;
pub mod ics;
pub mod planner;
pub mod row;
pub mod schedule;
pub mod semester;
pub mod snapshot;
pub mod source;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export core types and error handling
pub use error::{Error, Result};
pub use types::*;

/// Commonly used items
pub mod prelude {
    pub use crate::{
        cache::{Cache, CacheBackend, MemoryCache, SessionStore},
        catalog::Catalog,
        conflict::{Conflict, Selection},
        ics::{IcsGenerator, IcsOptions},
        planner::{Page, Planner, resolve_semester},
        schedule::{Schedule, ScheduleBook, ScheduleItem},
        snapshot::{CatalogLoader, default_snapshot_path},
        source::{TimetableSource, WorkbookSource},
        types::*,
    };
}
