//! Saving a parsed workbook into the backend.

mod job;
mod orchestrator;
mod summary;

pub type Error = String;

// Exports
pub use self::job::*;
pub use self::orchestrator::*;
pub use self::summary::*;
