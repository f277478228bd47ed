//! Domain types for the stored task representation.
//!
//! [`TaskRecord`] is what the store persists. It carries the dispatch
//! handle, which never leaves the service; clients see the
//! [`TaskView`](crate::types::TaskView) projection instead.
//! [`CompletionOutcome`] is the validated form of a completion callback.

pub mod outcome;
pub mod record;

pub use outcome::*;
pub use record::*;
