//! Wire types for the task HTTP surface.
//!
//! These types define the JSON bodies exchanged with clients and with the
//! external compute's callback. The stored representation lives in the
//! [`domain`](crate::domain) module.

pub mod params;
pub mod task;

pub use params::*;
pub use task::*;
