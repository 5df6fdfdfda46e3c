//! CLI command implementations.

pub mod merge;
pub mod resume;
pub mod task;
pub mod validate;
