//! CLI command implementations

pub mod move_data;
pub mod plan;
pub mod query;
pub mod validate;
