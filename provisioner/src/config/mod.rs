//! Operator configuration: the record and how it is collected

pub mod collector;
pub mod record;
