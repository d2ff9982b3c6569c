//! Deployment layout on the host

pub mod target;
