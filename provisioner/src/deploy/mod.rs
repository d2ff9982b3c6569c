//! Pipeline stages

pub mod envfile;
pub mod fsm;
pub mod identity;
pub mod packages;
pub mod permissions;
pub mod prereq;
pub mod rollback;
pub mod runtime;
pub mod service;
pub mod source;
pub mod unit;
pub mod validate;
