//! slotprov library
//!
//! Provisions a Linux host to run the WB slots monitoring bot as a systemd
//! service.

pub mod app;
pub mod config;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod host;
pub mod logs;
pub mod storage;
pub mod utils;
