//! Raw system call bindings

pub mod prctl;
