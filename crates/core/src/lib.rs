//! Domain types and client-side logic for the business administration service.
//!
//! Everything here is free of I/O: storage rows come in, aggregates, filtered
//! views and report documents come out.

pub mod aggregate;
pub mod history;
pub mod report;
pub mod session;
pub mod types;
pub mod views;
