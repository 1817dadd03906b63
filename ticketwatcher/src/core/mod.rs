//! Deterministic, pure logic shared by the triage pipeline.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod budget;
pub mod contract;
pub mod diff;
pub mod path;
pub mod policy;
pub mod stackparse;
pub mod state;
pub mod trigger;
pub mod types;
pub mod window;
