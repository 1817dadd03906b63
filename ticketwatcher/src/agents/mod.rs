//! Oracle-facing agents.

pub mod negotiator;
