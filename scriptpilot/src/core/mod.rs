//! Pure logic for the feedback loop.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data and return deterministic outputs suitable for tests.

pub mod extract;
pub mod gate;
pub mod history;
pub mod types;
