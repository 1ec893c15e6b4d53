//! Conversational agent that runs model-proposed scripts under supervision.
//!
//! A language model answers natural-language requests, optionally with a
//! fenced script. The script is extracted, passed through a confirmation
//! gate, run in a bounded child process, and any failure is fed back to the
//! model as a corrective prompt until it succeeds or the retry budget is spent.
//!
//! - **[`core`]**: Pure logic (extraction, confirmation gate, turn types,
//!   conversation window). No I/O.
//! - **[`io`]**: Side effects (config, child processes, model backends, terminal).
//!
//! [`controller`] ties both together into the per-turn state machine.

pub mod cancel;
pub mod controller;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
