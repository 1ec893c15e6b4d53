//! Side-effecting adapters: configuration, processes, model backends, terminal.

pub mod config;
pub mod console;
pub mod openai;
pub mod process;
pub mod prompt;
pub mod provider;
pub mod sandbox;
pub mod search;
