//! Side-effecting adapters: configuration, events, host, oracle, prompts.

pub mod config;
pub mod event;
pub mod github;
pub mod host;
pub mod http;
pub mod oracle;
pub mod prompt;
pub mod snippets;
