//! # pbau-bridge — PBAU command-line bridge
//!
//! Connects to a PandorasAutomation server, watches a configured set of
//! sequences and logs everything the server reports. One-shot
//! subcommands run discovery or send a single command and exit.
//!
//! ## Modes
//!
//! - **Monitor**: poll until Ctrl-C (default).
//! - **Discover**: print the server's sequences as JSON.
//! - **Command**: send one transport, cue or save command.

pub mod config;
pub mod service;
