//! Veloroute CLI library.
//!
//! Argument types, command handlers and output formatting shared by the
//! `veloroute` binary and its integration tests.

pub mod commands;
pub mod output;
