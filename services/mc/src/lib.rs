//! mc Library Crate
//!
//! Configuration, skill bundling, LED color parsing, and the command
//! handlers behind the `mc` binary. `bin/mc.rs` is a thin wrapper that parses
//! arguments, installs logging, and calls `commands::dispatch`.

pub mod bundle;
pub mod color;
pub mod commands;
pub mod config;
