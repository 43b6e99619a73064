//! Command-line front end for the element locator.
//!
//! Everything interesting lives in `element-locator`; this crate wires it to
//! configuration, logging, and a handful of subcommands.

pub mod app_settings;
pub mod cli;
