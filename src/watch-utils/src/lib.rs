//! Small helpers shared by the at-watch crates.
//!
//! Currently this only provides the [`env`] macros, which turn environment
//! variables present at build time into `const` configuration values.

#![cfg_attr(not(test), no_std)]

pub mod env;
