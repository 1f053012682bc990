//! Installer for the `cursor-acp` OpenCode plugin.
//!
//! An install run builds the plugin, adds the ACP SDK to the host, links the
//! build output into the host plugin directory, and registers the provider in
//! `opencode.json`. An uninstall run reverses those steps. The crate is split
//! the same way as the run itself:
//!
//! - **[`core`]**: Config document edits and the provider entry. No I/O.
//! - **[`io`]**: Backups, links, config files, external tools, and the run log.
//!
//! [`tasks`] defines the steps and [`pipeline`] executes them in order,
//! rolling a failed install back from the backups taken along the way.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod pipeline;
pub mod tasks;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
