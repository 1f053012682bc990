//! I/O helpers for installer tasks.

pub mod backup;
pub mod config_file;
pub mod link;
pub mod paths;
pub mod process;
pub mod run_log;
pub mod settings;
