//! Deterministic, pure logic shared by the installer.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod document;
pub mod provider;
pub mod types;
