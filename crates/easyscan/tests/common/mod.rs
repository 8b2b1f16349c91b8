//! Shared utilities for easyscan integration tests.
//!
//! - `TestHarness` wires a `Workflow` to an in-memory database, a temp
//!   staging directory and recording fakes for the remote side, the
//!   catalog and the mailer
//! - builders for configuration and identity headers

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::*;
