//! Eventual-consistency polling for end-to-end checks.
//!
//! A check observes a remote system once and reports `Success` or `Pending`;
//! the [`Poller`] decides how long to keep asking and how to fail.

pub mod error;
pub mod outcome;
pub mod poller;

pub use error::{Details, Error, HostInfo, Result, TimeoutError, UnrecoverableError};
pub use outcome::{Diagnostic, PollOutcome};
pub use poller::{ErrorMessage, Poller, DEFAULT_STEP, DEFAULT_TIMEOUT, TIMEOUT_VAR};
