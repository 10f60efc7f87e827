//! # execbox
//!
//! Sandboxed batch execution of untrusted source code. A program is prepared
//! once (written to a disposable workspace, compiled if the language needs
//! it) and then run against an ordered list of inputs under per-input and
//! whole-batch resource budgets. Every input yields exactly one
//! [`ExecutionResult`] whose [`ExecutionStatus`] says precisely why the run
//! ended: success, timeout, out-of-memory, oversized input or output,
//! compile failure, runtime crash, budget-exhausted skip, or an
//! infrastructure error.
//!
//! Isolation and accounting are composed from ordinary processes: GNU time
//! for resource accounting, `timeout` for the wall-clock deadline, `prlimit`
//! for address-space and file-size caps, and `bwrap` for namespace and
//! filesystem confinement. The composition lives in [`wrap`] and the
//! reference [`BwrapSandbox`]; alternative backends only need to implement
//! the [`Sandbox`] trait.

mod error;
mod executor;
mod languages;
mod sandbox;
mod service;
mod types;
mod usage;
pub mod wrap;

#[cfg(test)]
mod tests;

pub use error::Error;
pub use executor::{BatchExecutor, ProgramPreparer};
pub use languages::{preparer_for, CppPreparer, PythonPreparer};
pub use sandbox::{BwrapConfig, BwrapSandbox, Sandbox};
pub use service::ExecutionService;
pub use types::{
    ExecutionRequest, ExecutionResult, ExecutionStatus, Language, PreparedProgram, ResourceLimits,
};
pub use usage::UsageReport;

/// Result type for execution operations
pub type Result<T> = std::result::Result<T, Error>;
