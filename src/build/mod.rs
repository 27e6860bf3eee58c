//! Sandbox build validation.
//!
//! A session walks five steps in order:
//!
//! ```text
//! Initialize sandbox → Mount artifacts → Install dependencies → Build → Start preview server
//! ```
//!
//! A failed build is parsed into [`BuildError`]s, the affected files are
//! rewritten by the AI service, and the build runs once more. A second
//! failure ends the session. Sessions are tracked in a
//! [`ValidationSessionRegistry`] that supports polling, event subscription
//! and cancellation.

pub mod events;
pub mod parse;
pub mod registry;
pub mod session;
pub mod validator;

pub use events::{SessionEvent, SessionSubscription};
pub use parse::parse_build_output;
pub use registry::ValidationSessionRegistry;
pub use session::{
    BuildError, BuildSession, BuildStep, ErrorKind, RepairOutcome, SessionStatus, StepKind, StepStatus,
};
pub use validator::{BuildSettings, SandboxBuildValidator};
