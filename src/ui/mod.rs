//! Terminal output for the `genforge` CLI.

pub mod icons;
pub mod progress;
pub mod report;

pub use progress::{BuildProgressUI, GenerationProgressUI};
pub use report::{render_report, render_session};
