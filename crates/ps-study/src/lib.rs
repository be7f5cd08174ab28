//! # ps-study
//!
//! Ties the sweep definition, unit materialization and throttled submission
//! together into a study that can be planned, built, run and cancelled.

pub mod config;
pub mod study;

pub use config::{GroupConfig, PackingConfig, StudyConfig, StudySection, SubmissionConfig};
pub use study::{RunSummary, Study};
