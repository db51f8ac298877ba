//! Schedule reconciliation pipeline.
//!
//! Reads run in three stages: [`source`] picks an upstream that answers,
//! [`normalize`] maps its records onto [`CanonicalSchedule`], and
//! [`visibility`] narrows the list to what the actor may see. [`datetime`]
//! converts between instants and entry-form fields, and [`mutation`] validates
//! and sends changes. [`ScheduleBoard`] holds one page session and re-runs the
//! read stages after every successful change.

pub mod board;
pub mod client;
pub mod config;
pub mod datetime;
pub mod error;
pub mod mutation;
pub mod normalize;
pub mod session;
pub mod source;
mod types;
pub mod visibility;

#[cfg(test)]
mod mock;

pub use board::{ScheduleBoard, ScheduleView};
pub use client::{ApiClient, ScheduleApi};
pub use config::{BoardConfig, EnrollmentFailurePolicy};
pub use datetime::{DecomposedTime, Period};
pub use error::ScheduleError;
pub use mutation::{MutationKind, ScheduleForm};
pub use normalize::Normalizer;
pub use source::{FetchOutcome, SourceTier, StudentScheduleShape};
pub use types::*;
