//! Triage Core
//!
//! Core types, traits, and utilities shared across the triage crates.
//!
//! This crate provides:
//! - Request and result types for ticket priority classification
//! - Error types and result handling
//! - The injectable clock used for TTL and cooldown decisions
//! - Issue text normalization for cache keys

pub mod clock;
pub mod error;
pub mod normalize;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use normalize::normalize;
pub use types::{
    ClassificationRequest, ClassificationResult, CustomerSnapshot, Priority, ResultSource,
    UnknownPriority,
};
