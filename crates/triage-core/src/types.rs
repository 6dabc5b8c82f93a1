//! Core types for ticket triage

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ticket priority decided by the triage engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// All priorities, lowest first
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    /// Canonical label as used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a label is not one of `Low`, `Medium` or `High`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown priority: {0:?}")]
pub struct UnknownPriority(pub String);

impl FromStr for Priority {
    type Err = UnknownPriority;

    /// Case-insensitive match against the fixed enumeration.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Priority::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownPriority(s.to_string()))
    }
}

/// Which path produced a classification result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultSource {
    /// External classification service
    Ai,
    /// Deterministic keyword rules
    Rules,
    /// Rules forced by an open circuit breaker or a throttled upstream
    Cooldown,
}

impl ResultSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ai => "ai",
            Self::Rules => "rules",
            Self::Cooldown => "cooldown",
        }
    }
}

impl fmt::Display for ResultSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional customer identity sent along with the issue
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerSnapshot {
    /// Display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Contact email
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl CustomerSnapshot {
    /// Create a snapshot with both fields set
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            email: Some(email.into()),
        }
    }

    /// True when neither field carries a value
    pub fn is_empty(&self) -> bool {
        self.name.as_deref().map_or(true, str::is_empty)
            && self.email.as_deref().map_or(true, str::is_empty)
    }
}

/// A single classification request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRequest {
    /// Free-text issue description
    pub issue_text: String,

    /// Customer fields used to enrich the external call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<CustomerSnapshot>,
}

impl ClassificationRequest {
    /// Create a request without customer details
    pub fn new(issue_text: impl Into<String>) -> Self {
        Self {
            issue_text: issue_text.into(),
            customer: None,
        }
    }

    /// Attach a customer snapshot
    pub fn with_customer(mut self, customer: CustomerSnapshot) -> Self {
        self.customer = Some(customer);
        self
    }
}

/// Outcome of classification, returned to the ticket workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Decided priority
    pub priority: Priority,

    /// Human-readable explanation
    pub reason: String,

    /// Path that produced the value
    pub source: ResultSource,
}

impl ClassificationResult {
    /// Create a new classification result
    pub fn new(priority: Priority, reason: impl Into<String>, source: ResultSource) -> Self {
        Self {
            priority,
            reason: reason.into(),
            source,
        }
    }
}
