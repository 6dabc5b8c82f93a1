//! Keyword rule classifier
//!
//! Deterministic fallback used on every failure path. Two ordered keyword
//! lists are searched case-insensitively; a HIGH match wins over a MEDIUM
//! match, and text matching neither list is Low.

use aho_corasick::AhoCorasick;
use std::sync::OnceLock;
use triage_core::normalize::collapse_whitespace;
use triage_core::{Priority, Result};

/// Keywords that escalate a ticket to High, checked first
pub const HIGH_KEYWORDS: &[&str] = &[
    // safety and security
    "unsafe",
    "safety",
    "hazard",
    "smoke",
    "burn",
    "electric shock",
    "injur",
    "security",
    "hacked",
    "fraud",
    "unauthorized",
    "unauthorised",
    "phishing",
    "scam",
    // payment failures
    "payment failed",
    "payment failure",
    "payment declined",
    "card declined",
    "charged twice",
    "double charged",
    "double charge",
    "overcharged",
    "chargeback",
    "charge back",
    // theft and non-delivery
    "stolen",
    "theft",
    "never arrived",
    "never received",
    "not delivered",
    "did not arrive",
    "didn't arrive",
    "missing package",
    "lost package",
    // damage
    "damaged",
    "broken",
    "defective",
    "shattered",
    "cracked",
    "leaking",
    // urgency
    "urgent",
    "asap",
    "immediately",
    "emergency",
    // account access
    "can't log in",
    "cannot log in",
    "can't login",
    "cannot login",
    "unable to log in",
    "unable to login",
    "locked out",
    "account locked",
    "password reset",
    "can't access my account",
    "cannot access my account",
];

/// Keywords that raise a ticket to Medium when no HIGH keyword matched
pub const MEDIUM_KEYWORDS: &[&str] = &[
    // wrong item
    "wrong item",
    "wrong size",
    "wrong color",
    "wrong colour",
    "wrong order",
    "incorrect item",
    "not what i ordered",
    // delays
    "delay",
    "late delivery",
    "arrived late",
    "running late",
    "still waiting",
    "taking too long",
    "slow shipping",
    "where is my order",
    // warranty and exchanges
    "warranty",
    "replacement",
    "replace",
    "exchange",
    "repair",
    // invoicing
    "invoice",
    "receipt",
    "billing",
];

/// Priority decided by the rules, with the keyword that decided it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleVerdict {
    pub priority: Priority,
    pub matched: Option<String>,
}

impl RuleVerdict {
    /// Human-readable explanation for fallback results
    pub fn reason(&self) -> String {
        match &self.matched {
            Some(keyword) => format!(
                "{} priority keyword matched: \"{}\"",
                self.priority.as_str().to_lowercase(),
                keyword
            ),
            None => "no priority keywords matched".to_string(),
        }
    }
}

/// Keyword classifier backed by two Aho-Corasick automata
#[derive(Debug, Clone)]
pub struct RuleClassifier {
    high: Matcher,
    medium: Matcher,
}

#[derive(Debug, Clone)]
struct Matcher {
    automaton: AhoCorasick,
    keywords: Vec<String>,
}

impl Matcher {
    fn new(keywords: Vec<String>) -> Result<Self> {
        let keywords: Vec<String> = keywords
            .into_iter()
            .map(|k| collapse_whitespace(&k.to_lowercase()))
            .filter(|k| !k.is_empty())
            .collect();

        let automaton = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(&keywords)
            .map_err(|e| {
                triage_core::Error::classifier(format!("Failed to build keyword matcher: {}", e))
            })?;

        Ok(Self { automaton, keywords })
    }

    fn find(&self, text: &str) -> Option<&str> {
        self.automaton
            .find(text)
            .map(|m| self.keywords[m.pattern().as_usize()].as_str())
    }
}

impl RuleClassifier {
    /// Create a classifier from explicit keyword lists
    pub fn new(high: Vec<String>, medium: Vec<String>) -> Result<Self> {
        Ok(Self {
            high: Matcher::new(high)?,
            medium: Matcher::new(medium)?,
        })
    }

    /// Create a classifier with the built-in keywords plus extra ones
    pub fn with_extra_keywords(extra_high: &[String], extra_medium: &[String]) -> Result<Self> {
        let high = HIGH_KEYWORDS
            .iter()
            .map(|k| k.to_string())
            .chain(extra_high.iter().cloned())
            .collect();
        let medium = MEDIUM_KEYWORDS
            .iter()
            .map(|k| k.to_string())
            .chain(extra_medium.iter().cloned())
            .collect();
        Self::new(high, medium)
    }

    /// Process-wide classifier with the built-in keywords
    pub fn shared() -> &'static RuleClassifier {
        static DEFAULT: OnceLock<RuleClassifier> = OnceLock::new();
        DEFAULT.get_or_init(|| {
            // Static keyword lists are small; construction cannot exceed automaton limits
            Self::with_extra_keywords(&[], &[]).expect("built-in keyword lists must compile")
        })
    }

    /// Classify text and report the deciding keyword
    pub fn evaluate(&self, issue_text: &str) -> RuleVerdict {
        let text = collapse_whitespace(&issue_text.to_lowercase());

        if let Some(keyword) = self.high.find(&text) {
            return RuleVerdict {
                priority: Priority::High,
                matched: Some(keyword.to_string()),
            };
        }

        if let Some(keyword) = self.medium.find(&text) {
            return RuleVerdict {
                priority: Priority::Medium,
                matched: Some(keyword.to_string()),
            };
        }

        RuleVerdict {
            priority: Priority::Low,
            matched: None,
        }
    }

    /// Classify text into a priority
    pub fn classify(&self, issue_text: &str) -> Priority {
        self.evaluate(issue_text).priority
    }

    /// Number of HIGH and MEDIUM keywords
    pub fn keyword_counts(&self) -> (usize, usize) {
        (self.high.keywords.len(), self.medium.keywords.len())
    }
}

impl Default for RuleClassifier {
    fn default() -> Self {
        Self::shared().clone()
    }
}

/// Classify issue text with the built-in keyword rules
pub fn classify_by_rules(issue_text: &str) -> Priority {
    RuleClassifier::shared().classify(issue_text)
}
