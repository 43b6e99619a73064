//! Error types for element location

use std::time::Duration;

use souldesk_element::{ElementError, ElementSummary};
use thiserror::Error;

/// Locator error enumeration
#[derive(Debug, Error, Clone)]
pub enum LocateError {
    /// Search produced zero matches
    #[error("Element not found: {criteria}")]
    NotFound { criteria: String },

    /// Search produced several matches where exactly one was required
    #[error("{} elements match {criteria}: {}", .candidates.len(), format_candidates(.candidates))]
    Ambiguous {
        criteria: String,
        candidates: Vec<ElementSummary>,
    },

    /// No fuzzy candidate cleared the acceptance cutoff
    #[error("No candidate for '{query}' scored {cutoff:.2} or more (considered: {})", .pool.join(", "))]
    Match {
        query: String,
        cutoff: f64,
        pool: Vec<String>,
    },

    /// Element resolved but does not (yet) satisfy a wait condition
    #[error("Element {element} does not satisfy '{condition}'")]
    ConditionNotMet {
        element: ElementSummary,
        condition: String,
    },

    /// Retry budget exhausted; carries the last underlying failure
    #[error("Timed out after {elapsed:?} ({attempts} attempts): {last}")]
    Timeout {
        elapsed: Duration,
        attempts: u32,
        #[source]
        last: Box<LocateError>,
    },

    /// A previously obtained element no longer exists
    #[error("Stale element: {0}")]
    InvalidReference(ElementError),

    /// Criteria cannot be evaluated (bad regex, unknown key, empty chain)
    #[error("Invalid criteria: {0}")]
    InvalidCriteria(String),

    /// Backend failure other than a stale reference
    #[error("Backend error: {0}")]
    Backend(ElementError),

    /// Resolution was cancelled by the caller
    #[error("Resolution cancelled")]
    Cancelled,
}

fn format_candidates(candidates: &[ElementSummary]) -> String {
    candidates
        .iter()
        .map(|candidate| candidate.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<ElementError> for LocateError {
    fn from(err: ElementError) -> Self {
        if err.is_invalid_reference() {
            LocateError::InvalidReference(err)
        } else {
            LocateError::Backend(err)
        }
    }
}

impl LocateError {
    /// The underlying failure, looking through `Timeout`
    pub fn cause(&self) -> &LocateError {
        match self {
            LocateError::Timeout { last, .. } => last.cause(),
            other => other,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, LocateError::Timeout { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.cause(), LocateError::NotFound { .. })
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self.cause(), LocateError::Ambiguous { .. })
    }

    pub fn is_match_failure(&self) -> bool {
        matches!(self.cause(), LocateError::Match { .. })
    }

    pub fn is_invalid_reference(&self) -> bool {
        matches!(self.cause(), LocateError::InvalidReference(_))
    }

    /// Candidates carried by an ambiguity failure
    pub fn candidates(&self) -> &[ElementSummary] {
        match self.cause() {
            LocateError::Ambiguous { candidates, .. } => candidates,
            _ => &[],
        }
    }

    /// Check if error is retryable: the tree may change before the next attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            LocateError::NotFound { .. }
            | LocateError::Ambiguous { .. }
            | LocateError::Match { .. }
            | LocateError::ConditionNotMet { .. }
            | LocateError::InvalidReference(_) => true,
            LocateError::Backend(err) => err.is_retryable(),
            LocateError::Timeout { .. }
            | LocateError::InvalidCriteria(_)
            | LocateError::Cancelled => false,
        }
    }

    /// Get error severity (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            LocateError::InvalidCriteria(_) => 3,
            LocateError::Backend(_) | LocateError::Timeout { .. } => 2,
            LocateError::NotFound { .. }
            | LocateError::Ambiguous { .. }
            | LocateError::Match { .. }
            | LocateError::InvalidReference(_) => 1,
            LocateError::ConditionNotMet { .. } | LocateError::Cancelled => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use souldesk_element::NativeId;

    #[test]
    fn test_cause_looks_through_timeout() {
        let err = LocateError::Timeout {
            elapsed: Duration::from_millis(500),
            attempts: 6,
            last: Box::new(LocateError::NotFound {
                criteria: "title=\"Save\"".into(),
            }),
        };
        assert!(err.is_timeout());
        assert!(err.is_not_found());
        assert!(!err.is_ambiguous());
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("title=\"Save\""));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_element_errors_are_split() {
        let stale: LocateError =
            ElementError::invalid_reference("memory", &NativeId::from("w1")).into();
        assert!(stale.is_invalid_reference());
        assert!(stale.is_retryable());

        let unknown: LocateError = ElementError::UnknownBackend("uia".into()).into();
        assert!(matches!(unknown, LocateError::Backend(_)));
        assert!(!unknown.is_retryable());
    }

    #[test]
    fn test_severity_levels() {
        assert_eq!(LocateError::InvalidCriteria("x".into()).severity(), 3);
        assert_eq!(
            LocateError::NotFound {
                criteria: String::new()
            }
            .severity(),
            1
        );
        assert_eq!(LocateError::Cancelled.severity(), 0);
    }
}
