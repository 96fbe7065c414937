use serde::{Deserialize, Serialize};

// ============================================================================
// Error Classification
// ============================================================================
//
// Retryability is decided by error *kind*, never by concrete error type.
// Kinds form a small tree:
//
//   Transient
//   ├── Connection
//   ├── Timeout
//   ├── Unavailable
//   └── Storage
//       ├── Deadlock
//       └── ConcurrencyConflict
//   Permanent
//   ├── Validation
//   ├── InvalidIdentity
//   ├── BusinessRule
//   └── EventApplication
//
// A policy that registers a kind also retries every descendant of it.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transient,
    Connection,
    Timeout,
    Unavailable,
    Storage,
    Deadlock,
    ConcurrencyConflict,
    Permanent,
    Validation,
    InvalidIdentity,
    BusinessRule,
    EventApplication,
}

impl ErrorKind {
    /// Direct parent in the kind hierarchy, `None` for the two roots
    pub fn parent(self) -> Option<ErrorKind> {
        match self {
            ErrorKind::Transient | ErrorKind::Permanent => None,
            ErrorKind::Connection
            | ErrorKind::Timeout
            | ErrorKind::Unavailable
            | ErrorKind::Storage => Some(ErrorKind::Transient),
            ErrorKind::Deadlock | ErrorKind::ConcurrencyConflict => Some(ErrorKind::Storage),
            ErrorKind::Validation
            | ErrorKind::InvalidIdentity
            | ErrorKind::BusinessRule
            | ErrorKind::EventApplication => Some(ErrorKind::Permanent),
        }
    }

    /// True if `self` is `ancestor` or descends from it
    pub fn is_a(self, ancestor: ErrorKind) -> bool {
        self.lineage().any(|kind| kind == ancestor)
    }

    /// `self` followed by each ancestor up to the root
    pub fn lineage(self) -> impl Iterator<Item = ErrorKind> {
        std::iter::successors(Some(self), |kind| kind.parent())
    }
}

/// Exposes the kind of an error so retry policies can classify it.
///
/// Implemented by every error type that flows through the dispatcher.
pub trait Classify {
    fn error_kind(&self) -> ErrorKind;
}

impl Classify for ErrorKind {
    fn error_kind(&self) -> ErrorKind {
        *self
    }
}

impl<T: Classify + ?Sized> Classify for &T {
    fn error_kind(&self) -> ErrorKind {
        (**self).error_kind()
    }
}

impl<T: Classify + ?Sized> Classify for Box<T> {
    fn error_kind(&self) -> ErrorKind {
        (**self).error_kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roots_have_no_parent() {
        assert_eq!(ErrorKind::Transient.parent(), None);
        assert_eq!(ErrorKind::Permanent.parent(), None);
    }

    #[test]
    fn test_descendants_match_ancestors() {
        assert!(ErrorKind::ConcurrencyConflict.is_a(ErrorKind::Storage));
        assert!(ErrorKind::ConcurrencyConflict.is_a(ErrorKind::Transient));
        assert!(ErrorKind::Timeout.is_a(ErrorKind::Transient));
        assert!(ErrorKind::Storage.is_a(ErrorKind::Storage));
    }

    #[test]
    fn test_ancestors_do_not_match_descendants() {
        assert!(!ErrorKind::Storage.is_a(ErrorKind::Deadlock));
        assert!(!ErrorKind::Transient.is_a(ErrorKind::Connection));
        assert!(!ErrorKind::BusinessRule.is_a(ErrorKind::Transient));
    }

    #[test]
    fn test_lineage_order() {
        let lineage: Vec<_> = ErrorKind::Deadlock.lineage().collect();
        assert_eq!(
            lineage,
            vec![ErrorKind::Deadlock, ErrorKind::Storage, ErrorKind::Transient]
        );
    }

    #[test]
    fn test_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::ConcurrencyConflict).unwrap();
        assert_eq!(json, "\"concurrency_conflict\"");
    }
}
