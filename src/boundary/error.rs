//! Error types for boundary parsing.

use thiserror::Error;

/// Errors raised while parsing a boundary specification.
///
/// Every variant is a configuration error: the run aborts before any
/// network activity when one is returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoundaryError {
    /// An `@YYYYMMDD` endpoint that is not a valid calendar date.
    #[error("invalid date endpoint {value}: expected @YYYYMMDD")]
    InvalidDate {
        /// The raw endpoint text.
        value: String,
    },

    /// A short identifier containing characters outside the base-62 alphabet.
    #[error("invalid post identifier {value}")]
    InvalidIdentifier {
        /// The raw endpoint text.
        value: String,
    },

    /// An identifier whose decoded value does not fit in 64 bits.
    #[error("post identifier {value} is out of range")]
    Overflow {
        /// The raw endpoint text.
        value: String,
    },

    /// More than one `:` separator in the range.
    #[error("invalid id range {spec}: expected at most two endpoints")]
    TooManyEndpoints {
        /// The full specification.
        spec: String,
    },

    /// Lower endpoint is greater than the upper one.
    #[error("invalid id range {spec}: lower endpoint is after upper endpoint")]
    Inverted {
        /// The full specification.
        spec: String,
    },
}

impl BoundaryError {
    pub(crate) fn invalid_date(value: impl Into<String>) -> Self {
        Self::InvalidDate {
            value: value.into(),
        }
    }

    pub(crate) fn invalid_identifier(value: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            value: value.into(),
        }
    }

    pub(crate) fn overflow(value: impl Into<String>) -> Self {
        Self::Overflow {
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_error_messages_carry_input() {
        let msg = BoundaryError::invalid_date("@20241301").to_string();
        assert!(msg.contains("@20241301"), "Expected endpoint in: {msg}");

        let msg = BoundaryError::TooManyEndpoints {
            spec: "1:2:3".to_string(),
        }
        .to_string();
        assert!(msg.contains("invalid id range 1:2:3"), "got: {msg}");
    }
}
