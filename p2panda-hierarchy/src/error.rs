// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;

use thiserror::Error;

/// Error types for closure computation and resolution.
///
/// All variants are fatal and abort the whole call, no partial result is ever returned. Cycles in
/// the hierarchy are not errors, they are reported in the resolution metadata instead.
#[derive(Debug, Error)]
pub enum ResolverError<E>
where
    E: Error,
{
    #[error("edge source unavailable: {0}")]
    EdgeSourceUnavailable(E),

    #[error("graph too large: {0}")]
    GraphTooLarge(GraphLimit),

    #[error("deadline exceeded after {edge_source_calls} edge source calls")]
    DeadlineExceeded { edge_source_calls: usize },
}

impl<E> ResolverError<E>
where
    E: Error,
{
    /// Returns `true` if repeating the same call could succeed.
    ///
    /// Exceeding a traversal limit is deterministic for the same snapshot and usually hints at a
    /// data integrity problem upstream.
    pub fn is_retryable(&self) -> bool {
        match self {
            ResolverError::EdgeSourceUnavailable(_) => true,
            ResolverError::DeadlineExceeded { .. } => true,
            ResolverError::GraphTooLarge(_) => false,
        }
    }
}

/// Traversal limit which was exceeded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum GraphLimit {
    /// A container was reached at a depth greater than the configured maximum.
    #[error("maximum depth of {limit} exceeded")]
    Depth { limit: usize },

    /// More containers were visited than the configured maximum.
    #[error("maximum of {limit} visited containers exceeded")]
    Visited { limit: usize },
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::{GraphLimit, ResolverError};

    #[test]
    fn retryable() {
        let too_large: ResolverError<Infallible> =
            ResolverError::GraphTooLarge(GraphLimit::Depth { limit: 20 });
        assert!(!too_large.is_retryable());
        assert_eq!(
            too_large.to_string(),
            "graph too large: maximum depth of 20 exceeded"
        );

        let deadline: ResolverError<Infallible> = ResolverError::DeadlineExceeded {
            edge_source_calls: 3,
        };
        assert!(deadline.is_retryable());
    }

    #[test]
    fn graph_limit_messages() {
        assert_eq!(
            GraphLimit::Visited { limit: 5 }.to_string(),
            "maximum of 5 visited containers exceeded"
        );

        let unavailable: ResolverError<GraphLimit> =
            ResolverError::EdgeSourceUnavailable(GraphLimit::Depth { limit: 3 });
        assert_eq!(
            unavailable.to_string(),
            "edge source unavailable: maximum depth of 3 exceeded"
        );
    }
}
