// SPDX-License-Identifier: MIT OR Apache-2.0

//! Accounting of the work done during one call.
use std::error::Error;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::Limits;
use crate::error::{GraphLimit, ResolverError};

/// Tracks depth, visited containers and edge source calls of one call and enforces its limits,
/// deadline and cancellation.
///
/// Every edge source read goes through `Budget::fetch`, which makes the reads the only points
/// where a call can be aborted.
#[derive(Debug)]
pub struct Budget {
    limits: Limits,
    cancel_token: Option<CancellationToken>,
    visited: usize,
    edge_source_calls: usize,
    max_depth_reached: usize,
}

impl Budget {
    pub fn new(limits: Limits) -> Self {
        Self {
            limits,
            cancel_token: None,
            visited: 0,
            edge_source_calls: 0,
            max_depth_reached: 0,
        }
    }

    pub fn with_cancel_token(mut self, cancel_token: Option<CancellationToken>) -> Self {
        self.cancel_token = cancel_token;
        self
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Number of containers visited so far, counted once per closure they are part of.
    pub fn visited(&self) -> usize {
        self.visited
    }

    pub fn edge_source_calls(&self) -> usize {
        self.edge_source_calls
    }

    /// Deepest depth any closure reached so far.
    pub fn max_depth_reached(&self) -> usize {
        self.max_depth_reached
    }

    /// Account for a container reached at `depth`.
    pub(crate) fn visit<E>(&mut self, depth: usize) -> Result<(), ResolverError<E>>
    where
        E: Error,
    {
        if depth > self.limits.max_depth {
            debug!(depth, limit = self.limits.max_depth, "maximum depth exceeded");
            return Err(ResolverError::GraphTooLarge(GraphLimit::Depth {
                limit: self.limits.max_depth,
            }));
        }

        self.visited += 1;
        if self.visited > self.limits.max_visited {
            debug!(limit = self.limits.max_visited, "maximum visited containers exceeded");
            return Err(ResolverError::GraphTooLarge(GraphLimit::Visited {
                limit: self.limits.max_visited,
            }));
        }

        self.max_depth_reached = self.max_depth_reached.max(depth);
        Ok(())
    }

    /// Run one edge source read, aborting it when the deadline passes or the call gets
    /// cancelled while it is in flight.
    pub(crate) async fn fetch<T, E, F>(&mut self, read: F) -> Result<T, ResolverError<E>>
    where
        E: Error,
        F: Future<Output = Result<T, E>>,
    {
        if self.is_interrupted() {
            return Err(self.deadline_exceeded());
        }

        self.edge_source_calls += 1;

        let deadline = self.limits.deadline;
        let cancel_token = self.cancel_token.clone();

        let expired = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        let cancelled = async move {
            match cancel_token {
                Some(token) => token.cancelled_owned().await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => Err(self.deadline_exceeded()),
            _ = expired => Err(self.deadline_exceeded()),
            result = read => result.map_err(ResolverError::EdgeSourceUnavailable),
        }
    }

    fn is_interrupted(&self) -> bool {
        let cancelled = self
            .cancel_token
            .as_ref()
            .is_some_and(|token| token.is_cancelled());
        let expired = self
            .limits
            .deadline
            .is_some_and(|deadline| tokio::time::Instant::now() >= deadline);
        cancelled || expired
    }

    fn deadline_exceeded<E>(&self) -> ResolverError<E>
    where
        E: Error,
    {
        debug!(
            edge_source_calls = self.edge_source_calls,
            "call interrupted by deadline or cancellation"
        );
        ResolverError::DeadlineExceeded {
            edge_source_calls: self.edge_source_calls,
        }
    }
}
