// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for the resolver and per-call options.
//!
//! `Config` holds the defaults of a `Resolver` instance, `ResolveOptions` can override them for
//! a single call and adds a deadline and cancellation token.
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Default maximum depth of a single closure traversal.
pub const DEFAULT_MAX_DEPTH: usize = 20;

/// Default maximum number of containers visited during one call.
pub const DEFAULT_MAX_VISITED: usize = 100_000;

/// Configuration parameters for a resolver.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// Maximum depth a container can be reached at, counting the base containers as depth 1.
    pub max_depth: usize,

    /// Maximum number of containers visited across all closures of one call.
    pub max_visited: usize,

    /// Time budget of one call. No timeout is applied if not set.
    pub timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_visited: DEFAULT_MAX_VISITED,
            timeout: None,
        }
    }
}

/// Options for a single call, falling back to the resolver's `Config` where not set.
#[derive(Clone, Debug, Default)]
pub struct ResolveOptions {
    pub(crate) max_depth: Option<usize>,
    pub(crate) max_visited: Option<usize>,
    pub(crate) deadline: Option<Instant>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) cancel_token: Option<CancellationToken>,
}

impl ResolveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    pub fn with_max_visited(mut self, max_visited: usize) -> Self {
        self.max_visited = Some(max_visited);
        self
    }

    /// Abort the call when this instant is reached.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Abort the call when it takes longer than this duration, measured from the call's start.
    ///
    /// If both a deadline and a timeout are given, whichever is reached first applies.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Abort the call when this token gets cancelled.
    pub fn with_cancel_token(mut self, cancel_token: CancellationToken) -> Self {
        self.cancel_token = Some(cancel_token);
        self
    }

    /// Effective limits and deadline when starting a call at `now`.
    pub(crate) fn resolve_against(&self, config: &Config, now: Instant) -> Limits {
        let timeout = self.timeout.or(config.timeout);
        let deadline = match (self.deadline, timeout.map(|timeout| now + timeout)) {
            (Some(deadline), Some(timeout)) => Some(deadline.min(timeout)),
            (deadline, timeout) => deadline.or(timeout),
        };

        Limits {
            max_depth: self.max_depth.unwrap_or(config.max_depth),
            max_visited: self.max_visited.unwrap_or(config.max_visited),
            deadline,
        }
    }
}

/// Limits applied to one call after merging options and config.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limits {
    pub max_depth: usize,
    pub max_visited: usize,
    pub deadline: Option<Instant>,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_visited: DEFAULT_MAX_VISITED,
            deadline: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::Instant;

    use super::{Config, DEFAULT_MAX_DEPTH, DEFAULT_MAX_VISITED, ResolveOptions};

    #[test]
    fn options_fall_back_to_config() {
        let now = Instant::now();
        let config = Config::default();

        let limits = ResolveOptions::new().resolve_against(&config, now);
        assert_eq!(limits.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(limits.max_visited, DEFAULT_MAX_VISITED);
        assert_eq!(limits.deadline, None);

        let limits = ResolveOptions::new()
            .with_max_depth(3)
            .with_max_visited(10)
            .resolve_against(&config, now);
        assert_eq!(limits.max_depth, 3);
        assert_eq!(limits.max_visited, 10);
    }

    #[test]
    fn earliest_deadline_applies() {
        let now = Instant::now();
        let config = Config {
            timeout: Some(Duration::from_secs(10)),
            ..Config::default()
        };

        // Timeout from config only.
        let limits = ResolveOptions::new().resolve_against(&config, now);
        assert_eq!(limits.deadline, Some(now + Duration::from_secs(10)));

        // Explicit deadline earlier than the configured timeout.
        let deadline = now + Duration::from_secs(2);
        let limits = ResolveOptions::new()
            .with_deadline(deadline)
            .resolve_against(&config, now);
        assert_eq!(limits.deadline, Some(deadline));

        // Per-call timeout overrides the configured one.
        let limits = ResolveOptions::new()
            .with_timeout(Duration::from_secs(30))
            .with_deadline(now + Duration::from_secs(60))
            .resolve_against(&config, now);
        assert_eq!(limits.deadline, Some(now + Duration::from_secs(30)));
    }
}
