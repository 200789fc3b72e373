// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;

use crate::resolver::Resolution;

/// Cache for resolutions, owned and injected by the caller.
///
/// Entries are keyed by principal and the version of the data snapshot they were computed
/// from. A resolution is only valid for the snapshot it was computed against, invalidation
/// happens implicitly by asking for a newer version.
pub trait ResolutionCache<U, P> {
    type Error: Error;

    /// Returns the cached resolution of this principal for the given snapshot version.
    fn get(
        &self,
        principal: &U,
        snapshot_version: u64,
    ) -> impl Future<Output = Result<Option<Resolution<P>>, Self::Error>>;

    /// Stores a resolution of this principal computed against the given snapshot version.
    fn set(
        &self,
        principal: U,
        snapshot_version: u64,
        resolution: Resolution<P>,
    ) -> impl Future<Output = Result<(), Self::Error>>;
}
