// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;

use crate::types::{Membership, ShareLink};

/// Read interface to the container hierarchy.
///
/// Every method takes a batch of container ids and returns all matching edges for the whole
/// batch. Implementations are expected to answer each call with one indexed query, the closure
/// engine issues exactly one call per traversal round.
///
/// All reads of one resolution must observe the same snapshot of the underlying data, otherwise
/// cycle detection and depth tie-breaks are not well-defined.
pub trait HierarchySource<ID> {
    type Error: Error;

    /// Returns `(child, parent)` edges for every given container which has a parent.
    fn parent_edges(&self, containers: &[ID])
    -> impl Future<Output = Result<Vec<(ID, ID)>, Self::Error>>;

    /// Returns `(parent, child)` edges for every child of the given containers.
    fn child_edges(&self, containers: &[ID])
    -> impl Future<Output = Result<Vec<(ID, ID)>, Self::Error>>;
}

/// Read interface to everything the resolver needs besides the hierarchy itself: memberships,
/// share links and project ownership.
///
/// `U` is the principal id, `ID` the container id and `P` the project id.
pub trait EdgeSource<U, ID, P>: HierarchySource<ID> {
    /// Returns all share links whose target is one of the given containers.
    fn share_links_into(
        &self,
        targets: &[ID],
    ) -> impl Future<Output = Result<Vec<ShareLink<ID>>, Self::Error>>;

    /// Returns all share links whose source is one of the given containers.
    fn share_links_from(
        &self,
        sources: &[ID],
    ) -> impl Future<Output = Result<Vec<ShareLink<ID>>, Self::Error>>;

    /// Returns `(container, project)` pairs for every project owned by one of the given
    /// containers.
    fn projects_owned_by(
        &self,
        containers: &[ID],
    ) -> impl Future<Output = Result<Vec<(ID, P)>, Self::Error>>;

    /// Returns all direct memberships of the given principals.
    fn direct_memberships(
        &self,
        principals: &[U],
    ) -> impl Future<Output = Result<Vec<Membership<U, ID>>, Self::Error>>;

    /// Returns `(principal, project)` pairs for projects the given principals own personally,
    /// outside of any container hierarchy.
    fn directly_owned_projects(
        &self,
        principals: &[U],
    ) -> impl Future<Output = Result<Vec<(U, P)>, Self::Error>>;
}

/// Edge source answering every read from one fixed snapshot of the underlying data.
///
/// Resolutions computed against such a source stay valid as long as the version does, which
/// makes them safe to cache under it.
pub trait VersionedSource {
    /// Version of the snapshot all reads are answered from.
    fn snapshot_version(&self) -> u64;
}
