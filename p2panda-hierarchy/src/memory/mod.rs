// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory edge source and resolution cache.
//!
//! This does not persist data permanently, all changes are lost when the process ends. Use this
//! only in development or test contexts, or as a reference when implementing `EdgeSource` for a
//! real database.
mod cache;

use std::collections::{BTreeMap, BTreeSet};
use std::convert::Infallible;
use std::sync::Arc;

use petgraph::Direction;
use petgraph::graphmap::DiGraphMap;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::AccessLevel;
use crate::traits::{EdgeSource, HierarchySource, IdentityHandle, VersionedSource};
use crate::types::{Container, Membership, ShareLink};

pub use cache::MemoryCache;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MemoryStoreError<ID> {
    #[error("container {0} already exists")]
    DuplicateContainer(ID),

    #[error("container {0} not found")]
    UnknownContainer(ID),
}

#[derive(Clone, Debug)]
struct Snapshot<U, ID, P>
where
    ID: IdentityHandle,
{
    /// Incremented on every change.
    version: u64,

    /// Containers added through `add_container`, with their traversal paths.
    containers: BTreeMap<ID, Container<ID>>,

    /// Parent to child edges.
    hierarchy: DiGraphMap<ID, ()>,

    /// Source to target share links, weighted by their cap.
    shares: DiGraphMap<ID, AccessLevel>,

    projects: BTreeMap<ID, BTreeSet<P>>,

    memberships: BTreeMap<U, BTreeMap<ID, AccessLevel>>,

    personal_projects: BTreeMap<U, BTreeSet<P>>,
}

impl<U, ID, P> Default for Snapshot<U, ID, P>
where
    ID: IdentityHandle,
{
    fn default() -> Self {
        Self {
            version: 0,
            containers: Default::default(),
            hierarchy: DiGraphMap::new(),
            shares: DiGraphMap::new(),
            projects: Default::default(),
            memberships: Default::default(),
            personal_projects: Default::default(),
        }
    }
}

impl<U, ID, P> Snapshot<U, ID, P>
where
    ID: IdentityHandle,
{
    fn ensure_known(&self, container: ID) -> Result<(), MemoryStoreError<ID>> {
        if self.hierarchy.contains_node(container) {
            Ok(())
        } else {
            Err(MemoryStoreError::UnknownContainer(container))
        }
    }

    /// Hierarchy edges of the given containers as `(container, neighbour)` pairs.
    fn hierarchy_edges(&self, containers: &[ID], direction: Direction) -> Vec<(ID, ID)> {
        let mut edges = Vec::new();
        for container in containers {
            if !self.hierarchy.contains_node(*container) {
                continue;
            }
            for neighbour in self.hierarchy.neighbors_directed(*container, direction) {
                edges.push((*container, neighbour));
            }
        }
        edges
    }

    /// Share links ending in (`Incoming`) or starting at (`Outgoing`) the given containers.
    fn share_links(&self, containers: &[ID], direction: Direction) -> Vec<ShareLink<ID>> {
        let mut links = BTreeSet::new();
        for container in containers {
            if !self.shares.contains_node(*container) {
                continue;
            }
            for neighbour in self.shares.neighbors_directed(*container, direction) {
                let (source, target) = match direction {
                    Direction::Incoming => (neighbour, *container),
                    Direction::Outgoing => (*container, neighbour),
                };
                if let Some(cap) = self.shares.edge_weight(source, target) {
                    links.insert(ShareLink::new(source, target, *cap));
                }
            }
        }
        links.into_iter().collect()
    }
}

impl<U, ID, P> Snapshot<U, ID, P>
where
    U: Copy + Ord,
    ID: IdentityHandle,
    P: Copy + Ord,
{
    fn projects_owned_by(&self, containers: &[ID]) -> Vec<(ID, P)> {
        let mut projects = Vec::new();
        for container in containers {
            if let Some(owned) = self.projects.get(container) {
                projects.extend(owned.iter().map(|project| (*container, *project)));
            }
        }
        projects
    }

    fn direct_memberships(&self, principals: &[U]) -> Vec<Membership<U, ID>> {
        let mut memberships = Vec::new();
        for principal in principals {
            if let Some(held) = self.memberships.get(principal) {
                memberships.extend(
                    held.iter()
                        .map(|(container, level)| Membership::new(*principal, *container, *level)),
                );
            }
        }
        memberships
    }

    fn directly_owned_projects(&self, principals: &[U]) -> Vec<(U, P)> {
        let mut projects = Vec::new();
        for principal in principals {
            if let Some(owned) = self.personal_projects.get(principal) {
                projects.extend(owned.iter().map(|project| (*principal, *project)));
            }
        }
        projects
    }
}

/// Edge source keeping all containers, memberships and share links in memory.
///
/// Clones share the same data. Every single read observes consistent data, but writes can land
/// between the reads of one resolution. Resolve against `snapshot()` when data changes
/// concurrently.
#[derive(Clone, Debug)]
pub struct MemoryEdgeSource<U, ID, P>
where
    ID: IdentityHandle,
{
    inner: Arc<RwLock<Snapshot<U, ID, P>>>,
}

impl<U, ID, P> Default for MemoryEdgeSource<U, ID, P>
where
    ID: IdentityHandle,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<U, ID, P> MemoryEdgeSource<U, ID, P>
where
    ID: IdentityHandle,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Snapshot::default())),
        }
    }

    /// Version of the current data, incremented on every change.
    pub async fn snapshot_version(&self) -> u64 {
        self.inner.read().await.version
    }

    /// Adds a container below an already existing parent, or as a root.
    pub async fn add_container(
        &self,
        id: ID,
        parent: Option<ID>,
    ) -> Result<Container<ID>, MemoryStoreError<ID>> {
        let mut snapshot = self.inner.write().await;

        if snapshot.hierarchy.contains_node(id) {
            return Err(MemoryStoreError::DuplicateContainer(id));
        }

        let container = match parent {
            Some(parent_id) => {
                let parent = snapshot
                    .containers
                    .get(&parent_id)
                    .ok_or(MemoryStoreError::UnknownContainer(parent_id))?;
                Container::child_of(id, parent)
            }
            None => Container::root(id),
        };

        snapshot.hierarchy.add_node(id);
        if let Some(parent_id) = parent {
            snapshot.hierarchy.add_edge(parent_id, id, ());
        }
        snapshot.containers.insert(id, container.clone());
        snapshot.version += 1;

        Ok(container)
    }

    /// Inserts a raw parent edge without any validation.
    ///
    /// This is how hierarchy data arrives when it is imported from an external system, it can
    /// introduce containers with several parents or cycles. Traversal paths of `container` are
    /// not updated.
    pub async fn insert_parent_edge(&self, child: ID, parent: ID) {
        let mut snapshot = self.inner.write().await;
        snapshot.hierarchy.add_edge(parent, child, ());
        snapshot.version += 1;
    }

    /// Returns a container added through `add_container`.
    pub async fn container(&self, id: ID) -> Option<Container<ID>> {
        self.inner.read().await.containers.get(&id).cloned()
    }

    /// Adds a share link, replacing the cap of an existing link between the same containers.
    pub async fn add_share_link(&self, link: ShareLink<ID>) -> Result<(), MemoryStoreError<ID>> {
        let mut snapshot = self.inner.write().await;
        snapshot.ensure_known(link.source)?;
        snapshot.ensure_known(link.target)?;
        snapshot.shares.add_edge(link.source, link.target, link.cap);
        snapshot.version += 1;
        Ok(())
    }

    /// Removes the share link between two containers.
    ///
    /// Returns `true` if a link was removed.
    pub async fn remove_share_link(&self, source: ID, target: ID) -> bool {
        let mut snapshot = self.inner.write().await;
        let removed = snapshot.shares.remove_edge(source, target).is_some();
        if removed {
            snapshot.version += 1;
        }
        removed
    }
}

impl<U, ID, P> MemoryEdgeSource<U, ID, P>
where
    U: Ord,
    ID: IdentityHandle,
    P: Ord,
{
    /// Assigns a project to a container.
    pub async fn add_project(&self, container: ID, project: P) -> Result<(), MemoryStoreError<ID>> {
        let mut snapshot = self.inner.write().await;
        snapshot.ensure_known(container)?;
        snapshot
            .projects
            .entry(container)
            .or_default()
            .insert(project);
        snapshot.version += 1;
        Ok(())
    }

    /// Adds or updates the membership of a principal in a container.
    pub async fn add_membership(
        &self,
        principal: U,
        container: ID,
        level: AccessLevel,
    ) -> Result<(), MemoryStoreError<ID>> {
        let mut snapshot = self.inner.write().await;
        snapshot.ensure_known(container)?;
        snapshot
            .memberships
            .entry(principal)
            .or_default()
            .insert(container, level);
        snapshot.version += 1;
        Ok(())
    }

    /// Removes the membership of a principal in a container.
    ///
    /// Returns `true` if a membership was removed.
    pub async fn remove_membership(&self, principal: &U, container: ID) -> bool {
        let mut snapshot = self.inner.write().await;
        let removed = snapshot
            .memberships
            .get_mut(principal)
            .is_some_and(|memberships| memberships.remove(&container).is_some());
        if removed {
            snapshot.version += 1;
        }
        removed
    }

    /// Assigns a personal project to a principal.
    pub async fn add_personal_project(&self, principal: U, project: P) {
        let mut snapshot = self.inner.write().await;
        snapshot
            .personal_projects
            .entry(principal)
            .or_default()
            .insert(project);
        snapshot.version += 1;
    }
}

impl<U, ID, P> MemoryEdgeSource<U, ID, P>
where
    U: Clone,
    ID: IdentityHandle,
    P: Clone,
{
    /// Returns a frozen copy of the current data.
    ///
    /// All reads from the copy observe the same version, later writes to this source are not
    /// visible through it.
    pub async fn snapshot(&self) -> MemorySnapshot<U, ID, P> {
        let snapshot = self.inner.read().await;
        MemorySnapshot {
            inner: Arc::new((*snapshot).clone()),
        }
    }
}

impl<U, ID, P> HierarchySource<ID> for MemoryEdgeSource<U, ID, P>
where
    ID: IdentityHandle,
{
    type Error = Infallible;

    async fn parent_edges(&self, containers: &[ID]) -> Result<Vec<(ID, ID)>, Self::Error> {
        let snapshot = self.inner.read().await;
        Ok(snapshot.hierarchy_edges(containers, Direction::Incoming))
    }

    async fn child_edges(&self, containers: &[ID]) -> Result<Vec<(ID, ID)>, Self::Error> {
        let snapshot = self.inner.read().await;
        Ok(snapshot.hierarchy_edges(containers, Direction::Outgoing))
    }
}

impl<U, ID, P> EdgeSource<U, ID, P> for MemoryEdgeSource<U, ID, P>
where
    U: Copy + Ord,
    ID: IdentityHandle,
    P: Copy + Ord,
{
    async fn share_links_into(&self, targets: &[ID]) -> Result<Vec<ShareLink<ID>>, Self::Error> {
        let snapshot = self.inner.read().await;
        Ok(snapshot.share_links(targets, Direction::Incoming))
    }

    async fn share_links_from(&self, sources: &[ID]) -> Result<Vec<ShareLink<ID>>, Self::Error> {
        let snapshot = self.inner.read().await;
        Ok(snapshot.share_links(sources, Direction::Outgoing))
    }

    async fn projects_owned_by(&self, containers: &[ID]) -> Result<Vec<(ID, P)>, Self::Error> {
        let snapshot = self.inner.read().await;
        Ok(snapshot.projects_owned_by(containers))
    }

    async fn direct_memberships(
        &self,
        principals: &[U],
    ) -> Result<Vec<Membership<U, ID>>, Self::Error> {
        let snapshot = self.inner.read().await;
        Ok(snapshot.direct_memberships(principals))
    }

    async fn directly_owned_projects(&self, principals: &[U]) -> Result<Vec<(U, P)>, Self::Error> {
        let snapshot = self.inner.read().await;
        Ok(snapshot.directly_owned_projects(principals))
    }
}

/// Read-only edge source over a frozen copy of a `MemoryEdgeSource`.
///
/// Every read of every resolution against it observes the same version, so resolutions can be
/// cached under `version()`.
#[derive(Debug)]
pub struct MemorySnapshot<U, ID, P>
where
    ID: IdentityHandle,
{
    inner: Arc<Snapshot<U, ID, P>>,
}

impl<U, ID, P> Clone for MemorySnapshot<U, ID, P>
where
    ID: IdentityHandle,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<U, ID, P> MemorySnapshot<U, ID, P>
where
    ID: IdentityHandle,
{
    pub fn version(&self) -> u64 {
        self.inner.version
    }
}

impl<U, ID, P> VersionedSource for MemorySnapshot<U, ID, P>
where
    ID: IdentityHandle,
{
    fn snapshot_version(&self) -> u64 {
        self.version()
    }
}

impl<U, ID, P> HierarchySource<ID> for MemorySnapshot<U, ID, P>
where
    ID: IdentityHandle,
{
    type Error = Infallible;

    async fn parent_edges(&self, containers: &[ID]) -> Result<Vec<(ID, ID)>, Self::Error> {
        Ok(self.inner.hierarchy_edges(containers, Direction::Incoming))
    }

    async fn child_edges(&self, containers: &[ID]) -> Result<Vec<(ID, ID)>, Self::Error> {
        Ok(self.inner.hierarchy_edges(containers, Direction::Outgoing))
    }
}

impl<U, ID, P> EdgeSource<U, ID, P> for MemorySnapshot<U, ID, P>
where
    U: Copy + Ord,
    ID: IdentityHandle,
    P: Copy + Ord,
{
    async fn share_links_into(&self, targets: &[ID]) -> Result<Vec<ShareLink<ID>>, Self::Error> {
        Ok(self.inner.share_links(targets, Direction::Incoming))
    }

    async fn share_links_from(&self, sources: &[ID]) -> Result<Vec<ShareLink<ID>>, Self::Error> {
        Ok(self.inner.share_links(sources, Direction::Outgoing))
    }

    async fn projects_owned_by(&self, containers: &[ID]) -> Result<Vec<(ID, P)>, Self::Error> {
        Ok(self.inner.projects_owned_by(containers))
    }

    async fn direct_memberships(
        &self,
        principals: &[U],
    ) -> Result<Vec<Membership<U, ID>>, Self::Error> {
        Ok(self.inner.direct_memberships(principals))
    }

    async fn directly_owned_projects(&self, principals: &[U]) -> Result<Vec<(U, P)>, Self::Error> {
        Ok(self.inner.directly_owned_projects(principals))
    }
}

#[cfg(test)]
mod tests {
    use crate::AccessLevel;
    use crate::traits::{EdgeSource, HierarchySource, VersionedSource};
    use crate::types::{Membership, ShareLink};

    use super::{MemoryEdgeSource, MemoryStoreError};

    type TestSource = MemoryEdgeSource<u32, u32, u32>;

    #[tokio::test]
    async fn containers_and_traversal_paths() {
        let source = TestSource::new();
        source.add_container(1, None).await.unwrap();
        source.add_container(2, Some(1)).await.unwrap();
        let leaf = source.add_container(3, Some(2)).await.unwrap();

        assert_eq!(leaf.traversal_path(), &[1, 2, 3]);
        assert_eq!(source.container(3).await, Some(leaf));

        assert_eq!(
            source.add_container(2, None).await,
            Err(MemoryStoreError::DuplicateContainer(2))
        );
        assert_eq!(
            source.add_container(4, Some(9)).await,
            Err(MemoryStoreError::UnknownContainer(9))
        );

        let mut parents = source.parent_edges(&[3, 2, 1, 9]).await.unwrap();
        parents.sort();
        assert_eq!(parents, vec![(2, 1), (3, 2)]);

        let children = source.child_edges(&[1]).await.unwrap();
        assert_eq!(children, vec![(1, 2)]);
    }

    #[tokio::test]
    async fn share_links_in_both_directions() {
        let source = TestSource::new();
        for id in [1, 2, 3] {
            source.add_container(id, None).await.unwrap();
        }
        source
            .add_share_link(ShareLink::new(1, 3, AccessLevel::Reporter))
            .await
            .unwrap();
        source
            .add_share_link(ShareLink::new(2, 3, AccessLevel::Owner))
            .await
            .unwrap();

        assert_eq!(
            source.share_links_into(&[3]).await.unwrap(),
            vec![
                ShareLink::new(1, 3, AccessLevel::Reporter),
                ShareLink::new(2, 3, AccessLevel::Owner),
            ]
        );
        assert_eq!(
            source.share_links_from(&[2]).await.unwrap(),
            vec![ShareLink::new(2, 3, AccessLevel::Owner)]
        );
        assert!(source.share_links_from(&[3]).await.unwrap().is_empty());

        assert!(source.remove_share_link(1, 3).await);
        assert!(!source.remove_share_link(1, 3).await);
        assert_eq!(source.share_links_into(&[3]).await.unwrap().len(), 1);

        assert_eq!(
            source
                .add_share_link(ShareLink::new(1, 7, AccessLevel::Guest))
                .await,
            Err(MemoryStoreError::UnknownContainer(7))
        );
    }

    #[tokio::test]
    async fn memberships_and_projects() {
        let source = TestSource::new();
        source.add_container(1, None).await.unwrap();
        source.add_project(1, 100).await.unwrap();
        source
            .add_membership(7, 1, AccessLevel::Guest)
            .await
            .unwrap();
        // Updating a membership replaces its level.
        source
            .add_membership(7, 1, AccessLevel::Developer)
            .await
            .unwrap();
        source.add_personal_project(7, 200).await;

        assert_eq!(
            source.direct_memberships(&[7, 8]).await.unwrap(),
            vec![Membership::new(7, 1, AccessLevel::Developer)]
        );
        assert_eq!(source.projects_owned_by(&[1]).await.unwrap(), vec![(1, 100)]);
        assert_eq!(
            source.directly_owned_projects(&[7]).await.unwrap(),
            vec![(7, 200)]
        );

        assert!(source.remove_membership(&7, 1).await);
        assert!(source.direct_memberships(&[7]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn version_changes_with_data() {
        let source = TestSource::new();
        let initial = source.snapshot_version().await;

        source.add_container(1, None).await.unwrap();
        let after_insert = source.snapshot_version().await;
        assert!(after_insert > initial);

        // Failed or no-op writes keep the version.
        let _ = source.add_container(1, None).await;
        assert!(!source.remove_membership(&1, 1).await);
        assert_eq!(source.snapshot_version().await, after_insert);
    }

    #[tokio::test]
    async fn snapshot_is_frozen() {
        let source = TestSource::new();
        source.add_container(1, None).await.unwrap();
        source.add_container(2, Some(1)).await.unwrap();
        source
            .add_membership(7, 2, AccessLevel::Reporter)
            .await
            .unwrap();

        let snapshot = source.snapshot().await;
        let version = source.snapshot_version().await;
        assert_eq!(snapshot.version(), version);
        assert_eq!(snapshot.snapshot_version(), version);

        source.add_container(3, Some(2)).await.unwrap();
        source.add_project(2, 200).await.unwrap();
        assert!(source.remove_membership(&7, 2).await);
        assert!(source.snapshot_version().await > version);

        // Writes after taking the snapshot are not visible through it.
        assert_eq!(snapshot.version(), version);
        assert!(snapshot.child_edges(&[2]).await.unwrap().is_empty());
        assert!(snapshot.projects_owned_by(&[2]).await.unwrap().is_empty());
        assert_eq!(
            snapshot.direct_memberships(&[7]).await.unwrap(),
            vec![Membership::new(7, 2, AccessLevel::Reporter)]
        );

        assert_eq!(source.child_edges(&[2]).await.unwrap(), vec![(2, 3)]);
        assert!(source.direct_memberships(&[7]).await.unwrap().is_empty());
    }
}
