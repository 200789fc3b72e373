// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities.
mod random;

use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use thiserror::Error;

use crate::memory::MemoryEdgeSource;
use crate::resolver::Resolver;
use crate::traits::{EdgeSource, HierarchySource, IdentityHandle, VersionedSource};
use crate::types::{Membership, ShareLink};

pub use random::RandomHierarchy;

impl IdentityHandle for char {}

pub type UserId = char;
pub type ContainerId = u32;
pub type ProjectId = u32;

pub type TestSource = MemoryEdgeSource<UserId, ContainerId, ProjectId>;
pub type TestResolver<S = TestSource> = Resolver<UserId, ContainerId, ProjectId, S>;

pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

/// Adds a chain of containers, each nested inside the previous one.
pub async fn chain(source: &TestSource, ids: &[ContainerId]) {
    let mut parent = None;
    for id in ids {
        source
            .add_container(*id, parent)
            .await
            .expect("container ids are unique");
        parent = Some(*id);
    }
}

#[derive(Debug, Error)]
#[error("edge source failed on call {call}")]
pub struct EdgeSourceFailure {
    pub call: usize,
}

/// Edge source which fails every read starting with a given call.
#[derive(Clone, Debug)]
pub struct FailingEdgeSource<S> {
    inner: S,
    fail_from: usize,
    calls: Arc<AtomicUsize>,
}

impl<S> FailingEdgeSource<S> {
    /// Calls are counted from 1, `fail_from = 1` fails every read.
    pub fn new(inner: S, fail_from: usize) -> Self {
        Self {
            inner,
            fail_from,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_call(&self) -> Result<(), EdgeSourceFailure> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call >= self.fail_from {
            Err(EdgeSourceFailure { call })
        } else {
            Ok(())
        }
    }
}

impl<S> VersionedSource for FailingEdgeSource<S>
where
    S: VersionedSource,
{
    fn snapshot_version(&self) -> u64 {
        self.inner.snapshot_version()
    }
}

impl<S, ID> HierarchySource<ID> for FailingEdgeSource<S>
where
    S: HierarchySource<ID, Error = Infallible>,
{
    type Error = EdgeSourceFailure;

    async fn parent_edges(&self, containers: &[ID]) -> Result<Vec<(ID, ID)>, Self::Error> {
        self.next_call()?;
        self.inner
            .parent_edges(containers)
            .await
            .map_err(|err| match err {})
    }

    async fn child_edges(&self, containers: &[ID]) -> Result<Vec<(ID, ID)>, Self::Error> {
        self.next_call()?;
        self.inner
            .child_edges(containers)
            .await
            .map_err(|err| match err {})
    }
}

impl<S, U, ID, P> EdgeSource<U, ID, P> for FailingEdgeSource<S>
where
    S: EdgeSource<U, ID, P, Error = Infallible>,
{
    async fn share_links_into(&self, targets: &[ID]) -> Result<Vec<ShareLink<ID>>, Self::Error> {
        self.next_call()?;
        self.inner
            .share_links_into(targets)
            .await
            .map_err(|err| match err {})
    }

    async fn share_links_from(&self, sources: &[ID]) -> Result<Vec<ShareLink<ID>>, Self::Error> {
        self.next_call()?;
        self.inner
            .share_links_from(sources)
            .await
            .map_err(|err| match err {})
    }

    async fn projects_owned_by(&self, containers: &[ID]) -> Result<Vec<(ID, P)>, Self::Error> {
        self.next_call()?;
        self.inner
            .projects_owned_by(containers)
            .await
            .map_err(|err| match err {})
    }

    async fn direct_memberships(
        &self,
        principals: &[U],
    ) -> Result<Vec<Membership<U, ID>>, Self::Error> {
        self.next_call()?;
        self.inner
            .direct_memberships(principals)
            .await
            .map_err(|err| match err {})
    }

    async fn directly_owned_projects(&self, principals: &[U]) -> Result<Vec<(U, P)>, Self::Error> {
        self.next_call()?;
        self.inner
            .directly_owned_projects(principals)
            .await
            .map_err(|err| match err {})
    }
}

/// Edge source which sleeps before answering every read.
#[derive(Clone, Debug)]
pub struct SlowEdgeSource<S> {
    inner: S,
    latency: Duration,
    calls: Arc<AtomicUsize>,
}

impl<S> SlowEdgeSource<S> {
    pub fn new(inner: S, latency: Duration) -> Self {
        Self {
            inner,
            latency,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of reads which were started, including abandoned ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn delay(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
    }
}

impl<S> VersionedSource for SlowEdgeSource<S>
where
    S: VersionedSource,
{
    fn snapshot_version(&self) -> u64 {
        self.inner.snapshot_version()
    }
}

impl<S, ID> HierarchySource<ID> for SlowEdgeSource<S>
where
    S: HierarchySource<ID>,
{
    type Error = S::Error;

    async fn parent_edges(&self, containers: &[ID]) -> Result<Vec<(ID, ID)>, Self::Error> {
        self.delay().await;
        self.inner.parent_edges(containers).await
    }

    async fn child_edges(&self, containers: &[ID]) -> Result<Vec<(ID, ID)>, Self::Error> {
        self.delay().await;
        self.inner.child_edges(containers).await
    }
}

impl<S, U, ID, P> EdgeSource<U, ID, P> for SlowEdgeSource<S>
where
    S: EdgeSource<U, ID, P>,
{
    async fn share_links_into(&self, targets: &[ID]) -> Result<Vec<ShareLink<ID>>, Self::Error> {
        self.delay().await;
        self.inner.share_links_into(targets).await
    }

    async fn share_links_from(&self, sources: &[ID]) -> Result<Vec<ShareLink<ID>>, Self::Error> {
        self.delay().await;
        self.inner.share_links_from(sources).await
    }

    async fn projects_owned_by(&self, containers: &[ID]) -> Result<Vec<(ID, P)>, Self::Error> {
        self.delay().await;
        self.inner.projects_owned_by(containers).await
    }

    async fn direct_memberships(
        &self,
        principals: &[U],
    ) -> Result<Vec<Membership<U, ID>>, Self::Error> {
        self.delay().await;
        self.inner.direct_memberships(principals).await
    }

    async fn directly_owned_projects(&self, principals: &[U]) -> Result<Vec<(U, P)>, Self::Error> {
        self.delay().await;
        self.inner.directly_owned_projects(principals).await
    }
}
