// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolve the effective access level of a principal on every project it can reach.
//!
//! Three independent relations contribute project grants:
//!
//! 1. Projects the principal owns personally, granted as owner.
//! 2. Projects of every container at or below a container the principal is a member of, granted
//!    at the membership level. Access does not decay with depth.
//! 3. Projects of every container at or below the target of a share link whose source the
//!    principal is a member of, granted at the membership level but never above the link's cap.
//!
//! Within one share path levels are combined with `min`, across independent paths with `max`.
//! The final grant of a project is the maximum over all relations and paths.
mod relations;

use std::collections::{BTreeMap, BTreeSet};
use std::marker::PhantomData;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::AccessLevel;
use crate::budget::Budget;
use crate::closure::{ClosureEngine, ClosureQuery, CycleEvent};
use crate::config::{Config, ResolveOptions};
use crate::error::ResolverError;
use crate::traits::{EdgeSource, IdentityHandle, ResolutionCache, VersionedSource};
use crate::types::{ProjectGrant, ShareLink};

/// Deduplicated set of project grants, holding the greatest level seen per project.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrantSet<P> {
    grants: BTreeMap<P, AccessLevel>,
}

impl<P> Default for GrantSet<P> {
    fn default() -> Self {
        Self {
            grants: BTreeMap::new(),
        }
    }
}

impl<P> GrantSet<P>
where
    P: Copy + Ord,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant access to a project, keeping the greater level if the project was already granted.
    pub fn grant(&mut self, project: P, level: AccessLevel) {
        self.grants
            .entry(project)
            .and_modify(|current| *current = current.combine(level))
            .or_insert(level);
    }

    /// Merge all grants of another set into this one.
    pub fn merge(&mut self, other: GrantSet<P>) {
        for (project, level) in other.grants {
            self.grant(project, level);
        }
    }

    pub fn level(&self, project: &P) -> Option<AccessLevel> {
        self.grants.get(project).copied()
    }

    pub fn contains(&self, project: &P) -> bool {
        self.grants.contains_key(project)
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    /// All grants in ascending project order.
    pub fn iter(&self) -> impl Iterator<Item = ProjectGrant<P>> + '_ {
        self.grants
            .iter()
            .map(|(project, level)| ProjectGrant {
                project: *project,
                level: *level,
            })
    }

    pub fn into_grants(self) -> Vec<ProjectGrant<P>> {
        self.grants
            .into_iter()
            .map(|(project, level)| ProjectGrant { project, level })
            .collect()
    }
}

impl<P> FromIterator<ProjectGrant<P>> for GrantSet<P>
where
    P: Copy + Ord,
{
    fn from_iter<T: IntoIterator<Item = ProjectGrant<P>>>(iter: T) -> Self {
        let mut grants = GrantSet::new();
        for grant in iter {
            grants.grant(grant.project, grant.level);
        }
        grants
    }
}

/// Observations made while resolving which do not affect the result.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResolutionMetadata {
    /// Number of distinct hierarchy edges which were not followed because they close a cycle.
    pub cycles_detected: usize,

    /// Deepest depth any closure reached, base containers have depth 1.
    pub max_depth: usize,

    /// Containers visited, counted once per closure they are part of.
    pub visited: usize,

    /// Number of batched reads issued against the edge source.
    pub edge_source_calls: usize,
}

impl ResolutionMetadata {
    pub fn cycle_detected(&self) -> bool {
        self.cycles_detected > 0
    }

    fn from_budget(budget: &Budget, cycles_detected: usize) -> Self {
        Self {
            cycles_detected,
            max_depth: budget.max_depth_reached(),
            visited: budget.visited(),
            edge_source_calls: budget.edge_source_calls(),
        }
    }
}

/// All projects a principal can access with their effective access levels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution<P> {
    grants: GrantSet<P>,
    metadata: ResolutionMetadata,
}

impl<P> Resolution<P>
where
    P: Copy + Ord,
{
    pub fn new(grants: GrantSet<P>, metadata: ResolutionMetadata) -> Self {
        Self { grants, metadata }
    }

    pub fn grants(&self) -> &GrantSet<P> {
        &self.grants
    }

    pub fn metadata(&self) -> &ResolutionMetadata {
        &self.metadata
    }

    /// Effective access level on a project, `None` if the project is not accessible.
    pub fn level(&self, project: &P) -> Option<AccessLevel> {
        self.grants.level(project)
    }

    /// Returns `true` if the principal holds at least the required level on a project.
    pub fn can_access(&self, project: &P, required: AccessLevel) -> bool {
        self.level(project).is_some_and(|level| level >= required)
    }

    pub fn into_grants(self) -> Vec<ProjectGrant<P>> {
        self.grants.into_grants()
    }
}

/// Resolver for project access over a container hierarchy.
///
/// The resolver is stateless: every call reads from the edge source, allocates its own closures
/// and discards them afterwards. It can be shared and called concurrently.
///
/// The generic parameters are the principal id `U`, container id `ID`, project id `P` and the
/// edge source `S`.
#[derive(Debug)]
pub struct Resolver<U, ID, P, S> {
    source: S,
    config: Config,
    _phantom: PhantomData<fn() -> (U, ID, P)>,
}

impl<U, ID, P, S> Clone for Resolver<U, ID, P, S>
where
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            config: self.config.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<U, ID, P, S> Resolver<U, ID, P, S>
where
    U: IdentityHandle,
    ID: IdentityHandle,
    P: IdentityHandle,
    S: EdgeSource<U, ID, P>,
{
    pub fn new(source: S) -> Self {
        Self::with_config(source, Config::default())
    }

    pub fn with_config(source: S, config: Config) -> Self {
        Self {
            source,
            config,
            _phantom: PhantomData,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolve all projects the principal can access and the access level on each of them.
    ///
    /// Either the complete set of grants is returned or an error, never a partial result.
    pub async fn resolve(
        &self,
        principal: U,
        options: ResolveOptions,
    ) -> Result<Resolution<P>, ResolverError<S::Error>> {
        debug!(%principal, "resolving project access");

        let mut engine = self.engine(&options);
        let mut cycles: BTreeSet<CycleEvent<ID>> = BTreeSet::new();

        let direct =
            relations::direct_project_grants::<U, ID, P, S>(&mut engine, principal).await?;

        let memberships =
            relations::membership_levels::<U, ID, P, S>(&mut engine, principal).await?;
        let (container_levels, membership_grants) = relations::membership_grants::<U, ID, P, S>(
            &mut engine,
            &memberships,
            &mut cycles,
        )
        .await?;
        let shared_grants = relations::shared_grants::<U, ID, P, S>(
            &mut engine,
            &memberships,
            &container_levels,
            &mut cycles,
        )
        .await?;

        let mut grants = direct;
        grants.merge(membership_grants);
        grants.merge(shared_grants);

        let metadata = ResolutionMetadata::from_budget(engine.budget(), cycles.len());
        if metadata.cycle_detected() {
            warn!(
                %principal,
                cycles = metadata.cycles_detected,
                "resolved project access over a hierarchy containing cycles"
            );
        }

        debug!(
            %principal,
            projects = grants.len(),
            memberships = memberships.len(),
            visited = metadata.visited,
            edge_source_calls = metadata.edge_source_calls,
            "resolved project access"
        );

        Ok(Resolution::new(grants, metadata))
    }

    /// Resolve through an externally owned cache.
    ///
    /// The edge source answers every read from one fixed snapshot, its version keys the cache.
    /// On a miss the principal is resolved and the result stored under that version. Cache
    /// failures are logged and otherwise ignored, they never fail the call.
    pub async fn resolve_cached<C>(
        &self,
        cache: &C,
        principal: U,
        options: ResolveOptions,
    ) -> Result<Resolution<P>, ResolverError<S::Error>>
    where
        C: ResolutionCache<U, P>,
        S: VersionedSource,
    {
        let snapshot_version = self.source.snapshot_version();

        match cache.get(&principal, snapshot_version).await {
            Ok(Some(resolution)) => {
                debug!(%principal, snapshot_version, "resolution cache hit");
                return Ok(resolution);
            }
            Ok(None) => (),
            Err(err) => warn!(%principal, "reading from resolution cache failed: {err}"),
        }

        let resolution = self.resolve(principal, options).await?;

        if let Err(err) = cache
            .set(principal, snapshot_version, resolution.clone())
            .await
        {
            warn!(%principal, "writing to resolution cache failed: {err}");
        }

        Ok(resolution)
    }

    /// Every share link which exposes one of the given containers to another container, either
    /// directly or through one of their ancestors.
    pub async fn incoming_shares(
        &self,
        containers: &[ID],
        options: ResolveOptions,
    ) -> Result<Vec<ShareLink<ID>>, ResolverError<S::Error>> {
        let mut engine = self.engine(&options);

        let ancestors = engine
            .ancestors(ClosureQuery::new(containers.iter().copied()))
            .await?;
        if ancestors.is_empty() {
            return Ok(Vec::new());
        }

        let targets: Vec<ID> = ancestors.containers().collect();
        let links = engine
            .budget_mut()
            .fetch(self.source.share_links_into(&targets))
            .await?;

        let links: BTreeSet<ShareLink<ID>> = links
            .into_iter()
            .filter(|link| ancestors.contains(&link.target))
            .collect();
        Ok(links.into_iter().collect())
    }

    fn engine(&self, options: &ResolveOptions) -> ClosureEngine<'_, S> {
        let limits = options.resolve_against(&self.config, Instant::now());
        let budget = Budget::new(limits).with_cancel_token(options.cancel_token.clone());
        ClosureEngine::with_budget(&self.source, budget)
    }
}
