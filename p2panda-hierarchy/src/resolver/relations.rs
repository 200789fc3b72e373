// SPDX-License-Identifier: MIT OR Apache-2.0

//! The three project-access relations which are unioned into a resolution.
use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, trace};

use crate::AccessLevel;
use crate::closure::{ClosureEngine, ClosureQuery, CycleEvent, Direction};
use crate::error::ResolverError;
use crate::resolver::GrantSet;
use crate::traits::{EdgeSource, IdentityHandle};
use crate::types::ProjectGrant;

/// Effective access level per container.
pub(crate) type ContainerAccess<ID> = BTreeMap<ID, AccessLevel>;

fn raise<ID>(levels: &mut ContainerAccess<ID>, container: ID, level: AccessLevel)
where
    ID: IdentityHandle,
{
    levels
        .entry(container)
        .and_modify(|current| *current = current.combine(level))
        .or_insert(level);
}

/// Projects the principal owns personally, outside of any container.
pub(crate) async fn direct_project_grants<U, ID, P, S>(
    engine: &mut ClosureEngine<'_, S>,
    principal: U,
) -> Result<GrantSet<P>, ResolverError<S::Error>>
where
    U: IdentityHandle,
    ID: IdentityHandle,
    P: IdentityHandle,
    S: EdgeSource<U, ID, P>,
{
    let source = engine.source();
    let owned = engine
        .budget_mut()
        .fetch(source.directly_owned_projects(&[principal]))
        .await?;

    let grants = owned
        .into_iter()
        .filter(|(owner, _)| *owner == principal)
        .map(|(_, project)| ProjectGrant {
            project,
            level: AccessLevel::Owner,
        })
        .collect();
    Ok(grants)
}

/// Direct memberships of the principal, with several memberships on the same container folded
/// into the greatest level.
pub(crate) async fn membership_levels<U, ID, P, S>(
    engine: &mut ClosureEngine<'_, S>,
    principal: U,
) -> Result<ContainerAccess<ID>, ResolverError<S::Error>>
where
    U: IdentityHandle,
    ID: IdentityHandle,
    P: IdentityHandle,
    S: EdgeSource<U, ID, P>,
{
    let source = engine.source();
    let memberships = engine
        .budget_mut()
        .fetch(source.direct_memberships(&[principal]))
        .await?;

    let mut levels = ContainerAccess::new();
    for membership in memberships {
        if membership.principal == principal {
            raise(&mut levels, membership.container, membership.level);
        }
    }
    Ok(levels)
}

/// Projects of every container at or below a membership container.
///
/// Returns the effective level on every container reached as well, it is the principal's level
/// "on or above" a container when looking for share sources.
pub(crate) async fn membership_grants<U, ID, P, S>(
    engine: &mut ClosureEngine<'_, S>,
    memberships: &ContainerAccess<ID>,
    cycles: &mut BTreeSet<CycleEvent<ID>>,
) -> Result<(ContainerAccess<ID>, GrantSet<P>), ResolverError<S::Error>>
where
    U: IdentityHandle,
    ID: IdentityHandle,
    P: IdentityHandle,
    S: EdgeSource<U, ID, P>,
{
    let closures = engine
        .descendants_per_base(memberships.keys().copied())
        .await?;

    let mut container_levels = ContainerAccess::new();
    for (base, closure) in &closures {
        let Some(level) = memberships.get(base) else {
            continue;
        };

        cycles.extend(closure.cycles().iter().copied());
        for container in closure.containers() {
            raise(&mut container_levels, container, *level);
        }
    }

    let grants = project_grants::<U, ID, P, S>(engine, &container_levels).await?;
    Ok((container_levels, grants))
}

/// Projects of every container at or below the target of a share link the principal can use.
///
/// A link is usable when its source is a membership container, an ancestor of one, or below one.
/// The principal's level on the source is capped by the link and the capped level applies to the
/// whole descendant closure of the target. When the target lies above the source this includes the
/// source and its siblings.
pub(crate) async fn shared_grants<U, ID, P, S>(
    engine: &mut ClosureEngine<'_, S>,
    memberships: &ContainerAccess<ID>,
    container_levels: &ContainerAccess<ID>,
    cycles: &mut BTreeSet<CycleEvent<ID>>,
) -> Result<GrantSet<P>, ResolverError<S::Error>>
where
    U: IdentityHandle,
    ID: IdentityHandle,
    P: IdentityHandle,
    S: EdgeSource<U, ID, P>,
{
    // Level on every container the principal is a member of, on or above.
    let mut source_levels = container_levels.clone();

    // Level on every ancestor of a membership container.
    let ancestors = engine
        .ancestors_per_base(memberships.keys().copied())
        .await?;
    for (base, closure) in &ancestors {
        let Some(level) = memberships.get(base) else {
            continue;
        };

        cycles.extend(closure.cycles().iter().copied());
        for container in closure.containers() {
            raise(&mut source_levels, container, *level);
        }
    }

    if source_levels.is_empty() {
        return Ok(GrantSet::new());
    }

    let sources: Vec<ID> = source_levels.keys().copied().collect();
    let source = engine.source();
    let links = engine
        .budget_mut()
        .fetch(source.share_links_from(&sources))
        .await?;

    let links: BTreeMap<_, AccessLevel> = links
        .into_iter()
        .filter_map(|link| {
            source_levels
                .get(&link.source)
                .map(|level| (link, level.capped_by(link.cap)))
        })
        .collect();

    if links.is_empty() {
        return Ok(GrantSet::new());
    }

    let queries: Vec<ClosureQuery<ID>> = links
        .keys()
        .map(|link| ClosureQuery::new([link.target]))
        .collect();
    let closures = engine.walk(Direction::Descendants, &queries).await?;

    let mut shared_levels = ContainerAccess::new();
    for ((link, capped), closure) in links.iter().zip(closures) {
        trace!(
            source = %link.source,
            target = %link.target,
            cap = %link.cap,
            level = %capped,
            containers = closure.len(),
            "following share link"
        );

        cycles.extend(closure.cycles().iter().copied());
        for container in closure.containers() {
            raise(&mut shared_levels, container, *capped);
        }
    }

    debug!(
        links = links.len(),
        containers = shared_levels.len(),
        "resolved shared containers"
    );

    project_grants::<U, ID, P, S>(engine, &shared_levels).await
}

/// Grant every project owned by one of the containers at that container's level.
async fn project_grants<U, ID, P, S>(
    engine: &mut ClosureEngine<'_, S>,
    levels: &ContainerAccess<ID>,
) -> Result<GrantSet<P>, ResolverError<S::Error>>
where
    U: IdentityHandle,
    ID: IdentityHandle,
    P: IdentityHandle,
    S: EdgeSource<U, ID, P>,
{
    if levels.is_empty() {
        return Ok(GrantSet::new());
    }

    let containers: Vec<ID> = levels.keys().copied().collect();
    let source = engine.source();
    let owned = engine
        .budget_mut()
        .fetch(source.projects_owned_by(&containers))
        .await?;

    let mut grants = GrantSet::new();
    for (container, project) in owned {
        if let Some(level) = levels.get(&container) {
            grants.grant(project, *level);
        }
    }
    Ok(grants)
}
