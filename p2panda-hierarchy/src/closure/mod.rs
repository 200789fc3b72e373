// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ancestor and descendant closures over the container hierarchy.
//!
//! A closure is the set of containers reachable from a base set by repeatedly following one edge
//! direction, each tagged with the depth it was first reached at. Traversal is a breadth-first
//! search processed round by round, every round issues exactly one batched read for the whole
//! frontier.
//!
//! Hierarchy data is external and might be corrupted. Every frontier item carries the path of
//! containers taken to reach it and an edge leading back onto that path is recorded as a cycle
//! instead of being followed. Additionally each container is expanded at most once per closure,
//! a container reached again from another branch is not considered a cycle.
#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, BTreeSet};

use tracing::{trace, warn};

use crate::budget::Budget;
use crate::config::Limits;
use crate::error::ResolverError;
use crate::traits::{HierarchySource, IdentityHandle};

/// Edge direction a closure follows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Follow parent edges upwards.
    Ancestors,

    /// Follow child edges downwards.
    Descendants,
}

/// A container which is part of a closure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClosureNode<ID> {
    /// Depth the container was first reached at, base containers have depth 1.
    pub depth: usize,

    /// Base container this container was reached from. On equal depth the lowest base id wins.
    pub origin: ID,

    /// `true` if an edge leading back to this container closed a cycle.
    pub tree_cycle: bool,
}

/// An edge which would have closed a cycle and was not followed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CycleEvent<ID> {
    pub from: ID,
    pub to: ID,
}

/// Result of one traversal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Closure<ID> {
    direction: Direction,
    nodes: BTreeMap<ID, ClosureNode<ID>>,
    cycles: Vec<CycleEvent<ID>>,
}

impl<ID> Closure<ID>
where
    ID: IdentityHandle,
{
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            nodes: BTreeMap::new(),
            cycles: Vec::new(),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn get(&self, container: &ID) -> Option<&ClosureNode<ID>> {
        self.nodes.get(container)
    }

    pub fn contains(&self, container: &ID) -> bool {
        self.nodes.contains_key(container)
    }

    pub fn depth(&self, container: &ID) -> Option<usize> {
        self.nodes.get(container).map(|node| node.depth)
    }

    /// All containers of this closure in ascending id order.
    pub fn containers(&self) -> impl Iterator<Item = ID> + '_ {
        self.nodes.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ID, &ClosureNode<ID>)> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Deepest depth reached, 0 for an empty closure.
    pub fn max_depth(&self) -> usize {
        self.nodes
            .values()
            .map(|node| node.depth)
            .max()
            .unwrap_or_default()
    }

    /// Edges which were not followed because they would have closed a cycle.
    pub fn cycles(&self) -> &[CycleEvent<ID>] {
        &self.cycles
    }

    pub fn has_cycles(&self) -> bool {
        !self.cycles.is_empty()
    }

    fn insert(&mut self, container: ID, node: ClosureNode<ID>) {
        self.nodes.insert(container, node);
    }

    fn mark_cycle(&mut self, from: ID, to: ID) {
        if let Some(node) = self.nodes.get_mut(&to) {
            node.tree_cycle = true;
        }

        let event = CycleEvent { from, to };
        if !self.cycles.contains(&event) {
            self.cycles.push(event);
        }
    }
}

/// Base set of a closure, optionally bounded by a container the traversal must not include.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClosureQuery<ID> {
    bases: BTreeSet<ID>,
    stop_at: Option<ID>,
}

impl<ID> ClosureQuery<ID>
where
    ID: IdentityHandle,
{
    pub fn new(bases: impl IntoIterator<Item = ID>) -> Self {
        Self {
            bases: bases.into_iter().collect(),
            stop_at: None,
        }
    }

    /// Never include or cross this container.
    pub fn stop_at(mut self, container: ID) -> Self {
        self.stop_at = Some(container);
        self
    }

    pub fn bases(&self) -> impl Iterator<Item = ID> + '_ {
        self.bases.iter().copied()
    }

    fn excludes(&self, container: &ID) -> bool {
        self.stop_at.as_ref() == Some(container)
    }
}

/// Item on the traversal frontier.
#[derive(Debug)]
struct FrontierItem<ID> {
    /// Index of the closure this item belongs to.
    closure: usize,
    container: ID,
    origin: ID,
    /// Containers taken to reach this one, starting at the origin and including itself.
    path: Vec<ID>,
}

/// Computes closures against an edge source, accounting all work in a shared `Budget`.
#[derive(Debug)]
pub struct ClosureEngine<'a, S> {
    source: &'a S,
    budget: Budget,
}

impl<'a, S> ClosureEngine<'a, S> {
    pub fn new(source: &'a S, limits: Limits) -> Self {
        Self::with_budget(source, Budget::new(limits))
    }

    pub fn with_budget(source: &'a S, budget: Budget) -> Self {
        Self { source, budget }
    }

    pub fn budget(&self) -> &Budget {
        &self.budget
    }

    pub(crate) fn budget_mut(&mut self) -> &mut Budget {
        &mut self.budget
    }

    pub fn source(&self) -> &'a S {
        self.source
    }

    /// Base containers plus every container reachable by following parent edges.
    pub async fn ancestors<ID>(
        &mut self,
        query: ClosureQuery<ID>,
    ) -> Result<Closure<ID>, ResolverError<S::Error>>
    where
        ID: IdentityHandle,
        S: HierarchySource<ID>,
    {
        self.single(Direction::Ancestors, query).await
    }

    /// Base containers plus every container reachable by following child edges.
    pub async fn descendants<ID>(
        &mut self,
        query: ClosureQuery<ID>,
    ) -> Result<Closure<ID>, ResolverError<S::Error>>
    where
        ID: IdentityHandle,
        S: HierarchySource<ID>,
    {
        self.single(Direction::Descendants, query).await
    }

    /// One independent ancestor closure per base container.
    pub async fn ancestors_per_base<ID>(
        &mut self,
        bases: impl IntoIterator<Item = ID>,
    ) -> Result<BTreeMap<ID, Closure<ID>>, ResolverError<S::Error>>
    where
        ID: IdentityHandle,
        S: HierarchySource<ID>,
    {
        self.per_base(Direction::Ancestors, bases).await
    }

    /// One independent descendant closure per base container.
    pub async fn descendants_per_base<ID>(
        &mut self,
        bases: impl IntoIterator<Item = ID>,
    ) -> Result<BTreeMap<ID, Closure<ID>>, ResolverError<S::Error>>
    where
        ID: IdentityHandle,
        S: HierarchySource<ID>,
    {
        self.per_base(Direction::Descendants, bases).await
    }

    async fn single<ID>(
        &mut self,
        direction: Direction,
        query: ClosureQuery<ID>,
    ) -> Result<Closure<ID>, ResolverError<S::Error>>
    where
        ID: IdentityHandle,
        S: HierarchySource<ID>,
    {
        let mut closures = self.walk(direction, &[query]).await?;
        Ok(closures.pop().unwrap_or_else(|| Closure::new(direction)))
    }

    async fn per_base<ID>(
        &mut self,
        direction: Direction,
        bases: impl IntoIterator<Item = ID>,
    ) -> Result<BTreeMap<ID, Closure<ID>>, ResolverError<S::Error>>
    where
        ID: IdentityHandle,
        S: HierarchySource<ID>,
    {
        let bases: BTreeSet<ID> = bases.into_iter().collect();
        let queries: Vec<ClosureQuery<ID>> = bases
            .iter()
            .map(|base| ClosureQuery::new([*base]))
            .collect();
        let closures = self.walk(direction, &queries).await?;
        Ok(bases.into_iter().zip(closures).collect())
    }

    /// Compute one closure per query, sharing one batched read per round across all of them.
    pub async fn walk<ID>(
        &mut self,
        direction: Direction,
        queries: &[ClosureQuery<ID>],
    ) -> Result<Vec<Closure<ID>>, ResolverError<S::Error>>
    where
        ID: IdentityHandle,
        S: HierarchySource<ID>,
    {
        let mut closures: Vec<Closure<ID>> =
            queries.iter().map(|_| Closure::new(direction)).collect();
        let mut frontier = Vec::new();
        let mut depth = 1;

        for (index, query) in queries.iter().enumerate() {
            for base in query.bases() {
                if query.excludes(&base) {
                    continue;
                }

                self.budget.visit::<S::Error>(depth)?;
                closures[index].insert(
                    base,
                    ClosureNode {
                        depth,
                        origin: base,
                        tree_cycle: false,
                    },
                );
                frontier.push(FrontierItem {
                    closure: index,
                    container: base,
                    origin: base,
                    path: vec![base],
                });
            }
        }

        while !frontier.is_empty() {
            let containers: Vec<ID> = frontier
                .iter()
                .map(|item| item.container)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();

            trace!(
                ?direction,
                depth,
                frontier = containers.len(),
                "expanding traversal round"
            );

            let edges = match direction {
                Direction::Ancestors => {
                    self.budget
                        .fetch(self.source.parent_edges(&containers))
                        .await?
                }
                Direction::Descendants => {
                    self.budget
                        .fetch(self.source.child_edges(&containers))
                        .await?
                }
            };

            let mut adjacency: BTreeMap<ID, BTreeSet<ID>> = BTreeMap::new();
            for (from, to) in edges {
                adjacency.entry(from).or_default().insert(to);
            }

            depth += 1;

            // Candidates of this round keyed by closure and container. A container first reached
            // in this round from several items keeps the lowest origin.
            let mut candidates: BTreeMap<(usize, ID), FrontierItem<ID>> = BTreeMap::new();

            for item in &frontier {
                let Some(next) = adjacency.get(&item.container) else {
                    continue;
                };

                for to in next {
                    let closure = &mut closures[item.closure];

                    if item.path.contains(to) {
                        warn!(
                            from = %item.container,
                            to = %to,
                            ?direction,
                            "cycle detected in container hierarchy"
                        );
                        closure.mark_cycle(item.container, *to);
                        continue;
                    }

                    if queries[item.closure].excludes(to) || closure.contains(to) {
                        continue;
                    }

                    let replace = match candidates.get(&(item.closure, *to)) {
                        Some(existing) => item.origin < existing.origin,
                        None => true,
                    };

                    if replace {
                        let mut path = item.path.clone();
                        path.push(*to);
                        candidates.insert(
                            (item.closure, *to),
                            FrontierItem {
                                closure: item.closure,
                                container: *to,
                                origin: item.origin,
                                path,
                            },
                        );
                    }
                }
            }

            frontier = Vec::with_capacity(candidates.len());
            for ((index, container), item) in candidates {
                self.budget.visit::<S::Error>(depth)?;
                closures[index].insert(
                    container,
                    ClosureNode {
                        depth,
                        origin: item.origin,
                        tree_cycle: false,
                    },
                );
                frontier.push(item);
            }
        }

        Ok(closures)
    }
}
