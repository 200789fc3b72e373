// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;

use crate::AccessLevel;
use crate::types::ShareLink;

use super::{ContainerId, ProjectId, TestSource, UserId};

fn random_level<R: Rng>(rng: &mut R) -> AccessLevel {
    AccessLevel::ALL[rng.random_range(0..AccessLevel::ALL.len())]
}

/// Randomly generated forest of containers with projects, memberships of one principal and share
/// links between arbitrary containers.
///
/// Besides loading the data into a memory edge source it computes the expected grants directly
/// from parent pointers, without any graph traversal.
#[derive(Clone, Debug)]
pub struct RandomHierarchy {
    pub principal: UserId,
    pub parents: BTreeMap<ContainerId, Option<ContainerId>>,
    pub projects: BTreeMap<ContainerId, Vec<ProjectId>>,
    pub personal_projects: Vec<ProjectId>,
    pub memberships: BTreeMap<ContainerId, AccessLevel>,
    pub share_links: Vec<ShareLink<ContainerId>>,
}

impl RandomHierarchy {
    pub fn generate<R: Rng>(rng: &mut R, containers: u32) -> Self {
        let mut parents = BTreeMap::new();
        let mut projects: BTreeMap<ContainerId, Vec<ProjectId>> = BTreeMap::new();
        let mut next_project = 1000;

        for id in 1..=containers {
            let parent = if id > 1 && rng.random_bool(0.8) {
                Some(rng.random_range(1..id))
            } else {
                None
            };
            parents.insert(id, parent);

            for _ in 0..rng.random_range(0..3) {
                projects.entry(id).or_default().push(next_project);
                next_project += 1;
            }
        }

        let mut personal_projects = Vec::new();
        if rng.random_bool(0.3) {
            personal_projects.push(next_project);
        }

        let mut memberships = BTreeMap::new();
        for _ in 0..rng.random_range(1..4) {
            memberships.insert(rng.random_range(1..=containers), random_level(rng));
        }

        let mut links = BTreeSet::new();
        for _ in 0..rng.random_range(0..5) {
            let source = rng.random_range(1..=containers);
            let target = rng.random_range(1..=containers);
            if source != target && !links.iter().any(|(s, t, _)| (*s, *t) == (source, target)) {
                links.insert((source, target, random_level(rng)));
            }
        }
        let share_links = links
            .into_iter()
            .map(|(source, target, cap)| ShareLink::new(source, target, cap))
            .collect();

        Self {
            principal: 'u',
            parents,
            projects,
            personal_projects,
            memberships,
            share_links,
        }
    }

    /// Writes the hierarchy into a fresh memory edge source.
    pub async fn load(&self) -> TestSource {
        let source = TestSource::new();
        // Parents always have a lower id, so they exist before their children.
        for (id, parent) in &self.parents {
            source
                .add_container(*id, *parent)
                .await
                .expect("parents are added first");
        }
        for (container, projects) in &self.projects {
            for project in projects {
                source
                    .add_project(*container, *project)
                    .await
                    .expect("container exists");
            }
        }
        for project in &self.personal_projects {
            source.add_personal_project(self.principal, *project).await;
        }
        for (container, level) in &self.memberships {
            source
                .add_membership(self.principal, *container, *level)
                .await
                .expect("container exists");
        }
        for link in &self.share_links {
            source.add_share_link(*link).await.expect("containers exist");
        }
        source
    }

    /// The container itself followed by all of its ancestors up to the root.
    pub fn path_to_root(&self, container: ContainerId) -> Vec<ContainerId> {
        let mut path = vec![container];
        let mut current = container;
        while let Some(Some(parent)) = self.parents.get(&current) {
            path.push(*parent);
            current = *parent;
        }
        path
    }

    /// Greatest membership level on the container or any of its ancestors.
    pub fn inherited_level(&self, container: ContainerId) -> Option<AccessLevel> {
        self.path_to_root(container)
            .iter()
            .filter_map(|id| self.memberships.get(id).copied())
            .max()
    }

    /// Level the principal holds on the source of a share link, if it can use the link at all.
    pub fn level_on_source(&self, source: ContainerId) -> Option<AccessLevel> {
        let below = self
            .memberships
            .iter()
            .filter(|(container, _)| self.path_to_root(**container).contains(&source))
            .map(|(_, level)| *level)
            .max();
        below.max(self.inherited_level(source))
    }

    /// Returns `true` if `container` is exposed by a share link, meaning it is the target or
    /// nested anywhere below it.
    pub fn is_shared_through(&self, link: &ShareLink<ContainerId>, container: ContainerId) -> bool {
        self.path_to_root(container).contains(&link.target)
    }

    /// Expected effective level of every accessible project.
    pub fn expected_grants(&self) -> BTreeMap<ProjectId, AccessLevel> {
        let mut grants = BTreeMap::new();
        let mut grant = |project: ProjectId, level: AccessLevel| {
            grants
                .entry(project)
                .and_modify(|current: &mut AccessLevel| *current = (*current).max(level))
                .or_insert(level);
        };

        for project in &self.personal_projects {
            grant(*project, AccessLevel::Owner);
        }

        for (container, projects) in &self.projects {
            let mut level = self.inherited_level(*container);

            for link in &self.share_links {
                if !self.is_shared_through(link, *container) {
                    continue;
                }
                if let Some(source_level) = self.level_on_source(link.source) {
                    level = level.max(Some(source_level.min(link.cap)));
                }
            }

            if let Some(level) = level {
                for project in projects {
                    grant(*project, level);
                }
            }
        }

        grants
    }
}
