// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::AccessLevel;
use crate::traits::IdentityHandle;

/// A node in the container hierarchy (namespace or group).
///
/// The traversal path lists all ancestor ids from the root down to and including the container
/// itself. It is kept consistent with the `parent_id` chain and allows answering "is ancestor
/// of" without walking the hierarchy.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Container<ID> {
    id: ID,
    parent_id: Option<ID>,
    traversal_path: Vec<ID>,
}

impl<ID> Container<ID>
where
    ID: IdentityHandle,
{
    /// A container without a parent.
    pub fn root(id: ID) -> Self {
        Self {
            id,
            parent_id: None,
            traversal_path: vec![id],
        }
    }

    /// A container nested directly inside `parent`.
    pub fn child_of(id: ID, parent: &Container<ID>) -> Self {
        let mut traversal_path = parent.traversal_path.clone();
        traversal_path.push(id);

        Self {
            id,
            parent_id: Some(parent.id),
            traversal_path,
        }
    }

    pub fn id(&self) -> ID {
        self.id
    }

    pub fn parent_id(&self) -> Option<ID> {
        self.parent_id
    }

    pub fn traversal_path(&self) -> &[ID] {
        &self.traversal_path
    }

    /// Number of containers on the traversal path, 1 for a root container.
    pub fn depth(&self) -> usize {
        self.traversal_path.len()
    }

    /// Returns `true` if this container is a strict ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &Container<ID>) -> bool {
        match other.traversal_path.split_last() {
            Some((_, ancestors)) => ancestors.contains(&self.id),
            None => false,
        }
    }

    /// Returns `true` if this container is a strict descendant of `other`.
    pub fn is_descendant_of(&self, other: &Container<ID>) -> bool {
        other.is_ancestor_of(self)
    }
}

/// Direct membership of a principal in a container.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Membership<U, ID> {
    pub principal: U,
    pub container: ID,
    pub level: AccessLevel,
}

impl<U, ID> Membership<U, ID> {
    pub fn new(principal: U, container: ID, level: AccessLevel) -> Self {
        Self {
            principal,
            container,
            level,
        }
    }
}

/// Makes the `target` container, including everything nested below it, visible to members of
/// the `source` container, but never above `cap`.
///
/// Share links are a second edge type layered over the hierarchy and do not change it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShareLink<ID> {
    pub source: ID,
    pub target: ID,
    pub cap: AccessLevel,
}

impl<ID> ShareLink<ID> {
    pub fn new(source: ID, target: ID, cap: AccessLevel) -> Self {
        Self {
            source,
            target,
            cap,
        }
    }
}

/// Effective access of a principal to one project.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProjectGrant<P> {
    pub project: P,
    pub level: AccessLevel,
}

#[cfg(test)]
mod tests {
    use super::Container;

    #[test]
    fn traversal_paths() {
        let root = Container::root(1u32);
        let child = Container::child_of(2, &root);
        let grandchild = Container::child_of(3, &child);
        let other = Container::child_of(4, &root);

        assert_eq!(grandchild.traversal_path(), &[1, 2, 3]);
        assert_eq!(grandchild.parent_id(), Some(2));
        assert_eq!(root.parent_id(), None);
        assert_eq!(root.depth(), 1);
        assert_eq!(grandchild.depth(), 3);

        assert!(root.is_ancestor_of(&grandchild));
        assert!(child.is_ancestor_of(&grandchild));
        assert!(grandchild.is_descendant_of(&root));

        // Strict relation, a container is not its own ancestor.
        assert!(!child.is_ancestor_of(&child));

        // Siblings are unrelated.
        assert!(!other.is_ancestor_of(&grandchild));
        assert!(!child.is_ancestor_of(&other));
    }
}
