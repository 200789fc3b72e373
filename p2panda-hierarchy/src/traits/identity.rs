// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::{Debug, Display};
use std::hash::Hash as StdHash;

/// Identifier of a principal, container or project.
///
/// Identifiers are small, copyable values (usually database primary keys). They need a total
/// order so traversals and tie-breaks are deterministic.
pub trait IdentityHandle: Copy + Debug + Display + Eq + StdHash + Ord {}

impl IdentityHandle for u32 {}

impl IdentityHandle for u64 {}

impl IdentityHandle for i64 {}
