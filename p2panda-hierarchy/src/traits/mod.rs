// SPDX-License-Identifier: MIT OR Apache-2.0

mod cache;
mod edge_source;
mod identity;

pub use cache::ResolutionCache;
pub use edge_source::{EdgeSource, HierarchySource, VersionedSource};
pub use identity::IdentityHandle;
