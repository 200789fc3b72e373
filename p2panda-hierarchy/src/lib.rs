// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolve which projects a principal can access, and at which level, over an arbitrarily deep
//! hierarchy of containers (namespaces or groups).
//!
//! Access is derived from three sources:
//!
//! - Projects a principal owns personally.
//! - Memberships on containers, inherited by every nested container without decaying.
//! - Share links, which expose a container and everything below it to the members of another
//!   container, but never above the link's cap.
//!
//! Along one share path levels are combined with `min`, across independent paths with `max`.
//! Every project ends up with exactly one grant holding the greatest level any path allows.
//!
//! ## Edge sources
//!
//! The resolver does not own any data. All containers, memberships, share links and projects are
//! read through the batched `HierarchySource` and `EdgeSource` traits, which can be implemented
//! on top of any database offering indexed bulk reads. `MemoryEdgeSource` is an in-memory
//! implementation for tests and prototypes.
//!
//! All reads of one resolution need to observe the same data. When data changes concurrently,
//! resolve against a frozen snapshot (`MemoryEdgeSource::snapshot`, or a transaction in a
//! database adapter). Sources implementing `VersionedSource` can be used with a
//! `ResolutionCache`.
//!
//! ## Closures
//!
//! `ClosureEngine` computes ancestor and descendant closures in breadth-first rounds, issuing one
//! edge source read per round. Hierarchy data can be corrupted: edges closing a cycle are not
//! followed and reported in the resolution metadata instead of failing the call.
//!
//! ## Limits
//!
//! Every call is bounded by a maximum depth, a maximum number of visited containers and an
//! optional deadline or cancellation token. A call either returns the complete set of grants or
//! fails with a `ResolverError`, partial results are never returned.
//!
//! ## Example
//!
//! ```
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use p2panda_hierarchy::memory::MemoryEdgeSource;
//! use p2panda_hierarchy::{AccessLevel, ResolveOptions, Resolver, ShareLink};
//!
//! let source: MemoryEdgeSource<u64, u64, u64> = MemoryEdgeSource::new();
//!
//! // Group 1 contains group 2, which owns project 100. Group 3 owns project 300 and is shared
//! // with group 1 for reporters.
//! source.add_container(1, None).await?;
//! source.add_container(2, Some(1)).await?;
//! source.add_container(3, None).await?;
//! source.add_project(2, 100).await?;
//! source.add_project(3, 300).await?;
//! source
//!     .add_share_link(ShareLink::new(1, 3, AccessLevel::Reporter))
//!     .await?;
//! source.add_membership(7, 1, AccessLevel::Maintainer).await?;
//!
//! let resolver = Resolver::new(source);
//! let resolution = resolver.resolve(7, ResolveOptions::new()).await?;
//!
//! assert_eq!(resolution.level(&100), Some(AccessLevel::Maintainer));
//! assert_eq!(resolution.level(&300), Some(AccessLevel::Reporter));
//! # Ok(())
//! # }
//! ```
mod access;
pub mod budget;
pub mod closure;
pub mod config;
mod error;
#[cfg(feature = "memory")]
pub mod memory;
pub mod resolver;
#[cfg(any(test, feature = "test_utils"))]
mod test_utils;
pub mod traits;
pub mod types;

pub use access::{AccessLevel, AccessLevelError};
pub use closure::{Closure, ClosureEngine, ClosureQuery};
pub use config::{Config, ResolveOptions};
pub use error::{GraphLimit, ResolverError};
pub use resolver::{GrantSet, Resolution, ResolutionMetadata, Resolver};
pub use types::{Container, Membership, ProjectGrant, ShareLink};
