// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::HashMap;
use std::convert::Infallible;
use std::hash::Hash as StdHash;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::resolver::Resolution;
use crate::traits::ResolutionCache;

/// Resolution cache keeping the latest resolution per principal in memory.
///
/// Storing a resolution for a principal replaces any older one, so the cache never holds more
/// than one entry per principal.
#[derive(Clone, Debug)]
pub struct MemoryCache<U, P> {
    entries: Arc<RwLock<HashMap<U, (u64, Resolution<P>)>>>,
}

impl<U, P> Default for MemoryCache<U, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U, P> MemoryCache<U, P> {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

impl<U, P> ResolutionCache<U, P> for MemoryCache<U, P>
where
    U: Eq + StdHash,
    P: Clone,
{
    type Error = Infallible;

    async fn get(
        &self,
        principal: &U,
        snapshot_version: u64,
    ) -> Result<Option<Resolution<P>>, Self::Error> {
        let entries = self.entries.read().await;
        let resolution = entries
            .get(principal)
            .filter(|(version, _)| *version == snapshot_version)
            .map(|(_, resolution)| resolution.clone());
        Ok(resolution)
    }

    async fn set(
        &self,
        principal: U,
        snapshot_version: u64,
        resolution: Resolution<P>,
    ) -> Result<(), Self::Error> {
        let mut entries = self.entries.write().await;
        entries.insert(principal, (snapshot_version, resolution));
        Ok(())
    }
}
