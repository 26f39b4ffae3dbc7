//! Exact-key store
//!
//! Serves byte-equal key repeats. Used for the exact activity cache and for
//! weather, where a different date is always a different forecast.

use crate::cache::store::{StoreCore, StoreHit, TierStore};
use crate::cache::types::StoreId;
use crate::error::Result;
use async_trait::async_trait;

pub struct StrictStore {
    core: StoreCore,
}

impl StrictStore {
    pub fn new(id: StoreId, capacity: usize) -> Result<Self> {
        Ok(Self {
            core: StoreCore::new(id, capacity)?,
        })
    }
}

#[async_trait]
impl TierStore for StrictStore {
    type Query = str;

    fn core(&self) -> &StoreCore {
        &self.core
    }

    async fn lookup(&self, key: &str) -> Option<StoreHit> {
        let present = self.core.read().await.get(key).is_some();
        if !present {
            return self.core.miss();
        }
        self.core.hit(key, 1.0, None).await
    }
}
