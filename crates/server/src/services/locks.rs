//! Per-resource admission locks. The availability check and the
//! status write that follows it must not interleave for the same
//! resource, or two requests can both observe free capacity and both
//! confirm. Distinct resources stay fully concurrent.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use bookflow_core::domain::resource::ResourceId;

#[derive(Clone, Default)]
pub struct ResourceLocks {
    inner: Arc<Mutex<HashMap<i64, Arc<Mutex<()>>>>>,
}

impl ResourceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for one resource, creating it on first use.
    /// The guard is owned so it can be held across await points.
    pub async fn acquire(&self, resource: ResourceId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(resource.0).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
        };
        lock.lock_owned().await
    }
}
