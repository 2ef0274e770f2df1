use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use instance_defs::SyncLocker;
use log::{debug, warn};
use tokio::time::Instant;
use uuid::Uuid;

struct Lease {
    token: String,
    expires_at: Instant,
}

/// Process-local lease table. Expiry follows the tokio clock.
#[derive(Default)]
pub struct LeaseLocker {
    leases: Mutex<HashMap<String, Lease>>,
}

impl LeaseLocker {
    fn table(&self) -> MutexGuard<'_, HashMap<String, Lease>> {
        match self.leases.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn is_locked(&self, key: &str) -> bool {
        self.table()
            .get(key)
            .map_or(false, |lease| lease.expires_at > Instant::now())
    }

    /// Token of the current, unexpired holder.
    pub fn holder(&self, key: &str) -> Option<String> {
        self.table()
            .get(key)
            .filter(|lease| lease.expires_at > Instant::now())
            .map(|lease| lease.token.clone())
    }
}

#[async_trait]
impl SyncLocker for LeaseLocker {
    async fn try_acquire(
        &self,
        key: &str,
        lease: Duration,
    ) -> Result<Option<String>, anyhow::Error> {
        let now = Instant::now();
        let mut leases = self.table();
        if let Some(current) = leases.get(key) {
            if current.expires_at > now {
                return Ok(None);
            }
            warn!("Sync lock {} expired while held, taking it over", key);
        }
        let token = Uuid::new_v4().to_string();
        leases.insert(
            key.to_string(),
            Lease {
                token: token.clone(),
                expires_at: now + lease,
            },
        );
        debug!("Acquired sync lock {}", key);
        Ok(Some(token))
    }

    async fn renew(&self, key: &str, token: &str, lease: Duration) -> Result<bool, anyhow::Error> {
        let mut leases = self.table();
        match leases.get_mut(key) {
            Some(current) if current.token == token => {
                current.expires_at = Instant::now() + lease;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, key: &str, token: &str) -> Result<(), anyhow::Error> {
        let mut leases = self.table();
        if leases.get(key).map(|lease| lease.token.as_str()) == Some(token) {
            leases.remove(key);
            debug!("Released sync lock {}", key);
        }
        Ok(())
    }
}
