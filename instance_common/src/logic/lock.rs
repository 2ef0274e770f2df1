use std::sync::Arc;
use std::time::Duration;

use instance_defs::{SyncError, SyncLocker};
use log::{debug, warn};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::LockSettings;

/// Serialises sync passes per `account:infra_mapping` on top of a
/// [`SyncLocker`] backend.
///
/// A held lease is renewed in the background until the guard is released,
/// so a long pass keeps its lease while a crashed one loses it on expiry.
#[derive(Clone)]
pub struct SyncLock {
    locker: Arc<dyn SyncLocker>,
    settings: LockSettings,
}

/// Holds a lease until released or dropped.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard {
    key: String,
    token: String,
    lease: Duration,
    locker: Arc<dyn SyncLocker>,
    heartbeat: Option<JoinHandle<()>>,
    released: bool,
}

fn heartbeat(
    locker: Arc<dyn SyncLocker>,
    key: String,
    token: String,
    settings: LockSettings,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(settings.renew_interval()).await;
            match locker.renew(&key, &token, settings.lease).await {
                Ok(true) => debug!("Renewed sync lock {}", key),
                Ok(false) => {
                    warn!("Sync lock {} was taken over, stopping renewal", key);
                    return;
                }
                Err(e) => warn!("Failed to renew sync lock {}: {:?}", key, e),
            }
        }
    })
}

impl SyncLock {
    pub fn new(locker: Arc<dyn SyncLocker>, settings: LockSettings) -> Self {
        SyncLock { locker, settings }
    }

    pub fn settings(&self) -> &LockSettings {
        &self.settings
    }

    pub async fn try_acquire(&self, key: &str) -> Result<Option<LockGuard>, SyncError> {
        let Some(token) = self.locker.try_acquire(key, self.settings.lease).await? else {
            return Ok(None);
        };
        Ok(Some(LockGuard {
            key: key.to_string(),
            token: token.clone(),
            lease: self.settings.lease,
            locker: self.locker.clone(),
            heartbeat: Some(heartbeat(
                self.locker.clone(),
                key.to_string(),
                token,
                self.settings,
            )),
            released: false,
        }))
    }

    /// Polls for the lease until the acquire timeout elapses.
    pub async fn acquire(&self, key: &str) -> Result<LockGuard, SyncError> {
        let deadline = Instant::now() + self.settings.acquire_timeout;
        loop {
            if let Some(guard) = self.try_acquire(key).await? {
                return Ok(guard);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(SyncError::LockUnavailable(key.to_string()));
            }
            let wait = self
                .settings
                .retry_interval
                .min(deadline - now)
                .max(Duration::from_millis(1));
            tokio::time::sleep(wait).await;
        }
    }
}

impl LockGuard {
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Renews the lease and fails once another holder has taken it over.
    /// Callers check this right before writing.
    pub async fn ensure_held(&self) -> Result<(), SyncError> {
        if self.locker.renew(&self.key, &self.token, self.lease).await? {
            return Ok(());
        }
        warn!("Lost sync lock {} before writing, abandoning the pass", self.key);
        Err(SyncError::LockUnavailable(self.key.clone()))
    }

    pub async fn release(mut self) {
        self.stop_heartbeat();
        self.released = true;
        if let Err(e) = self.locker.release(&self.key, &self.token).await {
            warn!("Failed to release sync lock {}, leaving it to expire: {:?}", self.key, e);
        }
    }

    fn stop_heartbeat(&mut self) {
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.abort();
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.stop_heartbeat();
        if self.released {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let locker = self.locker.clone();
                let key = self.key.clone();
                let token = self.token.clone();
                runtime.spawn(async move {
                    if let Err(e) = locker.release(&key, &token).await {
                        warn!("Failed to release sync lock {}: {:?}", key, e);
                    }
                });
            }
            Err(_) => warn!("Sync lock {} dropped outside a runtime, leaving it to expire", self.key),
        }
    }
}
