//! Balance cache with TTL read-through and coalesced refreshes.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument, warn};

use crate::config::ClientConfig;
use crate::domain::{BalanceSnapshot, ClientResult, ErrorResult, WalletBackend};
use crate::infra::BalanceMirror;

/// In-memory view of the wallet's balances.
///
/// Reads are served from the cache while entries are younger than the
/// configured TTL; anything older triggers a refresh. A refresh replaces
/// the whole map in one write so readers never observe a half-updated
/// snapshot, and concurrent refresh requests coalesce into a single
/// network fetch.
pub struct BalanceCache {
    backend: Arc<dyn WalletBackend>,
    ttl: chrono::Duration,
    entries: RwLock<HashMap<String, BalanceSnapshot>>,
    /// Bumped on every successful map replacement. A caller that waited
    /// on `refresh_lock` compares generations to detect that the fetch
    /// it wanted already happened.
    generation: AtomicU64,
    refresh_lock: Mutex<()>,
    mirror: Option<BalanceMirror>,
}

impl BalanceCache {
    #[must_use]
    pub fn new(backend: Arc<dyn WalletBackend>, config: &ClientConfig) -> Self {
        let mirror = config
            .mirror_path
            .as_ref()
            .map(|path| BalanceMirror::new(path.clone(), config.offline_max_age));
        Self {
            backend,
            ttl: chrono::Duration::from_std(config.balance_ttl)
                .unwrap_or_else(|_| chrono::Duration::seconds(120)),
            entries: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
            refresh_lock: Mutex::new(()),
            mirror,
        }
    }

    /// Balance for one asset, refreshing first if the cached entry is
    /// missing or older than the TTL.
    #[instrument(skip(self))]
    pub async fn get(&self, asset: &str) -> ClientResult<BalanceSnapshot> {
        let now = Utc::now();
        {
            let entries = self.entries.read().await;
            if let Some(snapshot) = entries.get(asset) {
                if snapshot.is_fresh(now, self.ttl) {
                    return Ok(snapshot.clone());
                }
            }
        }

        self.force_refresh().await?;

        let entries = self.entries.read().await;
        entries
            .get(asset)
            .cloned()
            .ok_or_else(|| ErrorResult::not_found(format!("no balance held for asset {}", asset)))
    }

    /// All cached balances, refreshing first if any entry is missing or
    /// stale.
    pub async fn get_all(&self) -> ClientResult<Vec<BalanceSnapshot>> {
        let now = Utc::now();
        {
            let entries = self.entries.read().await;
            if !entries.is_empty() && entries.values().all(|s| s.is_fresh(now, self.ttl)) {
                return Ok(entries.values().cloned().collect());
            }
        }

        self.force_refresh().await
    }

    /// Drop one asset's entry so the next read goes to the network.
    pub async fn invalidate(&self, asset: &str) {
        self.entries.write().await.remove(asset);
    }

    /// Drop every entry.
    pub async fn invalidate_all(&self) {
        self.entries.write().await.clear();
    }

    /// Fetch a fresh snapshot and replace the cache atomically.
    ///
    /// Callers that arrive while a fetch is in flight wait for it and
    /// share its result instead of issuing their own.
    #[instrument(skip(self))]
    pub async fn force_refresh(&self) -> ClientResult<Vec<BalanceSnapshot>> {
        let observed = self.generation.load(Ordering::Acquire);
        let _guard = self.refresh_lock.lock().await;
        if self.generation.load(Ordering::Acquire) != observed {
            // Another caller refreshed while we waited for the guard.
            debug!("Coalesced into a concurrent balance refresh");
            let entries = self.entries.read().await;
            return Ok(entries.values().cloned().collect());
        }

        match self.backend.fetch_balances().await {
            Ok(mut balances) => {
                let now = Utc::now();
                for snapshot in &mut balances {
                    snapshot.fetched_at = now;
                }
                self.replace(&balances).await;
                if let Some(mirror) = &self.mirror {
                    mirror.store(&balances).await;
                }
                debug!(assets = balances.len(), "Balance cache refreshed");
                Ok(balances)
            }
            Err(e) => {
                warn!(error = %e, "Balance refresh failed");
                if self.entries.read().await.is_empty() {
                    if let Some(mirror) = &self.mirror {
                        if let Some(balances) = mirror.load().await {
                            warn!(
                                assets = balances.len(),
                                "Serving last-known balances from offline mirror"
                            );
                            // Mirrored entries keep their original fetch
                            // time, so the next read retries the network.
                            self.replace(&balances).await;
                            return Ok(balances);
                        }
                    }
                }
                Err(e)
            }
        }
    }

    async fn replace(&self, balances: &[BalanceSnapshot]) {
        let map = balances
            .iter()
            .map(|s| (s.asset.clone(), s.clone()))
            .collect();
        *self.entries.write().await = map;
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}
