//! Per-destination tunnel pool
//!
//! Opens one tunnel per destination on first use and hands the same tunnel
//! to every later datagram for that destination.

use super::cache::DestinationKey;
use crate::transport::{Tunnel, TunnelConnector};
use anyhow::{Context, Result};
use dashmap::DashMap;
use futures::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::timeout;
use tracing::{debug, warn};

type TunnelSlot = Arc<OnceCell<Arc<dyn Tunnel>>>;

/// Concurrent map from destination to its open tunnel
#[derive(Debug)]
pub struct TunnelPool {
    connector: Arc<dyn TunnelConnector>,
    tunnels: DashMap<DestinationKey, TunnelSlot>,
}

impl TunnelPool {
    /// Create an empty pool that opens tunnels through `connector`
    pub fn new(connector: Arc<dyn TunnelConnector>) -> Self {
        TunnelPool {
            connector,
            tunnels: DashMap::new(),
        }
    }

    /// Return the tunnel for `key`, opening it if this is the first use
    ///
    /// Concurrent callers for the same key wait on a single open. `on_open`
    /// runs once per opened tunnel, in the caller that opened it, after the
    /// tunnel is visible in the pool, so whatever it starts may already
    /// [`remove`](Self::remove) the tunnel again.
    pub async fn get_or_open<F>(&self, key: DestinationKey, on_open: F) -> Result<Arc<dyn Tunnel>>
    where
        F: FnOnce(Arc<dyn Tunnel>),
    {
        let slot = self.tunnels.entry(key).or_default().value().clone();
        let opened = AtomicBool::new(false);
        let opened_here = &opened;

        let tunnel = slot
            .get_or_try_init(|| async move {
                let addr = key.addr();
                let tunnel = self
                    .connector
                    .open(&addr.ip().to_string(), addr.port())
                    .await
                    .with_context(|| format!("Failed to open tunnel for {}", key))?;
                opened_here.store(true, Ordering::Release);
                Ok::<_, anyhow::Error>(tunnel)
            })
            .await?
            .clone();

        if opened.load(Ordering::Acquire) {
            on_open(tunnel.clone());
        }

        Ok(tunnel)
    }

    /// Tunnel currently open for `key`
    pub fn get(&self, key: &DestinationKey) -> Option<Arc<dyn Tunnel>> {
        self.tunnels
            .get(key)
            .and_then(|slot| slot.value().get().cloned())
    }

    /// Forget `tunnel` if it is still the one bound to `key`
    ///
    /// Returns true when the entry was removed.
    pub fn remove(&self, key: &DestinationKey, tunnel: &Arc<dyn Tunnel>) -> bool {
        self.tunnels
            .remove_if(key, |_, slot| {
                slot.get()
                    .map_or(false, |current| Arc::ptr_eq(current, tunnel))
            })
            .is_some()
    }

    /// Number of destinations with an open or opening tunnel
    pub fn len(&self) -> usize {
        self.tunnels.len()
    }

    /// Whether the pool holds no tunnels
    pub fn is_empty(&self) -> bool {
        self.tunnels.is_empty()
    }

    /// Close and forget every tunnel
    ///
    /// Tunnels are closed concurrently and each close gets at most `grace`,
    /// so one unresponsive relay cannot hold up the rest.
    pub async fn close_all(&self, grace: Duration) {
        let keys: Vec<DestinationKey> = self.tunnels.iter().map(|entry| *entry.key()).collect();

        let closing = keys.into_iter().filter_map(|key| {
            let (_, slot) = self.tunnels.remove(&key)?;
            let tunnel = slot.get()?.clone();
            Some(async move {
                debug!("Closing tunnel for {}", key);
                if timeout(grace, tunnel.close()).await.is_err() {
                    warn!("Tunnel for {} did not close within {:?}", key, grace);
                }
            })
        });

        join_all(closing).await;
    }
}
