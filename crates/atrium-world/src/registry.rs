//! World registry: the process-wide map of world key → running world.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use atrium_media::MediaSystem;
use tokio::sync::Mutex;

use crate::world::{spawn_world, WorldHandle};

/// Counter for world generations. An epoch identifies one *incarnation* of
/// a world, so a slow teardown can never evict a newer world that reused
/// the same key.
static NEXT_WORLD_EPOCH: AtomicU64 = AtomicU64::new(1);

/// Default command channel size for world actors.
const DEFAULT_CHANNEL_SIZE: usize = 64;

struct RegistryEntry<M: MediaSystem> {
    epoch: u64,
    handle: WorldHandle<M>,
}

struct RegistryInner<M: MediaSystem> {
    media: Arc<M>,
    worlds: Mutex<HashMap<String, RegistryEntry<M>>>,
}

/// Tracks every world in the process.
///
/// Worlds are created on the first join for an unknown key and remove
/// themselves the moment their last peer leaves. The registry's lock only
/// guards the map itself — each world is its own actor, so there is no
/// cross-world contention.
///
/// A handle obtained here can still lose a race against the world's own
/// teardown; operations then fail with
/// [`WorldError::Unavailable`](crate::WorldError::Unavailable) and the
/// caller re-fetches via [`get_or_create`](Self::get_or_create), which
/// spawns a fresh world if needed.
pub struct WorldRegistry<M: MediaSystem> {
    inner: Arc<RegistryInner<M>>,
}

impl<M: MediaSystem> Clone for WorldRegistry<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: MediaSystem> WorldRegistry<M> {
    /// Creates an empty registry. `media` is handed to every world it
    /// spawns.
    pub fn new(media: M) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                media: Arc::new(media),
                worlds: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The media subsystem shared by every world this registry spawns.
    pub fn media(&self) -> Arc<M> {
        Arc::clone(&self.inner.media)
    }

    /// Returns the live world for `key`, spawning one if the key is
    /// unknown or its previous world has already stopped.
    pub async fn get_or_create(&self, key: &str) -> WorldHandle<M> {
        let mut worlds = self.inner.worlds.lock().await;

        if let Some(entry) = worlds.get(key) {
            if !entry.handle.is_closed() {
                return entry.handle.clone();
            }
        }

        let epoch = NEXT_WORLD_EPOCH.fetch_add(1, Ordering::Relaxed);
        let handle = spawn_world(
            key,
            epoch,
            Arc::clone(&self.inner.media),
            RegistryRef {
                inner: Arc::downgrade(&self.inner),
            },
            DEFAULT_CHANNEL_SIZE,
        );
        worlds.insert(
            key.to_string(),
            RegistryEntry {
                epoch,
                handle: handle.clone(),
            },
        );
        tracing::info!(world = %key, "world registered");
        handle
    }

    /// Returns the live world for `key`, if one is running.
    pub async fn get(&self, key: &str) -> Option<WorldHandle<M>> {
        let worlds = self.inner.worlds.lock().await;
        worlds
            .get(key)
            .filter(|entry| !entry.handle.is_closed())
            .map(|entry| entry.handle.clone())
    }

    /// Whether a live world is registered for `key`.
    pub async fn contains(&self, key: &str) -> bool {
        self.get(key).await.is_some()
    }

    /// Number of registered worlds.
    pub async fn len(&self) -> usize {
        self.inner.worlds.lock().await.len()
    }

    /// Whether no worlds are registered.
    pub async fn is_empty(&self) -> bool {
        self.inner.worlds.lock().await.is_empty()
    }

    /// Force-removes a world: drops the entry and shuts the actor down,
    /// closing all of its media handles. Peers are not notified — this is
    /// the administrative path, not the leave protocol.
    pub async fn remove(&self, key: &str) {
        let entry = self.inner.worlds.lock().await.remove(key);
        if let Some(entry) = entry {
            let _ = entry.handle.shutdown().await;
            tracing::info!(world = %key, "world force-removed");
        }
    }
}

/// The world actor's way back to its registry for self-removal, weak so an
/// actor outliving the registry simply skips deregistration.
pub(crate) struct RegistryRef<M: MediaSystem> {
    inner: Weak<RegistryInner<M>>,
}

impl<M: MediaSystem> RegistryRef<M> {
    /// Removes the entry for `key` if it still belongs to the calling
    /// world's incarnation.
    pub(crate) async fn deregister(&self, key: &str, epoch: u64) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let mut worlds = inner.worlds.lock().await;
        if worlds.get(key).is_some_and(|entry| entry.epoch == epoch) {
            worlds.remove(key);
            tracing::info!(world = %key, "world deregistered (empty)");
        }
    }
}
